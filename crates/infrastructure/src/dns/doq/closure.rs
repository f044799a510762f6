//! Tells an orderly QUIC teardown apart from a real transport failure.
//!
//! Typed quinn errors are matched structurally. Anything else falls back to
//! the textual patterns QUIC stacks use for the same events, so errors that
//! only survive as strings (wrapped, logged, relayed) still classify.

use super::framing::StreamError;
use quinn::{ConnectionError, ReadError, TransportErrorCode, VarInt, WriteError};
use std::error::Error;

/// True when `err` means the peer or the transport closed the connection
/// normally or through idleness: safe to discard and redial.
pub fn is_expected_closure(err: &(dyn Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(expected) = classify_typed(e) {
            return expected;
        }
        if is_closed_error_text(&e.to_string()) {
            return true;
        }
        current = e.source();
    }
    false
}

/// Textual patterns for closure: explicit server close, idle timeout,
/// application close with code 0, and a bare end-of-stream.
pub fn is_closed_error_text(text: &str) -> bool {
    text.contains("server closed")
        || text.contains("No recent network activity")
        || text.ends_with("Application error 0x0")
        || text == "EOF"
}

fn classify_typed(e: &(dyn Error + 'static)) -> Option<bool> {
    if let Some(err) = e.downcast_ref::<ConnectionError>() {
        return Some(connection_closed_cleanly(err));
    }
    if let Some(err) = e.downcast_ref::<ReadError>() {
        return Some(match err {
            ReadError::ConnectionLost(conn) => connection_closed_cleanly(conn),
            ReadError::Reset(code) => *code == VarInt::from_u32(0),
            _ => false,
        });
    }
    if let Some(err) = e.downcast_ref::<WriteError>() {
        return Some(match err {
            WriteError::ConnectionLost(conn) => connection_closed_cleanly(conn),
            WriteError::Stopped(code) => *code == VarInt::from_u32(0),
            _ => false,
        });
    }
    if let Some(err) = e.downcast_ref::<StreamError>() {
        return Some(match err {
            StreamError::Connection(conn) => connection_closed_cleanly(conn),
            StreamError::Read(read) => is_expected_closure(read),
            StreamError::Write(write) => is_expected_closure(write),
            StreamError::Eof => true,
            StreamError::Closed(_) | StreamError::TooLarge(_) | StreamError::TrailingData => false,
        });
    }
    if let Some(err) = e.downcast_ref::<std::io::Error>() {
        // A truncated read is not a clean end-of-stream; only the wrapped
        // error, if any, decides.
        return err.get_ref().map(|inner| is_expected_closure(inner));
    }
    None
}

fn connection_closed_cleanly(err: &ConnectionError) -> bool {
    match err {
        ConnectionError::ApplicationClosed(close) => close.error_code == VarInt::from_u32(0),
        ConnectionError::ConnectionClosed(close) => close.error_code == TransportErrorCode::NO_ERROR,
        ConnectionError::TimedOut | ConnectionError::LocallyClosed => true,
        _ => false,
    }
}
