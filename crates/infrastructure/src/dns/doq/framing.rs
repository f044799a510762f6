use super::{negotiated_alpn, RFC9250_PROTO};
use quinn::{RecvStream, SendStream};
use thiserror::Error;

/// How a DNS message is delimited on a DoQ stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoqFraming {
    /// Draft tokens: the bare message, terminated by the stream FIN.
    Unprefixed,
    /// RFC 9250 (`doq`): a 2-byte big-endian length, then the message.
    LengthPrefixed,
}

impl DoqFraming {
    pub fn for_alpn(alpn: Option<&[u8]>) -> Self {
        match alpn {
            Some(proto) if proto == RFC9250_PROTO.as_bytes() => DoqFraming::LengthPrefixed,
            _ => DoqFraming::Unprefixed,
        }
    }

    pub fn for_connection(conn: &quinn::Connection) -> Self {
        Self::for_alpn(negotiated_alpn(conn).as_deref())
    }
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error(transparent)]
    Connection(#[from] quinn::ConnectionError),

    #[error(transparent)]
    Write(#[from] quinn::WriteError),

    #[error(transparent)]
    Read(#[from] quinn::ReadError),

    #[error(transparent)]
    Closed(#[from] quinn::ClosedStream),

    /// The peer finished the stream before a complete message arrived.
    #[error("EOF")]
    Eof,

    #[error("DNS message of {0} bytes exceeds the DoQ maximum")]
    TooLarge(usize),

    /// Bytes followed a length-prefixed message before the FIN.
    #[error("data after the DNS message on a DoQ stream")]
    TrailingData,
}

/// Writes one message and half-closes the stream.
pub async fn write_message(
    send: &mut SendStream,
    framing: DoqFraming,
    message_bytes: &[u8],
) -> Result<(), StreamError> {
    if framing == DoqFraming::LengthPrefixed {
        let length = u16::try_from(message_bytes.len())
            .map_err(|_| StreamError::TooLarge(message_bytes.len()))?;
        send.write_all(&length.to_be_bytes()).await?;
    }
    send.write_all(message_bytes).await?;
    send.finish()?;
    Ok(())
}

/// Reads one message into `buf`, returning its length.
///
/// Unprefixed messages end at the peer's FIN; the read never completes on
/// partial data.
pub async fn read_message(
    recv: &mut RecvStream,
    framing: DoqFraming,
    buf: &mut [u8],
) -> Result<usize, StreamError> {
    match framing {
        DoqFraming::Unprefixed => read_until_fin(recv, buf).await,
        DoqFraming::LengthPrefixed => read_with_length_prefix(recv, buf).await,
    }
}

/// Reads the single query a client sends on a stream.
///
/// Unlike [`read_message`], a length-prefixed query is only complete once
/// the client has half-closed the stream, and anything after the message is
/// an error.
pub async fn read_request(
    recv: &mut RecvStream,
    framing: DoqFraming,
    buf: &mut [u8],
) -> Result<usize, StreamError> {
    match framing {
        DoqFraming::Unprefixed => read_until_fin(recv, buf).await,
        DoqFraming::LengthPrefixed => {
            let len = read_with_length_prefix(recv, buf).await?;
            expect_fin(recv).await?;
            Ok(len)
        }
    }
}

async fn expect_fin(recv: &mut RecvStream) -> Result<(), StreamError> {
    let mut extra = [0u8; 1];
    match recv.read(&mut extra).await? {
        None => Ok(()),
        Some(_) => Err(StreamError::TrailingData),
    }
}

async fn read_until_fin(recv: &mut RecvStream, buf: &mut [u8]) -> Result<usize, StreamError> {
    let mut filled = 0;

    loop {
        if filled == buf.len() {
            let mut extra = [0u8; 1];
            return match recv.read(&mut extra).await? {
                None => Ok(filled),
                Some(_) => Err(StreamError::TooLarge(filled + 1)),
            };
        }

        match recv.read(&mut buf[filled..]).await? {
            Some(n) => filled += n,
            None => break,
        }
    }

    if filled == 0 {
        return Err(StreamError::Eof);
    }
    Ok(filled)
}

async fn read_with_length_prefix(
    recv: &mut RecvStream,
    buf: &mut [u8],
) -> Result<usize, StreamError> {
    let mut len_buf = [0u8; 2];
    read_exact(recv, &mut len_buf).await?;

    let message_len = u16::from_be_bytes(len_buf) as usize;
    if message_len > buf.len() {
        return Err(StreamError::TooLarge(message_len));
    }
    if message_len == 0 {
        return Err(StreamError::Eof);
    }

    read_exact(recv, &mut buf[..message_len]).await?;
    Ok(message_len)
}

async fn read_exact(recv: &mut RecvStream, buf: &mut [u8]) -> Result<(), StreamError> {
    recv.read_exact(buf).await.map_err(|e| match e {
        quinn::ReadExactError::FinishedEarly(_) => StreamError::Eof,
        quinn::ReadExactError::ReadError(e) => StreamError::Read(e),
    })
}
