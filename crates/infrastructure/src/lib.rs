//! Ferrous DoQ Infrastructure Layer
pub mod dns;
