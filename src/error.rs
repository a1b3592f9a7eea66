use std::io;
use thiserror::Error;

use crate::session::SessionState;

/// Errors surfaced by the protocol engine.
///
/// The engine never logs and never retries; every failure is handed to the
/// caller. A `Parse` error poisons the parser it came from, `Protocol` and
/// `UnsupportedVersion` move the session to `Disconnected`, and `State`
/// leaves the session untouched so the caller can decide what to do next.
#[derive(Error, Debug)]
pub enum StompError {
    /// Wire bytes could not be decoded.
    #[error("parse error at byte {offset}: {message}")]
    Parse { offset: u64, message: String },
    /// A syntactically valid frame violates the protocol tables.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// An operation was attempted in a session state that does not permit it.
    #[error("{message} [state: {state}]")]
    State {
        state: SessionState,
        message: String,
    },
    /// CONNECTED named a version outside the requested set.
    #[error("unsupported version [{0}]")]
    UnsupportedVersion(String),
    /// The reconnect schedule ran out of attempts.
    #[error("reconnect attempts exhausted after {attempts} retries")]
    FailoverExhausted { attempts: u64 },
    /// A broker or failover URI could not be parsed.
    #[error("invalid uri: {0}")]
    InvalidUri(String),
    /// I/O error from the surrounding transport.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, StompError>;
