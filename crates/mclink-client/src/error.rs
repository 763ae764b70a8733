//! Client error types.

use thiserror::Error;

use mclink_protocol::{FirmwareErrorCode, ProtocolError};

/// Errors surfaced to callers of the client API.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport I/O failure.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire-level decode failure.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A command with the same correlation key is already in flight.
    /// No I/O was performed.
    #[error("a command awaiting the same response is already in flight")]
    Busy,

    /// No matching response arrived within the caller's deadline.
    #[error("command timed out")]
    CommandTimeout,

    /// The link is down. All pending commands fail with this; the
    /// connection must be reopened explicitly.
    #[error("disconnected")]
    Disconnected,

    /// A key-prefix lookup matched more than one contact.
    #[error("public key prefix matches more than one contact")]
    AmbiguousPrefix,

    /// The device answered with an error frame.
    #[error("device error: {0}")]
    Firmware(FirmwareErrorCode),
}

impl ClientError {
    /// Whether this error means the connection is unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClientError::Io(_) | ClientError::Disconnected)
    }
}
