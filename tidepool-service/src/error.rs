//! Error types for session-fatal conditions.

use crate::framing::FrameError;
use crate::send_queue::SendQueueError;
use std::io;
use thiserror::Error;

/// Umbrella error for conditions that terminate a session.
///
/// On a stream connection any of these tears the session down with a
/// descriptive reason; other sessions are unaffected. On a datagram socket
/// the same conditions cost one packet, never the loop.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// I/O failure on read, write or connect.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// Malformed PDU or an invalid buffer-growth request.
    #[error(transparent)]
    Framing(#[from] FrameError),

    /// The request processor signaled an unrecoverable failure.
    #[error("request processing failed: {0}")]
    Processing(String),

    /// The owning transport was closed while the operation was in flight.
    #[error("operation cancelled: transport closed")]
    Cancelled,
}

impl From<SendQueueError> for ServiceError {
    fn from(err: SendQueueError) -> Self {
        match err {
            SendQueueError::Cancelled => ServiceError::Cancelled,
            SendQueueError::Io(message) => ServiceError::Transport(io::Error::other(message)),
        }
    }
}
