//! Error types for otalink.

use std::io;
use thiserror::Error;

use crate::transfer::SessionState;

/// Result type for otalink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for otalink operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad chunk size or payload, rejected before any I/O.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation not allowed in the current session state.
    #[error("Operation not allowed while session is {state}")]
    InvalidState {
        /// State the session was in when the call was made.
        state: SessionState,
    },

    /// The size announcement write was rejected or timed out.
    #[error("Handshake failed: {0}")]
    HandshakeFailed(#[source] LinkError),

    /// A data write was rejected or timed out.
    #[error("Chunk write failed at offset {offset}: {source}")]
    ChunkWriteFailed {
        /// Payload offset of the chunk that failed; resume restarts here.
        offset: u64,
        /// Underlying link fault.
        #[source]
        source: LinkError,
    },

    /// The caller aborted the transfer.
    #[error("Transfer aborted at offset {offset}")]
    Aborted {
        /// Offset reached when the abort took effect.
        offset: u64,
    },

    /// Status record could not be decoded.
    #[error("Status decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Transport fault outside of a transfer write.
    #[error("Link error: {0}")]
    Link(#[from] LinkError),
}

impl Error {
    /// Session-level classification of this error, if it terminates a session.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::InvalidConfig(_) => Some(ErrorKind::InvalidConfig),
            Self::HandshakeFailed(_) => Some(ErrorKind::HandshakeFailed),
            Self::ChunkWriteFailed { .. } => Some(ErrorKind::ChunkWriteFailed),
            _ => None,
        }
    }

    /// Offset at which the transfer stopped, when known.
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::ChunkWriteFailed { offset, .. } | Self::Aborted { offset } => Some(*offset),
            Self::HandshakeFailed(_) => Some(0),
            _ => None,
        }
    }
}

/// Compact failure classification stored in a session's `last_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad chunk size or payload.
    InvalidConfig,
    /// Size announcement rejected.
    HandshakeFailed,
    /// Data write rejected or timed out.
    ChunkWriteFailed,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidConfig => write!(f, "invalid configuration"),
            Self::HandshakeFailed => write!(f, "handshake failed"),
            Self::ChunkWriteFailed => write!(f, "chunk write failed"),
        }
    }
}

/// Status record decoding failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Invalid UTF-8 or not a well-formed structured record.
    #[error("malformed status record: {0}")]
    Malformed(String),

    /// Empty input, or a value that is not a record.
    #[error("empty status record")]
    Empty,
}

/// Opaque transport fault reported by a link adapter.
#[derive(Debug, Error)]
pub enum LinkError {
    /// I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The write did not complete within the configured timeout.
    #[error("write timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The link is closed or its worker has gone away.
    #[error("link closed")]
    Closed,

    /// The transport refused the operation.
    #[error("rejected: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        let err = Error::ChunkWriteFailed {
            offset: 600,
            source: LinkError::Closed,
        };
        assert_eq!(err.kind(), Some(ErrorKind::ChunkWriteFailed));
        assert_eq!(err.offset(), Some(600));

        let err = Error::HandshakeFailed(LinkError::Rejected("busy".into()));
        assert_eq!(err.kind(), Some(ErrorKind::HandshakeFailed));

        let err = Error::Aborted { offset: 300 };
        assert_eq!(err.kind(), None);
        assert_eq!(err.offset(), Some(300));
    }

    #[test]
    fn test_error_display_includes_offset() {
        let err = Error::ChunkWriteFailed {
            offset: 1024,
            source: LinkError::Timeout(std::time::Duration::from_millis(250)),
        };
        let text = err.to_string();
        assert!(text.contains("1024"));
        assert!(text.contains("timed out"));
    }
}
