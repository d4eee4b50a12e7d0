//! Transfer session state.

use std::fmt;

use crate::error::ErrorKind;

/// Lifecycle of a transfer session.
///
/// ```text
/// Idle -> Announcing -> Transferring -> Completed
///             |              |
///             +--------------+--> Failed | Aborted
/// ```
///
/// Only [`reset`](super::OtaTransfer::reset) returns a session to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No transfer started.
    #[default]
    Idle,
    /// Size announcement in flight.
    Announcing,
    /// Chunk delivery in progress.
    Transferring,
    /// Every byte was written.
    Completed,
    /// A handshake or chunk write failed.
    Failed,
    /// Stopped by the caller.
    Aborted,
}

impl SessionState {
    /// Returns `true` for `Completed`, `Failed` and `Aborted`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }

    /// Returns `true` while writes may still be issued.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Announcing | Self::Transferring)
    }

    /// Whether status notifications are merged into progress in this state.
    pub fn accepts_status(self) -> bool {
        matches!(
            self,
            Self::Announcing | Self::Transferring | Self::Completed
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Announcing => write!(f, "announcing"),
            Self::Transferring => write!(f, "transferring"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Mutable state of one transfer, owned by the state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferSession {
    pub(crate) offset: u64,
    pub(crate) chunk_size: u32,
    pub(crate) state: SessionState,
    pub(crate) last_error: Option<ErrorKind>,
    pub(crate) payload_len: u64,
    pub(crate) chunks_sent: u64,
}

impl TransferSession {
    pub(crate) fn new(payload_len: u64, chunk_size: u32) -> Self {
        Self {
            chunk_size,
            payload_len,
            ..Self::default()
        }
    }

    /// Bytes acknowledged by the link so far; the next chunk starts here.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Chunk size, fixed for the session.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Failure that put the session into `Failed`, if any.
    pub fn last_error(&self) -> Option<ErrorKind> {
        self.last_error
    }

    /// Length of the payload being sent.
    pub fn payload_len(&self) -> u64 {
        self.payload_len
    }

    /// Number of chunk writes acknowledged by the link.
    pub fn chunks_sent(&self) -> u64 {
        self.chunks_sent
    }

    /// Bytes still to send.
    pub fn remaining(&self) -> u64 {
        self.payload_len.saturating_sub(self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_classification() {
        assert!(!SessionState::Idle.is_terminal());
        assert!(SessionState::Completed.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(SessionState::Aborted.is_terminal());

        assert!(SessionState::Transferring.is_active());
        assert!(!SessionState::Completed.is_active());

        assert!(SessionState::Completed.accepts_status());
        assert!(!SessionState::Idle.accepts_status());
        assert!(!SessionState::Aborted.accepts_status());
        assert!(!SessionState::Failed.accepts_status());
    }

    #[test]
    fn test_new_session() {
        let session = TransferSession::new(1000, 300);
        assert_eq!(session.offset(), 0);
        assert_eq!(session.chunk_size(), 300);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.remaining(), 1000);
        assert!(session.last_error().is_none());
    }
}
