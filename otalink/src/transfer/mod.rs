//! Chunked transfer state machine.
//!
//! [`OtaTransfer`] owns one session at a time. It announces the payload size,
//! then writes the payload chunk by chunk, awaiting each write before issuing
//! the next. Status notifications from the device are merged into a progress
//! snapshot by a separate pump task and never touch the delivery state.
//!
//! ## Example
//!
//! ```rust,no_run
//! use otalink::{MemoryLink, OtaTransfer, TransferConfig};
//!
//! # async fn run() -> otalink::Result<()> {
//! let firmware = std::fs::read("firmware.bin").unwrap_or_default();
//! let mut link = MemoryLink::new().with_device();
//! let mut transfer = OtaTransfer::new(TransferConfig::default());
//!
//! let mut progress = transfer.subscribe();
//! tokio::spawn(async move {
//!     while progress.changed().await.is_ok() {
//!         println!("{:.1}%", progress.borrow().percent);
//!     }
//! });
//!
//! let report = transfer.start(&firmware, 512, &mut link).await?;
//! println!("sent {} bytes in {} chunks", report.bytes_sent, report.chunks_sent);
//! # Ok(())
//! # }
//! ```

mod session;

pub use session::{SessionState, TransferSession};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{DecodeError, Error, ErrorKind, LinkError, Result};
use crate::link::Link;
use crate::progress::{self, ProgressSnapshot};
use crate::protocol::{segment, size_announcement, status};

/// Default per-write timeout.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Transfer policy knobs.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Per-write timeout; `None` waits indefinitely.
    pub write_timeout: Option<Duration>,
    /// Largest payload accepted by `start`.
    pub max_payload: Option<u64>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            write_timeout: Some(DEFAULT_WRITE_TIMEOUT),
            max_payload: None,
        }
    }
}

impl TransferConfig {
    /// Set the per-write timeout.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the payload size limit.
    #[must_use]
    pub fn with_max_payload(mut self, max: Option<u64>) -> Self {
        self.max_payload = max;
        self
    }
}

/// Summary of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Total bytes acknowledged by the link.
    pub bytes_sent: u64,
    /// Total chunk writes acknowledged by the link.
    pub chunks_sent: u64,
    /// Wall time of the call that completed the session.
    pub elapsed: Duration,
}

/// Cloneable handle that stops a running transfer.
///
/// Abort is cooperative: a write already in flight is allowed to settle and
/// its result is discarded, then no further writes are issued.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
    state: watch::Receiver<SessionState>,
}

impl AbortHandle {
    /// Request an abort. Returns `false` when no transfer is active.
    pub fn abort(&self) -> bool {
        let state = *self.state.borrow();
        if state.is_active() {
            info!("Abort requested while {state}");
            self.flag.store(true, Ordering::SeqCst);
            true
        } else {
            debug!("Ignoring abort while {state}");
            false
        }
    }

    /// Whether an abort is pending.
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Cloneable handle that feeds status notifications into the progress model.
#[derive(Debug, Clone)]
pub struct StatusListener {
    state: watch::Receiver<SessionState>,
    progress: Arc<watch::Sender<ProgressSnapshot>>,
}

impl StatusListener {
    /// Decode a raw notification and merge it into progress.
    ///
    /// Returns the new snapshot, or `None` when the session state does not
    /// accept status. Decode errors are logged and returned; they never
    /// change the session.
    pub fn on_status_notification(
        &self,
        raw: &[u8],
    ) -> std::result::Result<Option<ProgressSnapshot>, DecodeError> {
        let state = *self.state.borrow();
        if !state.accepts_status() {
            debug!("Ignoring status notification while {state}");
            return Ok(None);
        }

        let decoded = match status::decode(raw) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("Ignoring status notification: {e}");
                return Err(e);
            },
        };
        trace!("Status notification: {decoded:?}");

        let text = String::from_utf8_lossy(raw)
            .trim_matches(|c: char| c.is_whitespace() || c == '\0')
            .to_string();

        let mut next = None;
        self.progress.send_modify(|snap| {
            if let Some(ota_size) = decoded.ota_size {
                if ota_size != snap.payload_size && snap.status.ota_size != Some(ota_size) {
                    warn!(
                        "Device reports ota_size {ota_size}, host is sending {} bytes",
                        snap.payload_size
                    );
                }
            }
            let updated = progress::update(snap, &decoded, snap.payload_size).with_raw(text);
            next = Some(updated.clone());
            *snap = updated;
        });

        if let Some(snap) = &next {
            debug!(
                "Progress {:.1}% (segment {:?}, used {:?})",
                snap.percent, snap.status.segment, snap.status.used_bytes
            );
        }
        Ok(next)
    }
}

/// Chunked OTA transfer engine.
pub struct OtaTransfer {
    config: TransferConfig,
    session: TransferSession,
    state_tx: watch::Sender<SessionState>,
    progress_tx: Arc<watch::Sender<ProgressSnapshot>>,
    abort: Arc<AtomicBool>,
    pump: Option<JoinHandle<()>>,
}

impl OtaTransfer {
    /// Create an idle engine.
    pub fn new(config: TransferConfig) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        let (progress_tx, _) = watch::channel(ProgressSnapshot::default());
        Self {
            config,
            session: TransferSession::default(),
            state_tx,
            progress_tx: Arc::new(progress_tx),
            abort: Arc::new(AtomicBool::new(false)),
            pump: None,
        }
    }

    /// Current session.
    pub fn session(&self) -> &TransferSession {
        &self.session
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.session.state
    }

    /// Latest progress snapshot.
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress_tx.borrow().clone()
    }

    /// Observe progress snapshots.
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress_tx.subscribe()
    }

    /// Observe state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Handle for aborting from another task or a signal handler.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            flag: Arc::clone(&self.abort),
            state: self.state_tx.subscribe(),
        }
    }

    /// Handle for feeding status notifications by hand.
    pub fn status_listener(&self) -> StatusListener {
        StatusListener {
            state: self.state_tx.subscribe(),
            progress: Arc::clone(&self.progress_tx),
        }
    }

    /// Feed one status notification.
    pub fn on_status_notification(
        &self,
        raw: &[u8],
    ) -> std::result::Result<Option<ProgressSnapshot>, DecodeError> {
        self.status_listener().on_status_notification(raw)
    }

    /// Request an abort of the running transfer.
    pub fn abort(&self) -> bool {
        self.abort_handle().abort()
    }

    /// Start a transfer of `payload` over `link`.
    ///
    /// Valid only from `Idle`. Announces the payload size, then delivers
    /// chunks of `chunk_size` bytes until the payload is exhausted.
    ///
    /// Must be polled inside a Tokio runtime; the status pump is spawned on it.
    pub async fn start<L: Link + ?Sized>(
        &mut self,
        payload: &[u8],
        chunk_size: u32,
        link: &mut L,
    ) -> Result<TransferReport> {
        if self.session.state != SessionState::Idle {
            return Err(Error::InvalidState {
                state: self.session.state,
            });
        }
        if chunk_size == 0 {
            self.session.last_error = Some(ErrorKind::InvalidConfig);
            return Err(Error::InvalidConfig("chunk size must be at least 1".into()));
        }
        let len = payload.len() as u64;
        if let Some(max) = self.config.max_payload {
            if len > max {
                self.session.last_error = Some(ErrorKind::InvalidConfig);
                return Err(Error::InvalidConfig(format!(
                    "payload of {len} bytes exceeds limit of {max} bytes"
                )));
            }
        }

        let started = Instant::now();
        self.session = TransferSession::new(len, chunk_size);
        self.abort.store(false, Ordering::SeqCst);
        self.progress_tx
            .send_modify(|snap| *snap = progress::with_payload_size(snap, len));
        self.attach_status(link);

        self.set_state(SessionState::Announcing);
        info!(
            "Announcing {len} bytes over {} ({} chunks of {chunk_size})",
            link.name(),
            segment::chunk_count(len, chunk_size)
        );

        let announced = self.write(link, &size_announcement(len)).await;
        if self.abort_requested() {
            return Err(self.finish_aborted());
        }
        if let Err(e) = announced {
            warn!("Size announcement failed: {e}");
            self.session.last_error = Some(ErrorKind::HandshakeFailed);
            self.set_state(SessionState::Failed);
            return Err(Error::HandshakeFailed(e));
        }

        self.set_state(SessionState::Transferring);
        self.deliver(payload, link, started).await
    }

    /// Continue a session that stopped on a chunk write failure.
    ///
    /// Delivery restarts at the session offset with the session chunk size.
    /// No new size announcement is sent.
    pub async fn resume<L: Link + ?Sized>(
        &mut self,
        payload: &[u8],
        link: &mut L,
    ) -> Result<TransferReport> {
        if self.session.state != SessionState::Failed
            || self.session.last_error != Some(ErrorKind::ChunkWriteFailed)
        {
            return Err(Error::InvalidState {
                state: self.session.state,
            });
        }
        let len = payload.len() as u64;
        if len != self.session.payload_len {
            return Err(Error::InvalidConfig(format!(
                "resume payload is {len} bytes, session was started with {}",
                self.session.payload_len
            )));
        }

        let started = Instant::now();
        self.abort.store(false, Ordering::SeqCst);
        self.session.last_error = None;
        if self.pump.as_ref().is_none_or(JoinHandle::is_finished) {
            self.attach_status(link);
        }

        info!(
            "Resuming at offset {} of {len} over {}",
            self.session.offset,
            link.name()
        );
        self.set_state(SessionState::Transferring);
        self.deliver(payload, link, started).await
    }

    /// Return to `Idle`, dropping the session and progress.
    ///
    /// Also the path to take when the link disconnects.
    pub fn reset(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.session = TransferSession::default();
        self.abort.store(false, Ordering::SeqCst);
        self.progress_tx.send_replace(ProgressSnapshot::default());
        self.set_state(SessionState::Idle);
        debug!("Session reset");
    }

    async fn deliver<L: Link + ?Sized>(
        &mut self,
        payload: &[u8],
        link: &mut L,
        started: Instant,
    ) -> Result<TransferReport> {
        let chunk_size = self.session.chunk_size;

        while let Some(chunk) = segment::next_chunk(payload, self.session.offset, chunk_size) {
            if self.abort_requested() {
                return Err(self.finish_aborted());
            }

            debug!(
                "Writing chunk [{}, {}) of {}",
                chunk.offset,
                chunk.end(),
                self.session.payload_len
            );
            let result = self.write(link, chunk.bytes).await;

            if self.abort_requested() {
                trace!("Discarding result of in-flight write after abort");
                return Err(self.finish_aborted());
            }

            if let Err(source) = result {
                warn!("Chunk write at offset {} failed: {source}", chunk.offset);
                self.session.last_error = Some(ErrorKind::ChunkWriteFailed);
                self.set_state(SessionState::Failed);
                return Err(Error::ChunkWriteFailed {
                    offset: chunk.offset,
                    source,
                });
            }

            self.session.offset = chunk.end();
            self.session.chunks_sent += 1;
        }

        self.set_state(SessionState::Completed);
        let report = TransferReport {
            bytes_sent: self.session.offset,
            chunks_sent: self.session.chunks_sent,
            elapsed: started.elapsed(),
        };
        info!(
            "Transfer complete: {} bytes in {} chunks ({:.2?})",
            report.bytes_sent, report.chunks_sent, report.elapsed
        );
        Ok(report)
    }

    async fn write<L: Link + ?Sized>(
        &self,
        link: &mut L,
        bytes: &[u8],
    ) -> std::result::Result<(), LinkError> {
        trace!("-> {} bytes", bytes.len());
        match self.config.write_timeout {
            Some(limit) => tokio::time::timeout(limit, link.write_value(bytes))
                .await
                .unwrap_or(Err(LinkError::Timeout(limit))),
            None => link.write_value(bytes).await,
        }
    }

    fn attach_status<L: Link + ?Sized>(&mut self, link: &mut L) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        let mut notifications = match link.subscribe() {
            Ok(rx) => rx,
            Err(e) => {
                warn!("Status notifications unavailable on {}: {e}", link.name());
                return;
            },
        };

        let listener = self.status_listener();
        self.pump = Some(tokio::spawn(async move {
            while let Some(raw) = notifications.recv().await {
                // Decode failures are already logged by the listener.
                let _ = listener.on_status_notification(&raw);
            }
            debug!("Status notification stream closed");
        }));
    }

    fn abort_requested(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    fn finish_aborted(&mut self) -> Error {
        self.abort.store(false, Ordering::SeqCst);
        self.set_state(SessionState::Aborted);
        info!("Transfer aborted at offset {}", self.session.offset);
        Error::Aborted {
            offset: self.session.offset,
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.session.state != state {
            trace!("Session {} -> {state}", self.session.state);
        }
        self.session.state = state;
        self.state_tx.send_replace(state);
    }
}

impl Default for OtaTransfer {
    fn default() -> Self {
        Self::new(TransferConfig::default())
    }
}

impl Drop for OtaTransfer {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::memory::MemoryLink;

    #[allow(clippy::cast_possible_truncation)]
    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn data_writes(link: &MemoryLink) -> Vec<Vec<u8>> {
        link.writes().into_iter().skip(1).collect()
    }

    #[tokio::test]
    async fn test_scenario_1000_bytes_in_300_byte_chunks() {
        let data = payload(1000);
        let mut link = MemoryLink::new();
        let mut transfer = OtaTransfer::default();

        let report = transfer.start(&data, 300, &mut link).await.unwrap();

        assert_eq!(transfer.state(), SessionState::Completed);
        assert_eq!(transfer.session().offset(), 1000);
        assert_eq!(report.bytes_sent, 1000);
        assert_eq!(report.chunks_sent, 4);

        let writes = link.writes();
        assert_eq!(writes[0], b"1000".to_vec());
        let sizes: Vec<usize> = writes[1..].iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![300, 300, 300, 100]);
        assert_eq!(data_writes(&link).concat(), data);
    }

    #[tokio::test]
    async fn test_empty_payload_completes_after_handshake() {
        let mut link = MemoryLink::new();
        let mut transfer = OtaTransfer::default();

        let report = transfer.start(&[], 512, &mut link).await.unwrap();

        assert_eq!(transfer.state(), SessionState::Completed);
        assert_eq!(report.chunks_sent, 0);
        assert_eq!(link.writes(), vec![b"0".to_vec()]);
        assert!(transfer.progress().percent.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_chunk_failure_keeps_offset() {
        let data = payload(1000);
        // Write 0 is the announcement, write 3 carries offset 600.
        let mut link = MemoryLink::new().fail_at(3);
        let mut transfer = OtaTransfer::default();

        let err = transfer.start(&data, 300, &mut link).await.unwrap_err();

        assert!(matches!(err, Error::ChunkWriteFailed { offset: 600, .. }));
        assert_eq!(transfer.state(), SessionState::Failed);
        assert_eq!(transfer.session().offset(), 600);
        assert_eq!(
            transfer.session().last_error(),
            Some(ErrorKind::ChunkWriteFailed)
        );
        // No retry was attempted on our own.
        assert_eq!(link.attempts(), 4);
    }

    #[tokio::test]
    async fn test_resume_after_chunk_failure() {
        let data = payload(1000);
        let mut link = MemoryLink::new().fail_at(3);
        let mut transfer = OtaTransfer::default();

        assert!(transfer.start(&data, 300, &mut link).await.is_err());
        let report = transfer.resume(&data, &mut link).await.unwrap();

        assert_eq!(transfer.state(), SessionState::Completed);
        assert_eq!(report.bytes_sent, 1000);
        assert_eq!(report.chunks_sent, 4);
        assert!(transfer.session().last_error().is_none());
        // One announcement only, and the failed chunk is not duplicated.
        assert_eq!(link.writes()[0], b"1000".to_vec());
        assert_eq!(data_writes(&link).concat(), data);
    }

    #[tokio::test]
    async fn test_resume_rejects_different_payload() {
        let data = payload(1000);
        let mut link = MemoryLink::new().fail_at(2);
        let mut transfer = OtaTransfer::default();

        assert!(transfer.start(&data, 300, &mut link).await.is_err());
        let err = transfer.resume(&data[..999], &mut link).await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert_eq!(transfer.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_handshake_failure() {
        let data = payload(10);
        let mut link = MemoryLink::new().fail_at(0);
        let mut transfer = OtaTransfer::default();

        let err = transfer.start(&data, 4, &mut link).await.unwrap_err();

        assert!(matches!(err, Error::HandshakeFailed(_)));
        assert_eq!(transfer.state(), SessionState::Failed);
        assert_eq!(
            transfer.session().last_error(),
            Some(ErrorKind::HandshakeFailed)
        );
        assert!(link.writes().is_empty());

        let err = transfer.resume(&data, &mut link).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                state: SessionState::Failed
            }
        ));
    }

    #[tokio::test]
    async fn test_zero_chunk_size_rejected_before_io() {
        let mut link = MemoryLink::new();
        let mut transfer = OtaTransfer::default();

        let err = transfer.start(&payload(10), 0, &mut link).await.unwrap_err();

        assert!(matches!(err, Error::InvalidConfig(_)));
        assert_eq!(link.attempts(), 0);
        assert_eq!(transfer.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_payload_limit() {
        let mut link = MemoryLink::new();
        let mut transfer = OtaTransfer::new(TransferConfig::default().with_max_payload(Some(8)));

        let err = transfer.start(&payload(9), 4, &mut link).await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert_eq!(link.attempts(), 0);
    }

    #[tokio::test]
    async fn test_start_twice_is_invalid_state() {
        let mut link = MemoryLink::new();
        let mut transfer = OtaTransfer::default();

        transfer.start(&payload(10), 4, &mut link).await.unwrap();
        let err = transfer.start(&payload(10), 4, &mut link).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                state: SessionState::Completed
            }
        ));

        transfer.reset();
        assert_eq!(transfer.state(), SessionState::Idle);
        transfer.start(&payload(10), 4, &mut link).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_timeout_fails_chunk() {
        let data = payload(1000);
        let mut link = MemoryLink::new().stall_at(2);
        let config = TransferConfig::default().with_write_timeout(Some(Duration::from_millis(50)));
        let mut transfer = OtaTransfer::new(config);

        let err = transfer.start(&data, 300, &mut link).await.unwrap_err();

        match err {
            Error::ChunkWriteFailed { offset, source } => {
                assert_eq!(offset, 300);
                assert!(matches!(source, LinkError::Timeout(_)));
            },
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transfer.session().offset(), 300);
    }

    #[tokio::test]
    async fn test_abort_waits_for_in_flight_write() {
        let data = payload(1000);
        let mut link = MemoryLink::new();
        // Write 2 is the second chunk.
        let gate = link.pause_at(2);
        let log = link.recorder();
        let mut transfer = OtaTransfer::default();
        let handle = transfer.abort_handle();

        let controller = async {
            gate.reached().await;
            assert!(handle.abort());
            gate.release();
        };
        let (result, ()) = tokio::join!(transfer.start(&data, 300, &mut link), controller);

        assert!(matches!(result, Err(Error::Aborted { offset: 300 })));
        assert_eq!(transfer.state(), SessionState::Aborted);
        // The in-flight chunk settled, nothing after it was issued.
        assert_eq!(log.attempts(), 3);
        assert_eq!(log.writes().len(), 3);
    }

    #[tokio::test]
    async fn test_abort_ignored_when_idle() {
        let transfer = OtaTransfer::default();
        assert!(!transfer.abort());
        assert!(!transfer.abort_handle().is_requested());
    }

    #[tokio::test]
    async fn test_status_merges_sticky_fields() {
        let mut link = MemoryLink::new();
        let mut transfer = OtaTransfer::default();
        transfer.start(&payload(1000), 300, &mut link).await.unwrap();

        transfer
            .on_status_notification(br#"{"Use_byte":300,"Segment":1}"#)
            .unwrap();
        let snap = transfer
            .on_status_notification(br#"{"ota_size":500,"msg_status":"ok","Segment":2}"#)
            .unwrap()
            .unwrap();

        assert_eq!(snap.status.ota_size, Some(500));
        assert_eq!(snap.status.segment, Some(2));
        assert_eq!(snap.status.used_bytes, Some(300));
        assert!((snap.percent - 30.0).abs() < f64::EPSILON);
        assert_eq!(transfer.progress(), snap);
    }

    #[tokio::test]
    async fn test_malformed_status_keeps_snapshot() {
        let mut link = MemoryLink::new();
        let mut transfer = OtaTransfer::default();
        transfer.start(&payload(1000), 300, &mut link).await.unwrap();
        transfer
            .on_status_notification(br#"{"Use_byte":500}"#)
            .unwrap();
        let before = transfer.progress();

        let err = transfer
            .on_status_notification(br#"{"Use_byte":9"#)
            .unwrap_err();

        assert!(matches!(err, DecodeError::Malformed(_)));
        assert_eq!(transfer.state(), SessionState::Completed);
        assert_eq!(transfer.progress(), before);
    }

    #[tokio::test]
    async fn test_status_ignored_when_idle() {
        let transfer = OtaTransfer::default();
        let applied = transfer
            .on_status_notification(br#"{"Use_byte":5}"#)
            .unwrap();
        assert!(applied.is_none());
        assert_eq!(transfer.progress(), ProgressSnapshot::default());
    }

    #[tokio::test]
    async fn test_device_notifications_reach_observers() {
        let data = payload(1000);
        let mut link = MemoryLink::new().with_device();
        let mut transfer = OtaTransfer::default();
        let mut progress = transfer.subscribe();

        transfer.start(&data, 300, &mut link).await.unwrap();

        let snap = tokio::time::timeout(
            Duration::from_secs(5),
            progress.wait_for(|s| s.status.used_bytes == Some(1000)),
        )
        .await
        .expect("progress should reach the end")
        .unwrap()
        .clone();

        assert!((snap.percent - 100.0).abs() < f64::EPSILON);
        assert_eq!(snap.status.segment, Some(4));
        assert_eq!(snap.status.message_status.as_deref(), Some("done"));
        assert!(snap.raw.is_some());
    }

    #[tokio::test]
    async fn test_reset_clears_progress() {
        let mut link = MemoryLink::new();
        let mut transfer = OtaTransfer::default();
        transfer.start(&payload(100), 10, &mut link).await.unwrap();
        transfer
            .on_status_notification(br#"{"Use_byte":100}"#)
            .unwrap();

        transfer.reset();

        assert_eq!(transfer.state(), SessionState::Idle);
        assert_eq!(transfer.session().offset(), 0);
        assert_eq!(transfer.progress(), ProgressSnapshot::default());
    }

    #[tokio::test]
    async fn test_state_observer_sees_terminal_state() {
        let mut link = MemoryLink::new();
        let mut transfer = OtaTransfer::default();
        let states = transfer.subscribe_state();

        transfer.start(&payload(10), 3, &mut link).await.unwrap();
        assert_eq!(*states.borrow(), SessionState::Completed);
    }
}
