//! In-memory link with scripted behavior and an optional simulated device.
//!
//! `MemoryLink` records every acknowledged write and can be told to fail,
//! stall, or pause at a given write index. Write index 0 is the size
//! announcement; data chunks follow from index 1.
//!
//! With [`MemoryLink::with_device`] it also behaves like an OTA receiver:
//! it parses the announcement and reports progress after every chunk, the
//! way an ESP32 OTA sketch does over a notify characteristic.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::trace;
use serde_json::json;
use tokio::sync::{Notify, mpsc};

use crate::error::LinkError;
use crate::link::{DEFAULT_NOTIFY_BUFFER, Link, LinkFuture};

/// Handle to a write paused by [`MemoryLink::pause_at`].
#[derive(Debug, Clone, Default)]
pub struct WriteGate {
    reached: Arc<Notify>,
    release: Arc<Notify>,
}

impl WriteGate {
    /// Wait until the paused write has been issued.
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    /// Let the paused write complete.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Device-side view kept by the simulated receiver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatedDevice {
    /// Size announced by the host.
    pub expected: Option<u64>,
    /// Bytes received after the announcement.
    pub received: u64,
    /// Data writes received.
    pub segments: u64,
}

impl SimulatedDevice {
    fn on_write(&mut self, bytes: &[u8]) -> Option<String> {
        let Some(expected) = self.expected else {
            let announced = std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.trim().parse::<u64>().ok());
            self.expected = announced;
            return announced.map(|size| {
                json!({ "ota_size": size, "msg_status": "ready", "Total_byte": size }).to_string()
            });
        };

        self.received += bytes.len() as u64;
        self.segments += 1;
        let msg_status = if self.received >= expected {
            "done"
        } else {
            "writing"
        };
        Some(
            json!({
                "ota_size": expected,
                "msg_status": msg_status,
                "Segment": self.segments,
                "Total_byte": expected,
                "Use_byte": self.received,
            })
            .to_string(),
        )
    }
}

#[derive(Debug, Default)]
struct Recorded {
    writes: Vec<Vec<u8>>,
    attempts: usize,
}

/// Scriptable in-memory [`Link`].
#[derive(Debug)]
pub struct MemoryLink {
    name: String,
    recorded: Arc<Mutex<Recorded>>,
    fail_at: HashSet<usize>,
    stall_at: HashSet<usize>,
    gates: Vec<(usize, WriteGate)>,
    delay: Option<Duration>,
    device: Option<Arc<Mutex<SimulatedDevice>>>,
    notify_tx: Option<mpsc::Sender<Vec<u8>>>,
    notify_buffer: usize,
}

impl Default for MemoryLink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLink {
    /// Create a link that acknowledges every write.
    pub fn new() -> Self {
        Self {
            name: "memory".to_string(),
            recorded: Arc::default(),
            fail_at: HashSet::new(),
            stall_at: HashSet::new(),
            gates: Vec::new(),
            delay: None,
            device: None,
            notify_tx: None,
            notify_buffer: DEFAULT_NOTIFY_BUFFER,
        }
    }

    /// Attach a simulated OTA receiver that reports progress.
    #[must_use]
    pub fn with_device(mut self) -> Self {
        self.device = Some(Arc::default());
        self
    }

    /// Delay every write by `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Reject the write with the given index once.
    #[must_use]
    pub fn fail_at(mut self, index: usize) -> Self {
        self.fail_at.insert(index);
        self
    }

    /// Never complete the write with the given index.
    #[must_use]
    pub fn stall_at(mut self, index: usize) -> Self {
        self.stall_at.insert(index);
        self
    }

    /// Hold the write with the given index until the returned gate is released.
    pub fn pause_at(&mut self, index: usize) -> WriteGate {
        let gate = WriteGate::default();
        self.gates.push((index, gate.clone()));
        gate
    }

    /// Inject a raw notification, as if the device had sent it.
    ///
    /// Returns `false` when nobody is subscribed or the channel is full.
    pub fn notify(&self, raw: impl Into<Vec<u8>>) -> bool {
        self.notify_tx
            .as_ref()
            .is_some_and(|tx| tx.try_send(raw.into()).is_ok())
    }

    /// Shared view of acknowledged writes, usable while the link is borrowed.
    pub fn recorder(&self) -> WriteLog {
        WriteLog {
            recorded: Arc::clone(&self.recorded),
        }
    }

    /// Acknowledged writes so far.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.recorder().writes()
    }

    /// Number of writes issued, including failed ones.
    pub fn attempts(&self) -> usize {
        self.recorder().attempts()
    }

    /// Current state of the simulated device, if attached.
    pub fn device(&self) -> Option<SimulatedDevice> {
        self.device
            .as_ref()
            .map(|d| d.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn emit(&self, bytes: &[u8]) {
        let Some(device) = &self.device else {
            return;
        };
        let report = device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_write(bytes);
        if let (Some(report), Some(tx)) = (report, &self.notify_tx) {
            // Notifications are best effort, like their radio counterparts.
            if tx.try_send(report.into_bytes()).is_err() {
                trace!("Dropping simulated status notification");
            }
        }
    }
}

impl Link for MemoryLink {
    fn write_value<'a>(&'a mut self, bytes: &'a [u8]) -> LinkFuture<'a, Result<(), LinkError>> {
        Box::pin(async move {
            let index = {
                let mut rec = self.recorded.lock().unwrap_or_else(PoisonError::into_inner);
                rec.attempts += 1;
                rec.attempts - 1
            };
            trace!("memory link write #{index}: {} bytes", bytes.len());

            if let Some(pos) = self.gates.iter().position(|(i, _)| *i == index) {
                let (_, gate) = self.gates.swap_remove(pos);
                gate.reached.notify_one();
                gate.release.notified().await;
            }

            if self.stall_at.contains(&index) {
                std::future::pending::<()>().await;
            }

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if self.fail_at.remove(&index) {
                return Err(LinkError::Rejected(format!("scripted failure at write {index}")));
            }

            self.recorded
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .writes
                .push(bytes.to_vec());
            self.emit(bytes);
            Ok(())
        })
    }

    fn subscribe(&mut self) -> Result<mpsc::Receiver<Vec<u8>>, LinkError> {
        let (tx, rx) = mpsc::channel(self.notify_buffer);
        self.notify_tx = Some(tx);
        Ok(rx)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Read access to the writes acknowledged by a [`MemoryLink`].
#[derive(Debug, Clone)]
pub struct WriteLog {
    recorded: Arc<Mutex<Recorded>>,
}

impl WriteLog {
    /// Acknowledged writes so far.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .writes
            .clone()
    }

    /// Number of writes issued, including failed ones.
    pub fn attempts(&self) -> usize {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_writes_in_order() {
        let mut link = MemoryLink::new();
        link.write_value(b"3").await.unwrap();
        link.write_value(b"abc").await.unwrap();
        assert_eq!(link.writes(), vec![b"3".to_vec(), b"abc".to_vec()]);
        assert_eq!(link.attempts(), 2);
    }

    #[tokio::test]
    async fn test_scripted_failure_is_one_shot() {
        let mut link = MemoryLink::new().fail_at(1);
        link.write_value(b"a").await.unwrap();
        assert!(matches!(
            link.write_value(b"b").await,
            Err(LinkError::Rejected(_))
        ));
        link.write_value(b"b").await.unwrap();
        assert_eq!(link.writes().len(), 2);
        assert_eq!(link.attempts(), 3);
    }

    #[tokio::test]
    async fn test_simulated_device_reports_progress() {
        let mut link = MemoryLink::new().with_device();
        let mut rx = link.subscribe().unwrap();

        link.write_value(b"10").await.unwrap();
        link.write_value(&[0u8; 6]).await.unwrap();
        link.write_value(&[0u8; 4]).await.unwrap();

        let ready = String::from_utf8(rx.recv().await.unwrap()).unwrap();
        assert!(ready.contains("\"ota_size\":10"));
        let first = String::from_utf8(rx.recv().await.unwrap()).unwrap();
        assert!(first.contains("\"Use_byte\":6"));
        let last = String::from_utf8(rx.recv().await.unwrap()).unwrap();
        assert!(last.contains("\"done\""));

        let device = link.device().unwrap();
        assert_eq!(device.expected, Some(10));
        assert_eq!(device.received, 10);
        assert_eq!(device.segments, 2);
    }

    #[tokio::test]
    async fn test_notify_without_subscriber() {
        let link = MemoryLink::new();
        assert!(!link.notify(b"{}".to_vec()));
    }
}
