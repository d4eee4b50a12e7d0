//! Progress projection from device status reports.
//!
//! Snapshots are values: every update builds a fresh [`ProgressSnapshot`] from
//! the previous one, so the notification path never mutates state that the
//! delivery loop reads.
//!
//! Fields merge stickily. A report that omits `Use_byte` keeps the last known
//! `used_bytes`, so partial updates cannot drag the displayed percentage back
//! to zero.

use serde::Serialize;

use crate::protocol::status::DeviceStatus;

/// Read-only view of transfer progress as reported by the device.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    /// Progress in `[0, 100]`; 0 when the payload size is unknown or zero.
    pub percent: f64,
    /// Size of the payload being sent, as known by the host.
    pub payload_size: u64,
    /// Latest merged device status.
    pub status: DeviceStatus,
    /// Last successfully decoded raw status text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl ProgressSnapshot {
    /// Percentage, or `None` when it is undefined (zero-size payload).
    pub fn percent_or_none(&self) -> Option<f64> {
        (self.payload_size > 0).then_some(self.percent)
    }

    /// Attach the raw text the snapshot was derived from.
    #[must_use]
    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }
}

/// Merge a decoded status into the previous snapshot.
///
/// Absent fields keep their previous value. `percent` is derived from
/// `used_bytes` against the host payload size; the device's `ota_size` never
/// feeds the percentage.
pub fn update(prev: &ProgressSnapshot, status: &DeviceStatus, payload_size: u64) -> ProgressSnapshot {
    let merged = DeviceStatus {
        ota_size: status.ota_size.or(prev.status.ota_size),
        message_status: status
            .message_status
            .clone()
            .or_else(|| prev.status.message_status.clone()),
        segment: status.segment.or(prev.status.segment),
        total_bytes: status.total_bytes.or(prev.status.total_bytes),
        used_bytes: status.used_bytes.or(prev.status.used_bytes),
    };

    ProgressSnapshot {
        percent: percent(merged.used_bytes, payload_size),
        payload_size,
        status: merged,
        raw: prev.raw.clone(),
    }
}

/// Recompute a snapshot for a newly known payload size.
pub fn with_payload_size(prev: &ProgressSnapshot, payload_size: u64) -> ProgressSnapshot {
    ProgressSnapshot {
        percent: percent(prev.status.used_bytes, payload_size),
        payload_size,
        status: prev.status.clone(),
        raw: prev.raw.clone(),
    }
}

#[allow(clippy::cast_precision_loss)]
fn percent(used_bytes: Option<u64>, payload_size: u64) -> f64 {
    match used_bytes {
        Some(used) if payload_size > 0 => {
            let p = used as f64 / payload_size as f64 * 100.0;
            p.clamp(0.0, 100.0)
        },
        _ => 0.0,
    }
}
