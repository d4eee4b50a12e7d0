//! Device status notification decoding.
//!
//! Devices report progress as a small JSON object:
//!
//! ```text
//! {"ota_size":1048576,"msg_status":"writing","Segment":12,"Total_byte":1048576,"Use_byte":6144}
//! ```
//!
//! Every field is optional and unknown fields are ignored. The decoder only
//! reports what was present; merging with earlier reports is the job of
//! [`crate::progress`].

use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::DecodeError;

/// Wire field names.
pub mod field {
    /// Total image size as seen by the device.
    pub const OTA_SIZE: &str = "ota_size";
    /// Free-form device message.
    pub const MSG_STATUS: &str = "msg_status";
    /// Segment index the device is processing.
    pub const SEGMENT: &str = "Segment";
    /// Total byte count the device expects.
    pub const TOTAL_BYTE: &str = "Total_byte";
    /// Bytes the device has consumed so far.
    pub const USE_BYTE: &str = "Use_byte";
}

/// Decoded snapshot of one status notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceStatus {
    /// Image size reported by the device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ota_size: Option<u64>,
    /// Device message status text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_status: Option<String>,
    /// Segment index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<u64>,
    /// Total bytes expected by the device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    /// Bytes consumed by the device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_bytes: Option<u64>,
}

impl DeviceStatus {
    /// Returns `true` when no known field was present.
    pub fn is_empty(&self) -> bool {
        self.ota_size.is_none()
            && self.message_status.is_none()
            && self.segment.is_none()
            && self.total_bytes.is_none()
            && self.used_bytes.is_none()
    }
}

/// Decode raw notification bytes.
pub fn decode(raw: &[u8]) -> Result<DeviceStatus, DecodeError> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| DecodeError::Malformed(format!("invalid UTF-8: {e}")))?;
    decode_str(text)
}

/// Decode a status record that is already text.
pub fn decode_str(text: &str) -> Result<DeviceStatus, DecodeError> {
    // Some firmwares NUL-terminate the characteristic value.
    let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    if text.is_empty() {
        return Err(DecodeError::Empty);
    }

    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    match value {
        Value::Object(map) => Ok(from_record(&map)),
        _ => Err(DecodeError::Empty),
    }
}

fn from_record(map: &Map<String, Value>) -> DeviceStatus {
    DeviceStatus {
        ota_size: integer_field(map, field::OTA_SIZE),
        message_status: string_field(map, field::MSG_STATUS),
        segment: integer_field(map, field::SEGMENT),
        total_bytes: integer_field(map, field::TOTAL_BYTE),
        used_bytes: integer_field(map, field::USE_BYTE),
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn integer_field(map: &Map<String, Value>, name: &str) -> Option<u64> {
    let value = map.get(name)?;
    let parsed = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    if parsed.is_none() && !value.is_null() {
        debug!("Ignoring status field {name}: unusable value {value}");
    }
    parsed
}

fn string_field(map: &Map<String, Value>, name: &str) -> Option<String> {
    match map.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => {
            debug!("Ignoring status field {name}: expected string, got {other}");
            None
        },
    }
}
