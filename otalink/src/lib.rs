//! # otalink
//!
//! Chunked firmware push to embedded devices over packetized links.
//!
//! The host announces the firmware size, then writes the image in fixed-size
//! chunks, one acknowledged write at a time. The device reports progress
//! through JSON status notifications which are merged into a progress
//! snapshot for display.
//!
//! - Size announcement and chunk segmentation
//! - Device status decoding with sticky field merging
//! - A transfer state machine with abort and caller-driven resume
//! - Link adapters for a serial bridge and an in-memory simulated device
//!
//! ## Features
//!
//! - `native` (default): serial-bridge link via the `serialport` crate
//!
//! ## Example
//!
//! ```rust,no_run
//! use otalink::{DEFAULT_CHUNK_SIZE, OtaTransfer, SerialLink, SerialLinkConfig, TransferConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let firmware = std::fs::read("firmware.bin")?;
//!     let mut link = SerialLink::open(&SerialLinkConfig::new("/dev/ttyUSB0", 115200))?;
//!
//!     let mut transfer = OtaTransfer::new(TransferConfig::default());
//!     let report = transfer
//!         .start(&firmware, DEFAULT_CHUNK_SIZE, &mut link)
//!         .await?;
//!
//!     println!("{} bytes in {:.2?}", report.bytes_sent, report.elapsed);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod link;
pub mod progress;
pub mod protocol;
pub mod transfer;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use link::serial::SerialLink;
pub use {
    error::{DecodeError, Error, ErrorKind, LinkError, Result},
    link::{
        Link, LinkFuture, SerialLinkConfig,
        framing::LineFramer,
        memory::{MemoryLink, SimulatedDevice, WriteGate, WriteLog},
    },
    progress::ProgressSnapshot,
    protocol::{
        DEFAULT_CHUNK_SIZE, size_announcement,
        segment::{Chunk, Segments, chunk_count, next_chunk, segments},
        status::{DeviceStatus, decode as decode_status},
    },
    transfer::{
        AbortHandle, OtaTransfer, SessionState, StatusListener, TransferConfig, TransferReport,
        TransferSession,
    },
};
