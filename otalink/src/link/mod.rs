//! Link abstraction for the device transport.
//!
//! The engine talks to the device through the [`Link`] trait and never
//! issues two operations at once:
//!
//! ```text
//! +----------------------+
//! |   OtaTransfer        |   sequential write_value().await
//! +----------+-----------+
//!            |                         ^ status records (mpsc)
//!            v                         |
//! +----------+-----------+   +---------+----------+
//! |   Link trait         |   |  status pump task  |
//! +----------+-----------+   +--------------------+
//!            |
//!   +--------+---------+---------------------+
//!   |                  |                     |
//!   v                  v                     v
//! SerialLink      MemoryLink          (BLE adapter supplied
//! (UART bridge)   (tests, simulate)    by the embedding app)
//! ```

pub mod framing;
pub mod memory;

#[cfg(feature = "native")]
pub mod serial;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::LinkError;

/// Boxed future returned by link operations.
pub type LinkFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Single-operation-at-a-time transport to the device.
///
/// Implementations are supplied by whatever owns discovery and connection
/// setup (a BLE central, a serial bridge, a test double).
pub trait Link: Send {
    /// Write one value; resolves once the transport acknowledged it.
    ///
    /// Acknowledgement means the transport accepted the bytes, not that the
    /// device application processed them.
    fn write_value<'a>(&'a mut self, bytes: &'a [u8]) -> LinkFuture<'a, Result<(), LinkError>>;

    /// Start receiving status notifications.
    ///
    /// Calling this again replaces the previous subscription. Delivery order
    /// and completeness are not guaranteed.
    fn subscribe(&mut self) -> Result<mpsc::Receiver<Vec<u8>>, LinkError>;

    /// Human readable name for logs.
    fn name(&self) -> &str;
}

impl<L: Link + ?Sized> Link for Box<L> {
    fn write_value<'a>(&'a mut self, bytes: &'a [u8]) -> LinkFuture<'a, Result<(), LinkError>> {
        (**self).write_value(bytes)
    }

    fn subscribe(&mut self) -> Result<mpsc::Receiver<Vec<u8>>, LinkError> {
        (**self).subscribe()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Default capacity of notification channels created by the bundled links.
pub const DEFAULT_NOTIFY_BUFFER: usize = 64;

/// Serial bridge configuration.
#[derive(Debug, Clone)]
pub struct SerialLinkConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read timeout of the notification reader.
    pub read_timeout: Duration,
    /// Pause after each acknowledged write, for bridges with small buffers.
    pub pace: Option<Duration>,
    /// Capacity of the notification channel.
    pub notify_buffer: usize,
}

impl Default for SerialLinkConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: 115200,
            read_timeout: Duration::from_millis(50),
            pace: None,
            notify_buffer: DEFAULT_NOTIFY_BUFFER,
        }
    }
}

impl SerialLinkConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the inter-write pause.
    #[must_use]
    pub fn with_pace(mut self, pace: Option<Duration>) -> Self {
        self.pace = pace;
        self
    }
}
