//! Record framing for byte-stream status channels.
//!
//! A UART bridge delivers status notifications as a byte stream, so record
//! boundaries have to be recovered. Records are newline terminated; `\r\n`
//! is accepted. Partial records stay buffered until the rest arrives.

use log::warn;

/// Longest record accepted before the buffer is discarded.
pub const MAX_RECORD_LEN: usize = 4096;

/// Splits an incoming byte stream into newline-terminated records.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
    overflowed: bool,
}

impl LineFramer {
    /// Create an empty framer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and collect every record completed by them.
    ///
    /// Blank lines are skipped. A record longer than [`MAX_RECORD_LEN`] is
    /// dropped up to its terminating newline.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut records = Vec::new();

        for &b in bytes {
            if b == b'\n' {
                let overflowed = std::mem::take(&mut self.overflowed);
                let mut line = std::mem::take(&mut self.buffer);
                if overflowed {
                    continue;
                }
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if !line.iter().all(u8::is_ascii_whitespace) {
                    records.push(line);
                }
                continue;
            }

            if self.overflowed {
                continue;
            }
            if self.buffer.len() >= MAX_RECORD_LEN {
                warn!("Status record exceeds {MAX_RECORD_LEN} bytes, discarding");
                self.buffer.clear();
                self.overflowed = true;
                continue;
            }
            self.buffer.push(b);
        }

        records
    }

    /// Bytes of the record currently being assembled.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
