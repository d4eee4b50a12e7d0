//! Wire-level pieces of the OTA transfer protocol.
//!
//! ```text
//! host                                   device
//!  |  "1048576"  (size announcement)       |
//!  |-------------------------------------->|
//!  |  chunk [0, 512)                       |
//!  |-------------------------------------->|
//!  |  chunk [512, 1024)                    |
//!  |-------------------------------------->|
//!  |       {"Use_byte":1024,"Segment":2}   |
//!  |<- - - - - - - - - - - - - - - - - - - |  (notification, any time)
//!  |  ...                                  |
//! ```

pub mod segment;
pub mod status;

/// Default chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: u32 = 512;

/// Encode the handshake that announces the payload length.
///
/// The device expects the decimal ASCII text of the byte count, not a
/// fixed-width integer.
pub fn size_announcement(payload_len: u64) -> Vec<u8> {
    payload_len.to_string().into_bytes()
}
