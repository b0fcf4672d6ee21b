// src/header.rs
//! The fixed 16-byte CA header and its 24-byte extended variant.
//!
//! Every CA command starts with this header. The four trailing "logical"
//! fields (`data_type`, `data_count`, `parameter1`, `parameter2`) are
//! reused for different purposes by different commands — the per-command
//! attribute map lives in [`crate::command`], not here. This module only
//! knows about the six raw wire fields, big-endian, and the extended-size
//! escape hatch.

use crate::error::RemoteProtocolError;

/// Size in bytes of the standard (non-extended) header.
pub const HEADER_SIZE: usize = 16;
/// Size in bytes of the extended header (standard header + 8 extra bytes).
pub const EXTENDED_HEADER_SIZE: usize = 24;

/// Sentinel `payload_size` value signalling "read the extended header".
const EXTENDED_PAYLOAD_SENTINEL: u16 = 0xFFFF;
/// Sentinel `data_count` value accompanying [`EXTENDED_PAYLOAD_SENTINEL`].
const EXTENDED_DATA_COUNT_SENTINEL: u16 = 0;

/// Minimum negotiated protocol version at which extended headers are
/// permitted at all (§3, §4.1).
pub const MIN_VERSION_FOR_EXTENDED_HEADER: u8 = 13;

/// The six raw fields of a CA header, decoded but not yet interpreted.
///
/// `payload_size` and `data_count` here are always the *true* values: if
/// the wire form used the extended encoding, those have already been
/// pulled out of the trailing 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub command: u16,
    pub payload_size: u32,
    pub data_type: u16,
    pub data_count: u32,
    pub parameter1: u32,
    pub parameter2: u32,
}

impl Header {
    /// Whether this header, if re-encoded, would require the extended
    /// (24-byte) form: `payload_size` or `data_count` doesn't fit 16 bits,
    /// or is numerically equal to the sentinel pair used to signal
    /// "extended" (0xFFFF payload size with 0 count would otherwise be
    /// ambiguous with "empty extended-eligible payload").
    pub fn needs_extended_form(&self) -> bool {
        self.payload_size > 0xFFFE || self.data_count > 0xFFFE
    }

    /// Encode this header, choosing standard or extended form based on
    /// field sizes. Does not check whether extended form is *permitted*
    /// for the owning command/version — callers (`command::encode`) do
    /// that before calling this, since only they know the command id and
    /// negotiated version.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(EXTENDED_HEADER_SIZE);
        buf.extend_from_slice(&self.command.to_be_bytes());
        if self.needs_extended_form() {
            buf.extend_from_slice(&EXTENDED_PAYLOAD_SENTINEL.to_be_bytes());
            buf.extend_from_slice(&self.data_type.to_be_bytes());
            buf.extend_from_slice(&EXTENDED_DATA_COUNT_SENTINEL.to_be_bytes());
            buf.extend_from_slice(&self.parameter1.to_be_bytes());
            buf.extend_from_slice(&self.parameter2.to_be_bytes());
            buf.extend_from_slice(&self.payload_size.to_be_bytes());
            buf.extend_from_slice(&self.data_count.to_be_bytes());
        } else {
            buf.extend_from_slice(&(self.payload_size as u16).to_be_bytes());
            buf.extend_from_slice(&self.data_type.to_be_bytes());
            buf.extend_from_slice(&(self.data_count as u16).to_be_bytes());
            buf.extend_from_slice(&self.parameter1.to_be_bytes());
            buf.extend_from_slice(&self.parameter2.to_be_bytes());
        }
        buf
    }

    /// Decode a header from the head of `bytes`.
    ///
    /// Returns `Ok(None)` if fewer than the minimum 16 bytes are available
    /// (§4.1 `NEED_DATA`), or if the sentinel indicates an extended header
    /// but fewer than 24 bytes are available yet.
    ///
    /// This function alone cannot reject "extended header not permitted"
    /// (that needs the command id and negotiated protocol version); callers
    /// in `command::decode` perform that check once they know both.
    pub fn decode(bytes: &[u8]) -> Result<Option<(Header, usize)>, RemoteProtocolError> {
        if bytes.len() < HEADER_SIZE {
            return Ok(None);
        }
        let command = u16::from_be_bytes([bytes[0], bytes[1]]);
        let raw_payload_size = u16::from_be_bytes([bytes[2], bytes[3]]);
        let data_type = u16::from_be_bytes([bytes[4], bytes[5]]);
        let raw_data_count = u16::from_be_bytes([bytes[6], bytes[7]]);
        let parameter1 = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let parameter2 = u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);

        if raw_payload_size == EXTENDED_PAYLOAD_SENTINEL
            && raw_data_count == EXTENDED_DATA_COUNT_SENTINEL
        {
            if bytes.len() < EXTENDED_HEADER_SIZE {
                return Ok(None);
            }
            let payload_size = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
            let data_count = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
            Ok(Some((
                Header {
                    command,
                    payload_size,
                    data_type,
                    data_count,
                    parameter1,
                    parameter2,
                },
                EXTENDED_HEADER_SIZE,
            )))
        } else {
            Ok(Some((
                Header {
                    command,
                    payload_size: raw_payload_size as u32,
                    data_type,
                    data_count: raw_data_count as u32,
                    parameter1,
                    parameter2,
                },
                HEADER_SIZE,
            )))
        }
    }

    /// Whether `bytes` begins with a header whose wire form is extended.
    /// Used by `command::decode` to apply the version/command gate before
    /// trusting the parsed extended fields.
    pub fn wire_form_is_extended(bytes: &[u8]) -> bool {
        bytes.len() >= 8
            && u16::from_be_bytes([bytes[2], bytes[3]]) == EXTENDED_PAYLOAD_SENTINEL
            && u16::from_be_bytes([bytes[6], bytes[7]]) == EXTENDED_DATA_COUNT_SENTINEL
    }
}
