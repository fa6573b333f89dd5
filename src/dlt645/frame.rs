//! # DL/T 645 Frame Codec
//!
//! Byte-exact serialisation and deserialisation of DL/T 645-2007 frames.
//!
//! A frame on the wire is
//!
//! ```text
//! FE FE FE FE 68 [6B address] 68 [ctrl] [len] [len bytes data+0x33] [cs] 16
//! ```
//!
//! where the address is the nibble-packed meter serial in little-endian
//! byte order, every data byte is offset by `0x33`, and the checksum is
//! the modulo-256 sum of everything from the first `0x68` through the
//! last encoded data byte. The decoder tolerates any number of leading
//! preamble bytes and returns the data field already de-offset.

use crate::constants::{ADDR_LEN, DATA_OFFSET, DI_LEN, FRAME_END, FRAME_START, PREAMBLE_BYTE, PREAMBLE_LEN};
use crate::error::Dlt645Error;
use crate::util::codec::bytes_to_u32_le;

/// One parsed frame. The data field holds the decoded payload (wire
/// bytes minus `0x33`); the preamble is not retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub address: [u8; ADDR_LEN],
    pub ctrl: u8,
    pub data: Vec<u8>,
}

impl Frame {
    /// Whether the control code flags a device exception response.
    pub fn is_exception(&self) -> bool {
        self.ctrl & crate::constants::CTRL_EXCEPTION_FLAG != 0
    }

    /// The data identifier in the first four data bytes, if present.
    pub fn di(&self) -> Option<u32> {
        (self.data.len() >= DI_LEN).then(|| bytes_to_u32_le(&self.data[..DI_LEN]))
    }
}

/// Builds a complete frame ready for transmission.
///
/// The payload is the decoded data field; the `+0x33` offset is applied
/// here. Payload length is at most 200 by protocol convention; the codec
/// does not clamp.
pub fn build_frame(address: &[u8; ADDR_LEN], ctrl: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(PREAMBLE_LEN + 12 + payload.len());
    buf.extend_from_slice(&[PREAMBLE_BYTE; PREAMBLE_LEN]);
    buf.push(FRAME_START);
    buf.extend_from_slice(address);
    buf.push(FRAME_START);
    buf.push(ctrl);
    buf.push(payload.len() as u8);
    for &b in payload {
        buf.push(b.wrapping_add(DATA_OFFSET));
    }
    let checksum = buf[PREAMBLE_LEN..]
        .iter()
        .fold(0u8, |sum, &b| sum.wrapping_add(b));
    buf.push(checksum);
    buf.push(FRAME_END);
    buf
}

/// Parses one frame out of a received buffer.
///
/// Single-pass: locates the first start marker (skipping any preamble),
/// validates the header, de-offsets the data field, then verifies the
/// checksum and end marker.
pub fn deserialize(raw: &[u8]) -> Result<Frame, Dlt645Error> {
    let start = raw
        .iter()
        .position(|&b| b == FRAME_START)
        .ok_or(Dlt645Error::InvalidStart)?;
    let frame = &raw[start..];
    if frame.len() < 10 {
        return Err(Dlt645Error::Truncated);
    }
    if frame[7] != FRAME_START {
        return Err(Dlt645Error::MissingSecondStart);
    }

    let ctrl = frame[8];
    let len = frame[9];
    let data_end = 10 + len as usize;
    if frame.len() < data_end + 2 {
        return Err(Dlt645Error::InvalidLength(len));
    }

    let data: Vec<u8> = frame[10..data_end]
        .iter()
        .map(|b| b.wrapping_sub(DATA_OFFSET))
        .collect();

    let calculated = frame[..data_end]
        .iter()
        .fold(0u8, |sum, &b| sum.wrapping_add(b));
    let expected = frame[data_end];
    if calculated != expected {
        return Err(Dlt645Error::BadChecksum {
            expected,
            calculated,
        });
    }
    if frame[data_end + 1] != FRAME_END {
        return Err(Dlt645Error::BadEnd);
    }

    let mut address = [0u8; ADDR_LEN];
    address.copy_from_slice(&frame[1..7]);
    Ok(Frame {
        address,
        ctrl,
        data,
    })
}
