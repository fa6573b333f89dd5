//! # Utility Modules
//!
//! Common utilities shared by both meter roles: hex formatting for frame
//! logging and the byte/BCD/time codecs at the bottom of the protocol stack.

pub mod codec;
pub mod hex;

pub use codec::{
    bcd_to_digits, bcd_to_float, bcd_to_time, bytes_to_i64_le, bytes_to_u32_le, digits_to_bcd,
    float_to_bcd, time_to_bcd, Endian,
};
pub use hex::{format_hex_spaced, hex_to_bytes};
