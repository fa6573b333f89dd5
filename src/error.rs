//! # DL/T 645 Error Handling
//!
//! This module defines the Dlt645Error enum, which represents the different
//! error types that can occur in the dlt645-rs crate.

use thiserror::Error;

use crate::constants::{
    EXC_AUTH_FAILED, EXC_BAUD_IMMUTABLE, EXC_DAY_SLOTS_EXCEEDED, EXC_NO_REQUEST_DATA, EXC_OTHER,
    EXC_RATE_COUNT_EXCEEDED, EXC_YEAR_ZONES_EXCEEDED,
};

/// Represents the different error types that can occur in the DL/T 645 crate.
#[derive(Debug, Error)]
pub enum Dlt645Error {
    /// No start marker was found in the received bytes.
    #[error("no start marker in buffer")]
    InvalidStart,

    /// The second start marker is missing seven bytes after the first.
    #[error("second start marker missing")]
    MissingSecondStart,

    /// The buffer ends before the frame header is complete.
    #[error("frame truncated")]
    Truncated,

    /// The declared data length does not fit the received buffer.
    #[error("invalid data length {0}")]
    InvalidLength(u8),

    /// The frame checksum does not match the received bytes.
    #[error("checksum mismatch: expected {expected:#04x}, calculated {calculated:#04x}")]
    BadChecksum { expected: u8, calculated: u8 },

    /// The end marker is missing after the checksum byte.
    #[error("end marker missing")]
    BadEnd,

    /// A control code the dispatcher does not handle.
    #[error("unknown control code {0:#04x}")]
    UnknownCtrl(u8),

    /// A data class (di3) the dispatcher does not handle.
    #[error("unknown data class {0:#04x}")]
    UnknownDi3(u8),

    /// A data identifier missing from the catalogue.
    #[error("unknown data identifier {0:#010x}")]
    UnknownDi(u32),

    /// The frame address does not match the local meter address or an
    /// applicable broadcast.
    #[error("unauthorized meter address")]
    Unauthorized,

    /// Malformed packed-BCD input.
    #[error("invalid BCD: {0}")]
    InvalidBcd(String),

    /// A data-format pattern the codec cannot interpret.
    #[error("invalid data format {0:?}")]
    InvalidFormat(String),

    /// A value whose magnitude exceeds what its format can represent.
    #[error("value {value} out of range for format {format:?}")]
    OutOfRange { value: f32, format: String },

    /// A value whose kind or shape does not match the addressed item.
    #[error("value does not match the item format")]
    InvalidValue,

    /// The peer answered with an exception response.
    #[error("device exception {0:#04x}: {}", exception_text(*.0))]
    DeviceException(u8),

    /// A socket or serial operation exceeded its deadline.
    #[error("i/o timeout")]
    IoTimeout,

    /// The connection is closed or was never opened.
    #[error("connection closed")]
    IoClosed,

    /// The peer sent nothing before the response deadline.
    #[error("no response received")]
    NoResponse,

    /// Serial port open or configuration failure.
    #[error("serial port error: {0}")]
    SerialPort(String),

    /// Underlying socket error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A catalogue seed table could not be read or parsed.
    #[error("seed table error: {0}")]
    SeedTable(String),
}

/// Renders the set bits of a device exception bitmap as readable text.
pub fn exception_text(code: u8) -> String {
    const BITS: [(u8, &str); 7] = [
        (EXC_OTHER, "other error"),
        (EXC_NO_REQUEST_DATA, "no request data"),
        (EXC_AUTH_FAILED, "authentication failed"),
        (EXC_BAUD_IMMUTABLE, "baud rate immutable"),
        (EXC_YEAR_ZONES_EXCEEDED, "year-zone count exceeded"),
        (EXC_DAY_SLOTS_EXCEEDED, "day-slot count exceeded"),
        (EXC_RATE_COUNT_EXCEEDED, "rate count exceeded"),
    ];
    let names: Vec<&str> = BITS
        .iter()
        .filter(|(bit, _)| code & bit != 0)
        .map(|(_, name)| *name)
        .collect();
    if names.is_empty() {
        "unknown".to_string()
    } else {
        names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_text_single_bit() {
        assert_eq!(exception_text(EXC_AUTH_FAILED), "authentication failed");
    }

    #[test]
    fn test_exception_text_combined_bits() {
        let text = exception_text(EXC_OTHER | EXC_RATE_COUNT_EXCEEDED);
        assert_eq!(text, "other error, rate count exceeded");
    }

    #[test]
    fn test_exception_text_unknown() {
        assert_eq!(exception_text(0x80), "unknown");
    }

    #[test]
    fn test_device_exception_display() {
        let err = Dlt645Error::DeviceException(EXC_NO_REQUEST_DATA);
        assert!(err.to_string().contains("no request data"));
    }
}
