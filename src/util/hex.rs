//! # Hex Formatting Utilities
//!
//! Hex helpers used for frame logging and test vectors. Transports log
//! every sent and received frame as spaced hex (`68 aa aa ...`), which is
//! the most readable form for DL/T 645 byte-level debugging.

use thiserror::Error;

/// Errors that can occur during hex decoding.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    #[error("odd number of hex characters: {0}")]
    OddLength(usize),

    #[error("empty hex string")]
    EmptyString,

    #[error("hex decoding error: {0}")]
    DecodeError(String),
}

/// Format bytes as lowercase hex with one space between bytes, the way
/// frames appear in the logs: `68 aa aa aa aa aa aa 68 11 04 ...`.
pub fn format_hex_spaced(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode a hex string into bytes. Whitespace is stripped first, so the
/// spaced form produced by [`format_hex_spaced`] round-trips.
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>, HexError> {
    if hex_str.is_empty() {
        return Err(HexError::EmptyString);
    }

    let cleaned: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.len() % 2 != 0 {
        return Err(HexError::OddLength(cleaned.len()));
    }

    hex::decode(&cleaned).map_err(|e| HexError::DecodeError(e.to_string()))
}

/// Helper for creating test data from hex strings.
///
/// Panics on invalid hex (intended for test code only).
pub fn hex_to_bytes(hex: &str) -> Vec<u8> {
    decode_hex(hex).expect("invalid hex in test data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_spaced() {
        let data = vec![0x68, 0xAA, 0x16];
        assert_eq!(format_hex_spaced(&data), "68 aa 16");
    }

    #[test]
    fn test_decode_with_whitespace() {
        assert_eq!(decode_hex("68 aa 16").unwrap(), vec![0x68, 0xAA, 0x16]);
    }

    #[test]
    fn test_spaced_roundtrip() {
        let data = vec![0xFE, 0xFE, 0x68, 0x00, 0x99];
        assert_eq!(decode_hex(&format_hex_spaced(&data)).unwrap(), data);
    }

    #[test]
    fn test_hex_to_bytes() {
        assert_eq!(hex_to_bytes("683333"), vec![0x68, 0x33, 0x33]);
    }

    #[test]
    fn test_errors() {
        assert!(decode_hex("").is_err());
        assert!(decode_hex("1").is_err());
        assert!(decode_hex("zz").is_err());
    }
}
