//! # Byte and BCD Codecs
//!
//! The conversions at the bottom of the DL/T 645 stack: little-endian
//! integer decoding, packed-BCD digit strings, BCD-encoded fixed-point
//! numbers with sign and endianness semantics, and packed-BCD calendar
//! time. Every function returns an explicit error on malformed input;
//! none panics.
//!
//! A format pattern such as `"XXXX.XX"` drives the numeric codecs: the
//! count of non-dot characters is the total digit width, the characters
//! after the dot the decimal count. Negative values carry their sign in
//! the high bit of the most significant BCD byte (the first byte in
//! big-endian order, the last byte in little-endian order).

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::error::Dlt645Error;

/// Byte order of a packed-BCD buffer on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

/// Wire length of a packed-BCD calendar time field (YY MM DD hh mm).
pub const TIME_BCD_LEN: usize = 5;

/// Decodes up to four little-endian bytes into a u32, zero-extending
/// short inputs.
pub fn bytes_to_u32_le(bytes: &[u8]) -> u32 {
    let mut padded = [0u8; 4];
    let n = bytes.len().min(4);
    padded[..n].copy_from_slice(&bytes[..n]);
    u32::from_le_bytes(padded)
}

/// Decodes up to eight little-endian bytes into an i64, zero-extending
/// short inputs.
pub fn bytes_to_i64_le(bytes: &[u8]) -> i64 {
    let mut padded = [0u8; 8];
    let n = bytes.len().min(8);
    padded[..n].copy_from_slice(&bytes[..n]);
    i64::from_le_bytes(padded)
}

/// Returns a reversed copy of the input bytes.
pub fn reverse_bytes(src: &[u8]) -> Vec<u8> {
    src.iter().rev().copied().collect()
}

/// Packs a value below 100 into one BCD byte (tens in the high nibble).
pub fn u8_to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// Unpacks one BCD byte into its decimal value.
pub fn bcd_to_u8(b: u8) -> u8 {
    (b >> 4) * 10 + (b & 0x0F)
}

/// Flattens a packed-BCD buffer into its decimal digit string,
/// big-endian byte order: byte 0 contributes the two leftmost digits.
pub fn bcd_to_digits(bcd: &[u8]) -> Result<String, Dlt645Error> {
    let mut digits = String::with_capacity(bcd.len() * 2);
    for &b in bcd {
        let high = b >> 4;
        let low = b & 0x0F;
        if high > 9 || low > 9 {
            return Err(Dlt645Error::InvalidBcd(format!(
                "non-decimal nibble in byte {b:#04x}"
            )));
        }
        digits.push(char::from(b'0' + high));
        digits.push(char::from(b'0' + low));
    }
    Ok(digits)
}

/// Packs a decimal digit string into BCD bytes. An odd digit count is
/// left-padded with a zero; `Endian::Little` reverses the byte order.
pub fn digits_to_bcd(digits: &str, endian: Endian) -> Result<Vec<u8>, Dlt645Error> {
    let padded;
    let digits = if digits.len() % 2 == 1 {
        padded = format!("0{digits}");
        padded.as_str()
    } else {
        digits
    };

    let mut bcd = Vec::with_capacity(digits.len() / 2);
    for pair in digits.as_bytes().chunks(2) {
        let (high, low) = (pair[0], pair[1]);
        if !high.is_ascii_digit() || !low.is_ascii_digit() {
            return Err(Dlt645Error::InvalidBcd(format!(
                "non-digit character in {digits:?}"
            )));
        }
        bcd.push(((high - b'0') << 4) | (low - b'0'));
    }
    if endian == Endian::Little {
        bcd.reverse();
    }
    Ok(bcd)
}

/// A parsed numeric format pattern: total digit count and decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSpec {
    pub digits: usize,
    pub decimals: usize,
}

/// Parses a numeric format pattern such as `"XXXX.XX"`. The pattern must
/// contain exactly one decimal point with digit positions on both sides.
pub fn parse_format(format: &str) -> Result<FormatSpec, Dlt645Error> {
    let mut parts = format.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(int), Some(frac), None) if !int.is_empty() && !frac.is_empty() => Ok(FormatSpec {
            digits: int.len() + frac.len(),
            decimals: frac.len(),
        }),
        _ => Err(Dlt645Error::InvalidFormat(format.to_string())),
    }
}

/// Counts the digit positions of a format pattern, ignoring the decimal
/// point. Dot-free patterns (parameter formats) count every character.
pub fn format_digit_count(format: &str) -> usize {
    format.chars().filter(|&c| c != '.').count()
}

/// Encodes a value as packed BCD according to its format pattern.
///
/// The value is rounded half-to-even to the format's decimal count,
/// rendered as a zero-padded fixed-point digit string and packed with
/// the requested byte order; a negative sign sets the high bit of the
/// most significant byte.
pub fn float_to_bcd(value: f32, format: &str, endian: Endian) -> Result<Vec<u8>, Dlt645Error> {
    let spec = parse_format(format)?;
    let negative = value < 0.0;
    let scale = 10f64.powi(spec.decimals as i32);
    let scaled = (f64::from(value).abs() * scale).round_ties_even();

    let digits = format!("{:0width$}", scaled as u64, width = spec.digits);
    let mut bcd = digits_to_bcd(&digits, endian)?;

    if negative {
        match endian {
            Endian::Big => bcd[0] |= 0x80,
            Endian::Little => {
                let last = bcd.len() - 1;
                bcd[last] |= 0x80;
            }
        }
    }
    Ok(bcd)
}

/// Decodes a packed-BCD buffer back into a float, the strict inverse of
/// [`float_to_bcd`]. Short buffers are zero-extended on the most
/// significant side, matching the encoder's padding.
pub fn bcd_to_float(bcd: &[u8], format: &str, endian: Endian) -> Result<f32, Dlt645Error> {
    let spec = parse_format(format)?;
    if bcd.is_empty() {
        return Err(Dlt645Error::InvalidBcd("empty buffer".to_string()));
    }

    let mut buf = bcd.to_vec();
    let negative = match endian {
        Endian::Big => {
            let negative = buf[0] & 0x80 != 0;
            buf[0] &= 0x7F;
            negative
        }
        Endian::Little => {
            let last = buf.len() - 1;
            let negative = buf[last] & 0x80 != 0;
            buf[last] &= 0x7F;
            negative
        }
    };
    if endian == Endian::Little {
        buf.reverse();
    }

    let mut digits = bcd_to_digits(&buf)?;
    if digits.len() < spec.digits {
        digits = format!("{}{}", "0".repeat(spec.digits - digits.len()), digits);
    }

    let split = digits.len() - spec.decimals;
    let value: f32 = format!("{}.{}", &digits[..split], &digits[split..])
        .parse()
        .map_err(|_| Dlt645Error::InvalidBcd(format!("unparseable digits {digits:?}")))?;
    Ok(if negative { -value } else { value })
}

/// Encodes a calendar time as the five-byte little-endian wire field:
/// YY MM DD hh mm packed as BCD, then byte-reversed.
pub fn time_to_bcd(t: &NaiveDateTime) -> [u8; TIME_BCD_LEN] {
    let fields = [
        (t.year().rem_euclid(100)) as u8,
        t.month() as u8,
        t.day() as u8,
        t.hour() as u8,
        t.minute() as u8,
    ];
    let mut bcd = [0u8; TIME_BCD_LEN];
    for (out, field) in bcd.iter_mut().zip(fields) {
        *out = u8_to_bcd(field);
    }
    bcd.reverse();
    bcd
}

/// Decodes the five-byte little-endian wire field back into a calendar
/// time. The two-digit year is interpreted as 2000 + YY.
pub fn bcd_to_time(bcd: &[u8]) -> Result<NaiveDateTime, Dlt645Error> {
    if bcd.len() < TIME_BCD_LEN {
        return Err(Dlt645Error::InvalidBcd(
            "time field shorter than five bytes".to_string(),
        ));
    }
    let mut buf = [0u8; TIME_BCD_LEN];
    buf.copy_from_slice(&bcd[..TIME_BCD_LEN]);
    buf.reverse();

    for &b in &buf {
        if (b >> 4) > 9 || (b & 0x0F) > 9 {
            return Err(Dlt645Error::InvalidBcd(format!(
                "non-decimal nibble in time byte {b:#04x}"
            )));
        }
    }

    let year = 2000 + i32::from(bcd_to_u8(buf[0]));
    let month = u32::from(bcd_to_u8(buf[1]));
    let day = u32::from(bcd_to_u8(buf[2]));
    let hour = u32::from(bcd_to_u8(buf[3]));
    let minute = u32::from(bcd_to_u8(buf[4]));

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .ok_or_else(|| {
            Dlt645Error::InvalidBcd(format!(
                "invalid calendar fields {year:04}-{month:02}-{day:02} {hour:02}:{minute:02}"
            ))
        })
}
