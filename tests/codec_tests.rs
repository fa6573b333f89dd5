//! BCD codec properties: exact round trips for format-fitting values and
//! endian symmetry of the encoders.

use chrono::NaiveDate;
use dlt645_rs::util::codec::{
    bcd_to_float, bcd_to_time, digits_to_bcd, float_to_bcd, reverse_bytes, time_to_bcd, Endian,
};

/// P2: values that fit their format round-trip exactly, both byte orders,
/// both signs.
#[test]
fn test_float_roundtrip_is_exact() {
    let cases: &[(f32, &str)] = &[
        (0.0, "XXXXXX.XX"),
        (123456.78, "XXXXXX.XX"),
        (131072.25, "XXXXXX.XX"),
        (-123456.78, "XXXXXX.XX"),
        (50.5, "XX.XXXX"),
        (79.9999, "XX.XXXX"),
        (-0.0625, "XX.XXXX"),
        (220.1, "XXX.X"),
        (1.375, "XXX.XXX"),
        (-1.375, "XXX.XXX"),
        (0.5, "X.XXX"),
        (49.98, "XX.XX"),
    ];
    for &(value, format) in cases {
        for endian in [Endian::Big, Endian::Little] {
            let bcd = float_to_bcd(value, format, endian).unwrap();
            let back = bcd_to_float(&bcd, format, endian).unwrap();
            assert_eq!(back, value, "{value} via {format} ({endian:?})");
        }
    }
}

/// P3: the little-endian encoding is the byte reverse of the big-endian
/// one, with the sign bit in the last byte instead of the first.
#[test]
fn test_endian_symmetry_with_sign() {
    for &value in &[31.7f32, -31.7] {
        let big = float_to_bcd(value, "XXXX.XX", Endian::Big).unwrap();
        let little = float_to_bcd(value, "XXXX.XX", Endian::Little).unwrap();

        let mut unsigned_big = big.clone();
        unsigned_big[0] &= 0x7F;
        let mut unsigned_little = little.clone();
        let last = unsigned_little.len() - 1;
        unsigned_little[last] &= 0x7F;
        assert_eq!(reverse_bytes(&unsigned_big), unsigned_little);

        if value < 0.0 {
            assert_eq!(big[0] & 0x80, 0x80);
            assert_eq!(little[last] & 0x80, 0x80);
        }
    }
}

/// A short buffer decodes as if zero-extended on the significant side,
/// matching the encoder's left padding.
#[test]
fn test_short_buffer_zero_extends() {
    // two BCD bytes where the format calls for three
    let value = bcd_to_float(&[0x23, 0x01], "XXXX.XX", Endian::Little).unwrap();
    assert_eq!(value, 1.23);
}

#[test]
fn test_schedule_entry_wire_order() {
    // a tariff slot is written little-endian: "120901" -> 01 09 12
    let bcd = digits_to_bcd("120901", Endian::Little).unwrap();
    assert_eq!(bcd, vec![0x01, 0x09, 0x12]);
}

#[test]
fn test_time_field_wire_order() {
    let t = NaiveDate::from_ymd_opt(2025, 11, 2)
        .unwrap()
        .and_hms_opt(12, 9, 0)
        .unwrap();
    let wire = time_to_bcd(&t);
    assert_eq!(wire, [0x09, 0x12, 0x02, 0x11, 0x25]);
    assert_eq!(bcd_to_time(&wire).unwrap(), t);
}

#[test]
fn test_year_window_starts_at_2000() {
    // 99 -> 2099, not 1999
    let wire = [0x00, 0x00, 0x01, 0x01, 0x99];
    let t = bcd_to_time(&wire).unwrap();
    assert_eq!(
        t,
        NaiveDate::from_ymd_opt(2099, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    );
}
