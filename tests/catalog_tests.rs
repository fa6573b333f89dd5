//! Catalogue behaviour at scale: expansion coverage, write idempotence
//! and validation across value kinds.

use chrono::NaiveDate;
use dlt645_rs::constants::{RATE_SLOTS, SETTLEMENT_DAYS};
use dlt645_rs::{Catalog, Demand, Dlt645Error, Value};

fn catalog() -> Catalog {
    Catalog::load_default().unwrap()
}

#[test]
fn test_expansion_scale() {
    let catalog = catalog();
    // eleven energy sub-classes and ten demand sub-classes fan out over
    // all rate slots and settlement days
    let combinatorial = (11 + 10) * RATE_SLOTS * SETTLEMENT_DAYS;
    assert!(
        catalog.len() > combinatorial,
        "{} items is too few",
        catalog.len()
    );
}

/// P6: set followed by get returns the written value, for every kind.
#[test]
fn test_write_then_read_every_kind() {
    let catalog = catalog();
    let occur = NaiveDate::from_ymd_opt(2025, 6, 1)
        .unwrap()
        .and_hms_opt(8, 30, 0)
        .unwrap();

    let writes: Vec<(u32, Value)> = vec![
        (0x0000_0000, Value::Float(123456.78)),
        (0x0001_0203, Value::Float(0.25)),
        (
            0x0102_0001,
            Value::Demand(Demand {
                value: 12.5,
                occur_time: occur,
            }),
        ),
        (0x0201_0100, Value::Float(220.1)),
        (0x0400_0102, Value::Digits("120900".to_string())),
        (
            0x0402_0000,
            Value::DigitsList((1..=14).map(|i| format!("0800{i:02}")).collect()),
        ),
    ];
    for (di, value) in writes {
        catalog.set(di, value.clone()).unwrap();
        assert_eq!(catalog.get(di).unwrap().value, value, "di {di:#010x}");
    }
}

#[test]
fn test_rewrite_replaces_value() {
    let catalog = catalog();
    catalog.set(0x0000_0000, Value::Float(1.0)).unwrap();
    catalog.set(0x0000_0000, Value::Float(2.0)).unwrap();
    assert_eq!(catalog.get(0x0000_0000).unwrap().value, Value::Float(2.0));
}

#[test]
fn test_metadata_survives_writes() {
    let catalog = catalog();
    let before = catalog.get(0x0000_0000).unwrap();
    catalog.set(0x0000_0000, Value::Float(5.0)).unwrap();
    let after = catalog.get(0x0000_0000).unwrap();
    assert_eq!(before.name, after.name);
    assert_eq!(before.format, after.format);
    assert_eq!(before.unit, after.unit);
}

#[test]
fn test_range_limits_follow_format() {
    let catalog = catalog();
    // energy: XXXXXX.XX tops out just under 800000
    assert!(catalog.set(0x0000_0000, Value::Float(799999.0)).is_ok());
    assert!(catalog.set(0x0000_0000, Value::Float(800000.0)).is_err());
    // demand: XX.XXXX tops out just under 80
    assert!(catalog.set(0x0101_0000, Value::Float(79.99)).is_ok());
    assert!(catalog.set(0x0101_0000, Value::Float(80.0)).is_err());
    // power factor variable: X.XXX
    assert!(catalog.set(0x0206_0000, Value::Float(0.998)).is_ok());
    assert!(catalog.set(0x0206_0000, Value::Float(8.0)).is_err());
}

#[test]
fn test_schedule_list_elements_validate_individually() {
    let catalog = catalog();
    let mut schedule: Vec<String> = (1..=14).map(|i| format!("1209{i:02}")).collect();
    assert!(catalog
        .set(0x0401_0000, Value::DigitsList(schedule.clone()))
        .is_ok());

    schedule[7] = "12".to_string(); // one short entry poisons the write
    assert!(matches!(
        catalog.set(0x0401_0000, Value::DigitsList(schedule)),
        Err(Dlt645Error::InvalidValue)
    ));
}

#[test]
fn test_unknown_di_read_and_write() {
    let catalog = catalog();
    assert!(matches!(
        catalog.get(0x0300_0000),
        Err(Dlt645Error::UnknownDi(0x0300_0000))
    ));
    assert!(matches!(
        catalog.set(0x0300_0000, Value::Float(1.0)),
        Err(Dlt645Error::UnknownDi(0x0300_0000))
    ));
}
