//! # Data-Item Catalogue
//!
//! The DI → data-item map shared by both meter roles. The catalogue is
//! seeded once at startup from the four JSON tables (energy → demand →
//! variable → parameter, later tables overwriting colliding DIs) and
//! expanded combinatorially over the electrical dimensions of the 2007
//! standard: for energy and demand, every sub-class base fans out over
//! 64 rate slots and 13 settlement-day back-references.
//!
//! Item metadata (name, format, unit) is immutable after seeding and
//! read without locking; only the value slots sit behind a lock, so the
//! read-mostly hot path stays cheap.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use chrono::Utc;
use log::{debug, info};

use crate::constants::{
    FORMAT_DEMAND, FORMAT_ENERGY, RATE_SLOTS, SETTLEMENT_DAYS, TARIFF_SCHEDULE_FIRST,
    TARIFF_SCHEDULE_LAST, TARIFF_SCHEDULE_SLOTS,
};
use crate::error::Dlt645Error;
use crate::payload::data_item::{DataItem, Value};
use crate::payload::types::{self, SeedEntry, SeedTables};
use crate::util::codec::{format_digit_count, parse_format};

/// Immutable per-item metadata, installed at seeding time.
#[derive(Debug, Clone)]
struct ItemMeta {
    name: String,
    format: String,
    unit: String,
}

/// A written value together with the Unix second of the write.
#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    timestamp: i64,
}

/// The DI → data-item catalogue.
pub struct Catalog {
    items: HashMap<u32, ItemMeta>,
    values: RwLock<HashMap<u32, Slot>>,
}

impl Catalog {
    /// Loads and expands the catalogue from the default seed directory
    /// (`$DLT645_CONFIG_DIR`, falling back to `config/`).
    pub fn load_default() -> Result<Self, Dlt645Error> {
        Self::load(&types::default_dir())
    }

    /// Loads and expands the catalogue from the given seed directory.
    pub fn load(dir: &Path) -> Result<Self, Dlt645Error> {
        let tables = SeedTables::load(dir)?;
        let mut items = HashMap::new();
        let mut values = HashMap::new();

        seed_expanded(&mut items, &tables.energy, 0x00, FORMAT_ENERGY);
        seed_expanded(&mut items, &tables.demand, 0x01, FORMAT_DEMAND);
        seed_direct(&mut items, &tables.variable);
        seed_parameters(&mut items, &mut values, &tables.parameter);

        info!("catalogue seeded with {} data items", items.len());
        Ok(Catalog {
            items,
            values: RwLock::new(values),
        })
    }

    /// Looks up a data item, returning its metadata together with the
    /// current value (or [`Value::None`] when nothing was written yet).
    pub fn get(&self, di: u32) -> Result<DataItem, Dlt645Error> {
        let meta = self.items.get(&di).ok_or(Dlt645Error::UnknownDi(di))?;
        let (value, timestamp) = self
            .values
            .read()
            .expect("catalogue value table lock poisoned")
            .get(&di)
            .map(|slot| (slot.value.clone(), slot.timestamp))
            .unwrap_or((Value::None, 0));
        Ok(DataItem {
            di,
            name: meta.name.clone(),
            format: meta.format.clone(),
            value,
            unit: meta.unit.clone(),
            timestamp,
        })
    }

    /// Replaces an item's value after validating it against the item's
    /// format. Rejected writes leave the catalogue untouched.
    pub fn set(&self, di: u32, value: Value) -> Result<(), Dlt645Error> {
        let meta = self.items.get(&di).ok_or(Dlt645Error::UnknownDi(di))?;
        validate(&meta.format, &value)?;
        debug!("set data item {di:#010x} to {value:?}");
        self.values
            .write()
            .expect("catalogue value table lock poisoned")
            .insert(
                di,
                Slot {
                    value,
                    timestamp: Utc::now().timestamp(),
                },
            );
        Ok(())
    }

    /// Whether a DI is present in the catalogue.
    pub fn contains(&self, di: u32) -> bool {
        self.items.contains_key(&di)
    }

    /// Number of seeded data items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Expands the energy/demand seed table into the full DI space.
///
/// Entries whose electrical sub-class (di2) lies in the combinatorial
/// band fan out over all rate slots and settlement days; entries above
/// the band (the phase-split and fundamental/harmonic registers) keep
/// their rate slot and fan out over settlement days only.
fn seed_expanded(
    items: &mut HashMap<u32, ItemMeta>,
    table: &[SeedEntry],
    di3: u8,
    format: &str,
) {
    for entry in table {
        let di2 = (entry.di >> 16) & 0xFF;
        if di2 <= 0x0A {
            for rate in 0..RATE_SLOTS as u32 {
                for day in 0..SETTLEMENT_DAYS as u32 {
                    let di = (u32::from(di3) << 24) | (di2 << 16) | (rate << 8) | day;
                    items.insert(
                        di,
                        ItemMeta {
                            name: day_name(&rate_name(&entry.name, rate), day),
                            format: format.to_string(),
                            unit: entry.unit.clone(),
                        },
                    );
                }
            }
        } else {
            for day in 0..SETTLEMENT_DAYS as u32 {
                let di = (entry.di & 0xFFFF_FF00) | day;
                items.insert(
                    di,
                    ItemMeta {
                        name: day_name(&entry.name, day),
                        format: format.to_string(),
                        unit: entry.unit.clone(),
                    },
                );
            }
        }
    }
}

/// Installs seed entries verbatim (variable table).
fn seed_direct(items: &mut HashMap<u32, ItemMeta>, table: &[SeedEntry]) {
    for entry in table {
        items.insert(
            entry.di,
            ItemMeta {
                name: entry.name.clone(),
                format: entry.format.clone(),
                unit: entry.unit.clone(),
            },
        );
    }
}

/// Installs parameter entries and pre-fills their values with zero-digit
/// placeholders so a fresh meter answers parameter reads. Tariff-schedule
/// DIs receive a full list of empty switching entries.
fn seed_parameters(
    items: &mut HashMap<u32, ItemMeta>,
    values: &mut HashMap<u32, Slot>,
    table: &[SeedEntry],
) {
    for entry in table {
        let placeholder = "0".repeat(format_digit_count(&entry.format));
        let value = if (TARIFF_SCHEDULE_FIRST..=TARIFF_SCHEDULE_LAST).contains(&entry.di) {
            Value::DigitsList(vec![placeholder; TARIFF_SCHEDULE_SLOTS])
        } else {
            Value::Digits(placeholder)
        };
        items.insert(
            entry.di,
            ItemMeta {
                name: entry.name.clone(),
                format: entry.format.clone(),
                unit: entry.unit.clone(),
            },
        );
        values.insert(
            entry.di,
            Slot {
                value,
                timestamp: 0,
            },
        );
    }
}

fn rate_name(base: &str, rate: u32) -> String {
    if rate == 0 {
        format!("{base} (total)")
    } else {
        format!("{base} (rate {rate})")
    }
}

fn day_name(name: &str, day: u32) -> String {
    if day == 0 {
        name.to_string()
    } else {
        format!("{name} (settlement day -{day})")
    }
}

/// Validates a value against an item's format pattern.
fn validate(format: &str, value: &Value) -> Result<(), Dlt645Error> {
    match value {
        Value::Float(v) => check_range(format, *v),
        Value::Demand(d) => check_range(format, d.value),
        Value::Digits(s) => check_digits(format, s),
        Value::DigitsList(list) => {
            for s in list {
                check_digits(format, s)?;
            }
            Ok(())
        }
        _ => Err(Dlt645Error::InvalidValue),
    }
}

/// Numeric range check: the leading digit is capped at 7 because the top
/// bit of the most significant nibble carries the sign on the wire. The
/// comparison happens in the encoder's scaled-integer space so that a
/// value is rejected exactly when its BCD rendering would not fit.
fn check_range(format: &str, value: f32) -> Result<(), Dlt645Error> {
    let spec = parse_format(format).map_err(|_| Dlt645Error::InvalidValue)?;
    let out_of_range = Err(Dlt645Error::OutOfRange {
        value,
        format: format.to_string(),
    });
    if !value.is_finite() {
        return out_of_range;
    }
    let scale = 10f64.powi(spec.decimals as i32);
    let scaled = (f64::from(value).abs() * scale).round_ties_even();
    let limit = 8f64 * 10f64.powi(spec.digits as i32 - 1) - 1.0;
    if scaled <= limit {
        Ok(())
    } else {
        out_of_range
    }
}

fn check_digits(format: &str, digits: &str) -> Result<(), Dlt645Error> {
    let expected = format_digit_count(format);
    if digits.len() == expected && digits.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(Dlt645Error::InvalidValue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::data_item::Demand;
    use chrono::NaiveDate;

    fn catalog() -> Catalog {
        Catalog::load_default().unwrap()
    }

    #[test]
    fn test_expansion_covers_rates_and_days() {
        let catalog = catalog();
        // combined active energy: total, a high rate, a back settlement day
        assert!(catalog.contains(0x0000_0000));
        assert!(catalog.contains(0x0000_3F0C));
        // forward active demand
        assert!(catalog.contains(0x0101_0000));
        assert!(catalog.contains(0x0101_010C));
        // phase-split special fans out over settlement days only
        assert!(catalog.contains(0x0015_0000));
        assert!(catalog.contains(0x0015_000C));
        assert!(!catalog.contains(0x0015_010C));
    }

    #[test]
    fn test_expanded_names_carry_rate_and_day() {
        let catalog = catalog();
        let total = catalog.get(0x0001_0000).unwrap();
        assert!(total.name.contains("(total)"));
        let item = catalog.get(0x0001_0201).unwrap();
        assert!(item.name.contains("(rate 2)"));
        assert!(item.name.contains("(settlement day -1)"));
        assert_eq!(item.format, FORMAT_ENERGY);
    }

    #[test]
    fn test_set_then_get_returns_value() {
        let catalog = catalog();
        catalog.set(0x0000_0000, Value::Float(123456.78)).unwrap();
        let item = catalog.get(0x0000_0000).unwrap();
        assert_eq!(item.value, Value::Float(123456.78));
        assert!(item.timestamp > 0);
    }

    #[test]
    fn test_set_rejects_out_of_range() {
        let catalog = catalog();
        let err = catalog.set(0x0000_0000, Value::Float(800000.0)).unwrap_err();
        assert!(matches!(err, Dlt645Error::OutOfRange { .. }));
        // the slot stays untouched
        assert_eq!(catalog.get(0x0000_0000).unwrap().value, Value::None);
    }

    #[test]
    fn test_set_rejects_unknown_di() {
        let catalog = catalog();
        assert!(matches!(
            catalog.set(0x0700_0000, Value::Float(1.0)),
            Err(Dlt645Error::UnknownDi(0x0700_0000))
        ));
    }

    #[test]
    fn test_demand_range_follows_format() {
        let catalog = catalog();
        let occur = NaiveDate::from_ymd_opt(2025, 11, 2)
            .unwrap()
            .and_hms_opt(12, 9, 0)
            .unwrap();
        catalog
            .set(
                0x0101_0000,
                Value::Demand(Demand {
                    value: 50.5,
                    occur_time: occur,
                }),
            )
            .unwrap();
        let err = catalog
            .set(
                0x0101_0000,
                Value::Demand(Demand {
                    value: 80.0,
                    occur_time: occur,
                }),
            )
            .unwrap_err();
        assert!(matches!(err, Dlt645Error::OutOfRange { .. }));
    }

    #[test]
    fn test_parameter_placeholders() {
        let catalog = catalog();
        match catalog.get(0x0401_0000).unwrap().value {
            Value::DigitsList(list) => {
                assert_eq!(list.len(), TARIFF_SCHEDULE_SLOTS);
                assert!(list.iter().all(|s| s.chars().all(|c| c == '0')));
            }
            other => panic!("expected schedule placeholder, got {other:?}"),
        }
        match catalog.get(0x0400_0101).unwrap().value {
            Value::Digits(s) => assert_eq!(s.len(), 8),
            other => panic!("expected digits placeholder, got {other:?}"),
        }
    }

    #[test]
    fn test_digit_string_length_must_match() {
        let catalog = catalog();
        assert!(catalog
            .set(0x0400_0101, Value::Digits("25080112".to_string()))
            .is_ok());
        assert!(catalog
            .set(0x0400_0101, Value::Digits("2508".to_string()))
            .is_err());
        assert!(catalog
            .set(0x0400_0101, Value::Digits("2508011x".to_string()))
            .is_err());
    }

    #[test]
    fn test_kind_mismatch_is_invalid() {
        let catalog = catalog();
        assert!(matches!(
            catalog.set(0x0400_0101, Value::Float(1.0)),
            Err(Dlt645Error::InvalidValue)
        ));
    }
}
