//! Data-item model: the addressable quantities a meter exposes, keyed by
//! their 32-bit data identifier (DI).

use chrono::NaiveDateTime;

/// A momentary or peak measurement together with the wall-clock time at
/// which it occurred.
#[derive(Debug, Clone, PartialEq)]
pub struct Demand {
    pub value: f32,
    pub occur_time: NaiveDateTime,
}

/// The dynamic value slot of a data item.
///
/// The protocol partitions value kinds by DI class and format, so this is
/// a closed tagged union; dispatchers match on the variant.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value has been written yet.
    #[default]
    None,
    /// A numeric register (energy, variable).
    Float(f32),
    /// A fixed-width decimal digit string (parameter).
    Digits(String),
    /// A list of digit strings (tariff schedule parameter).
    DigitsList(Vec<String>),
    /// A calendar time.
    Time(NaiveDateTime),
    /// Raw bytes (communication address).
    Bytes(Vec<u8>),
    /// A demand register with its occurrence time.
    Demand(Demand),
}

impl Value {
    /// Numeric view of the value; unset slots read as zero, matching the
    /// meter's behaviour for registers that were never written.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Demand(d) => Some(d.value),
            _ => None,
        }
    }

    pub fn as_digits(&self) -> Option<&str> {
        match self {
            Value::Digits(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_demand(&self) -> Option<&Demand> {
        match self {
            Value::Demand(d) => Some(d),
            _ => None,
        }
    }
}

/// One addressable quantity: identifier, human name, wire format, the
/// current value and the Unix second it was last written.
#[derive(Debug, Clone, PartialEq)]
pub struct DataItem {
    pub di: u32,
    pub name: String,
    pub format: String,
    pub value: Value,
    pub unit: String,
    pub timestamp: i64,
}
