//! Catalogue seed tables.
//!
//! Four JSON files seed the data-item catalogue at startup: energy,
//! demand, variable and parameter types. Each file is an array of
//! `{di, name, unit, format}` objects with the DI written as a base-16
//! string.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};

use crate::error::Dlt645Error;

/// One seed entry as it appears in the JSON tables.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry {
    #[serde(deserialize_with = "di_from_hex")]
    pub di: u32,
    pub name: String,
    pub unit: String,
    pub format: String,
}

fn di_from_hex<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    u32::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| serde::de::Error::custom(format!("di {s:?} is not hex: {e}")))
}

/// The four seed tables, loaded in catalogue seeding order.
#[derive(Debug)]
pub struct SeedTables {
    pub energy: Vec<SeedEntry>,
    pub demand: Vec<SeedEntry>,
    pub variable: Vec<SeedEntry>,
    pub parameter: Vec<SeedEntry>,
}

impl SeedTables {
    /// Loads all four tables from a directory.
    pub fn load(dir: &Path) -> Result<Self, Dlt645Error> {
        Ok(SeedTables {
            energy: load_table(&dir.join("energy_types.json"))?,
            demand: load_table(&dir.join("demand_types.json"))?,
            variable: load_table(&dir.join("variable_types.json"))?,
            parameter: load_table(&dir.join("parameter_types.json"))?,
        })
    }
}

fn load_table(path: &Path) -> Result<Vec<SeedEntry>, Dlt645Error> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| Dlt645Error::SeedTable(format!("{}: {e}", path.display())))?;
    let entries: Vec<SeedEntry> = serde_json::from_str(&json)
        .map_err(|e| Dlt645Error::SeedTable(format!("{}: {e}", path.display())))?;
    log::info!(
        "loaded {} seed entries from {}",
        entries.len(),
        path.display()
    );
    Ok(entries)
}

/// The seed directory: `$DLT645_CONFIG_DIR` when set, `config/` otherwise.
pub fn default_dir() -> PathBuf {
    std::env::var_os("DLT645_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config"))
}
