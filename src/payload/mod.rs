//! The payload module holds the data-item model and the DI catalogue both
//! meter roles resolve against.

pub mod catalog;
pub mod data_item;
pub mod types;

pub use catalog::Catalog;
pub use data_item::{DataItem, Demand, Value};
pub use types::{SeedEntry, SeedTables};
