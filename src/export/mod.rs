//! Persistence for extraction output and aggregated stat tables.

pub mod store;
pub mod table;

pub use store::{ClipKey, FeatureRecord, FeatureStore};
pub use table::{StatRow, StatTable};
