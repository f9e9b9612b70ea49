//! Core data types and traits for store-agnostic vector migration.

pub mod record;
pub mod traits;

pub use record::{Record, StoreKind, StoreStats};
pub use traits::VectorStore;
