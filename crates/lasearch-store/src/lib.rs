//! Storage layer: findings and risks per matter, plus the ingest adapter
//! that keeps them consistent.

mod error;
pub mod ingest;
pub mod memory;
pub mod store;

pub use error::StoreError;
pub use ingest::{IngestOptions, IngestReport, Ingestor, MatterReport, ReplaceScope, SourceDocument};
pub use memory::MemoryStore;
pub use store::{ClearScope, MatterStore, MatterUpdate};

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;
