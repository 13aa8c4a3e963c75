//! Sparkify ETL Library
//!
//! Loads song-metadata and listening-log JSON files into a SQLite star
//! schema. The binary is a thin CLI over these modules.

pub mod config;
pub mod etl;
pub mod extract;
pub mod sqlite_persistence;
pub mod warehouse;

// Re-export commonly used types for convenience
pub use etl::{process_data, BatchSummary, FileKind, FileReport};
pub use warehouse::{SqliteWarehouseStore, StoreError, TableCounts, WarehouseStore};
