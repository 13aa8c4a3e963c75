//! Common test infrastructure
//!
//! Integration tests build a throwaway data directory with [`TestWarehouse`],
//! write song and log files into it and run the public pipeline against a
//! SQLite file inside the same directory.

mod constants;
mod fixtures;

pub use constants::*;
pub use fixtures::{log_line, song_json, LogLine, TestWarehouse};
