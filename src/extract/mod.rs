//! Extraction of typed warehouse records from raw JSON input files.
//!
//! Extraction happens entirely in memory and before anything is written, so
//! a file that fails here leaves no partial rows behind.

mod log_file;
mod song_file;
mod time_bucket;

pub use log_file::{extract_log_file, parse_log_records, LogFileRecords, NEXT_SONG_PAGE};
pub use song_file::{extract_song_file, parse_song_record};
pub use time_bucket::{derive_time_bucket, start_time_from_millis};

use serde_json::error::Category;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure to extract records from one input file. The whole file is skipped.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {} at line {line}: {source}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unexpected content in {} at line {line}: {reason}", path.display())]
    SchemaMismatch {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

impl ExtractionError {
    /// Classifies a serde_json failure: syntax problems are parse errors,
    /// missing fields and wrong types are schema mismatches.
    fn from_json(path: &Path, line: usize, err: serde_json::Error) -> Self {
        match err.classify() {
            Category::Data => ExtractionError::SchemaMismatch {
                path: path.to_path_buf(),
                line,
                reason: err.to_string(),
            },
            Category::Syntax | Category::Eof | Category::Io => ExtractionError::Parse {
                path: path.to_path_buf(),
                line,
                source: err,
            },
        }
    }

    fn read(path: &Path, source: std::io::Error) -> Self {
        ExtractionError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::Io { .. } | ExtractionError::Parse { .. } => "ParseError",
            ExtractionError::SchemaMismatch { .. } => "SchemaMismatchError",
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ExtractionError::Io { path, .. }
            | ExtractionError::Parse { path, .. }
            | ExtractionError::SchemaMismatch { path, .. } => path,
        }
    }
}
