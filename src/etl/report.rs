//! Per-file and per-batch load reports.

use crate::extract::ExtractionError;
use crate::warehouse::{StoreError, TableCounts};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Song,
    Log,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Song => "song",
            FileKind::Log => "log",
        }
    }
}

/// How processing of one file ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileStatus {
    /// Records were written and committed (some may have been skipped).
    Loaded,
    /// The file could not be extracted; nothing was written.
    Skipped { kind: &'static str, message: String },
    /// The file transaction could not be opened or committed; nothing was kept.
    TransactionFailed { message: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    StoreWrite,
    StoreLookup,
}

impl SkipReason {
    fn from_error(err: &StoreError) -> Self {
        match err {
            StoreError::Lookup { .. } => SkipReason::StoreLookup,
            _ => SkipReason::StoreWrite,
        }
    }
}

/// A single record that was dropped while loading a file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedRecord {
    pub table: &'static str,
    pub reason: SkipReason,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    pub kind: FileKind,
    pub status: FileStatus,
    /// Insert calls that succeeded, per table. Ignored natural-key conflicts
    /// count as written.
    pub written: TableCounts,
    pub skipped: Vec<SkippedRecord>,
    /// Fact rows written without a song/artist match.
    pub unmatched_plays: usize,
}

impl FileReport {
    pub fn new(path: &Path, kind: FileKind) -> Self {
        FileReport {
            path: path.to_path_buf(),
            kind,
            status: FileStatus::Loaded,
            written: TableCounts::default(),
            skipped: Vec::new(),
            unmatched_plays: 0,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.status == FileStatus::Loaded
    }

    pub(crate) fn mark_skipped(&mut self, err: &ExtractionError) {
        warn!("Skipping {} file: {}", self.kind.as_str(), err);
        self.status = FileStatus::Skipped {
            kind: err.kind(),
            message: err.to_string(),
        };
    }

    pub(crate) fn mark_transaction_failed(&mut self, err: &StoreError) {
        warn!("Discarding {}: {}", self.path.display(), err);
        self.status = FileStatus::TransactionFailed {
            message: err.to_string(),
        };
        self.written = TableCounts::default();
        self.unmatched_plays = 0;
    }

    pub(crate) fn record_skipped(&mut self, table: &'static str, err: &StoreError) {
        warn!("Skipping {} record from {}: {}", table, self.path.display(), err);
        self.skipped.push(SkippedRecord {
            table,
            reason: SkipReason::from_error(err),
            message: err.to_string(),
        });
    }

    pub(crate) fn log_summary(&self) {
        if !self.is_loaded() {
            return;
        }
        let w = &self.written;
        info!(
            "Loaded {}: {} songplays, {} users, {} songs, {} artists, {} time rows; {} skipped, {} plays without song match",
            self.path.display(),
            w.songplays,
            w.users,
            w.songs,
            w.artists,
            w.time,
            self.skipped.len(),
            self.unmatched_plays
        );
        for skipped in &self.skipped {
            debug!("  skipped {} ({:?}): {}", skipped.table, skipped.reason, skipped.message);
        }
    }
}

/// Totals over every file of one `process_data` run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub files_found: usize,
    pub files_loaded: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub written: TableCounts,
    pub records_skipped: usize,
    pub unmatched_plays: usize,
}

impl BatchSummary {
    pub fn add(&mut self, report: &FileReport) {
        match report.status {
            FileStatus::Loaded => self.files_loaded += 1,
            FileStatus::Skipped { .. } => self.files_skipped += 1,
            FileStatus::TransactionFailed { .. } => self.files_failed += 1,
        }
        self.written.add(&report.written);
        self.records_skipped += report.skipped.len();
        self.unmatched_plays += report.unmatched_plays;
    }

    pub fn log(&self, kind: FileKind) {
        info!(
            "Processed {} {} files: {} loaded, {} skipped, {} failed; {} records written, {} records skipped, {} plays without song match",
            self.files_found,
            kind.as_str(),
            self.files_loaded,
            self.files_skipped,
            self.files_failed,
            self.written.total(),
            self.records_skipped,
            self.unmatched_plays
        );
    }
}
