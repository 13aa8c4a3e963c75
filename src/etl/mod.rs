//! Batch loader: drives extraction, fact resolution and the store, one file
//! at a time, committing once per file.
//!
//! Failures are recovered at the smallest granularity available. A file that
//! cannot be extracted is skipped entirely, a record that cannot be written
//! (or whose song lookup fails) is skipped on its own. Nothing here aborts a
//! batch.

mod discovery;
mod report;
mod resolver;

pub use discovery::discover_files;
pub use report::{BatchSummary, FileKind, FileReport, FileStatus, SkipReason, SkippedRecord};
pub use resolver::resolve_song_play;

use crate::extract::{extract_log_file, extract_song_file, LogFileRecords};
use crate::warehouse::{Artist, Song, WarehouseStore};
use std::path::Path;
use tracing::{debug, info, warn};

/// Loads the artist and song of one song-metadata file.
pub fn process_song_file(store: &dyn WarehouseStore, path: &Path) -> FileReport {
    let mut report = FileReport::new(path, FileKind::Song);
    let (artist, song) = match extract_song_file(path) {
        Ok(records) => records,
        Err(e) => {
            report.mark_skipped(&e);
            return report;
        }
    };

    in_file_transaction(store, &mut report, |report| {
        load_song_records(store, report, &artist, &song)
    });
    report.log_summary();
    report
}

/// Loads the time buckets, users and song plays of one log file.
pub fn process_log_file(store: &dyn WarehouseStore, path: &Path) -> FileReport {
    let mut report = FileReport::new(path, FileKind::Log);
    let records = match extract_log_file(path) {
        Ok(records) => records,
        Err(e) => {
            report.mark_skipped(&e);
            return report;
        }
    };

    in_file_transaction(store, &mut report, |report| {
        load_log_records(store, report, &records)
    });
    report.log_summary();
    report
}

/// Processes every file of `kind` found under `root`, in path order.
pub fn process_data(
    store: &dyn WarehouseStore,
    root: &Path,
    extension: &str,
    kind: FileKind,
) -> BatchSummary {
    let files = discover_files(root, extension);
    let num_files = files.len();
    info!("{} files found in {}", num_files, root.display());

    let mut summary = BatchSummary {
        files_found: num_files,
        ..Default::default()
    };
    for (index, path) in files.iter().enumerate() {
        let report = match kind {
            FileKind::Song => process_song_file(store, path),
            FileKind::Log => process_log_file(store, path),
        };
        summary.add(&report);
        info!("{}/{} files processed.", index + 1, num_files);
    }
    summary.log(kind);
    summary
}

fn in_file_transaction<F>(store: &dyn WarehouseStore, report: &mut FileReport, load: F)
where
    F: FnOnce(&mut FileReport),
{
    if let Err(e) = store.begin_file() {
        report.mark_transaction_failed(&e);
        return;
    }

    load(report);

    if let Err(e) = store.commit_file() {
        report.mark_transaction_failed(&e);
        if let Err(rollback_error) = store.rollback_file() {
            warn!("Rollback after failed commit also failed: {}", rollback_error);
        }
    }
}

fn load_song_records(
    store: &dyn WarehouseStore,
    report: &mut FileReport,
    artist: &Artist,
    song: &Song,
) {
    match store.insert_artist(artist) {
        Ok(()) => report.written.artists += 1,
        Err(e) => report.record_skipped("artists", &e),
    }
    match store.insert_song(song) {
        Ok(()) => report.written.songs += 1,
        Err(e) => report.record_skipped("songs", &e),
    }
}

fn load_log_records(store: &dyn WarehouseStore, report: &mut FileReport, records: &LogFileRecords) {
    for bucket in &records.time_buckets {
        match store.insert_time_bucket(bucket) {
            Ok(()) => report.written.time += 1,
            Err(e) => report.record_skipped("time", &e),
        }
    }

    // Line order, so the last line of a user decides its level
    for user in &records.users {
        match store.upsert_user(user) {
            Ok(()) => report.written.users += 1,
            Err(e) => report.record_skipped("users", &e),
        }
    }

    for event in &records.play_events {
        let play = match resolve_song_play(store, event) {
            Ok(play) => play,
            Err(e) => {
                report.record_skipped("songplays", &e);
                continue;
            }
        };
        let matched = play.is_matched();
        match store.insert_song_play(&play) {
            Ok(songplay_id) => {
                debug!(
                    "songplay {} for user {} (matched: {})",
                    songplay_id, play.user_id, matched
                );
                report.written.songplays += 1;
                if !matched {
                    report.unmatched_plays += 1;
                }
            }
            Err(e) => report.record_skipped("songplays", &e),
        }
    }
}
