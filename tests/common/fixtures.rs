use super::constants::*;
use rusqlite::Connection;
use serde_json::json;
use sparkify_etl::SqliteWarehouseStore;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary song/log directories plus a warehouse database file.
pub struct TestWarehouse {
    _dir: TempDir,
    pub db_path: PathBuf,
    pub song_data: PathBuf,
    pub log_data: PathBuf,
}

impl TestWarehouse {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let song_data = dir.path().join("song_data");
        let log_data = dir.path().join("log_data");
        fs::create_dir_all(&song_data).unwrap();
        fs::create_dir_all(&log_data).unwrap();
        TestWarehouse {
            db_path: dir.path().join("sparkify.db"),
            song_data,
            log_data,
            _dir: dir,
        }
    }

    pub fn open_store(&self) -> SqliteWarehouseStore {
        SqliteWarehouseStore::new(&self.db_path).unwrap()
    }

    /// Read-only side connection for asserting on committed rows.
    pub fn connection(&self) -> Connection {
        Connection::open(&self.db_path).unwrap()
    }

    pub fn write_song_file(&self, relative: &str, content: &str) -> PathBuf {
        write_file(&self.song_data, relative, content)
    }

    pub fn write_log_file(&self, relative: &str, lines: &[String]) -> PathBuf {
        write_file(&self.log_data, relative, &lines.join("\n"))
    }

    /// Writes the two catalog songs in the nested layout of the real dataset.
    pub fn write_catalog(&self) {
        self.write_song_file(
            "A/A/A/TRAAAAA128F1.json",
            &song_json(SONG_1_ID, SONG_1_TITLE, ARTIST_1_ID, ARTIST_1_NAME, SONG_1_DURATION),
        );
        self.write_song_file(
            "A/B/C/TRABCEI128F4.json",
            &song_json(SONG_2_ID, SONG_2_TITLE, ARTIST_2_ID, ARTIST_2_NAME, SONG_2_DURATION),
        );
    }
}

fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

pub fn song_json(
    song_id: &str,
    title: &str,
    artist_id: &str,
    artist_name: &str,
    duration: f64,
) -> String {
    json!({
        "num_songs": 1,
        "artist_id": artist_id,
        "artist_latitude": null,
        "artist_longitude": null,
        "artist_location": "",
        "artist_name": artist_name,
        "song_id": song_id,
        "title": title,
        "duration": duration,
        "year": 1994
    })
    .to_string()
}

/// Builder for one event of a log file. Defaults to a "NextSong" play of
/// song 1 by user 7 on the free level.
pub struct LogLine {
    pub page: &'static str,
    pub user_id: &'static str,
    pub level: &'static str,
    pub song: Option<&'static str>,
    pub artist: Option<&'static str>,
    pub length: Option<f64>,
    pub ts: i64,
}

impl LogLine {
    pub fn to_json(&self) -> String {
        json!({
            "artist": self.artist,
            "auth": "Logged In",
            "firstName": "Ann",
            "gender": "F",
            "itemInSession": 0,
            "lastName": "Lee",
            "length": self.length,
            "level": self.level,
            "location": "Chicago-Naperville-Elgin, IL-IN-WI",
            "method": "PUT",
            "page": self.page,
            "registration": 1540919166796.0,
            "sessionId": 139,
            "song": self.song,
            "status": 200,
            "ts": self.ts,
            "userAgent": "Mozilla/5.0 (Windows NT 6.1; WOW64)",
            "userId": self.user_id
        })
        .to_string()
    }
}

impl Default for LogLine {
    fn default() -> Self {
        LogLine {
            page: "NextSong",
            user_id: USER_ID,
            level: "free",
            song: Some(SONG_1_TITLE),
            artist: Some(ARTIST_1_NAME),
            length: Some(SONG_1_DURATION),
            ts: TS_1,
        }
    }
}

pub fn log_line(line: LogLine) -> String {
    line.to_json()
}
