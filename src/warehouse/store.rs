//! SQLite-backed warehouse store.

use super::models::*;
use super::schema::WAREHOUSE_VERSIONED_SCHEMAS;
use super::{StoreError, WarehouseStore};
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

/// Store over a single SQLite connection.
///
/// The batch is single threaded, so the connection is owned directly and
/// every call runs to completion before the next one starts.
pub struct SqliteWarehouseStore {
    conn: Connection,
}

impl SqliteWarehouseStore {
    /// Opens (creating if needed) the warehouse database at `db_path`.
    ///
    /// A database without tables gets the latest schema; an existing one is
    /// validated against the schema version recorded in it.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Self::open(db_path, false)
    }

    /// Like [`SqliteWarehouseStore::new`], but with `reset` every declared
    /// table is dropped and recreated first, whatever version the file is at.
    pub fn open<P: AsRef<Path>>(db_path: P, reset: bool) -> Result<Self> {
        let path = db_path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open warehouse database {:?}", path))?;
        info!("Opened warehouse database at {:?}", path);
        Self::from_connection(conn, reset)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn, false)
    }

    fn from_connection(conn: Connection, reset: bool) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON;", [])?;

        if reset {
            let store = SqliteWarehouseStore { conn };
            store.reset()?;
            return Ok(store);
        }

        let table_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            [],
            |r| r.get(0),
        )?;

        let latest_schema = WAREHOUSE_VERSIONED_SCHEMAS
            .last()
            .context("No warehouse schema declared")?;

        if table_count == 0 {
            info!(
                "Creating warehouse schema at version {}",
                latest_schema.version
            );
            latest_schema.create(&conn)?;
        } else {
            let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |r| r.get(0))?;
            let db_version = raw_version - BASE_DB_VERSION as i64;
            let schema = WAREHOUSE_VERSIONED_SCHEMAS
                .iter()
                .find(|s| s.version as i64 == db_version);
            let Some(schema) = schema else {
                bail!(
                    "Warehouse database version {} is unknown (latest is {}), use --reset to recreate it",
                    db_version,
                    latest_schema.version
                );
            };
            schema.validate(&conn).with_context(|| {
                format!(
                    "Warehouse schema validation failed for version {}",
                    db_version
                )
            })?;
        }

        Ok(SqliteWarehouseStore { conn })
    }

    /// Drops every warehouse table and recreates the latest schema.
    pub fn reset(&self) -> Result<()> {
        let latest_schema = WAREHOUSE_VERSIONED_SCHEMAS
            .last()
            .context("No warehouse schema declared")?;
        info!("Dropping and recreating warehouse tables");
        latest_schema.drop(&self.conn)?;
        latest_schema.create(&self.conn)?;
        Ok(())
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT user_id, first_name, last_name, gender, level FROM users WHERE user_id = ?1",
                params![user_id],
                |row| {
                    let gender: String = row.get(3)?;
                    let level: String = row.get(4)?;
                    Ok(User {
                        user_id: row.get(0)?,
                        first_name: row.get(1)?,
                        last_name: row.get(2)?,
                        gender: Gender::from_db_str(&gender),
                        level: parse_level(4, &level)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    /// Returns every fact row in insertion order, paired with its id.
    pub fn get_song_plays(&self) -> Result<Vec<(i64, SongPlay)>> {
        let mut stmt = self.conn.prepare(
            "SELECT songplay_id, start_time, user_id, level, song_id, artist_id, session_id, location, user_agent
             FROM songplays ORDER BY songplay_id ASC",
        )?;
        let plays: Vec<(i64, SongPlay)> = stmt
            .query_map([], |row| {
                let start_time: String = row.get(1)?;
                let level: String = row.get(3)?;
                Ok((
                    row.get(0)?,
                    SongPlay {
                        start_time: parse_start_time(1, &start_time)?,
                        user_id: row.get(2)?,
                        level: parse_level(3, &level)?,
                        song_id: row.get(4)?,
                        artist_id: row.get(5)?,
                        session_id: row.get(6)?,
                        location: row.get(7)?,
                        user_agent: row.get(8)?,
                    },
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(plays)
    }

    fn count_rows(&self, table: &'static str) -> Result<usize, StoreError> {
        self.conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
                r.get::<_, i64>(0)
            })
            .map(|count| count as usize)
            .map_err(|source| StoreError::Read { table, source })
    }
}

fn parse_level(column: usize, s: &str) -> rusqlite::Result<Level> {
    Level::from_db_str(s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            Type::Text,
            format!("unknown level {:?}", s).into(),
        )
    })
}

fn parse_start_time(column: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, START_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

impl WarehouseStore for SqliteWarehouseStore {
    fn begin_file(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch("BEGIN")
            .map_err(|source| StoreError::Transaction {
                action: "begin",
                source,
            })
    }

    fn commit_file(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|source| StoreError::Transaction {
                action: "commit",
                source,
            })
    }

    fn rollback_file(&self) -> Result<(), StoreError> {
        if self.conn.is_autocommit() {
            return Ok(());
        }
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|source| StoreError::Transaction {
                action: "roll back",
                source,
            })
    }

    fn insert_artist(&self, artist: &Artist) -> Result<(), StoreError> {
        self.conn
            .prepare_cached(
                "INSERT INTO artists (artist_id, name, location, latitude, longitude)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(artist_id) DO NOTHING",
            )
            .and_then(|mut stmt| {
                stmt.execute(params![
                    artist.artist_id,
                    artist.name,
                    artist.location,
                    artist.latitude,
                    artist.longitude
                ])
            })
            .map(|_| ())
            .map_err(|source| StoreError::Write {
                table: "artists",
                key: artist.artist_id.clone(),
                source,
            })
    }

    fn insert_song(&self, song: &Song) -> Result<(), StoreError> {
        self.conn
            .prepare_cached(
                "INSERT INTO songs (song_id, title, artist_id, year, duration)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(song_id) DO NOTHING",
            )
            .and_then(|mut stmt| {
                stmt.execute(params![
                    song.song_id,
                    song.title,
                    song.artist_id,
                    song.year,
                    song.duration
                ])
            })
            .map(|_| ())
            .map_err(|source| StoreError::Write {
                table: "songs",
                key: song.song_id.clone(),
                source,
            })
    }

    fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        self.conn
            .prepare_cached(
                "INSERT INTO users (user_id, first_name, last_name, gender, level)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id) DO UPDATE SET level = excluded.level",
            )
            .and_then(|mut stmt| {
                stmt.execute(params![
                    user.user_id,
                    user.first_name,
                    user.last_name,
                    user.gender.to_db_str(),
                    user.level.to_db_str()
                ])
            })
            .map(|_| ())
            .map_err(|source| StoreError::Write {
                table: "users",
                key: user.user_id.clone(),
                source,
            })
    }

    fn insert_time_bucket(&self, bucket: &TimeBucket) -> Result<(), StoreError> {
        let start_time = format_start_time(&bucket.start_time);
        self.conn
            .prepare_cached(
                "INSERT INTO time (start_time, hour, day, week, month, year, weekday)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(start_time) DO NOTHING",
            )
            .and_then(|mut stmt| {
                stmt.execute(params![
                    start_time,
                    bucket.hour,
                    bucket.day,
                    bucket.week,
                    bucket.month,
                    bucket.year,
                    bucket.weekday
                ])
            })
            .map(|_| ())
            .map_err(|source| StoreError::Write {
                table: "time",
                key: start_time.clone(),
                source,
            })
    }

    fn insert_song_play(&self, play: &SongPlay) -> Result<i64, StoreError> {
        let start_time = format_start_time(&play.start_time);
        self.conn
            .prepare_cached(
                "INSERT INTO songplays (start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .and_then(|mut stmt| {
                stmt.execute(params![
                    start_time,
                    play.user_id,
                    play.level.to_db_str(),
                    play.song_id,
                    play.artist_id,
                    play.session_id,
                    play.location,
                    play.user_agent
                ])
            })
            .map(|_| self.conn.last_insert_rowid())
            .map_err(|source| StoreError::Write {
                table: "songplays",
                key: format!("{}@{}", play.user_id, start_time),
                source,
            })
    }

    fn find_song_match(
        &self,
        title: &str,
        artist_name: &str,
        duration: f64,
    ) -> Result<Option<SongMatch>, StoreError> {
        let song_match = self
            .conn
            .prepare_cached(
                "SELECT songs.song_id, songs.artist_id
                 FROM songs JOIN artists ON songs.artist_id = artists.artist_id
                 WHERE songs.title = ?1 AND artists.name = ?2 AND songs.duration = ?3
                 ORDER BY songs.rowid ASC
                 LIMIT 1",
            )
            .and_then(|mut stmt| {
                stmt.query_row(params![title, artist_name, duration], |row| {
                    Ok(SongMatch {
                        song_id: row.get(0)?,
                        artist_id: row.get(1)?,
                    })
                })
                .optional()
            })
            .map_err(|source| StoreError::Lookup {
                title: title.to_string(),
                artist: artist_name.to_string(),
                duration,
                source,
            })?;

        if song_match.is_none() {
            debug!(
                "No song matches {:?} by {:?} lasting {}s",
                title, artist_name, duration
            );
        }
        Ok(song_match)
    }

    fn counts(&self) -> Result<TableCounts, StoreError> {
        Ok(TableCounts {
            songplays: self.count_rows("songplays")?,
            users: self.count_rows("users")?,
            songs: self.count_rows("songs")?,
            artists: self.count_rows("artists")?,
            time: self.count_rows("time")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn nirvana() -> Artist {
        Artist {
            artist_id: "A1".to_string(),
            name: "Nirvana".to_string(),
            location: Some("Aberdeen, WA".to_string()),
            latitude: None,
            longitude: None,
        }
    }

    fn song(song_id: &str, title: &str, duration: f64) -> Song {
        Song {
            song_id: song_id.to_string(),
            title: title.to_string(),
            artist_id: "A1".to_string(),
            year: 1994,
            duration,
        }
    }

    fn user(level: Level) -> User {
        User {
            user_id: "7".to_string(),
            first_name: Some("Adelyn".to_string()),
            last_name: Some("Jordan".to_string()),
            gender: Gender::Female,
            level,
        }
    }

    fn play(song_match: Option<SongMatch>) -> SongPlay {
        let (song_id, artist_id) = match song_match {
            Some(m) => (Some(m.song_id), Some(m.artist_id)),
            None => (None, None),
        };
        SongPlay {
            start_time: Utc.timestamp_millis_opt(1541121934796).unwrap(),
            user_id: "7".to_string(),
            level: Level::Free,
            song_id,
            artist_id,
            session_id: 52,
            location: Some("Chicago".to_string()),
            user_agent: None,
        }
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = SqliteWarehouseStore::open_in_memory().unwrap();
        assert_eq!(store.counts().unwrap(), TableCounts::default());
    }

    #[test]
    fn test_dimension_conflicts_are_ignored() {
        let store = SqliteWarehouseStore::open_in_memory().unwrap();
        store.insert_artist(&nirvana()).unwrap();
        store.insert_artist(&nirvana()).unwrap();
        store.insert_song(&song("S1", "X", 200.0)).unwrap();
        store.insert_song(&song("S1", "Renamed", 10.0)).unwrap();

        let counts = store.counts().unwrap();
        assert_eq!(counts.artists, 1);
        assert_eq!(counts.songs, 1);
        assert_eq!(
            store.find_song_match("X", "Nirvana", 200.0).unwrap(),
            Some(SongMatch {
                song_id: "S1".to_string(),
                artist_id: "A1".to_string()
            })
        );
    }

    #[test]
    fn test_user_level_latest_write_wins() {
        let store = SqliteWarehouseStore::open_in_memory().unwrap();
        store.upsert_user(&user(Level::Free)).unwrap();
        store.upsert_user(&user(Level::Paid)).unwrap();

        let stored = store.get_user("7").unwrap().unwrap();
        assert_eq!(stored.level, Level::Paid);
        assert_eq!(stored.first_name.as_deref(), Some("Adelyn"));
        assert_eq!(store.counts().unwrap().users, 1);
    }

    #[test]
    fn test_find_song_match_requires_exact_duration() {
        let store = SqliteWarehouseStore::open_in_memory().unwrap();
        store.insert_artist(&nirvana()).unwrap();
        store.insert_song(&song("S1", "X", 200.0)).unwrap();

        assert!(store.find_song_match("X", "Nirvana", 200.001).unwrap().is_none());
        assert!(store.find_song_match("X", "Nevermind", 200.0).unwrap().is_none());
        assert!(store.find_song_match("Y", "Nirvana", 200.0).unwrap().is_none());
    }

    #[test]
    fn test_find_song_match_prefers_first_inserted() {
        let store = SqliteWarehouseStore::open_in_memory().unwrap();
        store.insert_artist(&nirvana()).unwrap();
        store.insert_song(&song("S9", "X", 200.0)).unwrap();
        store.insert_song(&song("S1", "X", 200.0)).unwrap();

        let found = store.find_song_match("X", "Nirvana", 200.0).unwrap().unwrap();
        assert_eq!(found.song_id, "S9");
    }

    #[test]
    fn test_time_bucket_conflict_is_ignored() {
        let store = SqliteWarehouseStore::open_in_memory().unwrap();
        let bucket = crate::extract::derive_time_bucket(
            Utc.timestamp_millis_opt(1541121934796).unwrap(),
        );
        store.insert_time_bucket(&bucket).unwrap();
        store.insert_time_bucket(&bucket).unwrap();
        assert_eq!(store.counts().unwrap().time, 1);
    }

    #[test]
    fn test_song_play_round_trip_with_null_keys() {
        let store = SqliteWarehouseStore::open_in_memory().unwrap();
        let first = store.insert_song_play(&play(None)).unwrap();
        let second = store.insert_song_play(&play(None)).unwrap();
        assert_eq!(second, first + 1);

        let plays = store.get_song_plays().unwrap();
        assert_eq!(plays.len(), 2);
        assert_eq!(plays[0].1, play(None));
    }

    #[test]
    fn test_rollback_discards_file_inserts() {
        let store = SqliteWarehouseStore::open_in_memory().unwrap();
        store.begin_file().unwrap();
        store.insert_artist(&nirvana()).unwrap();
        store.rollback_file().unwrap();
        assert_eq!(store.counts().unwrap().artists, 0);

        store.begin_file().unwrap();
        store.insert_artist(&nirvana()).unwrap();
        store.commit_file().unwrap();
        assert_eq!(store.counts().unwrap().artists, 1);

        // Nothing open, nothing to roll back
        store.rollback_file().unwrap();
    }

    #[test]
    fn test_failed_insert_keeps_transaction_usable() {
        let store = SqliteWarehouseStore::open_in_memory().unwrap();
        store.begin_file().unwrap();
        let err = store.insert_song(&song("S1", "X", 200.0)).unwrap_err();
        assert!(matches!(err, StoreError::Write { table: "songs", .. }));

        store.insert_artist(&nirvana()).unwrap();
        store.commit_file().unwrap();
        assert_eq!(store.counts().unwrap().artists, 1);
        assert_eq!(store.counts().unwrap().songs, 0);
    }

    #[test]
    fn test_reopen_validates_existing_schema() {
        let dir = tempfile::TempDir::new().unwrap();
        let db_path = dir.path().join("warehouse.db");
        {
            let store = SqliteWarehouseStore::new(&db_path).unwrap();
            store.insert_artist(&nirvana()).unwrap();
        }
        let store = SqliteWarehouseStore::new(&db_path).unwrap();
        assert_eq!(store.counts().unwrap().artists, 1);
    }

    #[test]
    fn test_reopen_rejects_foreign_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let db_path = dir.path().join("other.db");
        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute("CREATE TABLE unrelated (id INTEGER)", []).unwrap();
        }
        let err = SqliteWarehouseStore::new(&db_path).err().unwrap().to_string();
        assert!(err.contains("unknown"));
    }

    #[test]
    fn test_open_with_reset_recovers_foreign_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let db_path = dir.path().join("other.db");
        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute("CREATE TABLE artists (id INTEGER)", []).unwrap();
        }
        let store = SqliteWarehouseStore::open(&db_path, true).unwrap();
        store.insert_artist(&nirvana()).unwrap();
        drop(store);

        let store = SqliteWarehouseStore::new(&db_path).unwrap();
        assert_eq!(store.counts().unwrap().artists, 1);
    }

    #[test]
    fn test_reset_empties_tables() {
        let store = SqliteWarehouseStore::open_in_memory().unwrap();
        store.insert_artist(&nirvana()).unwrap();
        store.insert_song(&song("S1", "X", 200.0)).unwrap();
        store.reset().unwrap();
        assert_eq!(store.counts().unwrap(), TableCounts::default());
    }
}
