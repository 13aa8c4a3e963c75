//! Dimension and fact records of the song-play star schema.
//!
//! Records are plain typed structs populated field by field by the
//! extractors; nothing here knows about JSON or SQL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Format used for `start_time` columns.
pub const START_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

// =============================================================================
// Enumerations
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(other)]
    Unknown,
}

impl Gender {
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "M" => Gender::Male,
            "F" => Gender::Female,
            _ => Gender::Unknown,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
            Gender::Unknown => "unknown",
        }
    }
}

/// Subscription level of a user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Free,
    Paid,
}

impl Level {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "free" => Some(Level::Free),
            "paid" => Some(Level::Paid),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            Level::Free => "free",
            Level::Paid => "paid",
        }
    }
}

// =============================================================================
// Dimension records
// =============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct Artist {
    pub artist_id: String,
    pub name: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Song {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    /// 0 when unknown.
    pub year: i32,
    /// Seconds.
    pub duration: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Gender,
    pub level: Level,
}

/// Calendar attributes of a play timestamp.
///
/// `year` and `week` follow ISO-8601 week numbering, so `year` can differ
/// from the calendar year of `start_time` in the first and last days of a
/// year. `day` and `month` are the calendar day of month and month.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeBucket {
    pub start_time: DateTime<Utc>,
    pub hour: u32,
    pub day: u32,
    pub week: u32,
    pub month: u32,
    pub year: i32,
    /// Monday = 0 ... Sunday = 6.
    pub weekday: u32,
}

// =============================================================================
// Fact records
// =============================================================================

/// A qualifying "NextSong" log line, before its song/artist keys are resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayEvent {
    pub start_time: DateTime<Utc>,
    pub user_id: String,
    pub level: Level,
    pub song: String,
    pub artist: String,
    pub length: f64,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

/// Song/artist key pair found for a play event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SongMatch {
    pub song_id: String,
    pub artist_id: String,
}

/// Row of the `songplays` fact table. The synthetic id is assigned by the store.
#[derive(Clone, Debug, PartialEq)]
pub struct SongPlay {
    pub start_time: DateTime<Utc>,
    pub user_id: String,
    pub level: Level,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

impl SongPlay {
    pub fn from_event(event: &PlayEvent, song_match: Option<SongMatch>) -> Self {
        let (song_id, artist_id) = match song_match {
            Some(m) => (Some(m.song_id), Some(m.artist_id)),
            None => (None, None),
        };
        SongPlay {
            start_time: event.start_time,
            user_id: event.user_id.clone(),
            level: event.level,
            song_id,
            artist_id,
            session_id: event.session_id,
            location: event.location.clone(),
            user_agent: event.user_agent.clone(),
        }
    }

    pub fn is_matched(&self) -> bool {
        self.song_id.is_some()
    }
}

/// Row counts of every warehouse table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub songplays: usize,
    pub users: usize,
    pub songs: usize,
    pub artists: usize,
    pub time: usize,
}

impl TableCounts {
    pub fn add(&mut self, other: &TableCounts) {
        self.songplays += other.songplays;
        self.users += other.users;
        self.songs += other.songs;
        self.artists += other.artists;
        self.time += other.time;
    }

    pub fn total(&self) -> usize {
        self.songplays + self.users + self.songs + self.artists + self.time
    }
}

pub fn format_start_time(start_time: &DateTime<Utc>) -> String {
    start_time.format(START_TIME_FORMAT).to_string()
}
