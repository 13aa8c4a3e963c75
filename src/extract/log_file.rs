use super::time_bucket::{derive_time_bucket, start_time_from_millis};
use super::ExtractionError;
use crate::warehouse::{Gender, Level, PlayEvent, TimeBucket, User};
use serde::{Deserialize, Deserializer};
use std::path::Path;

/// Page action of a log line recording a song being played.
pub const NEXT_SONG_PAGE: &str = "NextSong";

/// One line of a user-activity log file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogLine {
    /// Epoch milliseconds.
    ts: i64,
    page: String,
    #[serde(default, deserialize_with = "deserialize_user_id")]
    user_id: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    gender: Option<Gender>,
    level: Level,
    session_id: i64,
    artist: Option<String>,
    song: Option<String>,
    length: Option<f64>,
    location: Option<String>,
    user_agent: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UserIdValue {
    Text(String),
    Number(i64),
}

/// Accepts `"39"`, `39`, `""` or `null`; empty ids become `None`.
fn deserialize_user_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let user_id = match Option::<UserIdValue>::deserialize(deserializer)? {
        Some(UserIdValue::Text(s)) => Some(s),
        Some(UserIdValue::Number(n)) => Some(n.to_string()),
        None => None,
    };
    Ok(user_id.filter(|s| !s.is_empty()))
}

/// Records derived from one log file, each in file line order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LogFileRecords {
    pub time_buckets: Vec<TimeBucket>,
    pub users: Vec<User>,
    pub play_events: Vec<PlayEvent>,
}

/// Reads one log file. Any malformed line fails the whole file.
pub fn extract_log_file(path: &Path) -> Result<LogFileRecords, ExtractionError> {
    let text = std::fs::read_to_string(path).map_err(|e| ExtractionError::read(path, e))?;
    parse_log_records(path, &text)
}

pub fn parse_log_records(path: &Path, text: &str) -> Result<LogFileRecords, ExtractionError> {
    let mut records = LogFileRecords::default();

    for (index, raw_line) in text.lines().enumerate() {
        let line_number = index + 1;
        if raw_line.trim().is_empty() {
            continue;
        }
        let line: LogLine = serde_json::from_str(raw_line)
            .map_err(|e| ExtractionError::from_json(path, line_number, e))?;

        if let Some(user_id) = &line.user_id {
            records.users.push(User {
                user_id: user_id.clone(),
                first_name: line.first_name.clone(),
                last_name: line.last_name.clone(),
                gender: line.gender.unwrap_or(Gender::Unknown),
                level: line.level,
            });
        }

        if line.page != NEXT_SONG_PAGE {
            continue;
        }

        let start_time =
            start_time_from_millis(line.ts).ok_or_else(|| ExtractionError::SchemaMismatch {
                path: path.to_path_buf(),
                line: line_number,
                reason: format!("timestamp {} is out of range", line.ts),
            })?;
        records.time_buckets.push(derive_time_bucket(start_time));

        if let (Some(artist), Some(song), Some(length)) = (line.artist, line.song, line.length) {
            records.play_events.push(PlayEvent {
                start_time,
                user_id: line.user_id.unwrap_or_default(),
                level: line.level,
                song,
                artist,
                length,
                session_id: line.session_id,
                location: line.location,
                user_agent: line.user_agent,
            });
        }
    }

    Ok(records)
}
