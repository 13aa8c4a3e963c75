use super::ExtractionError;
use crate::warehouse::{Artist, Song};
use serde::Deserialize;
use std::path::Path;

/// A song-metadata file: one JSON object describing a song and its artist.
/// Unknown fields (e.g. `num_songs`) are ignored.
#[derive(Debug, Deserialize)]
struct SongFileRecord {
    artist_id: String,
    artist_name: String,
    artist_location: Option<String>,
    artist_latitude: Option<f64>,
    artist_longitude: Option<f64>,
    song_id: String,
    title: String,
    year: Option<i32>,
    duration: f64,
}

/// Reads one song-metadata file into its artist and song records.
pub fn extract_song_file(path: &Path) -> Result<(Artist, Song), ExtractionError> {
    let text = std::fs::read_to_string(path).map_err(|e| ExtractionError::read(path, e))?;
    parse_song_record(path, &text)
}

pub fn parse_song_record(path: &Path, text: &str) -> Result<(Artist, Song), ExtractionError> {
    let record: SongFileRecord =
        serde_json::from_str(text).map_err(|e| ExtractionError::from_json(path, 1, e))?;

    let artist = Artist {
        artist_id: record.artist_id.clone(),
        name: record.artist_name,
        location: record.artist_location,
        latitude: record.artist_latitude,
        longitude: record.artist_longitude,
    };
    let song = Song {
        song_id: record.song_id,
        title: record.title,
        artist_id: record.artist_id,
        year: record.year.unwrap_or(0),
        duration: record.duration,
    };
    Ok((artist, song))
}
