use crate::warehouse::{PlayEvent, SongPlay, StoreError, WarehouseStore};

/// Resolves the song and artist keys of a play event.
///
/// The log stream carries no foreign key, so the pair is looked up by exact
/// title, performer name and duration. No match is an ordinary outcome and
/// yields a fact row with null keys; only a failing lookup is an error.
pub fn resolve_song_play(
    store: &dyn WarehouseStore,
    event: &PlayEvent,
) -> Result<SongPlay, StoreError> {
    let song_match = store.find_song_match(&event.song, &event.artist, event.length)?;
    Ok(SongPlay::from_event(event, song_match))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::{Artist, Level, Song, SqliteWarehouseStore};
    use chrono::{TimeZone, Utc};

    fn store_with_song() -> SqliteWarehouseStore {
        let store = SqliteWarehouseStore::open_in_memory().unwrap();
        store
            .insert_artist(&Artist {
                artist_id: "A1".to_string(),
                name: "Nirvana".to_string(),
                location: None,
                latitude: None,
                longitude: None,
            })
            .unwrap();
        store
            .insert_song(&Song {
                song_id: "S1".to_string(),
                title: "X".to_string(),
                artist_id: "A1".to_string(),
                year: 1994,
                duration: 200.0,
            })
            .unwrap();
        store
    }

    fn event(length: f64) -> PlayEvent {
        PlayEvent {
            start_time: Utc.timestamp_millis_opt(1541121934796).unwrap(),
            user_id: "7".to_string(),
            level: Level::Free,
            song: "X".to_string(),
            artist: "Nirvana".to_string(),
            length,
            session_id: 1,
            location: Some("Chicago".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
        }
    }

    #[test]
    fn test_exact_match_resolves_keys() {
        let store = store_with_song();
        let play = resolve_song_play(&store, &event(200.0)).unwrap();
        assert_eq!(play.song_id.as_deref(), Some("S1"));
        assert_eq!(play.artist_id.as_deref(), Some("A1"));
        assert_eq!(play.user_agent.as_deref(), Some("Mozilla/5.0"));
    }

    #[test]
    fn test_near_duration_does_not_match() {
        let store = store_with_song();
        let play = resolve_song_play(&store, &event(200.001)).unwrap();
        assert_eq!(play.song_id, None);
        assert_eq!(play.artist_id, None);
        assert_eq!(play.session_id, 1);
    }
}
