mod models;
mod schema;
mod store;

pub use models::*;
pub use schema::WAREHOUSE_VERSIONED_SCHEMAS;
pub use store::SqliteWarehouseStore;

use thiserror::Error;

/// Errors reported by a [`WarehouseStore`]. None of them is fatal to a batch:
/// callers skip the record (or file) concerned and carry on.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Could not insert {table} record {key}: {source}")]
    Write {
        table: &'static str,
        key: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Could not look up song {title:?} by {artist:?} lasting {duration}s: {source}")]
    Lookup {
        title: String,
        artist: String,
        duration: f64,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Could not {action} file transaction: {source}")]
    Transaction {
        action: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Could not read {table}: {source}")]
    Read {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}

/// Relational store the loader writes to.
///
/// Every insert applies the conflict policy of its table: dimension rows are
/// ignored when their natural key already exists, except users whose `level`
/// is overwritten by the latest insert.
pub trait WarehouseStore {
    /// Starts the transaction covering one input file.
    fn begin_file(&self) -> Result<(), StoreError>;

    /// Commits everything inserted since [`WarehouseStore::begin_file`].
    fn commit_file(&self) -> Result<(), StoreError>;

    /// Discards everything inserted since [`WarehouseStore::begin_file`].
    fn rollback_file(&self) -> Result<(), StoreError>;

    fn insert_artist(&self, artist: &Artist) -> Result<(), StoreError>;

    fn insert_song(&self, song: &Song) -> Result<(), StoreError>;

    /// Inserts the user, or overwrites the `level` of an existing one.
    fn upsert_user(&self, user: &User) -> Result<(), StoreError>;

    fn insert_time_bucket(&self, bucket: &TimeBucket) -> Result<(), StoreError>;

    /// Inserts a fact row and returns its synthetic id.
    fn insert_song_play(&self, play: &SongPlay) -> Result<i64, StoreError>;

    /// Finds the song whose title, performer name and duration all equal the
    /// given values exactly. When several rows match, the first inserted song
    /// wins.
    fn find_song_match(
        &self,
        title: &str,
        artist_name: &str,
        duration: f64,
    ) -> Result<Option<SongMatch>, StoreError>;

    fn counts(&self) -> Result<TableCounts, StoreError>;
}
