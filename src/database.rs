use std::path::Path;
use std::time::Duration;

use migration::MigratorTrait;
use sea_orm::{
    ActiveValue::Set, ConnectOptions, ConnectionTrait, Database as SeaDatabase,
    DatabaseConnection, DatabaseTransaction, DbBackend, EntityTrait, QuerySelect, Statement,
    TransactionTrait, Value,
};

use crate::entities;
use crate::error::LocalStoreError;
use crate::services::ordering::{TrackOrder, ordered_tracks};

/// The local mirror of playlists and tracks.
pub struct Database {
    pub conn: DatabaseConnection,
}

impl Database {
    /// Open or create the mirror at the given path
    pub async fn open(path: &Path) -> Result<Self, LocalStoreError> {
        log::debug!("Opening database at: {}", path.display());

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| LocalStoreError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        // Create SQLite connection URL
        let url = format!("sqlite://{}?mode=rwc", path.display());

        // A single in-process flow owns the mirror
        let mut opt = ConnectOptions::new(url);
        opt.max_connections(1)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(8))
            .acquire_timeout(Duration::from_secs(8))
            .sqlx_logging(false);

        let conn = SeaDatabase::connect(opt).await?;
        let database = Self::from_connection(conn).await?;

        log::info!("Database ready at: {}", path.display());
        Ok(database)
    }

    /// Wrap an existing connection, creating the mirror tables if needed
    pub async fn from_connection(conn: DatabaseConnection) -> Result<Self, LocalStoreError> {
        let database = Database { conn };
        database.ensure_schema().await?;
        Ok(database)
    }

    /// Create both mirror tables if they are absent. Idempotent.
    pub async fn ensure_schema(&self) -> Result<(), LocalStoreError> {
        log::debug!("Running database migrations");
        migration::Migrator::up(&self.conn, None).await?;
        Ok(())
    }

    /// Start replacing the playlist table. Nothing is visible until `commit`.
    pub async fn begin_playlist_replace(&self) -> Result<PlaylistReplace, LocalStoreError> {
        let txn = self.conn.begin().await?;
        execute(&txn, "DELETE FROM playlist", Vec::new()).await?;
        Ok(PlaylistReplace { txn, inserted: 0 })
    }

    /// Start replacing the track table. Nothing is visible until `commit`.
    pub async fn begin_track_replace(&self) -> Result<TrackReplace, LocalStoreError> {
        let txn = self.conn.begin().await?;
        execute(&txn, "DELETE FROM track", Vec::new()).await?;
        Ok(TrackReplace { txn, inserted: 0 })
    }

    /// Ids of all mirrored tracks in the given order
    pub async fn track_ids(&self, order: &TrackOrder) -> Result<Vec<String>, LocalStoreError> {
        Ok(ordered_tracks(order)
            .select_only()
            .column(entities::track::Column::Id)
            .into_tuple::<String>()
            .all(&self.conn)
            .await?)
    }

    /// All mirrored tracks in the given order
    pub async fn tracks(
        &self,
        order: &TrackOrder,
    ) -> Result<Vec<entities::track::Model>, LocalStoreError> {
        Ok(ordered_tracks(order).all(&self.conn).await?)
    }
}

/// Run a parameterized write statement on a connection or an open transaction,
/// returning the affected row count.
pub async fn execute<C: ConnectionTrait>(
    conn: &C,
    sql: &str,
    values: Vec<Value>,
) -> Result<u64, LocalStoreError> {
    let statement = Statement::from_sql_and_values(DbBackend::Sqlite, sql, values);
    let result = conn.execute_raw(statement).await?;
    Ok(result.rows_affected())
}

/// An in-progress replacement of the playlist table
pub struct PlaylistReplace {
    txn: DatabaseTransaction,
    inserted: usize,
}

impl PlaylistReplace {
    pub async fn insert(
        &mut self,
        playlist: &entities::playlist::Model,
    ) -> Result<(), LocalStoreError> {
        let model = entities::playlist::ActiveModel {
            id: Set(playlist.id.clone()),
            name: Set(playlist.name.clone()),
            total_tracks: Set(playlist.total_tracks),
        };
        entities::playlist::Entity::insert(model)
            .exec_without_returning(&self.txn)
            .await?;
        self.inserted += 1;
        Ok(())
    }

    /// Make the new rows visible, returning how many were stored
    pub async fn commit(self) -> Result<usize, LocalStoreError> {
        self.txn.commit().await?;
        log::debug!("Mirrored {} playlists", self.inserted);
        Ok(self.inserted)
    }
}

/// An in-progress replacement of the track table
pub struct TrackReplace {
    txn: DatabaseTransaction,
    inserted: usize,
}

impl TrackReplace {
    /// Store a track. Ids are unique, a repeated id fails the insert.
    pub async fn insert(&mut self, track: &entities::track::Model) -> Result<(), LocalStoreError> {
        let model = entities::track::ActiveModel {
            id: Set(track.id.clone()),
            playlist_id: Set(track.playlist_id.clone()),
            name: Set(track.name.clone()),
            album: Set(track.album.clone()),
            artists: Set(track.artists.clone()),
            release_date: Set(track.release_date.clone()),
            disc_number: Set(track.disc_number),
            track_number: Set(track.track_number),
        };
        entities::track::Entity::insert(model)
            .exec_without_returning(&self.txn)
            .await?;
        self.inserted += 1;
        Ok(())
    }

    /// Make the new rows visible, returning how many were stored
    pub async fn commit(self) -> Result<usize, LocalStoreError> {
        self.txn.commit().await?;
        log::debug!("Mirrored {} tracks", self.inserted);
        Ok(self.inserted)
    }
}
