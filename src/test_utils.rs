use std::sync::Arc;

use sea_orm::{ConnectOptions, Database as SeaDatabase};

use crate::database::Database;
use crate::entities;
use crate::error::LocalStoreError;

pub async fn test_db() -> Arc<Database> {
    // Every pooled connection to :memory: is a separate database
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);

    let conn = SeaDatabase::connect(opt).await.unwrap();
    let database = Database::from_connection(conn)
        .await
        .unwrap_or_else(|e| panic!("Failed to create mirror schema: {e}"));

    Arc::new(database)
}

pub fn track(id: &str, name: &str, album: &str, release_date: &str) -> entities::track::Model {
    entities::track::Model {
        id: id.into(),
        playlist_id: None,
        name: name.into(),
        album: album.into(),
        artists: "Artist".into(),
        release_date: release_date.into(),
        disc_number: 1,
        track_number: 1,
    }
}

pub async fn replace_playlists(
    db: &Database,
    playlists: &[entities::playlist::Model],
) -> Result<usize, LocalStoreError> {
    let mut replace = db.begin_playlist_replace().await?;
    for playlist in playlists {
        replace.insert(playlist).await?;
    }
    replace.commit().await
}

pub async fn replace_tracks(
    db: &Database,
    tracks: &[entities::track::Model],
) -> Result<usize, LocalStoreError> {
    let mut replace = db.begin_track_replace().await?;
    for track in tracks {
        replace.insert(track).await?;
    }
    replace.commit().await
}
