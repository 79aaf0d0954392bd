use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::database::Database;
use crate::entities;
use crate::error::EngineError;
use crate::ports::spotify::{PlaylistTarget, SpotifyClient};
use crate::services::batch::{BATCH_DELAY, BatchMutator};
use crate::services::fetch;
use crate::services::ordering::{self, TrackOrder};

/// A selectable reorder target as shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaylistEntry {
    LikedSongs,
    Playlist(entities::playlist::Model),
}

impl PlaylistEntry {
    pub fn target(&self) -> PlaylistTarget {
        match self {
            Self::LikedSongs => PlaylistTarget::LikedSongs,
            Self::Playlist(playlist) => PlaylistTarget::Playlist(playlist.id.clone()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::LikedSongs => "Liked songs",
            Self::Playlist(playlist) => &playlist.name,
        }
    }

    pub fn total_tracks(&self) -> Option<i32> {
        match self {
            Self::LikedSongs => None,
            Self::Playlist(playlist) => Some(playlist.total_tracks),
        }
    }
}

impl fmt::Display for PlaylistEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.total_tracks() {
            Some(total) => write!(f, "{} ({} tracks)", self.name(), total),
            None => f.write_str(self.name()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReorderSummary {
    pub removed: usize,
    pub added: usize,
}

/// One run's session: the mirror plus an authenticated remote client.
pub struct PlaylistEngine<C: SpotifyClient> {
    db: Arc<Database>,
    client: C,
    batch_delay: Duration,
}

impl<C: SpotifyClient> PlaylistEngine<C> {
    pub fn new(db: Arc<Database>, client: C) -> Self {
        Self {
            db,
            client,
            batch_delay: BATCH_DELAY,
        }
    }

    pub fn with_batch_delay(mut self, batch_delay: Duration) -> Self {
        self.batch_delay = batch_delay;
        self
    }

    /// Refresh the mirrored playlists. Liked songs always comes first.
    pub async fn list_playlists(&self) -> Result<Vec<PlaylistEntry>, EngineError> {
        let playlists = fetch::fetch_playlists(&self.db, &self.client).await?;

        let mut entries = Vec::with_capacity(playlists.len() + 1);
        entries.push(PlaylistEntry::LikedSongs);
        entries.extend(playlists.into_iter().map(PlaylistEntry::Playlist));
        Ok(entries)
    }

    pub async fn fetch_tracks(
        &self,
        target: &PlaylistTarget,
    ) -> Result<Vec<entities::track::Model>, EngineError> {
        fetch::fetch_tracks(&self.db, &self.client, target).await
    }

    pub fn list_orderings(&self) -> Vec<&'static str> {
        ordering::catalog()
            .into_iter()
            .map(|ordering| ordering.name)
            .collect()
    }

    /// Refetch the target into the mirror, then rewrite it remotely in the named order.
    pub async fn reorder(
        &self,
        target: &PlaylistTarget,
        ordering_name: &str,
    ) -> Result<ReorderSummary, EngineError> {
        let order = ordering::resolve(ordering_name, target)?;
        self.fetch_tracks(target).await?;
        self.apply_order(target, &order).await
    }

    /// Rewrite the target from the mirror as it is, without refetching.
    pub async fn reorder_mirrored(
        &self,
        target: &PlaylistTarget,
        ordering_name: &str,
    ) -> Result<ReorderSummary, EngineError> {
        let order = ordering::resolve(ordering_name, target)?;
        self.apply_order(target, &order).await
    }

    /// The mirrored tracks in the order a reorder would send them.
    pub async fn preview(
        &self,
        target: &PlaylistTarget,
        ordering_name: &str,
    ) -> Result<(TrackOrder, Vec<entities::track::Model>), EngineError> {
        let order = ordering::resolve(ordering_name, target)?;
        let tracks = self.db.tracks(&order).await?;
        Ok((order, tracks))
    }

    async fn apply_order(
        &self,
        target: &PlaylistTarget,
        order: &TrackOrder,
    ) -> Result<ReorderSummary, EngineError> {
        log::info!("Reordering {} by {}", target, order);
        let mutator = BatchMutator::new(&self.db, &self.client).with_delay(self.batch_delay);
        let result = remove_then_save(&mutator, target, order).await;

        if let Err(EngineError::BatchFailed {
            operation,
            applied,
            total,
            ..
        }) = &result
        {
            match self.db.track_ids(&TrackOrder::by_id()).await {
                Ok(mirrored) => log::error!(
                    "Reorder of {} stopped during {} after {} of {} batches; the mirror still holds {} tracks, \
                     run `reorder --skip-fetch` to send them again",
                    target,
                    operation,
                    applied,
                    total,
                    mirrored.len()
                ),
                Err(e) => log::error!(
                    "Reorder of {} stopped during {} after {} of {} batches, and reading the mirror failed: {}",
                    target,
                    operation,
                    applied,
                    total,
                    e
                ),
            }
        }

        let summary = result?;
        log::info!(
            "Reordered {}: removed {} and added {} tracks",
            target,
            summary.removed,
            summary.added
        );
        Ok(summary)
    }
}

async fn remove_then_save<C: SpotifyClient>(
    mutator: &BatchMutator<'_, C>,
    target: &PlaylistTarget,
    order: &TrackOrder,
) -> Result<ReorderSummary, EngineError> {
    let removed = mutator.remove_all(target).await?;
    let added = mutator.save_all(target, order).await?;
    Ok(ReorderSummary { removed, added })
}
