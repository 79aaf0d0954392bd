use std::collections::HashSet;
use std::future::Future;

use rspotify::http::HttpError;
use rspotify::model::{FullTrack, PlayableId, PlayableItem, PlaylistId, PlaylistItem, TrackId};
use rspotify::prelude::*;
use rspotify::{AuthCodeSpotify, ClientError, ClientResult, Token};

use crate::error::RemoteCallError;
use crate::ports::spotify::{
    PlaylistTarget, SpotifyApiPlaylist, SpotifyApiTrack, SpotifyClient, SpotifyPage, TrackUri,
};

/// Spotify Web API client bound to one access token
pub struct SpotifyWebClient {
    spotify: AuthCodeSpotify,
}

impl SpotifyWebClient {
    pub fn new(access_token: String, expires_in: u64) -> Self {
        let expires_in = chrono::Duration::try_seconds(expires_in as i64).unwrap_or_default();
        let token = Token {
            access_token,
            expires_in,
            expires_at: Some(chrono::Utc::now() + expires_in),
            refresh_token: None,
            scopes: HashSet::new(),
        };

        Self {
            spotify: AuthCodeSpotify::from_token(token),
        }
    }
}

fn tracks_endpoint(target: &PlaylistTarget) -> String {
    match target {
        PlaylistTarget::Playlist(id) => format!("playlists/{id}/tracks"),
        PlaylistTarget::LikedSongs => "me/tracks".to_string(),
    }
}

fn playlist_id(id: &str) -> Result<PlaylistId<'_>, RemoteCallError> {
    PlaylistId::from_id(id).map_err(|source| RemoteCallError::InvalidId {
        id: id.to_string(),
        source,
    })
}

fn track_ids(items: &[TrackUri]) -> Result<Vec<TrackId<'static>>, RemoteCallError> {
    items
        .iter()
        .map(|uri| {
            TrackId::from_id(uri.id())
                .map(TrackId::into_static)
                .map_err(|source| RemoteCallError::InvalidId {
                    id: uri.id().to_string(),
                    source,
                })
        })
        .collect()
}

/// Await a request, keeping the status and body of rejected calls.
async fn checked<T>(
    endpoint: &str,
    request: impl Future<Output = ClientResult<T>>,
) -> Result<T, RemoteCallError> {
    log::debug!("Spotify request: {}", endpoint);

    match request.await {
        Ok(response) => Ok(response),
        Err(ClientError::Http(http)) => match *http {
            HttpError::StatusCode(response) => Err(RemoteCallError::Status {
                endpoint: endpoint.to_string(),
                status: response.status().as_u16(),
                body: response
                    .text()
                    .await
                    .unwrap_or("Failed to get error text".to_string()),
            }),
            http => Err(RemoteCallError::Client {
                endpoint: endpoint.to_string(),
                source: ClientError::Http(Box::new(http)),
            }),
        },
        Err(source) => Err(RemoteCallError::Client {
            endpoint: endpoint.to_string(),
            source,
        }),
    }
}

/// Number the entries of a page by their place in the remote listing, then
/// convert them. Entries that convert to `None` keep their number reserved.
fn numbered<T>(
    items: Vec<T>,
    offset: u32,
    convert: impl Fn(T) -> Option<SpotifyApiTrack>,
) -> Vec<SpotifyApiTrack> {
    items
        .into_iter()
        .zip(offset..)
        .filter_map(|(item, position)| {
            let mut track = convert(item)?;
            track.position = position;
            Some(track)
        })
        .collect()
}

fn from_full_track(track: FullTrack, is_local: bool) -> SpotifyApiTrack {
    SpotifyApiTrack {
        position: 0,
        id: track.id.map(|id| id.id().to_string()),
        is_local: is_local || track.is_local,
        name: track.name,
        album_name: track.album.name,
        album_release_date: track.album.release_date.unwrap_or_default(),
        album_artists: track
            .album
            .artists
            .into_iter()
            .map(|artist| artist.name)
            .collect(),
        disc_number: track.disc_number,
        track_number: i32::try_from(track.track_number).unwrap_or_default(),
    }
}

/// Returns `None` for unavailable entries and for entries that are not tracks.
fn from_playlist_item(item: PlaylistItem) -> Option<SpotifyApiTrack> {
    match item.track {
        Some(PlayableItem::Track(track)) => Some(from_full_track(track, item.is_local)),
        Some(_) => {
            log::warn!("Skipping non-track playlist entry");
            None
        }
        None => {
            log::warn!("Skipping unavailable track entry");
            None
        }
    }
}

#[async_trait::async_trait]
impl SpotifyClient for SpotifyWebClient {
    async fn current_user_playlists(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<SpotifyPage<SpotifyApiPlaylist>, RemoteCallError> {
        let page = checked(
            "me/playlists",
            self.spotify
                .current_user_playlists_manual(Some(limit), Some(offset)),
        )
        .await?;

        Ok(SpotifyPage {
            has_next: page.next.is_some(),
            items: page
                .items
                .into_iter()
                .map(|playlist| SpotifyApiPlaylist {
                    id: playlist.id.id().to_string(),
                    name: playlist.name,
                    total_tracks: i32::try_from(playlist.tracks.total).unwrap_or(i32::MAX),
                })
                .collect(),
        })
    }

    async fn target_tracks(
        &self,
        target: &PlaylistTarget,
        limit: u32,
        offset: u32,
    ) -> Result<SpotifyPage<SpotifyApiTrack>, RemoteCallError> {
        let endpoint = tracks_endpoint(target);

        match target {
            PlaylistTarget::Playlist(id) => {
                let request = self.spotify.playlist_items_manual(
                    playlist_id(id)?,
                    None,
                    None,
                    Some(limit),
                    Some(offset),
                );
                let page = checked(&endpoint, request).await?;
                Ok(SpotifyPage {
                    has_next: page.next.is_some(),
                    items: numbered(page.items, offset, from_playlist_item),
                })
            }
            PlaylistTarget::LikedSongs => {
                let request =
                    self.spotify
                        .current_user_saved_tracks_manual(None, Some(limit), Some(offset));
                let page = checked(&endpoint, request).await?;
                Ok(SpotifyPage {
                    has_next: page.next.is_some(),
                    items: numbered(page.items, offset, |saved| {
                        Some(from_full_track(saved.track, false))
                    }),
                })
            }
        }
    }

    async fn remove_items(
        &self,
        target: &PlaylistTarget,
        items: &[TrackUri],
    ) -> Result<(), RemoteCallError> {
        let endpoint = tracks_endpoint(target);
        let ids = track_ids(items)?;

        match target {
            PlaylistTarget::Playlist(id) => {
                let request = self.spotify.playlist_remove_all_occurrences_of_items(
                    playlist_id(id)?,
                    ids.into_iter().map(PlayableId::Track),
                    None,
                );
                checked(&endpoint, request).await?;
            }
            PlaylistTarget::LikedSongs => {
                checked(&endpoint, self.spotify.current_user_saved_tracks_delete(ids)).await?;
            }
        }
        Ok(())
    }

    async fn add_items(
        &self,
        target: &PlaylistTarget,
        items: &[TrackUri],
    ) -> Result<(), RemoteCallError> {
        let endpoint = tracks_endpoint(target);
        let ids = track_ids(items)?;

        match target {
            PlaylistTarget::Playlist(id) => {
                let request = self.spotify.playlist_add_items(
                    playlist_id(id)?,
                    ids.into_iter().map(PlayableId::Track),
                    None,
                );
                checked(&endpoint, request).await?;
            }
            PlaylistTarget::LikedSongs => {
                checked(&endpoint, self.spotify.current_user_saved_tracks_add(ids)).await?;
            }
        }
        Ok(())
    }
}
