use std::fmt;

use crate::error::RemoteCallError;

const TRACK_URI_PREFIX: &str = "spotify:track:";

/// What a fetch or reorder is aimed at: a real playlist, or the user's liked songs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlaylistTarget {
    Playlist(String),
    LikedSongs,
}

impl PlaylistTarget {
    pub fn from_playlist_id(playlist_id: Option<String>) -> Self {
        match playlist_id {
            Some(id) => Self::Playlist(id),
            None => Self::LikedSongs,
        }
    }

    pub fn playlist_id(&self) -> Option<&str> {
        match self {
            Self::Playlist(id) => Some(id),
            Self::LikedSongs => None,
        }
    }

    /// Page size used when listing the target's tracks
    pub fn tracks_page_size(&self) -> u32 {
        match self {
            Self::Playlist(_) => 100,
            Self::LikedSongs => 50,
        }
    }
}

impl fmt::Display for PlaylistTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Playlist(id) => write!(f, "playlist {id}"),
            Self::LikedSongs => write!(f, "liked songs"),
        }
    }
}

/// The `spotify:track:<id>` reference used to add or remove a track.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackUri(String);

impl TrackUri {
    pub fn from_id(id: &str) -> Self {
        Self(format!("{TRACK_URI_PREFIX}{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn id(&self) -> &str {
        self.0.strip_prefix(TRACK_URI_PREFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for TrackUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone)]
pub struct SpotifyPage<T> {
    pub items: Vec<T>,
    pub has_next: bool,
}

/// Decoupled representation of a Spotify playlist from the API.
#[derive(Debug, Clone)]
pub struct SpotifyApiPlaylist {
    pub id: String,
    pub name: String,
    pub total_tracks: i32,
}

/// Decoupled representation of a playlist or library track entry from the API.
#[derive(Debug, Clone, Default)]
pub struct SpotifyApiTrack {
    /// Index of the entry in the remote listing, counting skipped entries
    pub position: u32,
    /// Local files have no id
    pub id: Option<String>,
    pub is_local: bool,
    pub name: String,
    pub album_name: String,
    pub album_release_date: String,
    pub album_artists: Vec<String>,
    pub disc_number: i32,
    pub track_number: i32,
}

/// Port trait wrapping the Spotify API capabilities used by business logic.
///
/// Implementations live in `spotify_rs::client` (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SpotifyClient: Send + Sync {
    async fn current_user_playlists(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<SpotifyPage<SpotifyApiPlaylist>, RemoteCallError>;

    async fn target_tracks(
        &self,
        target: &PlaylistTarget,
        limit: u32,
        offset: u32,
    ) -> Result<SpotifyPage<SpotifyApiTrack>, RemoteCallError>;

    /// Removes every occurrence of the given tracks from the target
    async fn remove_items(
        &self,
        target: &PlaylistTarget,
        items: &[TrackUri],
    ) -> Result<(), RemoteCallError>;

    /// Appends the given tracks to the target, in order
    async fn add_items(
        &self,
        target: &PlaylistTarget,
        items: &[TrackUri],
    ) -> Result<(), RemoteCallError>;
}
