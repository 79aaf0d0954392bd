use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::database::Database;
use crate::entities;
use crate::error::{DataNormalizationError, EngineError};
use crate::ports::spotify::{PlaylistTarget, SpotifyApiTrack, SpotifyClient};

pub const PLAYLISTS_PAGE_SIZE: u32 = 50;

static BARE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}$").unwrap());

/// Spotify gives year-precision albums a bare `YYYY` release date.
pub fn normalize_release_date(release_date: &str) -> String {
    if BARE_YEAR.is_match(release_date) {
        format!("{release_date}-01-01")
    } else {
        release_date.to_string()
    }
}

/// Turn a remote entry into a mirror row. Local files yield `None`.
fn normalize_track(
    track: SpotifyApiTrack,
    target: &PlaylistTarget,
) -> Result<Option<entities::track::Model>, DataNormalizationError> {
    if track.is_local {
        log::debug!(
            "Skipping local track at position {}: {}",
            track.position,
            track.name
        );
        return Ok(None);
    }
    let id = track.id.ok_or(DataNormalizationError::MissingTrackId {
        position: track.position,
    })?;

    Ok(Some(entities::track::Model {
        id,
        playlist_id: target.playlist_id().map(str::to_string),
        name: track.name,
        album: track.album_name,
        artists: track.album_artists.join(", "),
        release_date: normalize_release_date(&track.album_release_date),
        disc_number: track.disc_number,
        track_number: track.track_number,
    }))
}

/// Replace the mirrored playlists with every playlist of the current user.
pub async fn fetch_playlists<C: SpotifyClient>(
    db: &Database,
    client: &C,
) -> Result<Vec<entities::playlist::Model>, EngineError> {
    let mut replace = db.begin_playlist_replace().await?;
    let mut playlists = Vec::new();
    let mut offset = 0;

    loop {
        log::debug!("Fetching playlists at offset {}", offset);
        let page = client
            .current_user_playlists(PLAYLISTS_PAGE_SIZE, offset)
            .await?;

        for playlist in page.items {
            let playlist = entities::playlist::Model {
                id: playlist.id,
                name: playlist.name,
                total_tracks: playlist.total_tracks,
            };
            replace.insert(&playlist).await?;
            playlists.push(playlist);
        }

        if !page.has_next {
            break;
        }
        offset += PLAYLISTS_PAGE_SIZE;
    }

    replace.commit().await?;
    log::info!("Fetched {} playlists", playlists.len());
    Ok(playlists)
}

/// Replace the mirrored tracks with the tracks of `target`, local files excluded.
///
/// A track listed twice fails the fetch: the reorder removes every occurrence
/// of an id and could only add one back.
pub async fn fetch_tracks<C: SpotifyClient>(
    db: &Database,
    client: &C,
    target: &PlaylistTarget,
) -> Result<Vec<entities::track::Model>, EngineError> {
    let page_size = target.tracks_page_size();
    let mut replace = db.begin_track_replace().await?;
    let mut tracks = Vec::new();
    let mut seen = HashSet::new();
    let mut offset = 0;

    loop {
        log::debug!("Fetching tracks of {} at offset {}", target, offset);
        let page = client.target_tracks(target, page_size, offset).await?;

        for item in page.items {
            let position = item.position;
            let Some(track) = normalize_track(item, target)? else {
                continue;
            };
            if !seen.insert(track.id.clone()) {
                return Err(DataNormalizationError::DuplicateTrack {
                    id: track.id,
                    position,
                }
                .into());
            }
            replace.insert(&track).await?;
            tracks.push(track);
        }

        if !page.has_next {
            break;
        }
        offset += page_size;
    }

    replace.commit().await?;
    log::info!("Fetched {} tracks of {}", tracks.len(), target);
    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteCallError;
    use crate::ports::spotify::{MockSpotifyClient, SpotifyApiPlaylist, SpotifyPage};
    use crate::services::ordering::TrackOrder;
    use crate::test_utils::{replace_tracks, test_db, track};
    use sea_orm::EntityTrait;

    fn api_track(id: &str, release_date: &str) -> SpotifyApiTrack {
        SpotifyApiTrack {
            position: 0,
            id: Some(id.into()),
            is_local: false,
            name: format!("Track {id}"),
            album_name: "Album".into(),
            album_release_date: release_date.into(),
            album_artists: vec!["First".into(), "Second".into()],
            disc_number: 1,
            track_number: 7,
        }
    }

    fn local_track(name: &str) -> SpotifyApiTrack {
        SpotifyApiTrack {
            id: None,
            is_local: true,
            name: name.into(),
            ..Default::default()
        }
    }

    fn api_playlist(id: &str) -> SpotifyApiPlaylist {
        SpotifyApiPlaylist {
            id: id.into(),
            name: format!("Playlist {id}"),
            total_tracks: 10,
        }
    }

    fn status_error() -> RemoteCallError {
        RemoteCallError::Status {
            endpoint: "me/tracks".into(),
            status: 401,
            body: "The access token expired".into(),
        }
    }

    #[test]
    fn test_normalize_release_date() {
        assert_eq!(normalize_release_date("1998"), "1998-01-01");
        assert_eq!(normalize_release_date("1998-03-05"), "1998-03-05");
        assert_eq!(normalize_release_date("1998-03"), "1998-03");
        assert_eq!(normalize_release_date("98"), "98");
        assert_eq!(normalize_release_date("19981"), "19981");
        assert_eq!(normalize_release_date(" 1998"), " 1998");
        assert_eq!(normalize_release_date(""), "");
    }

    #[test]
    fn test_normalize_track_fields() {
        let target = PlaylistTarget::Playlist("p1".into());
        let track = normalize_track(api_track("t1", "2004"), &target)
            .unwrap()
            .unwrap();

        assert_eq!(track.id, "t1");
        assert_eq!(track.playlist_id.as_deref(), Some("p1"));
        assert_eq!(track.artists, "First, Second");
        assert_eq!(track.release_date, "2004-01-01");
        assert_eq!(track.track_number, 7);

        let liked = normalize_track(api_track("t1", "2004"), &PlaylistTarget::LikedSongs)
            .unwrap()
            .unwrap();
        assert!(liked.playlist_id.is_none());
    }

    #[test]
    fn test_normalize_track_without_id() {
        let mut track = api_track("t1", "2004");
        track.id = None;
        track.position = 12;
        let result = normalize_track(track, &PlaylistTarget::LikedSongs);
        assert!(matches!(
            result,
            Err(DataNormalizationError::MissingTrackId { position: 12 })
        ));
    }

    #[tokio::test]
    async fn test_fetch_playlists_follows_pages() {
        let db = test_db().await;
        let mut client = MockSpotifyClient::new();
        client
            .expect_current_user_playlists()
            .times(2)
            .returning(|limit, offset| {
                assert_eq!(limit, 50);
                match offset {
                    0 => Ok(SpotifyPage {
                        items: (0..50).map(|i| api_playlist(&format!("p{i}"))).collect(),
                        has_next: true,
                    }),
                    50 => Ok(SpotifyPage {
                        items: vec![api_playlist("last")],
                        has_next: false,
                    }),
                    other => panic!("unexpected offset {other}"),
                }
            });

        let playlists = fetch_playlists(&db, &client).await.unwrap();

        assert_eq!(playlists.len(), 51);
        assert_eq!(playlists[50].id, "last");
        let stored = entities::playlist::Entity::find().all(&db.conn).await.unwrap();
        assert_eq!(stored.len(), 51);
    }

    #[tokio::test]
    async fn test_fetch_tracks_page_size_per_target() {
        for (target, page_size) in [
            (PlaylistTarget::Playlist("p1".into()), 100),
            (PlaylistTarget::LikedSongs, 50),
        ] {
            let db = test_db().await;
            let mut client = MockSpotifyClient::new();
            let expected = target.clone();
            client
                .expect_target_tracks()
                .times(3)
                .returning(move |target, limit, offset| {
                    assert_eq!(target, &expected);
                    assert_eq!(limit, page_size);
                    assert_eq!(offset % page_size, 0);
                    let page = offset / page_size;
                    Ok(SpotifyPage {
                        items: vec![api_track(&format!("t{page}"), "2000")],
                        has_next: page < 2,
                    })
                });

            let tracks = fetch_tracks(&db, &client, &target).await.unwrap();
            let ids: Vec<_> = tracks.iter().map(|track| track.id.as_str()).collect();
            assert_eq!(ids, vec!["t0", "t1", "t2"]);
        }
    }

    #[tokio::test]
    async fn test_fetch_tracks_excludes_local_files() {
        let db = test_db().await;
        let mut client = MockSpotifyClient::new();
        client.expect_target_tracks().returning(|_, _, _| {
            Ok(SpotifyPage {
                items: vec![
                    api_track("t1", "1998"),
                    local_track("home recording.mp3"),
                    api_track("t2", "1998-03-05"),
                ],
                has_next: false,
            })
        });

        let tracks = fetch_tracks(&db, &client, &PlaylistTarget::LikedSongs)
            .await
            .unwrap();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].release_date, "1998-01-01");
        assert_eq!(tracks[1].release_date, "1998-03-05");
        let mirrored = db.track_ids(&TrackOrder::by_id()).await.unwrap();
        assert_eq!(mirrored, vec!["t1", "t2"]);
    }

    #[tokio::test]
    async fn test_fetch_tracks_failure_keeps_previous_mirror() {
        let db = test_db().await;
        replace_tracks(&db, &[track("old", "Old", "A", "1990-01-01")])
            .await
            .unwrap();

        let mut client = MockSpotifyClient::new();
        client
            .expect_target_tracks()
            .returning(|_, _, offset| match offset {
                0 => Ok(SpotifyPage {
                    items: vec![api_track("new", "2020")],
                    has_next: true,
                }),
                _ => Err(status_error()),
            });

        let result = fetch_tracks(&db, &client, &PlaylistTarget::LikedSongs).await;

        assert!(matches!(
            result,
            Err(EngineError::RemoteCall(RemoteCallError::Status { status: 401, .. }))
        ));
        let mirrored = db.track_ids(&TrackOrder::by_id()).await.unwrap();
        assert_eq!(mirrored, vec!["old"]);
    }

    #[tokio::test]
    async fn test_fetch_tracks_replaces_previous_target() {
        let db = test_db().await;
        replace_tracks(&db, &[track("old", "Old", "A", "1990-01-01")])
            .await
            .unwrap();

        let mut client = MockSpotifyClient::new();
        client.expect_target_tracks().returning(|_, _, _| {
            Ok(SpotifyPage {
                items: vec![api_track("a", "2001"), api_track("b", "2001")],
                has_next: false,
            })
        });

        let tracks = fetch_tracks(&db, &client, &PlaylistTarget::Playlist("p2".into()))
            .await
            .unwrap();

        assert_eq!(tracks.len(), 2);
        let stored = entities::track::Entity::find().all(&db.conn).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|track| track.playlist_id.as_deref() == Some("p2")));
    }

    #[tokio::test]
    async fn test_fetch_tracks_rejects_repeated_track() {
        let db = test_db().await;
        replace_tracks(&db, &[track("old", "Old", "A", "1990-01-01")])
            .await
            .unwrap();

        let mut client = MockSpotifyClient::new();
        client.expect_target_tracks().returning(|_, _, _| {
            let items = ["a", "b", "a"]
                .iter()
                .enumerate()
                .map(|(position, id)| SpotifyApiTrack {
                    position: position as u32,
                    ..api_track(id, "2001")
                })
                .collect();
            Ok(SpotifyPage {
                items,
                has_next: false,
            })
        });

        let result = fetch_tracks(&db, &client, &PlaylistTarget::Playlist("p2".into())).await;

        match result {
            Err(EngineError::DataNormalization(DataNormalizationError::DuplicateTrack {
                id,
                position,
            })) => {
                assert_eq!(id, "a");
                assert_eq!(position, 2);
            }
            other => panic!("expected DuplicateTrack, got {other:?}"),
        }
        let mirrored = db.track_ids(&TrackOrder::by_id()).await.unwrap();
        assert_eq!(mirrored, vec!["old"]);
    }

    #[tokio::test]
    async fn test_missing_id_reports_position_in_remote_listing() {
        let db = test_db().await;
        let mut client = MockSpotifyClient::new();
        client.expect_target_tracks().returning(|_, _, _| {
            // Position 1 was an unavailable entry the client already dropped
            Ok(SpotifyPage {
                items: vec![
                    api_track("a", "2001"),
                    SpotifyApiTrack {
                        position: 2,
                        id: None,
                        ..api_track("b", "2001")
                    },
                ],
                has_next: false,
            })
        });

        let result = fetch_tracks(&db, &client, &PlaylistTarget::LikedSongs).await;

        assert!(matches!(
            result,
            Err(EngineError::DataNormalization(
                DataNormalizationError::MissingTrackId { position: 2 }
            ))
        ));
    }
}
