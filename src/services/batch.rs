use std::fmt;
use std::time::Duration;

use crate::database::Database;
use crate::error::EngineError;
use crate::ports::spotify::{PlaylistTarget, SpotifyClient, TrackUri};
use crate::services::ordering::TrackOrder;

/// Tracks per remove or add call
pub const BATCH_SIZE: usize = 50;
/// Pause after every call, keeping us under ~5 calls a second
pub const BATCH_DELAY: Duration = Duration::from_millis(200);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Mutation {
    Remove,
    Add,
}

impl Mutation {
    fn label(self) -> &'static str {
        match self {
            Self::Remove => "remove",
            Self::Add => "add",
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Replays the mirror onto the remote target, one batch at a time.
pub struct BatchMutator<'a, C: SpotifyClient> {
    db: &'a Database,
    client: &'a C,
    delay: Duration,
}

impl<'a, C: SpotifyClient> BatchMutator<'a, C> {
    pub fn new(db: &'a Database, client: &'a C) -> Self {
        Self {
            db,
            client,
            delay: BATCH_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Remove every mirrored track from the target. Returns the number of tracks sent.
    pub async fn remove_all(&self, target: &PlaylistTarget) -> Result<usize, EngineError> {
        let ids = self.db.track_ids(&TrackOrder::by_id()).await?;
        self.apply(Mutation::Remove, target, &ids).await
    }

    /// Append every mirrored track to the target in `order`. Returns the number of tracks sent.
    pub async fn save_all(
        &self,
        target: &PlaylistTarget,
        order: &TrackOrder,
    ) -> Result<usize, EngineError> {
        let ids = self.db.track_ids(order).await?;
        self.apply(Mutation::Add, target, &ids).await
    }

    async fn apply(
        &self,
        mutation: Mutation,
        target: &PlaylistTarget,
        ids: &[String],
    ) -> Result<usize, EngineError> {
        let uris: Vec<TrackUri> = ids.iter().map(|id| TrackUri::from_id(id)).collect();
        let total = uris.len().div_ceil(BATCH_SIZE);
        log::info!(
            "Sending {} tracks to {} in {} {} batches",
            uris.len(),
            target,
            total,
            mutation
        );

        for (applied, batch) in uris.chunks(BATCH_SIZE).enumerate() {
            log::debug!(
                "{} batch {}/{} ({} tracks) on {}",
                mutation,
                applied + 1,
                total,
                batch.len(),
                target
            );

            let result = match mutation {
                Mutation::Remove => self.client.remove_items(target, batch).await,
                Mutation::Add => self.client.add_items(target, batch).await,
            };
            tokio::time::sleep(self.delay).await;

            if let Err(source) = result {
                return Err(EngineError::BatchFailed {
                    operation: mutation.label(),
                    applied,
                    total,
                    source,
                });
            }
        }

        Ok(uris.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use crate::error::RemoteCallError;
    use crate::ports::spotify::MockSpotifyClient;
    use crate::services::ordering::resolve;
    use crate::test_utils::{replace_tracks, test_db, track};

    type CallLog = Arc<Mutex<Vec<(Mutation, Vec<String>, Instant)>>>;

    fn recording_client(calls: &CallLog) -> MockSpotifyClient {
        let mut client = MockSpotifyClient::new();
        let removes = calls.clone();
        client.expect_remove_items().returning(move |_, items| {
            let ids = items.iter().map(|uri| uri.id().to_string()).collect();
            removes
                .lock()
                .unwrap()
                .push((Mutation::Remove, ids, Instant::now()));
            Ok(())
        });
        let adds = calls.clone();
        client.expect_add_items().returning(move |_, items| {
            let ids = items.iter().map(|uri| uri.id().to_string()).collect();
            adds.lock()
                .unwrap()
                .push((Mutation::Add, ids, Instant::now()));
            Ok(())
        });
        client
    }

    async fn seeded_db(count: usize) -> Arc<Database> {
        let db = test_db().await;
        // Names run opposite to ids so name order differs from id order
        let tracks: Vec<_> = (0..count)
            .map(|i| {
                track(
                    &format!("id{i:03}"),
                    &format!("name{:03}", count - i),
                    "Album",
                    "2000-01-01",
                )
            })
            .collect();
        replace_tracks(&db, &tracks).await.unwrap();
        db
    }

    fn batch_sizes(calls: &CallLog, mutation: Mutation) -> Vec<usize> {
        calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(kind, _, _)| *kind == mutation)
            .map(|(_, ids, _)| ids.len())
            .collect()
    }

    #[tokio::test]
    async fn test_partitioning() {
        for (count, expected) in [
            (0, Vec::<usize>::new()),
            (1, vec![1]),
            (50, vec![50]),
            (51, vec![50, 1]),
            (130, vec![50, 50, 30]),
        ] {
            let db = seeded_db(count).await;
            let calls = CallLog::default();
            let client = recording_client(&calls);
            let mutator = BatchMutator::new(&db, &client).with_delay(Duration::ZERO);

            let sent = mutator
                .remove_all(&PlaylistTarget::Playlist("p".into()))
                .await
                .unwrap();

            assert_eq!(sent, count);
            assert_eq!(batch_sizes(&calls, Mutation::Remove), expected);
        }
    }

    #[tokio::test]
    async fn test_save_batches_concatenate_to_resolved_order() {
        let db = seeded_db(75).await;
        let calls = CallLog::default();
        let client = recording_client(&calls);
        let mutator = BatchMutator::new(&db, &client).with_delay(Duration::ZERO);
        let target = PlaylistTarget::Playlist("p".into());
        let order = resolve("Track name", &target).unwrap();

        mutator.save_all(&target, &order).await.unwrap();

        let sent: Vec<String> = calls
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, ids, _)| ids.clone())
            .collect();
        assert_eq!(sent, db.track_ids(&order).await.unwrap());
        assert_eq!(sent.first().map(String::as_str), Some("id074"));
        assert_eq!(sent.last().map(String::as_str), Some("id000"));
    }

    #[tokio::test]
    async fn test_reorder_120_tracks_spacing() {
        let db = seeded_db(120).await;
        let calls = CallLog::default();
        let client = recording_client(&calls);
        let mutator = BatchMutator::new(&db, &client);
        let target = PlaylistTarget::Playlist("p".into());
        let order = resolve("Track name", &target).unwrap();

        mutator.remove_all(&target).await.unwrap();
        mutator.save_all(&target, &order).await.unwrap();

        assert_eq!(batch_sizes(&calls, Mutation::Remove), vec![50, 50, 20]);
        assert_eq!(batch_sizes(&calls, Mutation::Add), vec![50, 50, 20]);

        let calls = calls.lock().unwrap();
        for pair in calls.windows(2) {
            assert!(pair[1].2.duration_since(pair[0].2) >= BATCH_DELAY);
        }
    }

    #[tokio::test]
    async fn test_failed_batch_stops_the_operation() {
        let db = seeded_db(120).await;
        let attempts = Arc::new(Mutex::new(0));
        let mut client = MockSpotifyClient::new();
        let counter = attempts.clone();
        client.expect_add_items().returning(move |_, _| {
            let mut attempts = counter.lock().unwrap();
            *attempts += 1;
            if *attempts == 2 {
                Err(RemoteCallError::Status {
                    endpoint: "me/tracks".into(),
                    status: 429,
                    body: "rate limited".into(),
                })
            } else {
                Ok(())
            }
        });
        let mutator = BatchMutator::new(&db, &client).with_delay(Duration::ZERO);

        let result = mutator
            .save_all(&PlaylistTarget::LikedSongs, &TrackOrder::by_id())
            .await;

        match result {
            Err(EngineError::BatchFailed {
                operation,
                applied,
                total,
                ..
            }) => {
                assert_eq!(operation, "add");
                assert_eq!(applied, 1);
                assert_eq!(total, 3);
            }
            other => panic!("expected BatchFailed, got {other:?}"),
        }
        assert_eq!(*attempts.lock().unwrap(), 2);
    }
}
