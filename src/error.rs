use std::path::PathBuf;

/// A failure talking to the Spotify Web API. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum RemoteCallError {
    #[error("Spotify answered {endpoint} with status {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("Spotify request to {endpoint} failed: {source}")]
    Client {
        endpoint: String,
        #[source]
        source: rspotify::ClientError,
    },
    #[error("Invalid Spotify id `{id}`: {source}")]
    InvalidId {
        id: String,
        #[source]
        source: rspotify::model::IdError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum LocalStoreError {
    #[error("Failed to create mirror directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Mirror store query failed: {0}")]
    Query(#[from] sea_orm::DbErr),
}

/// A remote record that does not have the shape the mirror needs.
#[derive(Debug, thiserror::Error)]
pub enum DataNormalizationError {
    #[error("Track entry at position {position} is not local but has no id")]
    MissingTrackId { position: u32 },
    #[error("Track {id} appears again at position {position}, refusing to mirror duplicates")]
    DuplicateTrack { id: String, position: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    RemoteCall(#[from] RemoteCallError),
    #[error(transparent)]
    LocalStore(#[from] LocalStoreError),
    #[error(transparent)]
    DataNormalization(#[from] DataNormalizationError),
    #[error("Unknown ordering `{name}`, expected one of: {available}")]
    UnknownOrdering { name: String, available: String },
    #[error("{operation} stopped after {applied} of {total} batches: {source}")]
    BatchFailed {
        operation: &'static str,
        applied: usize,
        total: usize,
        #[source]
        source: RemoteCallError,
    },
}

impl From<sea_orm::DbErr> for EngineError {
    fn from(error: sea_orm::DbErr) -> Self {
        Self::LocalStore(LocalStoreError::Query(error))
    }
}
