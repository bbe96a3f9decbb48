//! Error types for the archiver core.

use std::path::PathBuf;

use crate::domain::message::MessageId;

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Every variant is fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Credentials could not be obtained or refreshed
    #[error("session error: {source}")]
    Session {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("configuration error: {0}")]
    Config(String),

    /// The request never produced a response (network, TLS, body read)
    #[error("{call} request failed: {source}")]
    Transport {
        call: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The API answered with a non-success status, e.g. 429 when over quota
    #[error("{call} rejected with status {status}: {body}")]
    Remote {
        call: &'static str,
        status: u16,
        body: String,
    },

    #[error("message {id} came back without a raw payload")]
    MissingPayload { id: MessageId },

    #[error("failed to decode message {id}: {source}")]
    Decode {
        id: MessageId,
        #[source]
        source: base64::DecodeError,
    },

    /// The archive directory could not be enumerated
    #[error("failed to read archive directory {}: {source}", .path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to persist message {id} to {}: {source}", .path.display())]
    Persist {
        id: MessageId,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    pub fn session(err: anyhow::Error) -> Self {
        ArchiveError::Session {
            source: err.into(),
        }
    }

    pub fn transport(
        call: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ArchiveError::Transport {
            call,
            source: Box::new(source),
        }
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, ArchiveError::Remote { status: 429, .. })
    }
}
