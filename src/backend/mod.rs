/// Capability boundary of the notes client
///
/// The client never talks to a network or a disk directly. Everything it
/// needs from the outside world goes through three capabilities:
/// - AuthCapability: the signed-in session (sign out)
/// - GraphApi: list / create / delete notes
/// - BlobStore: put image bytes under a key, resolve a key to a display URL
///
/// Two providers live here: `local` (SQLite catalog + blob directory) and
/// `remote` (GraphQL over HTTP + HTTP object store).

pub mod graphql;
pub mod local;
pub mod remote;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{BackendKind, Config};

/// Failure of a capability call.
///
/// Payloads are plain strings so the error can be cloned into UI messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
    #[error("not signed in: {0}")]
    Auth(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Network(err.to_string())
    }
}

impl From<rusqlite::Error> for BackendError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => BackendError::NotFound("note".into()),
            other => BackendError::Database(other.to_string()),
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => BackendError::NotFound(err.to_string()),
            _ => BackendError::Storage(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for BackendError {
    fn from(err: tokio::task::JoinError) -> Self {
        BackendError::Unexpected(format!("task join error: {}", err))
    }
}

/// A note as the API returns it. `image` is always a storage key here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Input of the create mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateNoteInput {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[async_trait]
pub trait AuthCapability: Send + Sync {
    /// Terminate the current session.
    async fn sign_out(&self) -> BackendResult<()>;

    /// Display name of the signed-in user, if known.
    fn username(&self) -> Option<String>;
}

#[async_trait]
pub trait GraphApi: Send + Sync {
    async fn list_notes(&self) -> BackendResult<Vec<NoteRecord>>;
    async fn create_note(&self, input: &CreateNoteInput) -> BackendResult<NoteRecord>;
    async fn delete_note(&self, id: &str) -> BackendResult<NoteRecord>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> BackendResult<()>;

    /// Resolve a storage key into a URL the UI can display.
    async fn get_url(&self, key: &str) -> BackendResult<String>;
}

/// The three capabilities the client runs against.
#[derive(Clone)]
pub struct Services {
    pub auth: Arc<dyn AuthCapability>,
    pub api: Arc<dyn GraphApi>,
    pub store: Arc<dyn BlobStore>,
}

impl Services {
    /// Build the providers selected by the configuration.
    pub fn from_config(config: &Config) -> BackendResult<Self> {
        match config.backend {
            BackendKind::Local => {
                let backend = Arc::new(local::LocalBackend::open(
                    &config.data_dir,
                    config.username.clone(),
                )?);
                log::info!("📁 Using local notes catalog at {}", config.data_dir.display());
                Ok(Services {
                    auth: backend.clone(),
                    api: backend.clone(),
                    store: backend,
                })
            }
            BackendKind::Remote => {
                let remote = remote::RemoteBackend::new(&config.remote, config.username.clone())?;
                log::info!("🌐 Using remote notes API at {}", config.remote.graphql_url);
                Ok(Services {
                    auth: Arc::new(remote.auth),
                    api: Arc::new(remote.api),
                    store: Arc::new(remote.store),
                })
            }
        }
    }
}
