//! Boundary to the remote document service.
//!
//! The service owns conflict resolution between collaborators. This crate
//! only consumes the path-addressed primitives below, the stream of changes
//! accepted from other parties and the connection health signal.

use std::sync::Arc;

use async_trait::async_trait;
use entity_doc_path::Path;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, watch};

use crate::entity::EntityRef;
use crate::{RemoteError, Version};

pub mod memory;

/// Health of the connection to the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Error,
}

/// A mutation accepted from another party.
///
/// `value` is the new value at `path`, `None` when it was removed. Array
/// inserts and reorders arrive as the whole array at the array path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteChange {
    pub path: Path,
    pub value: Option<Value>,
    pub version: Version,
}

#[async_trait]
pub trait RemoteDocumentService: Send + Sync {
    /// Opens a live handle on `entity`. May fail and may be retried.
    async fn open(&self, entity: &EntityRef)
        -> Result<Arc<dyn RemoteDocumentHandle>, RemoteError>;
}

/// An open remote document. Every mutation resolves with the version the
/// service assigned to it.
///
/// `set_at` must fail with [`RemoteError::MissingParentPath`] when the
/// container holding the target does not exist yet.
#[async_trait]
pub trait RemoteDocumentHandle: Send + Sync {
    /// Current remote state, including `sys.version`.
    fn snapshot(&self) -> Value;

    fn version(&self) -> Version;

    async fn set_at(&self, path: &Path, value: Value) -> Result<Version, RemoteError>;

    async fn remove_at(&self, path: &Path) -> Result<Version, RemoteError>;

    /// Inserts before the array element addressed by `path`.
    async fn insert_at(&self, path: &Path, value: Value) -> Result<Version, RemoteError>;

    /// Appends to the array at `path`.
    async fn push_at(&self, path: &Path, value: Value) -> Result<Version, RemoteError>;

    /// Reorders within the array at `path`.
    async fn move_at(&self, path: &Path, from: usize, to: usize) -> Result<Version, RemoteError>;

    /// Changes accepted from other parties. Never echoes this handle's own
    /// writes.
    fn remote_changes(&self) -> broadcast::Receiver<RemoteChange>;

    fn connection_state(&self) -> watch::Receiver<ConnectionState>;

    async fn close(&self);
}
