//! The path-addressed document every editing surface binds to.
//!
//! [`DocumentApi`] is implemented by [`LiveDocument`], backed by a remote
//! document service, and by [`ReadOnlyDocument`], a fixed snapshot whose
//! mutators change nothing (used for diff and history views).

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use entity_doc_path::Path;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, oneshot, watch};

use crate::entity::Sys;
use crate::remote::ConnectionState;
use crate::{DocumentError, Version};

mod cache;
mod events;
mod live;
mod read_only;

pub use events::{ChangeEvent, ChangeOrigin};
pub use live::LiveDocument;
pub use read_only::ReadOnlyDocument;

/// Lifecycle of a document session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentState {
    Uninitialized,
    Connecting,
    Ready,
    Error,
    Closed,
}

impl DocumentState {
    /// Connection health as seen by status classification.
    pub fn connection(&self) -> ConnectionState {
        match self {
            DocumentState::Uninitialized | DocumentState::Connecting => {
                ConnectionState::Connecting
            }
            DocumentState::Ready => ConnectionState::Connected,
            DocumentState::Error | DocumentState::Closed => ConnectionState::Error,
        }
    }
}

/// One path-addressed mutation kind.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Mutation {
    Set { path: Path, value: Value },
    Remove { path: Path },
    Insert { path: Path, value: Value },
    Push { path: Path, value: Value },
    Move { path: Path, from: usize, to: usize },
}

impl Mutation {
    pub(crate) fn path(&self) -> &Path {
        match self {
            Mutation::Set { path, .. }
            | Mutation::Remove { path }
            | Mutation::Insert { path, .. }
            | Mutation::Push { path, .. }
            | Mutation::Move { path, .. } => path,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Mutation::Set { .. } => "set",
            Mutation::Remove { .. } => "remove",
            Mutation::Insert { .. } => "insert",
            Mutation::Push { .. } => "push",
            Mutation::Move { .. } => "move",
        }
    }
}

/// Completion of a mutating call: the version the remote service assigned.
///
/// The mutation is queued when the call is made, not when this future is
/// first polled, so writes reach the remote service in call order. Dropping
/// the future does not cancel the write.
#[must_use = "the write is queued regardless; await it to observe the result"]
#[derive(Debug)]
pub struct PendingWrite {
    rx: oneshot::Receiver<Result<Version, DocumentError>>,
}

impl PendingWrite {
    pub(crate) fn new(rx: oneshot::Receiver<Result<Version, DocumentError>>) -> Self {
        Self { rx }
    }

    /// An already settled write.
    pub fn ready(result: Result<Version, DocumentError>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }
}

impl Future for PendingWrite {
    type Output = Result<Version, DocumentError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(DocumentError::Closed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Path-addressed read/write/observe access to one entity document.
pub trait DocumentApi: Send + Sync {
    /// Last locally known value at `path`; the root path yields the whole
    /// snapshot. Never waits.
    fn get_value_at(&self, path: &Path) -> Option<Value>;

    /// Hot property of the value at `path`. The receiver starts with the
    /// current value and is updated after every applied change that affects
    /// `path`. Subscribers of the same path share one property.
    fn value_property_at(&self, path: &Path) -> watch::Receiver<Option<Value>>;

    fn set_value_at(&self, path: Path, value: Value) -> PendingWrite;

    fn remove_value_at(&self, path: Path) -> PendingWrite;

    /// Inserts before the array element addressed by `path`.
    fn insert_value_at(&self, path: Path, value: Value) -> PendingWrite;

    /// Appends to the array at `path`.
    fn push_value_at(&self, path: Path, value: Value) -> PendingWrite;

    /// Moves an element within the array at `path`.
    fn move_value_at(&self, path: Path, from: usize, to: usize) -> PendingWrite;

    /// Every applied change, local or remote.
    fn changes(&self) -> broadcast::Receiver<ChangeEvent>;

    /// Locally initiated changes under `fields` only.
    fn local_field_changes(&self) -> broadcast::Receiver<ChangeEvent>;

    fn sys_property(&self) -> watch::Receiver<Sys>;

    fn version(&self) -> Version;

    fn version_property(&self) -> watch::Receiver<Version>;

    fn state_property(&self) -> watch::Receiver<DocumentState>;

    fn connection_state(&self) -> watch::Receiver<ConnectionState>;
}
