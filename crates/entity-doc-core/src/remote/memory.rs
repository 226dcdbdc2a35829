//! In-process remote document service.
//!
//! Holds one JSON document per [`EntityRef`], assigns versions, fans accepted
//! mutations out to every other open handle and keeps an ordered log of the
//! operations it applied. Opens, writes and connection health can be
//! scripted, which makes it the backend for offline documents and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use entity_doc_path::{ops, Path, PathError, PathStep};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, watch};

use crate::entity::{write_sys_version, EntityRef};
use crate::remote::{ConnectionState, RemoteChange, RemoteDocumentHandle, RemoteDocumentService};
use crate::{RemoteError, Version};

const SUBSCRIBER_BUFFER: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Set,
    Remove,
    Insert,
    Push,
    Move,
}

/// One accepted mutation, in the order the service applied it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedOp {
    pub client: u64,
    pub kind: OpKind,
    pub path: Path,
    pub version: Version,
}

#[derive(Clone, Default)]
pub struct MemoryService {
    inner: Arc<ServiceInner>,
}

#[derive(Default)]
struct ServiceInner {
    docs: Mutex<HashMap<EntityRef, Arc<MemoryDoc>>>,
    failing_opens: AtomicUsize,
    opens: AtomicUsize,
    next_client: AtomicU64,
    open_gate: OpenGate,
}

struct OpenGate {
    paused: watch::Sender<bool>,
}

impl Default for OpenGate {
    fn default() -> Self {
        Self {
            paused: watch::channel(false).0,
        }
    }
}

struct MemoryDoc {
    state: Mutex<DocState>,
    subscribers: Mutex<Vec<(u64, broadcast::Sender<RemoteChange>)>>,
    connection: watch::Sender<ConnectionState>,
    deny_writes: AtomicBool,
}

struct DocState {
    value: Value,
    version: Version,
    log: Vec<LoggedOp>,
}

impl MemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds (or replaces) the document for `entity`. The version is taken
    /// from `sys.version` and defaults to 1.
    pub fn insert(&self, entity: EntityRef, mut snapshot: Value) {
        let version = snapshot
            .pointer("/sys/version")
            .and_then(Value::as_u64)
            .unwrap_or(1);
        write_sys_version(&mut snapshot, version);
        let doc = MemoryDoc {
            state: Mutex::new(DocState {
                value: snapshot,
                version,
                log: Vec::new(),
            }),
            subscribers: Mutex::new(Vec::new()),
            connection: watch::channel(ConnectionState::Connected).0,
            deny_writes: AtomicBool::new(false),
        };
        self.inner.docs.lock().insert(entity, Arc::new(doc));
    }

    pub fn document(&self, entity: &EntityRef) -> Option<Value> {
        self.doc(entity).map(|d| d.state.lock().value.clone())
    }

    pub fn version(&self, entity: &EntityRef) -> Option<Version> {
        self.doc(entity).map(|d| d.state.lock().version)
    }

    pub fn log(&self, entity: &EntityRef) -> Vec<LoggedOp> {
        self.doc(entity)
            .map(|d| d.state.lock().log.clone())
            .unwrap_or_default()
    }

    /// Number of `open` calls received, failed ones included.
    pub fn open_count(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }

    /// Makes the next `n` opens fail with a transport error.
    pub fn fail_next_opens(&self, n: usize) {
        self.inner.failing_opens.store(n, Ordering::SeqCst);
    }

    /// Holds every `open` until [`MemoryService::resume_opens`].
    pub fn pause_opens(&self) {
        self.inner.open_gate.paused.send_replace(true);
    }

    pub fn resume_opens(&self) {
        self.inner.open_gate.paused.send_replace(false);
    }

    pub fn set_connection_state(&self, entity: &EntityRef, state: ConnectionState) {
        if let Some(doc) = self.doc(entity) {
            doc.connection.send_replace(state);
        }
    }

    /// Rejects every write to `entity` with [`RemoteError::PermissionDenied`].
    pub fn deny_writes(&self, entity: &EntityRef, deny: bool) {
        if let Some(doc) = self.doc(entity) {
            doc.deny_writes.store(deny, Ordering::SeqCst);
        }
    }

    fn doc(&self, entity: &EntityRef) -> Option<Arc<MemoryDoc>> {
        self.inner.docs.lock().get(entity).cloned()
    }
}

#[async_trait]
impl RemoteDocumentService for MemoryService {
    async fn open(
        &self,
        entity: &EntityRef,
    ) -> Result<Arc<dyn RemoteDocumentHandle>, RemoteError> {
        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        let mut paused = self.inner.open_gate.paused.subscribe();
        let released = paused.wait_for(|p| !*p).await.is_ok();
        if !released {
            return Err(RemoteError::Closed);
        }
        let failing = self
            .inner
            .failing_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(RemoteError::Transport(format!("open of {entity} failed")));
        }
        let doc = self
            .doc(entity)
            .ok_or_else(|| RemoteError::Transport(format!("unknown entity {entity}")))?;
        let client = self.inner.next_client.fetch_add(1, Ordering::SeqCst);
        let (tx, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        doc.subscribers.lock().push((client, tx.clone()));
        tracing::debug!(%entity, client, "memory handle opened");
        Ok(Arc::new(MemoryHandle {
            client,
            doc,
            changes: tx,
            closed: AtomicBool::new(false),
        }))
    }
}

struct MemoryHandle {
    client: u64,
    doc: Arc<MemoryDoc>,
    changes: broadcast::Sender<RemoteChange>,
    closed: AtomicBool,
}

impl MemoryHandle {
    /// Applies `edit` under the document lock, bumps the version, logs the
    /// operation and publishes the value at `changed` to other clients.
    fn mutate<F>(&self, kind: OpKind, path: &Path, changed: Path, edit: F) -> Result<Version, RemoteError>
    where
        F: FnOnce(&mut Value) -> Result<(), PathError>,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RemoteError::Closed);
        }
        if *self.doc.connection.borrow() == ConnectionState::Error {
            return Err(RemoteError::Transport("connection lost".to_string()));
        }
        if self.doc.deny_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::PermissionDenied);
        }
        let mut state = self.doc.state.lock();
        edit(&mut state.value)?;
        state.version += 1;
        let version = state.version;
        write_sys_version(&mut state.value, version);
        state.log.push(LoggedOp {
            client: self.client,
            kind,
            path: path.clone(),
            version,
        });
        let change = RemoteChange {
            value: ops::value_at(&state.value, &changed).cloned(),
            path: changed,
            version,
        };
        for (client, tx) in self.doc.subscribers.lock().iter() {
            if *client != self.client {
                let _ = tx.send(change.clone());
            }
        }
        Ok(version)
    }
}

#[async_trait]
impl RemoteDocumentHandle for MemoryHandle {
    fn snapshot(&self) -> Value {
        self.doc.state.lock().value.clone()
    }

    fn version(&self) -> Version {
        self.doc.state.lock().version
    }

    async fn set_at(&self, path: &Path, value: Value) -> Result<Version, RemoteError> {
        tokio::task::yield_now().await;
        self.mutate(OpKind::Set, path, path.clone(), |doc| {
            ops::set_at(doc, path, value)
        })
    }

    async fn remove_at(&self, path: &Path) -> Result<Version, RemoteError> {
        tokio::task::yield_now().await;
        // Removing an array element shifts its siblings, so publish the array.
        let changed = match path.split_last() {
            Some((parent, PathStep::Index(_))) => parent,
            _ => path.clone(),
        };
        self.mutate(OpKind::Remove, path, changed, |doc| ops::remove_at(doc, path))
    }

    async fn insert_at(&self, path: &Path, value: Value) -> Result<Version, RemoteError> {
        tokio::task::yield_now().await;
        let changed = path.parent().unwrap_or_default();
        self.mutate(OpKind::Insert, path, changed, |doc| {
            ops::insert_at(doc, path, value)
        })
    }

    async fn push_at(&self, path: &Path, value: Value) -> Result<Version, RemoteError> {
        tokio::task::yield_now().await;
        self.mutate(OpKind::Push, path, path.clone(), |doc| {
            ops::push_at(doc, path, value)
        })
    }

    async fn move_at(&self, path: &Path, from: usize, to: usize) -> Result<Version, RemoteError> {
        tokio::task::yield_now().await;
        self.mutate(OpKind::Move, path, path.clone(), |doc| {
            ops::move_at(doc, path, from, to)
        })
    }

    fn remote_changes(&self) -> broadcast::Receiver<RemoteChange> {
        self.changes.subscribe()
    }

    fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.doc.connection.subscribe()
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.doc
                .subscribers
                .lock()
                .retain(|(client, _)| *client != self.client);
            tracing::debug!(client = self.client, "memory handle closed");
        }
    }
}
