//! A document backed by a remote document service.
//!
//! Each [`LiveDocument`] owns a driver task that opens the remote handle,
//! loads the snapshot, applies remote changes and feeds queued writes to the
//! remote service one at a time, in call order. Writes issued before the
//! document is ready wait in the queue.

use std::sync::Arc;

use entity_doc_path::Path;
use serde_json::Value;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc, oneshot, watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::cache::Shared;
use super::{ChangeEvent, ChangeOrigin, DocumentApi, DocumentState, Mutation, PendingWrite};
use crate::config::DocumentConfig;
use crate::entity::{EntityRef, Sys};
use crate::remote::{ConnectionState, RemoteChange, RemoteDocumentHandle, RemoteDocumentService};
use crate::{DocumentError, RemoteError, Version};

type Reply = oneshot::Sender<Result<Version, DocumentError>>;

struct QueuedWrite {
    mutation: Mutation,
    reply: Reply,
}

/// Handle on one open entity-editing session. Clones share the session;
/// dropping the last clone closes it.
#[derive(Clone)]
pub struct LiveDocument {
    session: Arc<Session>,
}

struct Session {
    entity: EntityRef,
    shared: Arc<Shared>,
    queue: mpsc::UnboundedSender<QueuedWrite>,
    reconnect: Arc<Notify>,
    cancel: CancellationToken,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl LiveDocument {
    /// Starts a session for `entity` on the current tokio runtime.
    ///
    /// Returns immediately in the `Uninitialized` state; mutations may be
    /// issued right away and are applied once the document is ready.
    pub fn open(
        service: Arc<dyn RemoteDocumentService>,
        entity: EntityRef,
        config: DocumentConfig,
    ) -> Self {
        let shared = Arc::new(Shared::empty(&config));
        let (queue, queued) = mpsc::unbounded_channel();
        let reconnect = Arc::new(Notify::new());
        let cancel = CancellationToken::new();
        let driver = Driver {
            service,
            entity: entity.clone(),
            shared: Arc::clone(&shared),
            queued,
            reconnect: Arc::clone(&reconnect),
            cancel: cancel.clone(),
        };
        let span = tracing::debug_span!("document", entity = %entity);
        tokio::spawn(driver.run().instrument(span));
        Self {
            session: Arc::new(Session {
                entity,
                shared,
                queue,
                reconnect,
                cancel,
            }),
        }
    }

    pub fn entity(&self) -> &EntityRef {
        &self.session.entity
    }

    pub fn state(&self) -> DocumentState {
        self.session.shared.state()
    }

    /// Waits until the snapshot is loaded and the connection is healthy.
    pub async fn ready(&self) -> Result<(), DocumentError> {
        self.wait_for_state(|s| matches!(s, DocumentState::Ready | DocumentState::Closed))
            .await
            .and_then(|state| match state {
                DocumentState::Closed => Err(DocumentError::Closed),
                _ => Ok(()),
            })
    }

    /// Retries opening the remote document after a failed open.
    pub fn reconnect(&self) {
        self.session.reconnect.notify_one();
    }

    /// Tears the session down: queued writes fail with
    /// [`DocumentError::Closed`], properties are released and the remote
    /// handle is closed. A write already in flight completes first.
    pub fn close(&self) {
        self.session.cancel.cancel();
    }

    /// Waits until the session reached `Closed`.
    pub async fn closed(&self) {
        let _ = self
            .wait_for_state(|s| *s == DocumentState::Closed)
            .await;
    }

    async fn wait_for_state(
        &self,
        accept: impl FnMut(&DocumentState) -> bool,
    ) -> Result<DocumentState, DocumentError> {
        let mut states = self.session.shared.state_property();
        let state = *states
            .wait_for(accept)
            .await
            .map_err(|_| DocumentError::Closed)?;
        Ok(state)
    }

    fn enqueue(&self, mutation: Mutation) -> PendingWrite {
        if self.session.shared.state() == DocumentState::Closed {
            return PendingWrite::ready(Err(DocumentError::Closed));
        }
        let (reply, rx) = oneshot::channel();
        tracing::trace!(path = %mutation.path(), kind = mutation.kind(), "write queued");
        match self.session.queue.send(QueuedWrite { mutation, reply }) {
            Ok(()) => PendingWrite::new(rx),
            Err(_) => PendingWrite::ready(Err(DocumentError::Closed)),
        }
    }
}

impl DocumentApi for LiveDocument {
    fn get_value_at(&self, path: &Path) -> Option<Value> {
        self.session.shared.get_value_at(path)
    }

    fn value_property_at(&self, path: &Path) -> watch::Receiver<Option<Value>> {
        self.session.shared.value_property_at(path)
    }

    fn set_value_at(&self, path: Path, value: Value) -> PendingWrite {
        self.enqueue(Mutation::Set { path, value })
    }

    fn remove_value_at(&self, path: Path) -> PendingWrite {
        self.enqueue(Mutation::Remove { path })
    }

    fn insert_value_at(&self, path: Path, value: Value) -> PendingWrite {
        self.enqueue(Mutation::Insert { path, value })
    }

    fn push_value_at(&self, path: Path, value: Value) -> PendingWrite {
        self.enqueue(Mutation::Push { path, value })
    }

    fn move_value_at(&self, path: Path, from: usize, to: usize) -> PendingWrite {
        self.enqueue(Mutation::Move { path, from, to })
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.session.shared.subscribe_changes()
    }

    fn local_field_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.session.shared.subscribe_local_field_changes()
    }

    fn sys_property(&self) -> watch::Receiver<Sys> {
        self.session.shared.sys_property()
    }

    fn version(&self) -> Version {
        self.session.shared.version()
    }

    fn version_property(&self) -> watch::Receiver<Version> {
        self.session.shared.version_property()
    }

    fn state_property(&self) -> watch::Receiver<DocumentState> {
        self.session.shared.state_property()
    }

    fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.session.shared.connection_state()
    }
}

struct Driver {
    service: Arc<dyn RemoteDocumentService>,
    entity: EntityRef,
    shared: Arc<Shared>,
    queued: mpsc::UnboundedReceiver<QueuedWrite>,
    reconnect: Arc<Notify>,
    cancel: CancellationToken,
}

impl Driver {
    async fn run(mut self) {
        if let Some(handle) = self.connect().await {
            self.serve(&handle).await;
            handle.close().await;
        }
        self.shutdown();
    }

    /// Opens the remote handle, waiting for [`LiveDocument::reconnect`] after
    /// each failure. `None` once the session is cancelled.
    async fn connect(&mut self) -> Option<Arc<dyn RemoteDocumentHandle>> {
        loop {
            self.shared.set_state(DocumentState::Connecting);
            let opened = tokio::select! {
                _ = self.cancel.cancelled() => return None,
                opened = self.service.open(&self.entity) => opened,
            };
            match opened {
                Ok(handle) => return Some(handle),
                Err(err) => {
                    tracing::warn!(%err, "opening remote document failed");
                    self.shared.set_state(DocumentState::Error);
                    tokio::select! {
                        _ = self.cancel.cancelled() => return None,
                        _ = self.reconnect.notified() => {}
                    }
                }
            }
        }
    }

    async fn serve(&mut self, handle: &Arc<dyn RemoteDocumentHandle>) {
        // Subscribe before reading the snapshot so no change falls in between.
        let mut remote = handle.remote_changes();
        let mut connection = handle.connection_state();
        self.shared.replace(handle.snapshot(), handle.version(), false);
        let mut healthy = *connection.borrow_and_update() == ConnectionState::Connected;
        self.shared.set_state(if healthy {
            DocumentState::Ready
        } else {
            DocumentState::Error
        });
        tracing::debug!(version = self.shared.version(), "document loaded");

        let mut connection_open = true;
        let mut remote_open = true;
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                changed = connection.changed(), if connection_open => {
                    if changed.is_err() {
                        connection_open = false;
                        healthy = false;
                    } else {
                        healthy = *connection.borrow_and_update() == ConnectionState::Connected;
                    }
                    self.on_connection(handle, healthy);
                }
                received = remote.recv(), if remote_open => match received {
                    Ok(change) => self.apply_remote(handle, change),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "remote change stream lagged");
                        self.resync(handle);
                    }
                    Err(RecvError::Closed) => {
                        tracing::warn!("remote change stream closed");
                        remote_open = false;
                        healthy = false;
                        self.on_connection(handle, false);
                    }
                },
                Some(write) = self.queued.recv(), if healthy => {
                    let QueuedWrite { mutation, reply } = write;
                    let result = self.execute(handle, &mut remote, mutation).await;
                    if reply.send(result).is_err() {
                        tracing::trace!("write settled after its caller went away");
                    }
                }
            }
        }
    }

    fn on_connection(&self, handle: &Arc<dyn RemoteDocumentHandle>, healthy: bool) {
        if healthy {
            if handle.version() != self.shared.version() {
                self.resync(handle);
            }
            self.shared.set_state(DocumentState::Ready);
        } else {
            self.shared.set_state(DocumentState::Error);
        }
    }

    /// Round-trips one write, taking the create-path fallback when a `set`
    /// targets a parent container the remote document does not have yet.
    async fn execute(
        &self,
        handle: &Arc<dyn RemoteDocumentHandle>,
        remote: &mut broadcast::Receiver<RemoteChange>,
        mutation: Mutation,
    ) -> Result<Version, DocumentError> {
        match submit(handle, &mutation).await {
            Ok(version) => {
                self.commit(handle, remote, &mutation, version);
                Ok(version)
            }
            Err(RemoteError::MissingParentPath { path }) => match mutation {
                Mutation::Set { .. } => self.create_path_then_set(handle, remote, mutation).await,
                _ => Err(RemoteError::MissingParentPath { path }.into()),
            },
            Err(err) => {
                tracing::debug!(%err, path = %mutation.path(), kind = mutation.kind(), "write rejected");
                Err(err.into())
            }
        }
    }

    async fn create_path_then_set(
        &self,
        handle: &Arc<dyn RemoteDocumentHandle>,
        remote: &mut broadcast::Receiver<RemoteChange>,
        mutation: Mutation,
    ) -> Result<Version, DocumentError> {
        // Bring the cache up to date with everything the remote already sent.
        self.drain_remote(handle, remote, Version::MAX);
        let target = mutation.path().clone();
        let Some((at, containers)) = self.shared.make_path(&target) else {
            let cached_parent = target
                .parent()
                .is_some_and(|parent| self.shared.get_value_at(&parent).is_some());
            if cached_parent {
                // The cache has the parent the remote is missing; only a
                // resync can tell who is right.
                self.resync(handle);
            }
            return Err(RemoteError::MissingParentPath { path: target }.into());
        };
        tracing::debug!(path = %target, create = %at, "creating missing parent before set");
        let create = Mutation::Set {
            path: at,
            value: containers,
        };
        let version = submit(handle, &create).await?;
        self.commit(handle, remote, &create, version);
        let version = submit(handle, &mutation).await?;
        self.commit(handle, remote, &mutation, version);
        Ok(version)
    }

    /// Applies an acknowledged local write at `version`, preceded by any
    /// buffered remote changes the service accepted before it.
    fn commit(
        &self,
        handle: &Arc<dyn RemoteDocumentHandle>,
        remote: &mut broadcast::Receiver<RemoteChange>,
        mutation: &Mutation,
        version: Version,
    ) {
        let later = self.drain_remote(handle, remote, version);
        if self.shared.version() >= version {
            // A resync while draining loaded a snapshot that already holds
            // this write; applying it again would repeat non-idempotent edits.
            tracing::debug!(path = %mutation.path(), version, "write already in resynced snapshot");
            self.shared.announce(mutation, ChangeOrigin::Local, version);
        } else if let Err(err) = self.shared.apply(mutation, ChangeOrigin::Local, version) {
            tracing::warn!(%err, path = %mutation.path(), "acknowledged write does not apply locally");
            self.resync(handle);
        }
        for change in later {
            self.apply_remote(handle, change);
        }
    }

    /// Applies buffered remote changes older than `before` and returns the
    /// newer ones in arrival order.
    fn drain_remote(
        &self,
        handle: &Arc<dyn RemoteDocumentHandle>,
        remote: &mut broadcast::Receiver<RemoteChange>,
        before: Version,
    ) -> Vec<RemoteChange> {
        let mut later = Vec::new();
        loop {
            match remote.try_recv() {
                Ok(change) if change.version < before => self.apply_remote(handle, change),
                Ok(change) => later.push(change),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "remote change stream lagged");
                    self.resync(handle);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        later
    }

    fn apply_remote(&self, handle: &Arc<dyn RemoteDocumentHandle>, change: RemoteChange) {
        if change.version <= self.shared.version() {
            tracing::trace!(path = %change.path, version = change.version, "dropping stale remote change");
            return;
        }
        let mutation = match change.value {
            Some(value) => Mutation::Set {
                path: change.path,
                value,
            },
            None => Mutation::Remove { path: change.path },
        };
        if let Err(err) = self
            .shared
            .apply(&mutation, ChangeOrigin::Remote, change.version)
        {
            tracing::warn!(%err, path = %mutation.path(), "remote change does not apply locally");
            self.resync(handle);
        }
    }

    fn resync(&self, handle: &Arc<dyn RemoteDocumentHandle>) {
        let version = handle.version();
        tracing::warn!(from = self.shared.version(), to = version, "resyncing from remote snapshot");
        self.shared.replace(handle.snapshot(), version, true);
    }

    fn shutdown(&mut self) {
        self.queued.close();
        let mut rejected = 0usize;
        while let Ok(write) = self.queued.try_recv() {
            let _ = write.reply.send(Err(DocumentError::Closed));
            rejected += 1;
        }
        self.shared.release_properties();
        self.shared.set_state(DocumentState::Closed);
        tracing::debug!(rejected, "document closed");
    }
}

async fn submit(
    handle: &Arc<dyn RemoteDocumentHandle>,
    mutation: &Mutation,
) -> Result<Version, RemoteError> {
    match mutation {
        Mutation::Set { path, value } => handle.set_at(path, value.clone()).await,
        Mutation::Remove { path } => handle.remove_at(path).await,
        Mutation::Insert { path, value } => handle.insert_at(path, value.clone()).await,
        Mutation::Push { path, value } => handle.push_at(path, value.clone()).await,
        Mutation::Move { path, from, to } => handle.move_at(path, *from, *to).await,
    }
}
