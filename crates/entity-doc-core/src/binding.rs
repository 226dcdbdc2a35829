//! Scoped field bindings for trees of editing components.
//!
//! A [`BindingScope`] carries the nearest ancestor document and an absolute
//! base path down a component tree. Components bind to a path relative to
//! their scope and never see the document itself. A binding only hears about
//! changes that affect its own path.

use std::future::Future;
use std::sync::Arc;

use entity_doc_path::{is_affecting, Path};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::document::{ChangeEvent, DocumentApi, PendingWrite};
use crate::{BindingError, Version};

#[derive(Clone, Default)]
pub struct BindingScope {
    document: Option<Arc<dyn DocumentApi>>,
    base: Path,
}

impl BindingScope {
    pub fn root(document: Arc<dyn DocumentApi>) -> Self {
        Self {
            document: Some(document),
            base: Path::root(),
        }
    }

    /// A scope without an ancestor document. Bindings created from it read
    /// nothing and reject every write.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn document(&self) -> Option<&Arc<dyn DocumentApi>> {
        self.document.as_ref()
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn child(&self, relative: &Path) -> Self {
        Self {
            document: self.document.clone(),
            base: self.base.join(relative),
        }
    }

    pub fn bind(&self, relative: &Path) -> FieldBinding {
        FieldBinding::new(self.document.clone(), self.base.join(relative))
    }
}

/// One component's view of the document at a fixed absolute path.
///
/// Dropping the binding unmounts it.
pub struct FieldBinding {
    document: Option<Arc<dyn DocumentApi>>,
    path: Path,
    property: Option<watch::Receiver<Option<Value>>>,
    in_flight: Arc<watch::Sender<usize>>,
    unmounted: CancellationToken,
}

impl FieldBinding {
    fn new(document: Option<Arc<dyn DocumentApi>>, path: Path) -> Self {
        let property = document.as_ref().map(|doc| doc.value_property_at(&path));
        Self {
            document,
            path,
            property,
            in_flight: Arc::new(watch::channel(0).0),
            unmounted: CancellationToken::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_mounted(&self) -> bool {
        !self.unmounted.is_cancelled()
    }

    pub fn read(&self) -> Option<Value> {
        self.document.as_ref()?.get_value_at(&self.path)
    }

    /// Hot receiver of the bound value. After unmount, and for detached
    /// bindings, the receiver holds the last known value and never changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<Value>> {
        match &self.property {
            Some(property) => property.clone(),
            None => watch::channel(self.read()).1,
        }
    }

    /// Change events affecting the bound path. The stream ends on unmount.
    pub fn changes(&self) -> ScopedChanges {
        let rx = match &self.document {
            Some(doc) => doc.changes(),
            None => broadcast::channel(1).1,
        };
        ScopedChanges {
            rx,
            path: self.path.clone(),
            unmounted: self.unmounted.clone(),
        }
    }

    /// Number of writes issued through this binding that have not settled.
    pub fn busy(&self) -> watch::Receiver<usize> {
        self.in_flight.subscribe()
    }

    /// Sets the bound value.
    ///
    /// The write is queued on the document when this is called, not when
    /// the returned future is polled. A `set` whose parent container is
    /// missing is retried by the document after creating the path.
    pub fn write(
        &self,
        value: Value,
    ) -> impl Future<Output = Result<Version, BindingError>> + Send + 'static {
        let started = self.start_write(value);
        async move {
            let (pending, _busy) = started?;
            Ok(pending.await?)
        }
    }

    /// Like [`FieldBinding::write`], but reports the outcome to `callback`
    /// from a spawned task. The write is not cancelled by unmounting; only
    /// the callback is skipped.
    pub fn write_with<F>(&self, value: Value, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Version, BindingError>) + Send + 'static,
    {
        let write = self.write(value);
        let unmounted = self.unmounted.clone();
        let path = self.path.clone();
        tokio::spawn(async move {
            let result = write.await;
            if unmounted.is_cancelled() {
                tracing::trace!(%path, "write settled after unmount");
                return;
            }
            callback(result);
        })
    }

    /// Releases the value subscription and ends every [`ScopedChanges`]
    /// stream of this binding. In-flight writes still complete.
    pub fn unmount(&mut self) {
        if !self.unmounted.is_cancelled() {
            tracing::trace!(path = %self.path, "binding unmounted");
        }
        self.unmounted.cancel();
        self.property = None;
    }

    fn start_write(&self, value: Value) -> Result<(PendingWrite, BusyGuard), BindingError> {
        let Some(doc) = &self.document else {
            tracing::error!(path = %self.path, "write without an ancestor document, edit dropped");
            return Err(BindingError::NoDocument {
                path: self.path.clone(),
            });
        };
        let busy = BusyGuard::enter(&self.in_flight);
        Ok((doc.set_value_at(self.path.clone(), value), busy))
    }
}

impl Drop for FieldBinding {
    fn drop(&mut self) {
        self.unmounted.cancel();
    }
}

struct BusyGuard(Arc<watch::Sender<usize>>);

impl BusyGuard {
    fn enter(counter: &Arc<watch::Sender<usize>>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self(Arc::clone(counter))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Change events filtered to those affecting one path.
pub struct ScopedChanges {
    rx: broadcast::Receiver<ChangeEvent>,
    path: Path,
    unmounted: CancellationToken,
}

impl ScopedChanges {
    /// Next affecting event, or `None` once the binding is unmounted or the
    /// document closed its change stream.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            let received = tokio::select! {
                biased;
                _ = self.unmounted.cancelled() => return None,
                received = self.rx.recv() => received,
            };
            match received {
                Ok(event) if is_affecting(&event.path, &self.path) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(path = %self.path, skipped, "binding change stream lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
