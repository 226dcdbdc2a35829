//! The per-document snapshot cache and its observers.
//!
//! [`Shared::apply`] is the only routine that mutates the cached snapshot.
//! Everything else (normalization, reverts, bindings) goes through the
//! document's mutators and ends up here once the remote service accepts it.

use std::collections::HashMap;

use entity_doc_path::{is_affecting, ops, path, Path, PathError, PathStep};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{broadcast, watch};

use super::{ChangeEvent, ChangeOrigin, DocumentState, Mutation};
use crate::config::DocumentConfig;
use crate::entity::{write_sys_version, Sys};
use crate::remote::ConnectionState;
use crate::Version;

struct Cache {
    snapshot: Value,
    version: Version,
    properties: HashMap<Path, watch::Sender<Option<Value>>>,
}

impl Cache {
    /// Pushes fresh values to every live property affected by one of
    /// `changed`, dropping properties nobody listens to anymore.
    fn notify(&mut self, changed: &[&Path]) {
        self.properties.retain(|_, tx| tx.receiver_count() > 0);
        let snapshot = &self.snapshot;
        for (path, tx) in &self.properties {
            if changed.iter().any(|c| is_affecting(c, path)) {
                tx.send_replace(ops::value_at(snapshot, path).cloned());
            }
        }
    }
}

pub(crate) struct Shared {
    cache: Mutex<Cache>,
    state: watch::Sender<DocumentState>,
    connection: watch::Sender<ConnectionState>,
    version: watch::Sender<Version>,
    sys: watch::Sender<Sys>,
    changes: broadcast::Sender<ChangeEvent>,
    local_field_changes: broadcast::Sender<ChangeEvent>,
}

impl Shared {
    pub(crate) fn new(config: &DocumentConfig, snapshot: Value, state: DocumentState) -> Self {
        let version = Sys::from_snapshot(&snapshot).version;
        let sys = Sys::from_snapshot(&snapshot);
        Self {
            cache: Mutex::new(Cache {
                snapshot,
                version,
                properties: HashMap::new(),
            }),
            state: watch::channel(state).0,
            connection: watch::channel(state.connection()).0,
            version: watch::channel(version).0,
            sys: watch::channel(sys).0,
            changes: broadcast::channel(config.change_capacity()).0,
            local_field_changes: broadcast::channel(config.change_capacity()).0,
        }
    }

    pub(crate) fn empty(config: &DocumentConfig) -> Self {
        Self::new(config, json!({}), DocumentState::Uninitialized)
    }

    pub(crate) fn state(&self) -> DocumentState {
        *self.state.borrow()
    }

    pub(crate) fn set_state(&self, state: DocumentState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = ?previous, to = ?state, "document state changed");
        }
        self.connection.send_if_modified(|current| {
            let next = state.connection();
            let modified = *current != next;
            *current = next;
            modified
        });
    }

    pub(crate) fn get_value_at(&self, path: &Path) -> Option<Value> {
        let cache = self.cache.lock();
        ops::value_at(&cache.snapshot, path).cloned()
    }

    pub(crate) fn value_property_at(&self, path: &Path) -> watch::Receiver<Option<Value>> {
        let mut cache = self.cache.lock();
        if let Some(tx) = cache.properties.get(path) {
            return tx.subscribe();
        }
        let current = ops::value_at(&cache.snapshot, path).cloned();
        let (tx, rx) = watch::channel(current);
        cache.properties.insert(path.clone(), tx);
        rx
    }

    pub(crate) fn make_path(&self, path: &Path) -> Option<(Path, Value)> {
        let cache = self.cache.lock();
        ops::make_path(&cache.snapshot, path)
    }

    pub(crate) fn version(&self) -> Version {
        self.cache.lock().version
    }

    /// Applies one accepted mutation and notifies observers.
    ///
    /// Properties, `version` and `sys` are updated before the change is
    /// broadcast and before the caller resolves the originating write.
    pub(crate) fn apply(
        &self,
        mutation: &Mutation,
        origin: ChangeOrigin,
        version: Version,
    ) -> Result<(), PathError> {
        let event = {
            let mut cache = self.cache.lock();
            let changed = apply_to(&mut cache.snapshot, mutation)?;
            cache.version = cache.version.max(version);
            let current = cache.version;
            write_sys_version(&mut cache.snapshot, current);
            let version_path = path!["sys", "version"];
            cache.notify(&[&changed, &version_path]);
            self.version.send_replace(current);
            self.sys.send_replace(Sys::from_snapshot(&cache.snapshot));
            ChangeEvent {
                value: ops::value_at(&cache.snapshot, &changed).cloned(),
                path: changed,
                origin,
                version,
            }
        };
        tracing::trace!(path = %event.path, version, ?origin, kind = mutation.kind(), "change applied");
        self.broadcast(event);
        Ok(())
    }

    /// Broadcasts `mutation` as applied without touching the snapshot. Used
    /// when a resync already brought in the state the mutation produced.
    pub(crate) fn announce(&self, mutation: &Mutation, origin: ChangeOrigin, version: Version) {
        let changed = changed_path(mutation);
        let value = {
            let cache = self.cache.lock();
            ops::value_at(&cache.snapshot, &changed).cloned()
        };
        self.broadcast(ChangeEvent {
            path: changed,
            value,
            origin,
            version,
        });
    }

    /// Replaces the whole snapshot. `announce` emits a root change for
    /// observers of the change streams (used on resync, not on first load).
    pub(crate) fn replace(&self, snapshot: Value, version: Version, announce: bool) {
        let event = {
            let mut cache = self.cache.lock();
            cache.snapshot = snapshot;
            cache.version = version;
            write_sys_version(&mut cache.snapshot, version);
            cache.notify(&[&Path::root()]);
            self.version.send_replace(version);
            self.sys.send_replace(Sys::from_snapshot(&cache.snapshot));
            ChangeEvent {
                path: Path::root(),
                value: Some(cache.snapshot.clone()),
                origin: ChangeOrigin::Remote,
                version,
            }
        };
        if announce {
            self.broadcast(event);
        }
    }

    /// Releases every property so subscribers observe the end of the stream.
    pub(crate) fn release_properties(&self) {
        self.cache.lock().properties.clear();
    }

    pub(crate) fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    pub(crate) fn subscribe_local_field_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.local_field_changes.subscribe()
    }

    pub(crate) fn sys_property(&self) -> watch::Receiver<Sys> {
        self.sys.subscribe()
    }

    pub(crate) fn version_property(&self) -> watch::Receiver<Version> {
        self.version.subscribe()
    }

    pub(crate) fn state_property(&self) -> watch::Receiver<DocumentState> {
        self.state.subscribe()
    }

    pub(crate) fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    fn broadcast(&self, event: ChangeEvent) {
        let is_local_field = event.origin == ChangeOrigin::Local
            && matches!(event.path.get(0), Some(PathStep::Key(k)) if k == "fields");
        if is_local_field {
            let _ = self.local_field_changes.send(event.clone());
        }
        // No receivers is not an error.
        let _ = self.changes.send(event);
    }
}

/// Applies `mutation` to `snapshot`, returning the path whose value changed.
fn apply_to(snapshot: &mut Value, mutation: &Mutation) -> Result<Path, PathError> {
    match mutation {
        Mutation::Set { path, value } => ops::set_at(snapshot, path, value.clone())?,
        Mutation::Remove { path } => ops::remove_at(snapshot, path)?,
        Mutation::Insert { path, value } => ops::insert_at(snapshot, path, value.clone())?,
        Mutation::Push { path, value } => ops::push_at(snapshot, path, value.clone())?,
        Mutation::Move { path, from, to } => ops::move_at(snapshot, path, *from, *to)?,
    }
    Ok(changed_path(mutation))
}

/// The path whose value a mutation changes. Removing or inserting an array
/// element shifts its siblings, so the whole array changes.
fn changed_path(mutation: &Mutation) -> Path {
    match mutation {
        Mutation::Remove { path } => match path.split_last() {
            Some((parent, PathStep::Index(_))) => parent,
            _ => path.clone(),
        },
        Mutation::Insert { path, .. } => path.parent().unwrap_or_default(),
        _ => mutation.path().clone(),
    }
}
