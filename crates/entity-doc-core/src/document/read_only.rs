use std::sync::Arc;

use entity_doc_path::Path;
use serde_json::Value;
use tokio::sync::{broadcast, watch};

use super::cache::Shared;
use super::{ChangeEvent, DocumentApi, DocumentState, Mutation, PendingWrite};
use crate::config::DocumentConfig;
use crate::entity::Sys;
use crate::remote::ConnectionState;
use crate::Version;

/// A fixed snapshot exposed through [`DocumentApi`].
///
/// Reads and properties behave like a live document that never changes.
/// Every mutator is a no-op that resolves with the current version, so field
/// editors can be mounted unchanged in diff and history views.
#[derive(Clone)]
pub struct ReadOnlyDocument {
    shared: Arc<Shared>,
}

impl ReadOnlyDocument {
    pub fn new(snapshot: Value) -> Self {
        Self::with_config(snapshot, &DocumentConfig::default())
    }

    pub fn with_config(snapshot: Value, config: &DocumentConfig) -> Self {
        Self {
            shared: Arc::new(Shared::new(config, snapshot, DocumentState::Ready)),
        }
    }

    fn ignore(&self, mutation: Mutation) -> PendingWrite {
        tracing::debug!(path = %mutation.path(), kind = mutation.kind(), "write ignored by read-only document");
        PendingWrite::ready(Ok(self.shared.version()))
    }
}

impl DocumentApi for ReadOnlyDocument {
    fn get_value_at(&self, path: &Path) -> Option<Value> {
        self.shared.get_value_at(path)
    }

    fn value_property_at(&self, path: &Path) -> watch::Receiver<Option<Value>> {
        self.shared.value_property_at(path)
    }

    fn set_value_at(&self, path: Path, value: Value) -> PendingWrite {
        self.ignore(Mutation::Set { path, value })
    }

    fn remove_value_at(&self, path: Path) -> PendingWrite {
        self.ignore(Mutation::Remove { path })
    }

    fn insert_value_at(&self, path: Path, value: Value) -> PendingWrite {
        self.ignore(Mutation::Insert { path, value })
    }

    fn push_value_at(&self, path: Path, value: Value) -> PendingWrite {
        self.ignore(Mutation::Push { path, value })
    }

    fn move_value_at(&self, path: Path, from: usize, to: usize) -> PendingWrite {
        self.ignore(Mutation::Move { path, from, to })
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.shared.subscribe_changes()
    }

    fn local_field_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.shared.subscribe_local_field_changes()
    }

    fn sys_property(&self) -> watch::Receiver<Sys> {
        self.shared.sys_property()
    }

    fn version(&self) -> Version {
        self.shared.version()
    }

    fn version_property(&self) -> watch::Receiver<Version> {
        self.shared.version_property()
    }

    fn state_property(&self) -> watch::Receiver<DocumentState> {
        self.shared.state_property()
    }

    fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.connection_state()
    }
}
