//! A remote handle whose collaborator traffic is scripted by the test.
//!
//! Unlike the memory service it can emit collaborator changes in the middle
//! of one of our writes, change the document without telling anyone and use
//! a tiny change buffer so subscribers lag on demand.

use std::sync::Arc;

use async_trait::async_trait;
use entity_doc_core::{
    path, ConnectionState, DocumentConfig, EntityRef, LiveDocument, Path, RemoteChange,
    RemoteDocumentHandle, RemoteDocumentService, RemoteError, Version,
};
use entity_doc_path::ops;
use entity_doc_path::PathError;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{broadcast, watch};

use super::fixtures::entry;
use super::TIMEOUT;

struct Script {
    value: Value,
    version: Version,
    /// Collaborator sets accepted just before our next write.
    before_next_write: Vec<(Path, Value)>,
}

impl Script {
    fn bump(&mut self) -> Version {
        self.version += 1;
        let version = self.version;
        let _ = ops::set_at(&mut self.value, &path!["sys", "version"], json!(version));
        version
    }
}

pub struct ScriptedRemote {
    script: Mutex<Script>,
    changes: broadcast::Sender<RemoteChange>,
    connection: watch::Sender<ConnectionState>,
}

impl ScriptedRemote {
    /// `buffer` is the capacity of the change stream handed to subscribers.
    pub fn new(mut snapshot: Value, buffer: usize) -> Arc<Self> {
        let version = snapshot["sys"]["version"].as_u64().unwrap_or(1);
        snapshot["sys"] = json!({ "version": version });
        let (changes, _) = broadcast::channel(buffer);
        let (connection, _) = watch::channel(ConnectionState::Connected);
        Arc::new(Self {
            script: Mutex::new(Script {
                value: snapshot,
                version,
                before_next_write: Vec::new(),
            }),
            changes,
            connection,
        })
    }

    pub fn document(&self) -> Value {
        self.script.lock().value.clone()
    }

    /// Accepts a collaborator `set` right away and publishes it.
    pub fn collaborate(&self, path: Path, value: Value) {
        let mut script = self.script.lock();
        self.publish(&mut script, path, value);
    }

    /// Holds a collaborator `set` until our next write arrives; it is then
    /// accepted and published before that write.
    pub fn collaborate_before_next_write(&self, path: Path, value: Value) {
        self.script.lock().before_next_write.push((path, value));
    }

    /// Changes the document and its version without publishing anything.
    pub fn edit_silently(&self, path: Path, value: Value) {
        let mut script = self.script.lock();
        ops::set_at(&mut script.value, &path, value).expect("silent edit must apply");
        script.bump();
    }

    pub fn set_connection_state(&self, state: ConnectionState) {
        self.connection.send_replace(state);
    }

    fn publish(&self, script: &mut Script, path: Path, value: Value) {
        ops::set_at(&mut script.value, &path, value.clone()).expect("collaborator edit must apply");
        let version = script.bump();
        let _ = self.changes.send(RemoteChange {
            path,
            value: Some(value),
            version,
        });
    }

    fn write<F>(&self, edit: F) -> Result<Version, RemoteError>
    where
        F: FnOnce(&mut Value) -> Result<(), PathError>,
    {
        if *self.connection.borrow() != ConnectionState::Connected {
            return Err(RemoteError::Transport("connection lost".to_string()));
        }
        let mut script = self.script.lock();
        for (path, value) in std::mem::take(&mut script.before_next_write) {
            self.publish(&mut script, path, value);
        }
        edit(&mut script.value)?;
        Ok(script.bump())
    }
}

#[async_trait]
impl RemoteDocumentHandle for ScriptedRemote {
    fn snapshot(&self) -> Value {
        self.document()
    }

    fn version(&self) -> Version {
        self.script.lock().version
    }

    async fn set_at(&self, path: &Path, value: Value) -> Result<Version, RemoteError> {
        self.write(|doc| ops::set_at(doc, path, value))
    }

    async fn remove_at(&self, path: &Path) -> Result<Version, RemoteError> {
        self.write(|doc| ops::remove_at(doc, path))
    }

    async fn insert_at(&self, path: &Path, value: Value) -> Result<Version, RemoteError> {
        self.write(|doc| ops::insert_at(doc, path, value))
    }

    async fn push_at(&self, path: &Path, value: Value) -> Result<Version, RemoteError> {
        self.write(|doc| ops::push_at(doc, path, value))
    }

    async fn move_at(&self, path: &Path, from: usize, to: usize) -> Result<Version, RemoteError> {
        self.write(|doc| ops::move_at(doc, path, from, to))
    }

    fn remote_changes(&self) -> broadcast::Receiver<RemoteChange> {
        self.changes.subscribe()
    }

    fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    async fn close(&self) {}
}

struct ScriptedService(Arc<ScriptedRemote>);

#[async_trait]
impl RemoteDocumentService for ScriptedService {
    async fn open(
        &self,
        _entity: &EntityRef,
    ) -> Result<Arc<dyn RemoteDocumentHandle>, RemoteError> {
        let handle: Arc<dyn RemoteDocumentHandle> = self.0.clone();
        Ok(handle)
    }
}

/// Opens a live document on `remote` and waits until it is ready.
pub async fn open_scripted(remote: &Arc<ScriptedRemote>) -> LiveDocument {
    let service: Arc<dyn RemoteDocumentService> = Arc::new(ScriptedService(Arc::clone(remote)));
    let doc = LiveDocument::open(service, entry(), DocumentConfig::default());
    tokio::time::timeout(TIMEOUT, doc.ready())
        .await
        .expect("timed out opening document")
        .expect("document closed while opening");
    doc
}
