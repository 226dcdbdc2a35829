//! "Discard my changes" for an open document.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use entity_doc_path::path;
use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::document::{DocumentApi, DocumentState};
use crate::{DocumentError, Version};

/// Tracks divergence of a document from the state it had when editing
/// started, and restores its `fields` on demand.
///
/// Divergence is measured by version alone: any accepted mutation counts as
/// a change, even one that writes back an identical value.
pub struct Reverter<D: ?Sized> {
    doc: Arc<D>,
    original_fields: Value,
    snapshot_version: AtomicU64,
    current: watch::Receiver<Version>,
}

impl<D> Reverter<D>
where
    D: DocumentApi + ?Sized,
{
    /// Waits until the document is ready, then captures its `fields` and
    /// version as the original state. Normalize before calling this.
    ///
    /// Fails with [`DocumentError::Closed`] if the document closes before it
    /// ever loads.
    pub async fn new(doc: Arc<D>) -> Result<Self, DocumentError> {
        let mut states = doc.state_property();
        let state = *states
            .wait_for(|s| matches!(s, DocumentState::Ready | DocumentState::Closed))
            .await
            .map_err(|_| DocumentError::Closed)?;
        if state == DocumentState::Closed {
            return Err(DocumentError::Closed);
        }
        let fields = doc
            .get_value_at(&path!["fields"])
            .unwrap_or_else(|| Value::Object(Map::new()));
        let version = doc.version();
        Ok(Self::with_original(doc, fields, version))
    }

    pub fn with_original(doc: Arc<D>, original_fields: Value, snapshot_version: Version) -> Self {
        let current = doc.version_property();
        Self {
            doc,
            original_fields,
            snapshot_version: AtomicU64::new(snapshot_version),
            current,
        }
    }

    pub fn snapshot_version(&self) -> Version {
        self.snapshot_version.load(Ordering::SeqCst)
    }

    pub fn original_fields(&self) -> &Value {
        &self.original_fields
    }

    pub fn has_changes(&self) -> bool {
        *self.current.borrow() != self.snapshot_version()
    }

    /// Writes the original `fields` back. On failure the snapshot version is
    /// kept, so [`Reverter::has_changes`] keeps reporting `true`.
    pub async fn revert(&self) -> Result<Version, DocumentError> {
        tracing::debug!(from = *self.current.borrow(), "reverting fields");
        let version = self
            .doc
            .set_value_at(path!["fields"], self.original_fields.clone())
            .await
            .inspect_err(|err| tracing::warn!(%err, "revert failed"))?;
        self.snapshot_version.store(version, Ordering::SeqCst);
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ReadOnlyDocument;

    #[tokio::test]
    async fn read_only_document_never_diverges() {
        let doc = Arc::new(ReadOnlyDocument::new(
            json!({"sys": {"version": 4}, "fields": {"title": {"en": "x"}}}),
        ));
        let reverter = Reverter::new(Arc::clone(&doc)).await.unwrap();
        assert!(!reverter.has_changes());
        assert_eq!(reverter.original_fields(), &json!({"title": {"en": "x"}}));
        assert_eq!(reverter.revert().await, Ok(4));
        assert!(!reverter.has_changes());
    }

    #[test]
    fn divergent_snapshot_version_reports_changes() {
        let doc = Arc::new(ReadOnlyDocument::new(json!({"sys": {"version": 9}, "fields": {}})));
        let reverter = Reverter::with_original(doc, json!({}), 2);
        assert!(reverter.has_changes());
    }
}
