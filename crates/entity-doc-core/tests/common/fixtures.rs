use std::sync::Arc;

use entity_doc_core::remote::memory::MemoryService;
use entity_doc_core::schema::{ContentType, FieldDecl, Locale};
use entity_doc_core::{DocumentConfig, EntityRef, LiveDocument, RemoteDocumentService};
use serde_json::Value;

use super::TIMEOUT;

pub fn entry() -> EntityRef {
    EntityRef::entry("space-1", "entry-1")
}

pub fn content_type(field_ids: &[&str]) -> ContentType {
    ContentType {
        name: "Post".to_string(),
        fields: field_ids
            .iter()
            .map(|id| FieldDecl {
                id: (*id).to_string(),
                api_name: Some((*id).to_string()),
                name: (*id).to_string(),
                field_type: "Symbol".to_string(),
                localized: true,
                disabled: false,
                omitted: false,
            })
            .collect(),
    }
}

pub fn locales(codes: &[&str]) -> Vec<Locale> {
    codes.iter().map(|c| Locale::new(*c)).collect()
}

pub fn service_with(snapshot: Value) -> MemoryService {
    let service = MemoryService::new();
    service.insert(entry(), snapshot);
    service
}

pub fn open(service: &MemoryService) -> LiveDocument {
    let remote: Arc<dyn RemoteDocumentService> = Arc::new(service.clone());
    LiveDocument::open(remote, entry(), DocumentConfig::default())
}

pub async fn open_ready(service: &MemoryService) -> LiveDocument {
    let doc = open(service);
    tokio::time::timeout(TIMEOUT, doc.ready())
        .await
        .expect("timed out opening document")
        .expect("document closed while opening");
    doc
}
