//! Structural repair of a freshly loaded snapshot.
//!
//! After normalization `fields` is an object, every field id under it is
//! declared by the content type and every locale key under a field is an
//! active locale. Repairs are written through the document's mutators so
//! observers and the remote service see them like any other change.

use std::collections::HashSet;

use entity_doc_path::{ops, path, Path};
use serde_json::{Map, Value};

use crate::document::{DocumentApi, PendingWrite};
use crate::schema::{ContentType, Locale};
use crate::DocumentError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repair {
    /// `fields` is not an object and is replaced by an empty one.
    ResetFields,
    /// The content type no longer declares this field.
    RemoveField(String),
    /// The locale is not active.
    RemoveLocale { field: String, locale: String },
}

impl Repair {
    pub fn path(&self) -> Path {
        match self {
            Repair::ResetFields => path!["fields"],
            Repair::RemoveField(field) => path!["fields", field],
            Repair::RemoveLocale { field, locale } => path!["fields", field, locale],
        }
    }
}

/// Lists the repairs `snapshot` needs, without touching it.
///
/// Undeclared fields are removed whole, so their locales are not listed
/// separately.
pub fn plan(snapshot: &Value, content_type: &ContentType, locales: &[Locale]) -> Vec<Repair> {
    let Some(fields) = snapshot.get("fields").and_then(Value::as_object) else {
        return vec![Repair::ResetFields];
    };
    let active: HashSet<&str> = locales.iter().map(|l| l.internal_code.as_str()).collect();
    let mut repairs = Vec::new();
    for (field_id, value) in fields {
        if !content_type.declares(field_id) {
            repairs.push(Repair::RemoveField(field_id.clone()));
            continue;
        }
        let Some(by_locale) = value.as_object() else {
            continue;
        };
        for code in by_locale.keys() {
            if !active.contains(code.as_str()) {
                repairs.push(Repair::RemoveLocale {
                    field: field_id.clone(),
                    locale: code.clone(),
                });
            }
        }
    }
    repairs
}

/// Returns a normalized copy of `snapshot`.
pub fn normalize_snapshot(snapshot: &Value, content_type: &ContentType, locales: &[Locale]) -> Value {
    let mut out = snapshot.clone();
    for repair in plan(snapshot, content_type, locales) {
        let result = match &repair {
            Repair::ResetFields => ops::set_at(&mut out, &repair.path(), Value::Object(Map::new())),
            _ => ops::remove_at(&mut out, &repair.path()),
        };
        if let Err(err) = result {
            tracing::warn!(%err, ?repair, "snapshot repair could not be applied");
        }
    }
    out
}

/// Repairs the document loaded from `snapshot` in place and returns the
/// repairs that were written.
///
/// All writes are queued before the first one is awaited, so they reach the
/// remote service back to back and in plan order.
pub async fn normalize<D>(
    doc: &D,
    snapshot: &Value,
    content_type: &ContentType,
    locales: &[Locale],
) -> Result<Vec<Repair>, DocumentError>
where
    D: DocumentApi + ?Sized,
{
    let repairs = plan(snapshot, content_type, locales);
    if repairs.is_empty() {
        return Ok(repairs);
    }
    tracing::debug!(count = repairs.len(), "normalizing snapshot");
    let writes: Vec<PendingWrite> = repairs
        .iter()
        .map(|repair| match repair {
            Repair::ResetFields => doc.set_value_at(repair.path(), Value::Object(Map::new())),
            _ => doc.remove_value_at(repair.path()),
        })
        .collect();
    for write in writes {
        write.await?;
    }
    Ok(repairs)
}
