use entity_doc_path::Path;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeOrigin {
    Local,
    Remote,
}

/// A mutation applied to a document's cached snapshot.
///
/// `value` is the value at `path` after the change (`None` once removed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub path: Path,
    pub value: Option<Value>,
    pub origin: ChangeOrigin,
    pub version: Version,
}

impl ChangeEvent {
    pub fn is_local(&self) -> bool {
        self.origin == ChangeOrigin::Local
    }

    /// Field id and locale code for changes under `fields`, when present.
    pub fn field_locale(&self) -> Option<(&str, Option<&str>)> {
        let steps = self.path.steps();
        if steps.first()?.as_key()? != "fields" {
            return None;
        }
        let field = steps.get(1)?.as_key()?;
        Some((field, steps.get(2).and_then(|s| s.as_key())))
    }
}
