//! Content-type schema and locale declarations consumed by the normalizer.

use serde::{Deserialize, Serialize};

/// One field declared by a content type. `id` is the internal field id used
/// as the key under `fields` in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDecl {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_name: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub localized: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub omitted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentType {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

impl ContentType {
    pub fn declares(&self, field_id: &str) -> bool {
        self.fields.iter().any(|f| f.id == field_id)
    }

    pub fn field(&self, field_id: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.id == field_id)
    }
}

/// An active locale. Snapshots key localized values by `internal_code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Locale {
    pub code: String,
    pub internal_code: String,
    #[serde(default)]
    pub default: bool,
}

impl Locale {
    /// A locale whose public and internal codes coincide.
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            internal_code: code.clone(),
            code,
            default: false,
        }
    }
}
