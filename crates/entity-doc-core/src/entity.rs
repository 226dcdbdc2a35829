//! Entity identity and the `sys` metadata block.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Entry,
    Asset,
}

impl EntityKind {
    /// Lower-case label used in user-facing messages.
    pub const fn label(&self) -> &'static str {
        match self {
            EntityKind::Entry => "entry",
            EntityKind::Asset => "asset",
        }
    }
}

/// Identifies one entity document at the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub space_id: String,
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn entry(space_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            space_id: space_id.into(),
            kind: EntityKind::Entry,
            id: id.into(),
        }
    }

    pub fn asset(space_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            space_id: space_id.into(),
            kind: EntityKind::Asset,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.space_id, self.kind.label(), self.id)
    }
}

/// The `sys` block of a snapshot. Unknown keys are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_version: Option<Version>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Sys {
    /// Reads the `sys` block of `snapshot`, falling back to defaults for a
    /// missing or malformed block.
    pub fn from_snapshot(snapshot: &Value) -> Sys {
        match snapshot.get("sys") {
            Some(sys) => serde_json::from_value(sys.clone()).unwrap_or_else(|err| {
                tracing::warn!(%err, "malformed sys block in snapshot");
                Sys::default()
            }),
            None => Sys::default(),
        }
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

/// Stores `version` as `sys.version`, creating the `sys` block if needed.
pub(crate) fn write_sys_version(snapshot: &mut Value, version: Version) {
    let Some(root) = snapshot.as_object_mut() else {
        return;
    };
    let sys = root
        .entry("sys")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Some(sys) = sys.as_object_mut() {
        sys.insert("version".to_string(), Value::from(version));
    }
}
