//! Per-document configuration.

use serde::{Deserialize, Serialize};

use crate::status::StatusMessages;

/// Default capacity of the change broadcast channels.
pub const DEFAULT_CHANGE_BUFFER: usize = 256;

/// Settings for one document session. Every field has a default, so a
/// partial JSON object (or `{}`) deserializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentConfig {
    /// Capacity of the `changes` / `local_field_changes` broadcast channels.
    /// Slow subscribers that fall further behind observe a lag error.
    pub change_buffer: usize,
    /// User-facing status banner templates.
    pub status_messages: StatusMessages,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            change_buffer: DEFAULT_CHANGE_BUFFER,
            status_messages: StatusMessages::default(),
        }
    }
}

impl DocumentConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub(crate) fn change_capacity(&self) -> usize {
        self.change_buffer.max(1)
    }
}
