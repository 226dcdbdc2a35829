//! Classification of the single user-facing editor status.
//!
//! Three independent signals (connection health, edit permission and the
//! archived flag) collapse into exactly one [`EditorStatus`], evaluated in a
//! fixed order so at most one banner is ever shown:
//!
//! 1. connection error
//! 2. read-only
//! 3. archived
//! 4. ok

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::DocumentApi;
use crate::entity::EntityKind;
use crate::remote::ConnectionState;
use crate::StatusError;

/// Placeholder replaced by the entity label in message templates.
pub const ENTITY_PLACEHOLDER: &str = "{entity}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditorStatus {
    Ok,
    ConnectionError,
    ReadOnly,
    Archived,
}

impl EditorStatus {
    pub const fn id(&self) -> &'static str {
        match self {
            EditorStatus::Ok => "ok",
            EditorStatus::ConnectionError => "connection-error",
            EditorStatus::ReadOnly => "read-only",
            EditorStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for EditorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// First match wins: connection error, then read-only, then archived.
///
/// The predicates are only consulted when an earlier rule did not match.
pub fn classify(
    connection: ConnectionState,
    is_read_only: impl FnOnce() -> bool,
    is_archived: impl FnOnce() -> bool,
) -> EditorStatus {
    if connection == ConnectionState::Error {
        EditorStatus::ConnectionError
    } else if is_read_only() {
        EditorStatus::ReadOnly
    } else if is_archived() {
        EditorStatus::Archived
    } else {
        EditorStatus::Ok
    }
}

/// Classifies `doc` from its current connection state and `sys.archivedAt`.
pub fn classify_document<D>(doc: &D, is_read_only: impl FnOnce() -> bool) -> EditorStatus
where
    D: DocumentApi + ?Sized,
{
    let connection = *doc.connection_state().borrow();
    classify(connection, is_read_only, || {
        doc.sys_property().borrow().is_archived()
    })
}

/// Message templates per non-`ok` status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusMessages(BTreeMap<EditorStatus, String>);

impl Default for StatusMessages {
    fn default() -> Self {
        let mut table = BTreeMap::new();
        table.insert(
            EditorStatus::ConnectionError,
            "It appears that you aren't connected to the internet at the moment. \
             The fields are temporarily locked so that you won't lose any important changes."
                .to_string(),
        );
        table.insert(
            EditorStatus::ReadOnly,
            "You have read-only access to this {entity}. \
             If you need to edit it please contact your administrator."
                .to_string(),
        );
        table.insert(
            EditorStatus::Archived,
            "This {entity} is archived and cannot be edited. Unarchive it to make any changes."
                .to_string(),
        );
        StatusMessages(table)
    }
}

impl StatusMessages {
    pub fn empty() -> Self {
        StatusMessages(BTreeMap::new())
    }

    pub fn with(mut self, status: EditorStatus, template: impl Into<String>) -> Self {
        self.0.insert(status, template.into());
        self
    }

    pub fn template(&self, status: EditorStatus) -> Option<&str> {
        self.0.get(&status).map(String::as_str)
    }

    /// Renders the banner for `status`, or `None` for [`EditorStatus::Ok`].
    ///
    /// A non-`ok` status without a registered template is an error: showing
    /// nothing would leave the user editing fields that cannot be saved.
    pub fn message(
        &self,
        status: EditorStatus,
        kind: EntityKind,
    ) -> Result<Option<String>, StatusError> {
        if status == EditorStatus::Ok {
            return Ok(None);
        }
        match self.0.get(&status) {
            Some(template) => Ok(Some(template.replace(ENTITY_PLACEHOLDER, kind.label()))),
            None => {
                tracing::error!(status = %status, "no message registered for editor status");
                Err(StatusError::MissingMessage(status))
            }
        }
    }
}
