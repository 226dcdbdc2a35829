use entity_doc_path::{Path, PathError};
use thiserror::Error;

use crate::status::EditorStatus;

/// Failures reported by the remote document service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The container holding the target does not exist remotely yet.
    #[error("parent path missing for {path}")]
    MissingParentPath { path: Path },
    #[error("invalid path operation: {0}")]
    InvalidPath(PathError),
    #[error("permission denied")]
    PermissionDenied,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("remote document closed")]
    Closed,
}

impl From<PathError> for RemoteError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::MissingParent(path) => RemoteError::MissingParentPath { path },
            other => RemoteError::InvalidPath(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("remote write failed: {0}")]
    Remote(#[from] RemoteError),
    #[error("document closed")]
    Closed,
}

impl DocumentError {
    pub fn is_missing_parent(&self) -> bool {
        matches!(
            self,
            DocumentError::Remote(RemoteError::MissingParentPath { .. })
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("no message registered for status `{0}`")]
    MissingMessage(EditorStatus),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("no ancestor document for binding at {path}")]
    NoDocument { path: Path },
    #[error(transparent)]
    Document(#[from] DocumentError),
}
