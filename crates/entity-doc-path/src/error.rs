use thiserror::Error;

use crate::Path;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The container that would hold the target does not exist.
    #[error("parent container missing for {0}")]
    MissingParent(Path),
    #[error("no value at {0}")]
    NotFound(Path),
    #[error("value at {0} is not a container for this step")]
    NotContainer(Path),
    #[error("value at {0} is not an array")]
    NotArray(Path),
    #[error("index {index} out of bounds for array of length {len} at {path}")]
    IndexOutOfBounds { path: Path, index: usize, len: usize },
    #[error("operation requires a non-root path")]
    EmptyPath,
    #[error("invalid pointer: {0}")]
    InvalidPointer(String),
}
