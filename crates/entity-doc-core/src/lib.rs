//! Entity document synchronisation.
//!
//! Keeps many path-bound editing surfaces consistent with one shared,
//! remotely replicated entity document.
//!
//! - [`document`]: the path-addressed [`DocumentApi`] with its live and
//!   read-only implementations,
//! - [`normalizer`]: one-shot structural repair of a loaded snapshot,
//! - [`reverter`]: divergence tracking and "discard changes",
//! - [`status`]: the single user-facing editor status,
//! - [`binding`]: scoped field bindings for UI trees,
//! - [`remote`]: the boundary to the remote document service.

pub mod binding;
pub mod config;
pub mod document;
pub mod entity;
mod error;
pub mod normalizer;
pub mod remote;
pub mod reverter;
pub mod schema;
pub mod status;

pub use config::DocumentConfig;
pub use document::{
    ChangeEvent, ChangeOrigin, DocumentApi, DocumentState, LiveDocument, PendingWrite,
    ReadOnlyDocument,
};
pub use entity::{EntityKind, EntityRef, Sys};
pub use entity_doc_path::{find_common_prefix, is_affecting, path, Path, PathStep};
pub use error::{BindingError, DocumentError, RemoteError, StatusError};
pub use remote::{ConnectionState, RemoteChange, RemoteDocumentHandle, RemoteDocumentService};

/// Monotonic document version assigned by the remote service.
pub type Version = u64;
