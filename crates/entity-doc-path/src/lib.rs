//! Document paths for path-addressed entity documents.
//!
//! A [`Path`] names a location inside a JSON document as an immutable
//! sequence of object keys and array indices. This crate provides:
//!
//! - the [`Path`] value type with pointer formatting/parsing,
//! - change analysis ([`is_affecting`], [`find_common_prefix`]),
//! - the value-tree edits ([`ops`]) shared by local caches and in-process
//!   document services.

mod affect;
mod error;
pub mod ops;
mod path;
mod pointer;

pub use affect::{find_common_prefix, is_affecting, is_prefix};
pub use error::PathError;
pub use path::{Path, PathStep};

/// Builds a [`Path`] from a mixed list of keys and indices.
///
/// ```
/// use entity_doc_path::{path, PathStep};
///
/// let p = path!["fields", "tags", 0];
/// assert_eq!(p.last(), Some(&PathStep::Index(0)));
/// ```
#[macro_export]
macro_rules! path {
    () => {
        $crate::Path::root()
    };
    ($($step:expr),+ $(,)?) => {
        $crate::Path::from(vec![$($crate::PathStep::from($step)),+])
    };
}
