use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::pointer::{format_pointer, parse_pointer};
use crate::PathError;

/// One step of a [`Path`]: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathStep {
    Key(String),
    Index(usize),
}

impl PathStep {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            PathStep::Key(k) => Some(k),
            PathStep::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathStep::Index(i) => Some(*i),
            PathStep::Key(_) => None,
        }
    }
}

impl From<&str> for PathStep {
    fn from(key: &str) -> Self {
        PathStep::Key(key.to_owned())
    }
}

impl From<String> for PathStep {
    fn from(key: String) -> Self {
        PathStep::Key(key)
    }
}

impl From<&String> for PathStep {
    fn from(key: &String) -> Self {
        PathStep::Key(key.clone())
    }
}

impl From<usize> for PathStep {
    fn from(index: usize) -> Self {
        PathStep::Index(index)
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Key(k) => f.write_str(k),
            PathStep::Index(i) => write!(f, "{i}"),
        }
    }
}

/// An immutable location inside a document. The empty path is the root.
///
/// Paths never change after construction; every builder method returns a new
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<PathStep>);

impl Path {
    pub fn root() -> Self {
        Path(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathStep> {
        self.0.iter()
    }

    pub fn get(&self, index: usize) -> Option<&PathStep> {
        self.0.get(index)
    }

    pub fn last(&self) -> Option<&PathStep> {
        self.0.last()
    }

    /// Path of the containing value, or `None` for the root.
    pub fn parent(&self) -> Option<Path> {
        let (_, parent) = self.0.split_last()?;
        Some(Path(parent.to_vec()))
    }

    /// Splits into parent path and final step.
    pub fn split_last(&self) -> Option<(Path, &PathStep)> {
        let (last, parent) = self.0.split_last()?;
        Some((Path(parent.to_vec()), last))
    }

    pub fn child(&self, step: impl Into<PathStep>) -> Path {
        let mut steps = Vec::with_capacity(self.0.len() + 1);
        steps.extend_from_slice(&self.0);
        steps.push(step.into());
        Path(steps)
    }

    pub fn join(&self, other: &Path) -> Path {
        let mut steps = Vec::with_capacity(self.0.len() + other.0.len());
        steps.extend_from_slice(&self.0);
        steps.extend_from_slice(&other.0);
        Path(steps)
    }

    /// First `len` steps of this path.
    pub fn truncate(&self, len: usize) -> Path {
        Path(self.0[..len.min(self.0.len())].to_vec())
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn strip_prefix(&self, prefix: &Path) -> Option<Path> {
        self.0.strip_prefix(prefix.0.as_slice()).map(|rest| Path(rest.to_vec()))
    }

    /// Formats the path as an RFC 6901 JSON Pointer.
    pub fn to_pointer(&self) -> String {
        format_pointer(&self.0)
    }
}

impl From<Vec<PathStep>> for Path {
    fn from(steps: Vec<PathStep>) -> Self {
        Path(steps)
    }
}

impl From<&[PathStep]> for Path {
    fn from(steps: &[PathStep]) -> Self {
        Path(steps.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for Path {
    fn from(keys: [&str; N]) -> Self {
        keys.into_iter().map(PathStep::from).collect()
    }
}

impl FromIterator<PathStep> for Path {
    fn from_iter<I: IntoIterator<Item = PathStep>>(iter: I) -> Self {
        Path(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a PathStep;
    type IntoIter = std::slice::Iter<'a, PathStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl AsRef<[PathStep]> for Path {
    fn as_ref(&self) -> &[PathStep] {
        &self.0
    }
}

/// Pointer text; the root displays as the empty string.
impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_pointer())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_pointer(s).map(Path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;

    #[test]
    fn builders_do_not_alias() {
        let base = path!["fields", "title"];
        let en = base.child("en");
        let de = base.child("de");
        assert_eq!(base.len(), 2);
        assert_eq!(en.to_pointer(), "/fields/title/en");
        assert_eq!(de.to_pointer(), "/fields/title/de");
        assert_eq!(en.parent(), Some(base));
    }

    #[test]
    fn root_has_no_parent() {
        assert!(Path::root().parent().is_none());
        assert_eq!(Path::root().to_string(), "");
        assert_eq!("".parse::<Path>().unwrap(), Path::root());
    }

    #[test]
    fn serde_uses_plain_arrays() {
        let p = path!["fields", "tags", 2];
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json, serde_json::json!(["fields", "tags", 2]));
        let back: Path = serde_json::from_value(json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn strip_prefix_returns_relative_tail() {
        let p = path!["fields", "title", "en"];
        assert_eq!(p.strip_prefix(&path!["fields"]), Some(path!["title", "en"]));
        assert_eq!(p.strip_prefix(&path!["sys"]), None);
    }
}
