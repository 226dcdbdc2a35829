//! RFC 6901 JSON Pointer text form of a [`crate::Path`].
//!
//! Inside a key `~` is written `~0` and `/` is written `~1`.

use crate::{PathError, PathStep};

pub(crate) fn format_pointer(steps: &[PathStep]) -> String {
    let mut out = String::new();
    for step in steps {
        out.push('/');
        match step {
            PathStep::Key(key) => {
                for c in key.chars() {
                    match c {
                        '~' => out.push_str("~0"),
                        '/' => out.push_str("~1"),
                        c => out.push(c),
                    }
                }
            }
            PathStep::Index(i) => out.push_str(&i.to_string()),
        }
    }
    out
}

/// Parses pointer text. Only `""` is the root; `"/"` addresses the empty
/// key. All-digit tokens without a leading zero become indices.
pub(crate) fn parse_pointer(pointer: &str) -> Result<Vec<PathStep>, PathError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(PathError::InvalidPointer(pointer.to_string()));
    };
    rest.split('/').map(parse_component).collect()
}

fn parse_component(raw: &str) -> Result<PathStep, PathError> {
    let is_index = !raw.is_empty()
        && raw.bytes().all(|b| b.is_ascii_digit())
        && (raw == "0" || !raw.starts_with('0'));
    if is_index {
        if let Ok(i) = raw.parse::<usize>() {
            return Ok(PathStep::Index(i));
        }
    }
    let mut key = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            key.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => key.push('~'),
            Some('1') => key.push('/'),
            _ => return Err(PathError::InvalidPointer(raw.to_string())),
        }
    }
    Ok(PathStep::Key(key))
}
