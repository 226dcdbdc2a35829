//! Path-addressed edits over a `serde_json::Value` tree.
//!
//! These are the primitive mutations a document applies to its cached
//! snapshot. Each one leaves the tree untouched when it returns an error.

use serde_json::{Map, Value};

use crate::{Path, PathError, PathStep};

pub fn value_at<'a>(root: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut cur = root;
    for step in path {
        cur = match (step, cur) {
            (PathStep::Key(key), Value::Object(map)) => map.get(key)?,
            (PathStep::Index(idx), Value::Array(arr)) => arr.get(*idx)?,
            _ => return None,
        };
    }
    Some(cur)
}

pub fn value_at_mut<'a>(root: &'a mut Value, path: &Path) -> Option<&'a mut Value> {
    let mut cur = root;
    for step in path {
        cur = match (step, cur) {
            (PathStep::Key(key), Value::Object(map)) => map.get_mut(key)?,
            (PathStep::Index(idx), Value::Array(arr)) => arr.get_mut(*idx)?,
            _ => return None,
        };
    }
    Some(cur)
}

/// Writes `value` at `path`. The root path replaces the whole tree.
///
/// The parent container must already exist; otherwise the error is
/// [`PathError::MissingParent`]. An index equal to the array length appends.
pub fn set_at(root: &mut Value, path: &Path, value: Value) -> Result<(), PathError> {
    let Some((parent_path, leaf)) = path.split_last() else {
        *root = value;
        return Ok(());
    };
    let parent = value_at_mut(root, &parent_path)
        .ok_or_else(|| PathError::MissingParent(path.clone()))?;
    match (parent, leaf) {
        (Value::Object(map), PathStep::Key(key)) => {
            map.insert(key.clone(), value);
        }
        (Value::Array(arr), PathStep::Index(idx)) => {
            let len = arr.len();
            match (*idx).cmp(&len) {
                std::cmp::Ordering::Less => arr[*idx] = value,
                std::cmp::Ordering::Equal => arr.push(value),
                std::cmp::Ordering::Greater => {
                    return Err(PathError::IndexOutOfBounds {
                        path: path.clone(),
                        index: *idx,
                        len,
                    })
                }
            }
        }
        _ => return Err(PathError::NotContainer(parent_path)),
    }
    Ok(())
}

/// Removes the value at `path`. Removing an absent object key is a no-op.
pub fn remove_at(root: &mut Value, path: &Path) -> Result<(), PathError> {
    let (parent_path, leaf) = path.split_last().ok_or(PathError::EmptyPath)?;
    let parent =
        value_at_mut(root, &parent_path).ok_or_else(|| PathError::NotFound(parent_path.clone()))?;
    match (parent, leaf) {
        (Value::Object(map), PathStep::Key(key)) => {
            map.remove(key);
        }
        (Value::Array(arr), PathStep::Index(idx)) => {
            if *idx >= arr.len() {
                return Err(PathError::IndexOutOfBounds {
                    path: path.clone(),
                    index: *idx,
                    len: arr.len(),
                });
            }
            arr.remove(*idx);
        }
        _ => return Err(PathError::NotContainer(parent_path)),
    }
    Ok(())
}

/// Inserts `value` before the element addressed by `path`, whose last step
/// must be an index into an existing array (`index <= len`).
pub fn insert_at(root: &mut Value, path: &Path, value: Value) -> Result<(), PathError> {
    let (parent_path, leaf) = path.split_last().ok_or(PathError::EmptyPath)?;
    let PathStep::Index(idx) = leaf else {
        return Err(PathError::NotArray(parent_path));
    };
    let parent = value_at_mut(root, &parent_path)
        .ok_or_else(|| PathError::MissingParent(path.clone()))?;
    let arr = parent
        .as_array_mut()
        .ok_or_else(|| PathError::NotArray(parent_path.clone()))?;
    if *idx > arr.len() {
        return Err(PathError::IndexOutOfBounds {
            path: path.clone(),
            index: *idx,
            len: arr.len(),
        });
    }
    arr.insert(*idx, value);
    Ok(())
}

/// Appends `value` to the array at `path`.
pub fn push_at(root: &mut Value, path: &Path, value: Value) -> Result<(), PathError> {
    let target = value_at_mut(root, path).ok_or_else(|| PathError::NotFound(path.clone()))?;
    let arr = target
        .as_array_mut()
        .ok_or_else(|| PathError::NotArray(path.clone()))?;
    arr.push(value);
    Ok(())
}

/// Moves the element at `from` to position `to` within the array at `path`.
pub fn move_at(root: &mut Value, path: &Path, from: usize, to: usize) -> Result<(), PathError> {
    let target = value_at_mut(root, path).ok_or_else(|| PathError::NotFound(path.clone()))?;
    let arr = target
        .as_array_mut()
        .ok_or_else(|| PathError::NotArray(path.clone()))?;
    let len = arr.len();
    for index in [from, to] {
        if index >= len {
            return Err(PathError::IndexOutOfBounds {
                path: path.clone(),
                index,
                len,
            });
        }
    }
    let item = arr.remove(from);
    arr.insert(to, item);
    Ok(())
}

/// Deepest prefix of `path` (excluding `path` itself) that resolves to a
/// value in `root`.
pub fn deepest_existing_ancestor(root: &Value, path: &Path) -> Path {
    let mut len = 0;
    let mut cur = root;
    for step in path.iter().take(path.len().saturating_sub(1)) {
        let next = match (step, cur) {
            (PathStep::Key(key), Value::Object(map)) => map.get(key),
            (PathStep::Index(idx), Value::Array(arr)) => arr.get(*idx),
            _ => None,
        };
        match next {
            Some(v) => {
                cur = v;
                len += 1;
            }
            None => break,
        }
    }
    path.truncate(len)
}

/// Computes the single write that creates every missing container on the way
/// to `path`'s parent.
///
/// Returns the path of the first missing step together with the nested empty
/// containers to store there: an object where the next step is a key, an
/// array where it is an index.
///
/// Returns `None` when the parent already exists, and when a new array would
/// have to be entered at an index other than 0 (a fresh array only has room
/// for its first element).
pub fn make_path(root: &Value, path: &Path) -> Option<(Path, Value)> {
    let parent = path.parent()?;
    if value_at(root, &parent).is_some() {
        return None;
    }
    let existing = deepest_existing_ancestor(root, path);
    let steps = path.steps();
    let first_missing = existing.len();
    let enters_past_start = steps[first_missing + 1..]
        .iter()
        .any(|step| matches!(step, PathStep::Index(i) if *i > 0));
    if enters_past_start {
        return None;
    }
    let mut value = empty_container_for(&steps[steps.len() - 1]);
    for k in (first_missing + 1..steps.len() - 1).rev() {
        value = wrap(&steps[k], value);
    }
    Some((existing.child(steps[first_missing].clone()), value))
}

fn empty_container_for(step: &PathStep) -> Value {
    match step {
        PathStep::Key(_) => Value::Object(Map::new()),
        PathStep::Index(_) => Value::Array(Vec::new()),
    }
}

fn wrap(step: &PathStep, inner: Value) -> Value {
    match step {
        PathStep::Key(key) => {
            let mut map = Map::new();
            map.insert(key.clone(), inner);
            Value::Object(map)
        }
        PathStep::Index(_) => Value::Array(vec![inner]),
    }
}
