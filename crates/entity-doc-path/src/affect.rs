use crate::Path;

/// `true` when `prefix` is a (non-strict) prefix of `path`.
pub fn is_prefix(prefix: &Path, path: &Path) -> bool {
    path.starts_with(prefix)
}

/// Whether a mutation at `change` can change the value read at `value`.
///
/// Holds when either path is a prefix of the other, so a root change affects
/// every path and every change affects the root.
pub fn is_affecting(change: &Path, value: &Path) -> bool {
    is_prefix(change, value) || is_prefix(value, change)
}

/// Longest path that is a prefix of every path in `paths`.
///
/// Returns the root for an empty input, an input containing the root, or paths
/// that diverge at their first step.
pub fn find_common_prefix<'a, I>(paths: I) -> Path
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut iter = paths.into_iter();
    let Some(first) = iter.next() else {
        return Path::root();
    };
    let mut len = first.len();
    for path in iter {
        len = first
            .iter()
            .zip(path.iter())
            .take(len)
            .take_while(|(a, b)| a == b)
            .count();
        if len == 0 {
            break;
        }
    }
    first.truncate(len)
}
