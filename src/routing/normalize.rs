//! Path normalization applied before matching.
//!
//! - empty path becomes `/`
//! - a missing leading slash is added
//! - trailing slashes are stripped, except for the root
//!
//! Interior `//` is left alone: an empty segment never satisfies a parameter,
//! so such paths simply fail to match.

use std::borrow::Cow;

pub fn normalize_path(path: &str) -> Cow<'_, str> {
    let trimmed = path.trim_end_matches('/');

    if trimmed.is_empty() {
        return if path == "/" {
            Cow::Borrowed(path)
        } else {
            Cow::Borrowed("/")
        };
    }

    if !trimmed.starts_with('/') {
        return Cow::Owned(format!("/{}", trimmed));
    }

    Cow::Borrowed(trimmed)
}

/// True when `path` is already in normalized form.
pub fn is_normalized(path: &str) -> bool {
    normalize_path(path) == path
}
