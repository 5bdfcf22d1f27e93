//! Normalisation of drag-and-drop payloads into a local file path.
//!
//! Desktop shells deliver dropped files in several shapes: brace-quoted
//! lists (`{/a b/c.txt} {/d.txt}`), `file://` URIs, or bare paths with
//! Windows separators. Only the first dropped item is used.

use camino::Utf8PathBuf;

const FILE_URI_PREFIX: &str = "file://";

/// Extracts the first dropped path without checking the filesystem.
#[must_use]
pub fn first_dropped_item(payload: &str) -> Option<String> {
    let trimmed = payload.trim();
    let first = if let Some(rest) = trimmed.strip_prefix('{') {
        rest.split_once('}').map_or(rest, |(inner, _)| inner)
    } else {
        trimmed.split_whitespace().next()?
    };
    let without_scheme = first.strip_prefix(FILE_URI_PREFIX).unwrap_or(first);
    let normalised = without_scheme.replace('\\', "/");
    if normalised.is_empty() {
        None
    } else {
        Some(normalised)
    }
}

/// Returns the local file named by `payload`.
///
/// A payload that already names an existing file is used unchanged, so plain
/// paths containing spaces survive. Anything else is parsed as a drop payload
/// and its first item is accepted when it is an existing regular file.
#[must_use]
pub fn normalise_drop(payload: &str) -> Option<Utf8PathBuf> {
    let verbatim = Utf8PathBuf::from(payload.trim());
    if !verbatim.as_str().is_empty() && verbatim.is_file() {
        return Some(verbatim);
    }
    let path = Utf8PathBuf::from(first_dropped_item(payload)?);
    if path.is_file() {
        Some(path)
    } else {
        tracing::debug!(%path, "dropped item is not a file");
        None
    }
}
