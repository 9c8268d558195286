//! Site-path conventions shared by discovery, list objects and output paths.
//!
//! Every template, list item and single-view item ends up as part of a public
//! URL, so paths are normalized to a single form before they are used:
//!
//! - `/`-separated, relative to the directory they were discovered in
//! - no leading `./` or `/`, no trailing `/`
//! - the root directory is the empty string
//!
//! ## URL-safe validation
//!
//! Only `a-z`, `0-9`, `-`, `_`, `.` and `/` are accepted. Anything else
//! (uppercase, spaces, unicode) is rejected outright instead of being escaped:
//!
//! - `blog/first-post/index.html.template` → ok
//! - `Blog/index.html.template` → rejected
//! - `my page.template` → rejected

use crate::types::Breadcrumb;
use std::path::{Component, Path};

/// Human-readable form of the validator, used in error messages.
pub const PATH_VALIDATOR: &str = "^[a-z0-9-_./]+$";

/// Whether `path` only contains URL-safe characters.
pub fn is_valid_site_path(path: &str) -> bool {
    !path.is_empty()
        && path.chars().all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.' | '/')
        })
}

/// Convert a relative filesystem path into a `/`-separated site path.
///
/// `.` components are dropped, so `Path::new(".")` becomes `""`.
pub fn to_site_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Normalize a user-supplied directory string.
///
/// - `"./blog/"` → `"blog"`
/// - `"/blog"` → `"blog"`
/// - `"."` → `""`
pub fn clean_dir(dir: &str) -> String {
    dir.split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Join a site directory and an entry name; the root directory is `""`.
pub fn join_site_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Directory part of a site path (`"blog/index.html.template"` → `"blog"`).
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// File-name part of a site path (`"blog/post.html.single.template"` →
/// `"post.html.single.template"`).
pub fn base_name(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

/// Remove `extension` from the end of `path` if present.
pub fn strip_extension<'a>(path: &'a str, extension: &str) -> &'a str {
    path.strip_suffix(extension).unwrap_or(path)
}

/// Breadcrumbs for a site directory.
///
/// One crumb per segment from the root, excluding the final segment so a
/// page never links to itself:
///
/// - `"a/b/c"` → `[(a, /a), (b, /a/b)]`
/// - `"a"` → `[]`
/// - `""` → `[]`
///
/// A top-level directory like `blog` is treated like the root: it has no
/// parent to link to, so it gets no crumb for itself either.
pub fn breadcrumbs(dir: &str) -> Vec<Breadcrumb> {
    let segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    let mut crumbs = Vec::new();
    let mut current = String::new();
    for segment in segments.iter().take(segments.len().saturating_sub(1)) {
        current.push('/');
        current.push_str(segment);
        crumbs.push(Breadcrumb {
            name: segment.to_string(),
            path: current.clone(),
        });
    }
    crumbs
}
