//! List objects: directory-backed collections for templates.
//!
//! A directory becomes a collection when its immediate subdirectories carry
//! an `index.yaml`. Each such subdirectory is one list object:
//!
//! ```text
//! blog/
//! ├── index.html.template     {% for path, post in list()|items %}
//! ├── first-post/
//! │   └── index.yaml          → "blog/first-post": {title: ..., Path: /blog/first-post}
//! ├── second-post/
//! │   └── index.yaml          → "blog/second-post": {...}
//! └── images/                 (no index.yaml, skipped)
//! ```
//!
//! Objects are keyed by their site path and carry a synthetic `Path` key
//! with the leading `/`.
//!
//! ## Cache
//!
//! Every `list(...)` call made while rendering a cycle records its merged
//! result in the cycle's [`ListCache`]. Repeated calls for the same directory
//! accumulate into the same entry. The cache belongs to one rebuild cycle
//! and is dropped with it.

use crate::config::SENTINEL_FILENAME;
use crate::naming::{PATH_VALIDATOR, clean_dir, is_valid_site_path, join_site_path};
use crate::values::{ValuesError, load_yaml, merge_mappings};
use log::debug;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ListError {
    #[error("cannot list {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Values(#[from] ValuesError),
    #[error("The path '{0}' for the list object must validate against the regular expression '{PATH_VALIDATOR}'.")]
    InvalidPath(String),
}

/// Subdirectories of `site_root/dir` that contain the sentinel file, sorted
/// by name, as `(site path, sentinel file)` pairs.
pub fn item_dirs(site_root: &Path, dir: &str) -> Result<Vec<(String, PathBuf)>, ListError> {
    let dir = clean_dir(dir);
    let full = site_root.join(&dir);
    let entries = fs::read_dir(&full).map_err(|source| ListError::Io {
        path: full.clone(),
        source,
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ListError::Io {
            path: full.clone(),
            source,
        })?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();

    let mut items = Vec::new();
    for name in names {
        let sentinel = full.join(&name).join(SENTINEL_FILENAME);
        if !sentinel.is_file() {
            continue;
        }
        let item_path = join_site_path(&dir, &name);
        let sentinel_path = join_site_path(&item_path, SENTINEL_FILENAME);
        if !is_valid_site_path(&sentinel_path) {
            return Err(ListError::InvalidPath(sentinel_path));
        }
        items.push((item_path, sentinel));
    }
    Ok(items)
}

/// Load the list objects of one directory.
pub fn load_list_objects(site_root: &Path, dir: &str) -> Result<Mapping, ListError> {
    debug!("*** Loading list objects from '{dir}' ... ***");
    let mut objects = Mapping::new();
    for (item_path, sentinel) in item_dirs(site_root, dir)? {
        let mut object = load_yaml(&sentinel)?;
        object.insert(
            Value::String("Path".into()),
            Value::String(format!("/{item_path}")),
        );
        debug!("Loaded object from '{}' ...", sentinel.display());
        objects.insert(Value::String(item_path), Value::Mapping(object));
    }
    Ok(objects)
}

/// Per-cycle record of every resolved list directory.
#[derive(Debug, Default)]
pub struct ListCache {
    entries: Mutex<BTreeMap<String, Mapping>>,
}

impl ListCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and merge the objects of every directory in `dirs`, in order.
    ///
    /// After each directory, the cumulative result so far is merged into that
    /// directory's cache entry. Returns the cumulative mapping.
    pub fn resolve(&self, site_root: &Path, dirs: &[String]) -> Result<Mapping, ListError> {
        let mut cumulative = Mapping::new();
        for dir in dirs {
            cumulative = merge_mappings(cumulative, load_list_objects(site_root, dir)?);
            self.record(&clean_dir(dir), &cumulative);
        }
        Ok(cumulative)
    }

    fn record(&self, dir: &str, objects: &Mapping) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.remove(dir).unwrap_or_default();
        entries.insert(dir.to_string(), merge_mappings(entry, objects.clone()));
    }

    /// Cached objects for `dir`, if any template listed it this cycle.
    pub fn get(&self, dir: &str) -> Option<Mapping> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&clean_dir(dir))
            .cloned()
    }

    /// `(directory, object count)` for every cached entry, sorted by directory.
    pub fn summary(&self) -> Vec<(String, usize)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(dir, objects)| (dir.clone(), objects.len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write_file;
    use tempfile::TempDir;

    fn key(s: &str) -> Value {
        Value::String(s.into())
    }

    #[test]
    fn only_dirs_with_sentinel_become_objects() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "blog/item1/index.yaml", "title: A\n");
        std::fs::create_dir_all(tmp.path().join("blog/item2")).unwrap();
        write_file(tmp.path(), "blog/notes.yaml", "title: loose\n");

        let objects = load_list_objects(tmp.path(), "blog").unwrap();
        assert_eq!(objects.len(), 1);
        let item = objects.get(key("blog/item1")).unwrap();
        assert_eq!(item.get("Path").unwrap().as_str(), Some("/blog/item1"));
        assert_eq!(item.get("title").unwrap().as_str(), Some("A"));
    }

    #[test]
    fn root_directory_items_have_no_double_slash() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "about/index.yaml", "title: About\n");

        let objects = load_list_objects(tmp.path(), ".").unwrap();
        let item = objects.get(key("about")).unwrap();
        assert_eq!(item.get("Path").unwrap().as_str(), Some("/about"));
    }

    #[test]
    fn leading_slash_tolerated() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "blog/a/index.yaml", "x: 1\n");

        let objects = load_list_objects(tmp.path(), "/blog/").unwrap();
        assert!(objects.contains_key(key("blog/a")));
    }

    #[test]
    fn objects_sorted_by_directory_name() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "blog/b/index.yaml", "x: 1\n");
        write_file(tmp.path(), "blog/a/index.yaml", "x: 1\n");
        write_file(tmp.path(), "blog/c/index.yaml", "x: 1\n");

        let objects = load_list_objects(tmp.path(), "blog").unwrap();
        let keys: Vec<&str> = objects.keys().map(|k| k.as_str().unwrap()).collect();
        assert_eq!(keys, vec!["blog/a", "blog/b", "blog/c"]);
    }

    #[test]
    fn invalid_item_path_is_error() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "blog/First Post/index.yaml", "x: 1\n");

        let result = load_list_objects(tmp.path(), "blog");
        assert!(matches!(result, Err(ListError::InvalidPath(_))));
    }

    #[test]
    fn missing_directory_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_list_objects(tmp.path(), "nope");
        assert!(matches!(result, Err(ListError::Io { .. })));
    }

    #[test]
    fn file_in_place_of_directory_is_io_error() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "blog", "not a directory");
        let err = item_dirs(tmp.path(), "blog").unwrap_err();
        match err {
            ListError::Io { path, .. } => assert_eq!(path, tmp.path().join("blog")),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[test]
    fn malformed_sentinel_is_error() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "blog/a/index.yaml", "x: [1\n");
        let result = load_list_objects(tmp.path(), "blog");
        assert!(matches!(result, Err(ListError::Values(_))));
    }

    // =========================================================================
    // ListCache tests
    // =========================================================================

    #[test]
    fn resolve_merges_multiple_directories() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "blog/a/index.yaml", "x: 1\n");
        write_file(tmp.path(), "news/b/index.yaml", "x: 2\n");

        let cache = ListCache::new();
        let merged = cache
            .resolve(tmp.path(), &["blog".into(), "news".into()])
            .unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(cache.get("blog").unwrap().len(), 1);
        assert_eq!(cache.get("news").unwrap().len(), 2);
    }

    #[test]
    fn repeated_calls_accumulate() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "blog/a/index.yaml", "x: 1\n");
        write_file(tmp.path(), "news/b/index.yaml", "x: 2\n");

        let cache = ListCache::new();
        cache
            .resolve(tmp.path(), &["news".into(), "blog".into()])
            .unwrap();
        cache.resolve(tmp.path(), &["blog".into()]).unwrap();
        // The first call recorded news+blog under "blog"; the second must not
        // reset it to blog alone.
        assert_eq!(cache.get("blog").unwrap().len(), 2);
    }

    #[test]
    fn summary_lists_every_directory() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "blog/a/index.yaml", "x: 1\n");

        let cache = ListCache::new();
        cache.resolve(tmp.path(), &["./blog".into()]).unwrap();
        assert_eq!(cache.summary(), vec![("blog".to_string(), 1)]);
    }

    #[test]
    fn fresh_cache_is_empty() {
        assert!(ListCache::new().summary().is_empty());
        assert!(ListCache::new().get("blog").is_none());
    }
}
