//! Value data: loading, deep merging and per-render views.
//!
//! All data handed to templates starts as YAML. Values files are loaded in
//! the order given and deep-merged into one mapping:
//!
//! ```text
//! values.yaml        {site: {title: A, lang: en}}
//! values.prod.yaml   {site: {title: B}}
//! ─────────────────────────────────────────────
//! merged             {site: {title: B, lang: en}}
//! ```
//!
//! The merged mapping is converted once per cycle into an immutable
//! [`minijinja::Value`]. Each render then gets an [`Overlay`]: its own keys
//! (`breadcrumbs`, `Item`, `ItemPath`) layered over the shared base without
//! copying or mutating it, so nothing one render injects can leak into the
//! next.

use minijinja::value::{Enumerator, Object, Value};
use serde_yaml::Mapping;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValuesError {
    #[error("cannot read values file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("YAML parse error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("values file {0} must contain a mapping at the top level")]
    NotAMapping(PathBuf),
}

/// Load a YAML file as a mapping. An empty document is an empty mapping.
pub fn load_yaml(path: &Path) -> Result<Mapping, ValuesError> {
    let content = fs::read_to_string(path).map_err(|source| ValuesError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|source| ValuesError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
    match value {
        serde_yaml::Value::Mapping(mapping) => Ok(mapping),
        serde_yaml::Value::Null => Ok(Mapping::new()),
        _ => Err(ValuesError::NotAMapping(path.to_path_buf())),
    }
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Mappings are merged key-by-key (overlay keys override base keys).
/// - Non-mapping values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_yaml(base: serde_yaml::Value, overlay: serde_yaml::Value) -> serde_yaml::Value {
    match (base, overlay) {
        (serde_yaml::Value::Mapping(base_map), serde_yaml::Value::Mapping(overlay_map)) => {
            serde_yaml::Value::Mapping(merge_mappings(base_map, overlay_map))
        }
        (_, overlay) => overlay,
    }
}

/// [`merge_yaml`] for two mappings.
pub fn merge_mappings(mut base: Mapping, overlay: Mapping) -> Mapping {
    for (key, overlay_val) in overlay {
        match base.get_mut(&key) {
            // Merged in place so existing keys keep their position.
            Some(base_val) => {
                let taken = std::mem::take(base_val);
                *base_val = merge_yaml(taken, overlay_val);
            }
            None => {
                base.insert(key, overlay_val);
            }
        }
    }
    base
}

/// Load every values file relative to `root` and merge them in order.
pub fn load_merged(root: &Path, paths: &[String]) -> Result<Mapping, ValuesError> {
    let mut merged = Mapping::new();
    for path in paths {
        merged = merge_mappings(merged, load_yaml(&root.join(path))?);
    }
    Ok(merged)
}

/// A read-only view of `base` with extra top-level keys layered on top.
///
/// Lookups try the overlay keys first, then fall through to the base.
#[derive(Debug)]
pub struct Overlay {
    base: Value,
    extra: BTreeMap<String, Value>,
}

impl Overlay {
    pub fn new(base: Value) -> Self {
        Self {
            base,
            extra: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    pub fn into_value(self) -> Value {
        Value::from_object(self)
    }
}

impl Object for Overlay {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        if let Some(value) = key.as_str().and_then(|k| self.extra.get(k)) {
            return Some(value.clone());
        }
        self.base.get_item(key).ok().filter(|v| !v.is_undefined())
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        let mut keys: Vec<Value> = self.extra.keys().map(|k| Value::from(k.as_str())).collect();
        if let Ok(base_keys) = self.base.try_iter() {
            keys.extend(base_keys.filter(|k| {
                k.as_str().is_none_or(|k| !self.extra.contains_key(k))
            }));
        }
        Enumerator::Values(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write_file;
    use tempfile::TempDir;

    fn yaml(s: &str) -> serde_yaml::Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn merge_nested_mappings_keywise() {
        let merged = merge_yaml(yaml("a: {x: 1}"), yaml("a: {y: 2}"));
        assert_eq!(merged, yaml("a: {x: 1, y: 2}"));
    }

    #[test]
    fn merge_scalar_replaced_wholesale() {
        let merged = merge_yaml(yaml("a: 1"), yaml("a: 2"));
        assert_eq!(merged, yaml("a: 2"));
    }

    #[test]
    fn merge_sequence_replaced_not_concatenated() {
        let merged = merge_yaml(yaml("a: [1, 2]"), yaml("a: [3]"));
        assert_eq!(merged, yaml("a: [3]"));
    }

    #[test]
    fn merge_mapping_replaces_scalar() {
        let merged = merge_yaml(yaml("a: 1"), yaml("a: {b: 2}"));
        assert_eq!(merged, yaml("a: {b: 2}"));
    }

    #[test]
    fn merge_three_layers_in_order() {
        let merged = merge_yaml(
            merge_yaml(yaml("site: {title: A, lang: en}"), yaml("site: {title: B}")),
            yaml("site: {lang: de}"),
        );
        assert_eq!(merged, yaml("site: {title: B, lang: de}"));
    }

    #[test]
    fn load_merged_later_files_override() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "values.yaml", "site:\n  title: A\n  lang: en\n");
        write_file(tmp.path(), "prod.yaml", "site:\n  title: B\n");

        let merged = load_merged(tmp.path(), &["values.yaml".into(), "prod.yaml".into()]).unwrap();
        assert_eq!(
            serde_yaml::Value::Mapping(merged),
            yaml("site: {title: B, lang: en}")
        );
    }

    #[test]
    fn empty_file_is_empty_mapping() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "values.yaml", "");
        assert!(load_yaml(&tmp.path().join("values.yaml")).unwrap().is_empty());
    }

    #[test]
    fn malformed_yaml_is_error() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "values.yaml", "a: [1, 2\n");
        let result = load_yaml(&tmp.path().join("values.yaml"));
        assert!(matches!(result, Err(ValuesError::Yaml { .. })));
    }

    #[test]
    fn top_level_sequence_is_error() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "values.yaml", "- a\n- b\n");
        let result = load_yaml(&tmp.path().join("values.yaml"));
        assert!(matches!(result, Err(ValuesError::NotAMapping(_))));
    }

    #[test]
    fn missing_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_merged(tmp.path(), &["values.yaml".into()]);
        assert!(matches!(result, Err(ValuesError::Io { .. })));
    }

    // =========================================================================
    // Overlay tests
    // =========================================================================

    fn base() -> Value {
        Value::from_serialize(yaml("title: Home\nItem: base-item\n"))
    }

    #[test]
    fn overlay_prefers_extra_keys() {
        let view = Overlay::new(base())
            .with("Item", Value::from("mine"))
            .into_value();
        assert_eq!(view.get_attr("Item").unwrap().as_str(), Some("mine"));
        assert_eq!(view.get_attr("title").unwrap().as_str(), Some("Home"));
    }

    #[test]
    fn overlay_leaves_base_untouched() {
        let shared = base();
        let _view = Overlay::new(shared.clone())
            .with("title", Value::from("Other"))
            .into_value();
        assert_eq!(shared.get_attr("title").unwrap().as_str(), Some("Home"));
    }

    #[test]
    fn overlay_missing_key_is_undefined() {
        let view = Overlay::new(base()).into_value();
        assert!(view.get_attr("nope").unwrap().is_undefined());
    }

    #[test]
    fn overlay_renders_in_template() {
        let env = minijinja::Environment::new();
        let view = Overlay::new(base())
            .with("ItemPath", Value::from("/blog/p1"))
            .into_value();
        let out = env
            .render_str("{{ title }} {{ ItemPath }} {{ Item }}", view)
            .unwrap();
        assert_eq!(out, "Home /blog/p1 base-item");
    }

    #[test]
    fn overlay_enumerates_each_key_once() {
        let view = Overlay::new(base())
            .with("Item", Value::from("mine"))
            .with("extra", Value::from(1))
            .into_value();
        let mut keys: Vec<String> = view
            .try_iter()
            .unwrap()
            .map(|k| k.as_str().unwrap().to_string())
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["Item", "extra", "title"]);
    }
}
