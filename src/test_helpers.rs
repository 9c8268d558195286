//! Shared test utilities.
//!
//! Every filesystem test works in its own [`TempDir`] laid out like a real
//! project:
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = site_fixture();
//! write_file(tmp.path(), "blog/index.html.template", "{{ list()|length }}");
//! write_file(tmp.path(), "blog/first/index.yaml", "title: First\n");
//! let report = rebuild(tmp.path(), &default_config()).unwrap();
//! ```

use crate::config::SiteConfig;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write `content` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
}

/// A minimal project that passes [`SiteConfig::validate`] with the defaults:
/// an empty `values.yaml` and `.temingoignore`, plus empty `partials/`,
/// `static/` and `output/` directories. No templates.
pub fn site_fixture() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "values.yaml", "");
    write_file(tmp.path(), ".temingoignore", "");
    for dir in ["partials", "static", "output"] {
        fs::create_dir_all(tmp.path().join(dir)).unwrap();
    }
    tmp
}

/// The stock configuration, cleaned the way the CLI would clean it.
pub fn default_config() -> SiteConfig {
    SiteConfig::default().cleaned()
}
