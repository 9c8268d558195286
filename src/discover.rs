//! Template discovery.
//!
//! Walks a directory depth-first and returns every file whose name ends with
//! the requested extension, together with its contents. Hidden entries
//! (`.git`, `.DS_Store`, ...) and entries rejected by the
//! [`ExclusionSet`] are pruned; excluded directories are not descended.
//!
//! Exclusion is evaluated on paths relative to the working directory, while
//! the returned [`TemplateRecord::path`] is relative to the walked directory:
//!
//! ```text
//! discover(root, "site", ".template", ..)
//!
//!   site/index.html.template        filtered as "site/index.html.template"
//!                                   returned as "index.html.template"
//! ```
//!
//! Entries are visited in file-name order so results are deterministic.

use crate::filter::{ExclusionSet, FilterError};
use crate::naming::{PATH_VALIDATOR, is_valid_site_path, to_site_path};
use crate::types::TemplateRecord;
use log::debug;
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("The path '{0}' doesn't validate against the regular expression '{PATH_VALIDATOR}'.")]
    InvalidPath(String),
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Collect all templates below `root/dir` ending with `extension`.
///
/// `extra` holds transient exclusion patterns for this call only.
pub fn discover(
    root: &Path,
    dir: &str,
    extension: &str,
    filter: &ExclusionSet,
    extra: &[String],
) -> Result<Vec<TemplateRecord>, DiscoverError> {
    let base = root.join(dir);
    // filter_entry cannot return a Result, so the first filter error is
    // parked here and surfaced after the walk.
    let filter_error: RefCell<Option<FilterError>> = RefCell::new(None);

    let walker = WalkDir::new(&base)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            if is_hidden(&entry.file_name().to_string_lossy()) {
                return false;
            }
            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            match filter.is_excluded(&to_site_path(rel), extra) {
                Ok(excluded) => !excluded,
                Err(e) => {
                    filter_error.borrow_mut().get_or_insert(e);
                    false
                }
            }
        });

    let mut templates = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file()
            || !entry.file_name().to_string_lossy().ends_with(extension)
        {
            continue;
        }

        let rel = entry.path().strip_prefix(&base).unwrap_or(entry.path());
        let path = to_site_path(rel);
        if !is_valid_site_path(&path) {
            return Err(DiscoverError::InvalidPath(path));
        }

        let text = fs::read_to_string(entry.path())?;
        debug!("Discovered template '{path}'.");
        templates.push(TemplateRecord { path, text });
    }

    if let Some(e) = filter_error.into_inner() {
        return Err(e.into());
    }
    Ok(templates)
}
