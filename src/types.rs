//! Shared types passed between the pipeline stages.
//!
//! Discovery produces [`TemplateRecord`]s, the site builder turns them into
//! [`RenderedFile`]s, and the rebuild coordinator summarizes a cycle in a
//! [`BuildReport`] for [`crate::output`].

use serde::Serialize;
use std::path::PathBuf;

/// A template or partial read from disk.
///
/// `path` is relative to the directory it was discovered in and has already
/// passed [`crate::naming::is_valid_site_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRecord {
    pub path: String,
    pub text: String,
}

/// One navigation step above the current page.
///
/// Serialized with capitalized keys so templates read `crumb.Name` and
/// `crumb.Path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Path")]
    pub path: String,
}

/// What produced a rendered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderSource {
    /// A normal template, rendered once.
    Page,
    /// A single-view template instantiated for one item.
    SingleView {
        /// Site path of the item (`"blog/p1"`).
        item: String,
    },
}

/// A rendered output held in memory until the cycle publishes it.
#[derive(Debug, Clone)]
pub struct RenderedFile {
    /// Site path of the template that produced the file.
    pub template: String,
    pub source: RenderSource,
    /// Output path relative to the output directory.
    pub output: PathBuf,
    pub bytes: Vec<u8>,
}

/// Summary of one successful rebuild cycle.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub files: Vec<RenderedFile>,
    /// List directories resolved during the cycle with their item counts.
    pub lists: Vec<(String, usize)>,
    /// Files copied from the static and input directories.
    pub copied: usize,
}

impl BuildReport {
    pub fn page_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.source == RenderSource::Page)
            .count()
    }

    pub fn single_view_count(&self) -> usize {
        self.files.len() - self.page_count()
    }
}
