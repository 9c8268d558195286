//! Site builder: turns discovered templates into rendered files.
//!
//! Two kinds of templates are rendered against the merged values:
//!
//! ```text
//! index.html.template               → index.html            (once)
//! blog/index.html.template          → blog/index.html       (once)
//! blog/post.html.single.template    → blog/p1/post.html     (once per item:
//!                                   → blog/p2/post.html      blog/p1/index.yaml,
//!                                                            blog/p2/index.yaml)
//! ```
//!
//! Every render sees the shared values plus `breadcrumbs` for the template's
//! directory. Single views additionally see `Item` (the item's
//! `index.yaml`) and `ItemPath` (`/blog/p1`).
//!
//! Nothing is written here. [`render_site`] returns every output in memory
//! so the caller can decide when to touch the output directory.

use crate::config::SiteConfig;
use crate::discover::{DiscoverError, discover};
use crate::filter::ExclusionSet;
use crate::list::{ListCache, ListError, item_dirs};
use crate::naming::{base_name, breadcrumbs, parent_dir, strip_extension};
use crate::render::{ListScope, PartialSet, RenderError, Renderer};
use crate::types::{RenderSource, RenderedFile, TemplateRecord};
use crate::values::{Overlay, ValuesError, load_merged, load_yaml};
use log::debug;
use minijinja::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiteError {
    #[error(transparent)]
    Values(#[from] ValuesError),
    #[error(transparent)]
    Discover(#[from] DiscoverError),
    #[error(transparent)]
    List(#[from] ListError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("cannot dump values: {0}")]
    Dump(#[from] serde_yaml::Error),
}

/// Every template of one cycle, rendered.
#[derive(Debug, Default)]
pub struct RenderedSite {
    pub files: Vec<RenderedFile>,
    /// `(directory, object count)` for every `list()` target of the cycle.
    pub lists: Vec<(String, usize)>,
}

/// The templates a build would render, without rendering them.
#[derive(Debug, Default)]
pub struct Inventory {
    pub templates: Vec<TemplateRecord>,
    pub partials: Vec<TemplateRecord>,
    pub single_views: Vec<TemplateRecord>,
}

/// Discover normal templates, partials and single views.
pub fn inventory(
    root: &Path,
    config: &SiteConfig,
    filter: &ExclusionSet,
) -> Result<Inventory, SiteError> {
    let single = format!("**/*{}", config.single_template_extension);
    let partials_dir = format!("/{}/**", config.partials_dir);
    let output_dir = format!("/{}/**", config.output_dir);

    debug!("*** Discovering templates ... ***");
    let templates = discover(
        root,
        &config.input_dir,
        &config.template_extension,
        filter,
        &[single.clone(), partials_dir.clone()],
    )?;
    let partials = discover(
        root,
        &config.partials_dir,
        &config.partial_extension,
        filter,
        &[single],
    )?;
    let single_views = discover(
        root,
        &config.input_dir,
        &config.single_template_extension,
        filter,
        &[partials_dir, output_dir],
    )?;

    Ok(Inventory {
        templates,
        partials,
        single_views,
    })
}

/// Render every normal and single-view template into memory.
///
/// One [`ListCache`] is created for the cycle and shared by all renders, so
/// `list()` results accumulate across templates but never across cycles.
pub fn render_site(
    root: &Path,
    config: &SiteConfig,
    filter: &ExclusionSet,
) -> Result<RenderedSite, SiteError> {
    debug!("*** Reading values file(s) ... ***");
    let values = load_merged(root, &config.values_files)?;
    if log::log_enabled!(log::Level::Debug) {
        debug!("*** General values-object: ***\n{}", serde_yaml::to_string(&values)?);
    }
    let base = Value::from_serialize(&values);

    let Inventory {
        templates,
        partials,
        single_views,
    } = inventory(root, config, filter)?;
    let partials = PartialSet::new(partials, &config.partial_extension);
    debug!("Loaded {} partial(s).", partials.len());

    let site_root = root.join(&config.input_dir);
    let lists = ListScope {
        cache: Arc::new(ListCache::new()),
        site_root: site_root.clone(),
    };

    let mut files = Vec::new();
    for template in &templates {
        files.push(render_page(template, config, &base, &partials, &lists)?);
    }
    for template in &single_views {
        files.extend(render_single_views(
            template, &site_root, config, &base, &partials, &lists,
        )?);
    }

    Ok(RenderedSite {
        files,
        lists: lists.cache.summary(),
    })
}

fn crumbs_value(dir: &str) -> Value {
    Value::from_serialize(breadcrumbs(dir))
}

fn render_page(
    template: &TemplateRecord,
    config: &SiteConfig,
    base: &Value,
    partials: &PartialSet,
    lists: &ListScope,
) -> Result<RenderedFile, SiteError> {
    let output = strip_extension(&template.path, &config.template_extension);
    debug!("Rendering '{}' to '{output}' ...", template.path);

    let renderer = Renderer::compile(&template.path, &template.text, output, partials, lists)?;
    let data = Overlay::new(base.clone())
        .with("breadcrumbs", crumbs_value(parent_dir(&template.path)))
        .into_value();

    Ok(RenderedFile {
        template: template.path.clone(),
        source: RenderSource::Page,
        output: PathBuf::from(output),
        bytes: renderer.render(data)?,
    })
}

/// Render one single-view template once per sibling item directory.
fn render_single_views(
    template: &TemplateRecord,
    site_root: &Path,
    config: &SiteConfig,
    base: &Value,
    partials: &PartialSet,
    lists: &ListScope,
) -> Result<Vec<RenderedFile>, SiteError> {
    let dir = parent_dir(&template.path);
    let file_name = strip_extension(base_name(&template.path), &config.single_template_extension);
    let renderer = Renderer::compile(&template.path, &template.text, file_name, partials, lists)?;
    let crumbs = crumbs_value(dir);

    let mut files = Vec::new();
    for (item_dir, sentinel) in item_dirs(site_root, dir)? {
        let item = load_yaml(&sentinel)?;
        let item_path = strip_extension(&item_dir, ".yaml");
        let output = format!("{item_path}/{file_name}");
        debug!(
            "Rendering single view '{}' for '{item_path}' to '{output}' ...",
            template.path
        );

        let data = Overlay::new(base.clone())
            .with("breadcrumbs", crumbs.clone())
            .with("ItemPath", Value::from(format!("/{item_path}")))
            .with("Item", Value::from_serialize(&item))
            .into_value();

        files.push(RenderedFile {
            template: template.path.clone(),
            source: RenderSource::SingleView {
                item: item_path.to_string(),
            },
            output: PathBuf::from(output),
            bytes: renderer.render(data)?,
        });
    }
    Ok(files)
}
