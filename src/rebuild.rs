//! One complete build cycle.
//!
//! ```text
//! 1. validate config, load exclusions
//! 2. render every template into memory          (nothing written yet)
//! 3. clear the output directory's entries
//! 4. copy static/ verbatim                      (no filtering)
//! 5. copy the input tree                        (filtered, see below)
//! 6. write the rendered files
//! ```
//!
//! Rendering comes first so a broken template or data file aborts the cycle
//! before the previous output is deleted.
//!
//! The input copy skips the partials directory, templates (`**/*.template`),
//! item data (`**/index.yaml`), hidden entries and everything the
//! [`ExclusionSet`] rejects (which always includes the output and static
//! directories, the ignore file and the settings file).

use crate::config::{ConfigError, SENTINEL_FILENAME, SiteConfig};
use crate::filter::{ExclusionSet, FilterError};
use crate::naming::{base_name, to_site_path};
use crate::site::{SiteError, render_site};
use crate::types::{BuildReport, RenderedFile};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Site(#[from] SiteError),
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> BuildError + '_ {
    move |source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Run one full cycle in the working directory `root`.
pub fn rebuild(root: &Path, config: &SiteConfig) -> Result<BuildReport, BuildError> {
    config.validate(root)?;
    let filter = ExclusionSet::load(root, config)?;
    let site = render_site(root, config, &filter)?;

    let output_dir = root.join(&config.output_dir);
    debug!("*** Deleting contents of '{}' ... ***", output_dir.display());
    clear_dir(&output_dir)?;

    debug!("*** Copying static files ... ***");
    let mut copied = copy_tree(root, &root.join(&config.static_dir), &output_dir, |_| Ok(true))?;

    debug!("*** Copying input files ... ***");
    let skip = [
        format!("/{}", config.partials_dir),
        format!("**/*{}", config.template_extension),
        format!("**/*{}", config.single_template_extension),
        format!("**/{SENTINEL_FILENAME}"),
    ];
    copied += copy_tree(root, &root.join(&config.input_dir), &output_dir, |rel| {
        Ok(!base_name(rel).starts_with('.') && !filter.is_excluded(rel, &skip)?)
    })?;

    write_files(&output_dir, &site.files)?;
    info!("Successfully built contents to '{}'.", config.output_dir);

    Ok(BuildReport {
        files: site.files,
        lists: site.lists,
        copied,
    })
}

/// Remove every immediate entry of `dir`, keeping `dir` itself.
pub fn clear_dir(dir: &Path) -> Result<(), BuildError> {
    for entry in fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        let file_type = fs::symlink_metadata(&path).map_err(io_error(&path))?.file_type();
        if file_type.is_dir() {
            fs::remove_dir_all(&path).map_err(io_error(&path))?;
        } else {
            fs::remove_file(&path).map_err(io_error(&path))?;
        }
    }
    Ok(())
}

/// Copy the contents of `src` into `dst`, returning the number of files copied.
///
/// `keep` receives each entry's path relative to `root`; a rejected
/// directory is not descended.
fn copy_tree(
    root: &Path,
    src: &Path,
    dst: &Path,
    keep: impl Fn(&str) -> Result<bool, FilterError>,
) -> Result<usize, BuildError> {
    let mut copied = 0;
    let mut walker = WalkDir::new(src).min_depth(1).sort_by_file_name().into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry?;
        let is_dir = entry.file_type().is_dir();
        let rel_root = to_site_path(entry.path().strip_prefix(root).unwrap_or(entry.path()));
        if !keep(&rel_root)? {
            if is_dir {
                walker.skip_current_dir();
            }
            continue;
        }

        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(rel);
        if is_dir {
            fs::create_dir_all(&target).map_err(io_error(&target))?;
        } else if entry.path().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(io_error(parent))?;
            }
            fs::copy(entry.path(), &target).map_err(io_error(&target))?;
            debug!("Copied '{rel_root}'.");
            copied += 1;
        }
    }
    Ok(copied)
}

fn write_files(output_dir: &Path, files: &[RenderedFile]) -> Result<(), BuildError> {
    for file in files {
        let path = output_dir.join(&file.output);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        fs::write(&path, &file.bytes).map_err(io_error(&path))?;
        debug!("Wrote '{}'.", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{default_config, site_fixture, write_file};

    fn read(root: &Path, rel: &str) -> String {
        fs::read_to_string(root.join(rel)).unwrap()
    }

    #[test]
    fn written_bytes_match_rendered_bytes() {
        let tmp = site_fixture();
        write_file(tmp.path(), "values.yaml", "title: Home\n");
        write_file(tmp.path(), "index.html.template", "<title>{{ title }}</title>\n");
        write_file(tmp.path(), "p1/page.html.single.template", "{{ Item.x }}");
        write_file(tmp.path(), "p1/a/index.yaml", "x: 1\n");

        let report = rebuild(tmp.path(), &default_config()).unwrap();
        assert_eq!(report.files.len(), 2);
        for file in &report.files {
            let on_disk = fs::read(tmp.path().join("output").join(&file.output)).unwrap();
            assert_eq!(on_disk, file.bytes);
        }
        assert_eq!(read(tmp.path(), "output/index.html"), "<title>Home</title>\n");
    }

    #[test]
    fn stale_output_removed() {
        let tmp = site_fixture();
        write_file(tmp.path(), "output/old.html", "stale");
        write_file(tmp.path(), "output/old-dir/x.html", "stale");

        rebuild(tmp.path(), &default_config()).unwrap();
        assert!(!tmp.path().join("output/old.html").exists());
        assert!(!tmp.path().join("output/old-dir").exists());
        assert!(tmp.path().join("output").is_dir());
    }

    #[test]
    fn static_copied_unfiltered() {
        let tmp = site_fixture();
        write_file(tmp.path(), ".temingoignore", "**/*.css\n");
        write_file(tmp.path(), "static/css/site.css", "body {}");
        write_file(tmp.path(), "static/raw.template", "{{ not rendered }}");

        let report = rebuild(tmp.path(), &default_config()).unwrap();
        assert_eq!(read(tmp.path(), "output/css/site.css"), "body {}");
        assert_eq!(read(tmp.path(), "output/raw.template"), "{{ not rendered }}");
        assert!(report.copied >= 2);
    }

    #[test]
    fn hidden_files_copied_from_static_only() {
        let tmp = site_fixture();
        write_file(tmp.path(), "static/.htaccess", "static");
        write_file(tmp.path(), ".env", "secret");

        rebuild(tmp.path(), &default_config()).unwrap();
        assert_eq!(read(tmp.path(), "output/.htaccess"), "static");
        assert!(!tmp.path().join("output/.env").exists());
    }

    #[test]
    fn input_copy_skips_build_inputs() {
        let tmp = site_fixture();
        write_file(tmp.path(), ".temingoignore", "/drafts\n");
        write_file(tmp.path(), "img/logo.svg", "<svg/>");
        write_file(tmp.path(), "index.html.template", "x");
        write_file(tmp.path(), "blog/a/index.yaml", "x: 1\n");
        write_file(tmp.path(), "blog/a/photo.jpg", "jpg");
        write_file(tmp.path(), "partials/head.partial", "x");
        write_file(tmp.path(), "drafts/wip.txt", "x");

        rebuild(tmp.path(), &default_config()).unwrap();
        let out = tmp.path().join("output");
        assert!(out.join("img/logo.svg").is_file());
        assert!(out.join("blog/a/photo.jpg").is_file());
        assert!(!out.join("index.html.template").exists());
        assert!(!out.join("blog/a/index.yaml").exists());
        assert!(!out.join("partials").exists());
        assert!(!out.join("drafts").exists());
        assert!(!out.join("static").exists());
        assert!(!out.join("output").exists());
        assert!(!out.join(".temingoignore").exists());
    }

    #[test]
    fn failed_render_leaves_previous_output() {
        let tmp = site_fixture();
        write_file(tmp.path(), "index.html.template", "good");
        rebuild(tmp.path(), &default_config()).unwrap();

        write_file(tmp.path(), "index.html.template", "{{ include('missing', {}) }}");
        let result = rebuild(tmp.path(), &default_config());
        assert!(matches!(result, Err(BuildError::Site(_))));
        assert_eq!(read(tmp.path(), "output/index.html"), "good");
    }

    #[test]
    fn invalid_config_fails_before_touching_output() {
        let tmp = site_fixture();
        write_file(tmp.path(), "output/keep.html", "keep");
        fs::remove_dir_all(tmp.path().join("partials")).unwrap();

        let result = rebuild(tmp.path(), &default_config());
        assert!(matches!(result, Err(BuildError::Config(_))));
        assert!(tmp.path().join("output/keep.html").exists());
    }

    #[test]
    fn clear_dir_keeps_directory() {
        let tmp = site_fixture();
        write_file(tmp.path(), "output/a/b.txt", "x");
        clear_dir(&tmp.path().join("output")).unwrap();
        assert!(fs::read_dir(tmp.path().join("output")).unwrap().next().is_none());
    }
}
