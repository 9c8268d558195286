//! Site configuration module.
//!
//! Handles loading, merging and validating the generator's settings. Values
//! are layered, later layers overriding earlier ones key by key:
//!
//! ```text
//! stock defaults  →  temingo.toml (optional)  →  command-line flags
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! values_files = ["values.yaml"]       # Deep-merged in order, later wins
//! input_dir = "."                      # Template tree (site root)
//! partials_dir = "partials"            # Partial templates
//! output_dir = "output"                # Wiped and rebuilt every cycle
//! static_dir = "static"                # Copied verbatim into output
//! template_extension = ".template"
//! single_template_extension = ".single.template"
//! partial_extension = ".partial"
//! ignore_file = ".temingoignore"
//! ```
//!
//! Unknown keys are rejected to catch typos early. Every path is relative to
//! the working directory and checked by [`SiteConfig::validate`] before any
//! rendering starts.

use crate::naming::{clean_dir, to_site_path};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default name of the optional project config file.
pub const CONFIG_FILENAME: &str = "temingo.toml";

/// Name of the per-item data file that marks a directory as a list item.
pub const SENTINEL_FILENAME: &str = "index.yaml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Generator settings.
///
/// All fields have defaults; a `temingo.toml` only needs the keys it wants
/// to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Values files, deep-merged in order with later files overriding.
    pub values_files: Vec<String>,
    /// Template tree; also the root that site paths are relative to.
    pub input_dir: String,
    /// Partial templates available to every render.
    pub partials_dir: String,
    /// Destination directory. Its contents are replaced every cycle.
    pub output_dir: String,
    /// Copied into the output root without filtering.
    pub static_dir: String,
    pub template_extension: String,
    /// Always excluded from normal template discovery.
    pub single_template_extension: String,
    pub partial_extension: String,
    /// gitignore-style exclusion file.
    pub ignore_file: String,
    /// The settings file these values were loaded from; never published.
    #[serde(skip)]
    pub settings_file: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            values_files: vec!["values.yaml".to_string()],
            input_dir: ".".to_string(),
            partials_dir: "partials".to_string(),
            output_dir: "output".to_string(),
            static_dir: "static".to_string(),
            template_extension: ".template".to_string(),
            single_template_extension: ".single.template".to_string(),
            partial_extension: ".partial".to_string(),
            ignore_file: ".temingoignore".to_string(),
            settings_file: CONFIG_FILENAME.to_string(),
        }
    }
}

impl SiteConfig {
    /// Normalize every path so generated exclusion patterns are stable.
    ///
    /// `./partials/` and `partials` both become `partials`; the working
    /// directory itself becomes `.`.
    pub fn cleaned(mut self) -> Self {
        let clean = |p: &str| {
            let c = clean_dir(p);
            if c.is_empty() {
                ".".to_string()
            } else if p.starts_with('/') {
                format!("/{c}")
            } else {
                c
            }
        };
        self.values_files = self.values_files.iter().map(|p| clean(p)).collect();
        self.input_dir = clean(&self.input_dir);
        self.partials_dir = clean(&self.partials_dir);
        self.output_dir = clean(&self.output_dir);
        self.static_dir = clean(&self.static_dir);
        self.ignore_file = clean(&self.ignore_file);
        self.settings_file = clean(&self.settings_file);
        self
    }

    /// Check that every configured path exists with the expected type.
    ///
    /// Runs before any rendering so a typo never leaves a half-built site.
    pub fn validate(&self, root: &Path) -> Result<(), ConfigError> {
        if self.values_files.is_empty() {
            return Err(ConfigError::Validation(
                "at least one values file is required".into(),
            ));
        }
        for values_file in &self.values_files {
            expect_file(root, values_file, "Values file")?;
        }
        expect_dir(root, &self.input_dir, "input-directory")?;
        expect_dir(root, &self.partials_dir, "partial-files-directory")?;
        expect_dir(root, &self.output_dir, "output-directory")?;
        expect_dir(root, &self.static_dir, "static-files-directory")?;
        expect_file(root, &self.ignore_file, "Ignore file")?;

        for (name, ext) in [
            ("template_extension", &self.template_extension),
            ("single_template_extension", &self.single_template_extension),
            ("partial_extension", &self.partial_extension),
        ] {
            if ext.is_empty() {
                return Err(ConfigError::Validation(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }
}

fn expect_file(root: &Path, path: &str, what: &str) -> Result<(), ConfigError> {
    let full = root.join(path);
    match fs::metadata(&full) {
        Err(_) => Err(ConfigError::Validation(format!("{what} does not exist: {path}"))),
        Ok(meta) if meta.is_dir() => Err(ConfigError::Validation(format!(
            "{what} is not a file (but a directory): {path}"
        ))),
        Ok(_) => Ok(()),
    }
}

fn expect_dir(root: &Path, path: &str, what: &str) -> Result<(), ConfigError> {
    let full = root.join(path);
    match fs::metadata(&full) {
        Err(_) => Err(ConfigError::Validation(format!(
            "Given {what} does not exist: {path}"
        ))),
        Ok(meta) if !meta.is_dir() => Err(ConfigError::Validation(format!(
            "Given {what} is not a directory: {path}"
        ))),
        Ok(_) => Ok(()),
    }
}

/// Settings supplied on the command line. `None` leaves the lower layer alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values_files: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partials_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_extension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub single_template_extension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_extension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_file: Option<String>,
}

impl ConfigOverrides {
    fn to_value(&self) -> Result<toml::Value, ConfigError> {
        Ok(toml::Value::try_from(self)?)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(SiteConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge the optional file layer and the command-line layer onto the stock
/// defaults, then deserialize and clean.
pub fn resolve_config(
    file: Option<toml::Value>,
    overrides: &ConfigOverrides,
) -> Result<SiteConfig, ConfigError> {
    let mut merged = stock_defaults_value()?;
    if let Some(file) = file {
        merged = merge_toml(merged, file);
    }
    merged = merge_toml(merged, overrides.to_value()?);
    let config: SiteConfig = merged.try_into()?;
    Ok(config.cleaned())
}

/// Load the effective configuration for a working directory.
///
/// `config_path` is resolved against `root`; a missing file simply means
/// "stock defaults plus flags".
pub fn load_config(
    root: &Path,
    config_path: &Path,
    overrides: &ConfigOverrides,
) -> Result<SiteConfig, ConfigError> {
    let file = load_raw_config(&root.join(config_path))?;
    let config = SiteConfig {
        settings_file: to_site_path(config_path),
        ..resolve_config(file, overrides)?
    };
    Ok(config.cleaned())
}

/// Returns a fully-commented stock `temingo.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Temingo Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Command-line flags override this file.
# Unknown keys will cause an error.

# Values files, deep-merged in the order given. Later files override earlier
# ones; nested mappings merge key by key, everything else is replaced.
values_files = ["values.yaml"]

# Directory holding the templates. Site paths (breadcrumbs, list objects,
# single-view items) are relative to it.
input_dir = "."

# Directory holding partial templates. Each partial is available to every
# template under its path without the partial extension.
partials_dir = "partials"

# Destination directory. Its contents are deleted at the start of every build.
output_dir = "output"

# Directory copied verbatim into the output root.
static_dir = "static"

# ---------------------------------------------------------------------------
# Extensions
# ---------------------------------------------------------------------------
# Full-page templates: index.html.template -> index.html
template_extension = ".template"

# Single-view templates, rendered once per sibling item directory that holds
# an index.yaml: post.html.single.template -> <item>/post.html
single_template_extension = ".single.template"

partial_extension = ".partial"

# gitignore-style exclusion file, one pattern per line, relative to the
# working directory. `**` matches any depth.
ignore_file = ".temingoignore"
"##
}
