//! Path exclusion for discovery and copying.
//!
//! Exclusions come from two sources that are always combined as a union:
//!
//! - the **persistent** ignore file (`.temingoignore` by default), plus the
//!   implicit entries: the ignore file itself, the settings file, the output
//!   directory and the static directory
//! - **transient** patterns supplied by the caller for one call, e.g.
//!   `**/*.single.template` while discovering normal templates
//!
//! ## Pattern syntax
//!
//! One gitignore-style pattern per line, matched against paths relative to
//! the working directory:
//!
//! ```text
//! # comment
//! node_modules        # no slash: matches that name at any depth
//! /drafts             # leading slash: anchored at the working directory
//! docs/internal       # inner slash: anchored as well
//! **/*.bak            # ** spans any number of directories
//! build/              # trailing slash is accepted and ignored
//! ```
//!
//! A pattern matching a directory also excludes everything below it.
//! Negated patterns (`!keep.me`) are skipped with a warning: a later line
//! must never re-include something an earlier line excluded.

use crate::config::SiteConfig;
use crate::naming::clean_dir;
use glob::{MatchOptions, Pattern, PatternError};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("cannot read ignore file {path}: {source}")]
    IgnoreFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid exclusion pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: PatternError,
    },
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// One compiled exclusion line.
#[derive(Debug, Clone)]
struct ExclusionPattern {
    source: String,
    pattern: Pattern,
    /// For `dir/**`, a pattern for `dir` itself.
    dir_pattern: Option<Pattern>,
    anchored: bool,
}

impl ExclusionPattern {
    /// Parse a single line. Returns `Ok(None)` for blanks, comments and
    /// unsupported negations.
    fn parse(line: &str) -> Result<Option<Self>, FilterError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        if line.starts_with('!') {
            warn!("Negated exclusion pattern '{line}' is not supported and was skipped.");
            return Ok(None);
        }

        let trimmed = line.trim_end_matches('/');
        let anchored = trimmed.starts_with('/') || trimmed.contains('/');
        let text = trimmed.trim_start_matches('/');
        if text.is_empty() {
            return Ok(None);
        }

        let compile = |p: &str| {
            Pattern::new(p).map_err(|source| FilterError::Pattern {
                pattern: line.to_string(),
                source,
            })
        };
        let dir_pattern = match text.strip_suffix("/**") {
            Some(dir) if !dir.is_empty() => Some(compile(dir)?),
            _ => None,
        };

        Ok(Some(Self {
            source: line.to_string(),
            pattern: compile(text)?,
            dir_pattern,
            anchored,
        }))
    }

    fn matches(&self, path: &str) -> bool {
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        if self.anchored {
            // Any ancestor (or the path itself) matching excludes the path.
            (1..=components.len()).any(|end| {
                let prefix = components[..end].join("/");
                self.pattern.matches_with(&prefix, MATCH_OPTIONS)
                    || self
                        .dir_pattern
                        .as_ref()
                        .is_some_and(|p| p.matches_with(&prefix, MATCH_OPTIONS))
            })
        } else {
            components
                .iter()
                .any(|c| self.pattern.matches_with(c, MATCH_OPTIONS))
        }
    }
}

fn compile_all<'a>(
    lines: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<ExclusionPattern>, FilterError> {
    let mut patterns = Vec::new();
    for line in lines {
        if let Some(pattern) = ExclusionPattern::parse(line)? {
            patterns.push(pattern);
        }
    }
    Ok(patterns)
}

/// The persistent exclusion rules for one working directory.
#[derive(Debug, Clone)]
pub struct ExclusionSet {
    ignore_file: String,
    persistent: Vec<ExclusionPattern>,
    implicit: Vec<ExclusionPattern>,
}

impl ExclusionSet {
    /// Read the ignore file and add the implicit exclusions.
    ///
    /// An unreadable ignore file is an error: the generator must know its own
    /// exclusion rules before touching anything.
    pub fn load(root: &Path, config: &SiteConfig) -> Result<Self, FilterError> {
        let path = root.join(&config.ignore_file);
        let content = fs::read_to_string(&path)
            .map_err(|source| FilterError::IgnoreFile { path, source })?;
        Self::from_lines(content.lines(), config)
    }

    /// Build from in-memory ignore-file lines.
    pub fn from_lines<'a>(
        lines: impl IntoIterator<Item = &'a str>,
        config: &SiteConfig,
    ) -> Result<Self, FilterError> {
        let implicit_lines = [
            format!("/{}", clean_dir(&config.ignore_file)),
            format!("/{}", clean_dir(&config.settings_file)),
            format!("/{}/**", clean_dir(&config.output_dir)),
            format!("/{}/**", clean_dir(&config.static_dir)),
        ];
        Ok(Self {
            ignore_file: config.ignore_file.clone(),
            persistent: compile_all(lines)?,
            implicit: compile_all(implicit_lines.iter().map(String::as_str))?,
        })
    }

    /// Whether `path` (relative to the working directory) is excluded by the
    /// persistent rules, the implicit rules, or any of `extra`.
    pub fn is_excluded(&self, path: &str, extra: &[String]) -> Result<bool, FilterError> {
        let path = path.trim_start_matches("./").trim_start_matches('/');
        if let Some(hit) = self.persistent.iter().find(|p| p.matches(path)) {
            debug!(
                "Exclusion triggered at '/{path}' by '{}', specified in '{}'.",
                hit.source, self.ignore_file
            );
            return Ok(true);
        }

        let transient = compile_all(extra.iter().map(String::as_str))?;
        if let Some(hit) = self
            .implicit
            .iter()
            .chain(transient.iter())
            .find(|p| p.matches(path))
        {
            debug!(
                "Exclusion triggered at '/{path}' by '{}', specified internally.",
                hit.source
            );
            return Ok(true);
        }
        Ok(false)
    }
}
