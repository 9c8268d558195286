//! # Temingo
//!
//! A template-driven static site generator. A directory of Jinja templates,
//! one or more YAML values files and a few directory conventions are all it
//! takes to build a site:
//!
//! ```text
//! .
//! ├── temingo.toml                 # optional settings
//! ├── values.yaml                  # data available to every template
//! ├── .temingoignore               # gitignore-style exclusions
//! ├── partials/header.partial      # include-able fragments
//! ├── static/                      # copied verbatim to output/
//! ├── index.html.template          # → output/index.html
//! └── blog/
//!     ├── index.html.template      # → output/blog/index.html, uses list()
//!     ├── post.html.single.template
//!     ├── first-post/index.yaml    # → output/blog/first-post/post.html
//!     └── second-post/index.yaml   # → output/blog/second-post/post.html
//! ```
//!
//! # Build Cycle
//!
//! Every build, one-shot or triggered by a change in watch mode, does the
//! same work from scratch:
//!
//! ```text
//! 1. Render   templates + values  →  memory        (discover, merge, render)
//! 2. Publish  memory              →  output/       (clear, copy, write)
//! ```
//!
//! Nothing is rebuilt incrementally. Because the whole site is rendered
//! before the output directory is touched, a template or data error leaves
//! the last good output in place.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | Settings: stock defaults, `temingo.toml`, command-line overlay, validation |
//! | [`naming`] | Site-path conventions: URL-safe validator, joining, breadcrumbs |
//! | [`filter`] | `.temingoignore` and call-specific exclusion patterns |
//! | [`discover`] | Finds templates and partials by extension |
//! | [`values`] | Loads and deep-merges YAML values; per-render overlay views |
//! | [`list`] | List objects from `*/index.yaml` and the per-cycle list cache |
//! | [`render`] | Template engine setup and the template function library |
//! | [`site`] | Renders pages and single views into memory |
//! | [`rebuild`] | One complete cycle: render, clear output, copy, write |
//! | [`watch`] | Rebuild on file changes |
//! | [`types`] | Records shared between stages |
//! | [`output`] | CLI summaries for build and check |
//!
//! # Design Decisions
//!
//! ## Site Paths Are URL Paths
//!
//! Template paths, list items and single-view items all become public URLs.
//! They are validated against `^[a-z0-9-_./]+$` and rejected rather than
//! escaped, so what is on disk is exactly what ends up in the address bar.
//!
//! ## Cycle-Owned State
//!
//! The merged values and the list cache live for exactly one cycle. Each
//! render reads the shared values through an overlay that adds its own keys
//! (`breadcrumbs`, `Item`, `ItemPath`), so one render can never see what
//! another injected, and a later cycle never sees stale list results.

pub mod config;
pub mod discover;
pub mod filter;
pub mod list;
pub mod naming;
pub mod output;
pub mod rebuild;
pub mod render;
pub mod site;
pub mod types;
pub mod values;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;
