//! CLI output formatting for build and check.
//!
//! Output is **template-centric**: each line starts with the template that
//! produced something, followed by what it produced. Single views are grouped
//! under their template with one indented line per item.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! Pages
//! 001 index.html.template → index.html
//! 002 blog/index.html.template → blog/index.html
//!
//! Single views
//! blog/post.html.single.template
//!     001 blog/p1 → blog/p1/post.html
//!     002 blog/p2 → blog/p2/post.html
//!
//! Lists
//!     blog (2 items)
//!
//! Built 2 pages, 2 single views, copied 3 files
//! ```
//!
//! ## Check
//!
//! ```text
//! Templates
//! 001 index.html.template
//!
//! Single views
//! 001 blog/post.html.single.template
//!
//! Partials
//! 001 header
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::naming::strip_extension;
use crate::site::Inventory;
use crate::types::{BuildReport, RenderSource, RenderedFile, TemplateRecord};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{n} {}", if n == 1 { one } else { many })
}

fn output_of(file: &RenderedFile) -> String {
    file.output.display().to_string()
}

/// Format the summary of one build cycle.
pub fn format_build_output(report: &BuildReport) -> Vec<String> {
    let mut lines = Vec::new();

    let pages: Vec<&RenderedFile> = report
        .files
        .iter()
        .filter(|f| f.source == RenderSource::Page)
        .collect();
    if !pages.is_empty() {
        lines.push("Pages".to_string());
        for (i, file) in pages.iter().enumerate() {
            lines.push(format!(
                "{} {} → {}",
                format_index(i + 1),
                file.template,
                output_of(file)
            ));
        }
    }

    // Files of one single-view template are contiguous.
    let mut current_template: Option<&str> = None;
    let mut item_index = 0;
    for file in &report.files {
        let RenderSource::SingleView { item } = &file.source else {
            continue;
        };
        if current_template != Some(file.template.as_str()) {
            if current_template.is_none() {
                if !lines.is_empty() {
                    lines.push(String::new());
                }
                lines.push("Single views".to_string());
            }
            lines.push(file.template.clone());
            current_template = Some(file.template.as_str());
            item_index = 0;
        }
        item_index += 1;
        lines.push(format!(
            "{}{} {} → {}",
            indent(1),
            format_index(item_index),
            item,
            output_of(file)
        ));
    }

    if !report.lists.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Lists".to_string());
        for (dir, count) in &report.lists {
            let dir = if dir.is_empty() { "/" } else { dir.as_str() };
            lines.push(format!("{}{} ({})", indent(1), dir, plural(*count, "item", "items")));
        }
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "Built {}, {}, copied {}",
        plural(report.page_count(), "page", "pages"),
        plural(report.single_view_count(), "single view", "single views"),
        plural(report.copied, "file", "files"),
    ));
    lines
}

pub fn print_build_output(report: &BuildReport) {
    for line in format_build_output(report) {
        println!("{}", line);
    }
}

fn section(lines: &mut Vec<String>, title: &str, names: &[String]) {
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(title.to_string());
    if names.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
    }
    for (i, name) in names.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), name));
    }
}

fn paths(records: &[TemplateRecord]) -> Vec<String> {
    records.iter().map(|r| r.path.clone()).collect()
}

/// Format the inventory found by `check`.
///
/// Partials are listed by the name templates include them with.
pub fn format_check_output(inventory: &Inventory, partial_extension: &str) -> Vec<String> {
    let mut lines = Vec::new();
    section(&mut lines, "Templates", &paths(&inventory.templates));
    section(&mut lines, "Single views", &paths(&inventory.single_views));
    let partials: Vec<String> = inventory
        .partials
        .iter()
        .map(|r| strip_extension(&r.path, partial_extension).to_string())
        .collect();
    section(&mut lines, "Partials", &partials);
    lines
}

pub fn print_check_output(inventory: &Inventory, partial_extension: &str) {
    for line in format_check_output(inventory, partial_extension) {
        println!("{}", line);
    }
}
