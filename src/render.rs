//! Template rendering.
//!
//! A [`Renderer`] compiles one named template together with every partial
//! into a single [`minijinja::Environment`] and executes it against a data
//! value. Templates use Jinja syntax; partials are registered under their
//! path relative to the partials directory without the partial extension,
//! so `partials/nav/menu.partial` is reachable as `"nav/menu"` from
//! `{% include %}`, `{% import %}` and the `include()` function.
//!
//! ## Function library
//!
//! | Function | Result |
//! |----------|--------|
//! | `safeHTML(s)` | `s` inserted without escaping |
//! | `safeCSS(s)` | `s` inserted without escaping (style contexts) |
//! | `addPercentage(a, b)` | `"10%"`, `"5%"` → `"15%"` |
//! | `include(name, data)` | output of template `name` rendered with `data` |
//! | `list(dirs...)` | list objects of the given directories, or of the template's own directory |
//! | `urlize(s)` | lowercase, spaces to `_`, RFC 3986 normalized |
//! | `capitalize(s)` | first letter of every word uppercased |
//!
//! The engine's builtin filters (`upper`, `default`, `join`, `tojson`, ...)
//! are available as well.
//!
//! ## Escaping
//!
//! Auto-escaping is chosen from the output file name: `index.html` escapes
//! HTML, `feed.json` escapes JSON, `style.css` is emitted raw.

use crate::list::ListCache;
use crate::naming::{parent_dir, strip_extension};
use crate::types::TemplateRecord;
use minijinja::value::{Rest, Value};
use minijinja::{Environment, Error, ErrorKind, State, UndefinedBehavior};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("template '{name}' failed to compile: {source:#}")]
    Compile {
        name: String,
        source: minijinja::Error,
    },
    #[error("template '{name}' failed to render: {source:#}")]
    Execute {
        name: String,
        source: minijinja::Error,
    },
}

/// Partial templates, keyed by the name templates refer to them with.
#[derive(Debug, Clone, Default)]
pub struct PartialSet {
    partials: Vec<(String, String)>,
}

impl PartialSet {
    pub fn new(records: Vec<TemplateRecord>, extension: &str) -> Self {
        let partials = records
            .into_iter()
            .map(|r| (strip_extension(&r.path, extension).to_string(), r.text))
            .collect();
        Self { partials }
    }

    pub fn len(&self) -> usize {
        self.partials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partials.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.partials.iter().map(|(name, _)| name.as_str())
    }
}

/// Where `list()` reads from and records to.
#[derive(Debug, Clone)]
pub struct ListScope {
    pub cache: Arc<ListCache>,
    /// Directory site paths are relative to (the input directory).
    pub site_root: PathBuf,
}

/// One compiled template plus its partials.
pub struct Renderer {
    env: Environment<'static>,
    name: String,
}

impl Renderer {
    /// Compile `source` under `name`.
    ///
    /// `output_name` is the file the result will be written to and decides
    /// the auto-escape mode. `list()` without arguments lists the directory
    /// containing `name`.
    pub fn compile(
        name: &str,
        source: &str,
        output_name: &str,
        partials: &PartialSet,
        lists: &ListScope,
    ) -> Result<Self, RenderError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.set_keep_trailing_newline(true);
        let escape = minijinja::default_auto_escape_callback(output_name);
        env.set_auto_escape_callback(move |_| escape.clone());

        register_functions(&mut env, name, lists);

        let compile_err = |source| RenderError::Compile {
            name: name.to_string(),
            source,
        };
        for (partial_name, text) in &partials.partials {
            env.add_template_owned(partial_name.clone(), text.clone())
                .map_err(compile_err)?;
        }
        env.add_template_owned(name.to_string(), source.to_string())
            .map_err(compile_err)?;

        Ok(Self {
            env,
            name: name.to_string(),
        })
    }

    /// Execute the compiled template against `data`.
    pub fn render(&self, data: Value) -> Result<Vec<u8>, RenderError> {
        let execute_err = |source| RenderError::Execute {
            name: self.name.clone(),
            source,
        };
        let template = self.env.get_template(&self.name).map_err(execute_err)?;
        let text = template.render(data).map_err(execute_err)?;
        Ok(text.into_bytes())
    }
}

fn register_functions(env: &mut Environment<'static>, name: &str, lists: &ListScope) {
    env.add_function("safeHTML", safe_markup);
    env.add_function("safeCSS", safe_markup);
    env.add_function("addPercentage", add_percentage);
    env.add_function("include", include);
    env.add_function("urlize", urlize);
    env.add_function("capitalize", capitalize);

    let cache = Arc::clone(&lists.cache);
    let site_root = lists.site_root.clone();
    let default_dir = parent_dir(name).to_string();
    env.add_function("list", move |dirs: Rest<String>| -> Result<Value, Error> {
        let dirs = if dirs.is_empty() {
            vec![default_dir.clone()]
        } else {
            dirs.0
        };
        let objects = cache.resolve(&site_root, &dirs).map_err(|e| {
            Error::new(ErrorKind::InvalidOperation, format!("list({dirs:?}) failed: {e}"))
                .with_source(e)
        })?;
        Ok(Value::from_serialize(&objects))
    });
}

fn safe_markup(value: String) -> Value {
    Value::from_safe_string(value)
}

/// Render another template of the same compiled set with explicit data.
fn include(state: &State, name: &str, data: Option<Value>) -> Result<Value, Error> {
    let template = state.env().get_template(name)?;
    let text = template.render(data.unwrap_or_default())?;
    Ok(Value::from_safe_string(text))
}

fn parse_percentage(value: &str) -> Result<i64, Error> {
    value
        .strip_suffix('%')
        .and_then(|n| n.trim().parse::<i64>().ok())
        .ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("addPercentage: '{value}' is not of the form <integer>%"),
            )
        })
}

/// `"10%"` + `"5%"` → `"15%"`.
pub fn add_percentage(a: &str, b: &str) -> Result<String, Error> {
    let sum = parse_percentage(a)?
        .checked_add(parse_percentage(b)?)
        .ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("addPercentage: '{a}' + '{b}' is out of range"),
            )
        })?;
    Ok(format!("{sum}%"))
}

/// Lowercase URL slug: spaces become `_`, then the string is normalized.
pub fn urlize(value: &str) -> String {
    let slug = normalize_uri(&value.replace(' ', "_")).to_lowercase();
    log::debug!("Urlized '{value}' to '{slug}'.");
    slug
}

fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
}

fn is_reserved(c: char) -> bool {
    matches!(
        c,
        ':' | '/' | '?' | '#' | '[' | ']' | '@' | '!' | '$' | '&' | '\'' | '(' | ')' | '*' | '+'
            | ',' | ';' | '='
    )
}

/// RFC 3986 normalization of a URI reference:
///
/// - escapes of unreserved characters are decoded (`%7E` → `~`)
/// - remaining escapes are uppercased (`%2f` → `%2F`)
/// - characters that are not allowed in a URI are percent-encoded
/// - an empty query separator is dropped (`a?` → `a`)
///
/// A `%` that does not start a valid escape is encoded like any other
/// disallowed character (`50%` → `50%25`) instead of failing.
fn normalize_uri(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let escape = (c == '%')
            .then(|| chars.get(i + 1..i + 3))
            .flatten()
            .filter(|hex| hex.iter().all(char::is_ascii_hexdigit))
            .map(|hex| hex.iter().collect::<String>());
        if let Some(hex) = escape {
            match u8::from_str_radix(&hex, 16).map(char::from) {
                Ok(decoded) if is_unreserved(decoded) => out.push(decoded),
                _ => {
                    out.push('%');
                    out.push_str(&hex.to_ascii_uppercase());
                }
            }
            i += 3;
            continue;
        }
        if is_unreserved(c) || is_reserved(c) {
            out.push(c);
        } else {
            out.push_str(&urlencoding::encode(c.encode_utf8(&mut [0; 4])));
        }
        i += 1;
    }
    if out.ends_with('?') {
        out.pop();
    }
    out
}

/// Uppercase the first letter of every word.
///
/// A word starts after any character that is not a letter, digit or `_`.
pub fn capitalize(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;
    for c in value.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !(c.is_alphanumeric() || c == '_');
    }
    log::debug!("Capitalized '{value}' to '{out}'.");
    out
}
