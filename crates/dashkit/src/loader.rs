//! Definition loader: turns a folder tree of SQL files into artifact groups.
//!
//! ```text
//! root/
//!   assessment/            <- step
//!     main/                <- dashboard
//!       00_count.sql
//!       01_readiness.sql
//! ```
//!
//! Every second-level folder becomes one [`ArtifactGroup`]. Every `*.sql`
//! file inside it becomes one [`QueryDefinition`] and must carry both magic
//! comments:
//!
//! ```sql
//! -- viz type=counter, name=Tables, counter_label=Tables, value_column=count
//! -- widget title=Tables, row=0, col=0, size_x=1, size_y=3
//! SELECT count(*) AS count FROM tables
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::types::{ArtifactGroup, GroupRef, QueryDefinition};

/// Line prefix carrying visualization attributes.
pub const VIZ_MARKER: &str = "-- viz ";
/// Line prefix carrying widget attributes.
pub const WIDGET_MARKER: &str = "-- widget ";

/// Rewrites query text before attributes are extracted.
pub type Transform = Box<dyn Fn(&str) -> String>;

/// How definitions are turned into remote names and text.
#[derive(Default)]
pub struct LoaderOptions {
    /// Prepended to every dashboard name.
    pub name_prefix: String,
    /// Optional rewrite of the raw file contents.
    pub transform: Option<Transform>,
}

impl LoaderOptions {
    pub fn new(name_prefix: impl Into<String>) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            transform: None,
        }
    }

    #[must_use]
    pub fn with_transform(mut self, transform: impl Fn(&str) -> String + 'static) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    /// Remote display name for a dashboard folder.
    pub fn dashboard_name(&self, step: &str, dashboard: &str) -> String {
        let name = format!("{} ({})", title_case(step), title_case(dashboard));
        if self.name_prefix.is_empty() {
            name
        } else {
            format!("{} {}", self.name_prefix, name)
        }
    }
}

/// Load every artifact group under `root`, in lexicographic folder order.
pub fn load_groups(root: &Path, options: &LoaderOptions) -> Result<Vec<ArtifactGroup>> {
    if !root.is_dir() {
        return Err(Error::io(
            root,
            io::Error::new(io::ErrorKind::NotFound, "definition folder does not exist"),
        ));
    }

    let mut groups = Vec::new();
    for step in subfolders(root)? {
        let step_name = entry_name(&step);
        for dashboard in subfolders(&step)? {
            let dashboard_name = entry_name(&dashboard);
            let reference = GroupRef::from_folders(&step_name, &dashboard_name);
            let queries = load_queries(&dashboard, &reference, options)?;
            log::debug!(
                "Loaded {} queries for {} from {}",
                queries.len(),
                reference,
                dashboard.display()
            );
            groups.push(ArtifactGroup {
                dashboard_name: options.dashboard_name(&step_name, &dashboard_name),
                reference,
                queries,
            });
        }
    }
    Ok(groups)
}

fn load_queries(
    folder: &Path,
    group: &GroupRef,
    options: &LoaderOptions,
) -> Result<Vec<QueryDefinition>> {
    let mut queries = Vec::new();
    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| Error::io(folder, io::Error::from(e)))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "sql") {
            continue;
        }
        let raw = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let text = match &options.transform {
            Some(transform) => transform(&raw),
            None => raw,
        };
        queries.push(parse_definition(path, group.clone(), text)?);
    }
    Ok(queries)
}

/// Build a query definition from file text, extracting both magic comments.
pub fn parse_definition(
    path: &Path,
    group: GroupRef,
    query_text: String,
) -> Result<QueryDefinition> {
    let viz_attrs = parse_magic_comment(path, &query_text, VIZ_MARKER)?;
    let widget_attrs = parse_magic_comment(path, &query_text, WIDGET_MARKER)?;
    Ok(QueryDefinition {
        group,
        name: entry_name(path),
        query_text,
        viz_attrs,
        widget_attrs,
    })
}

/// Extract the `key=value` pairs of the first line starting with `marker`.
pub fn parse_magic_comment(
    path: &Path,
    text: &str,
    marker: &'static str,
) -> Result<HashMap<String, String>> {
    let line = text
        .lines()
        .find_map(|line| line.strip_prefix(marker))
        .ok_or_else(|| Error::MissingMagicComment {
            path: path.to_path_buf(),
            marker,
        })?;

    let mut attrs = HashMap::new();
    for part in line.trim_end().split(", ") {
        let (key, value) = part.split_once('=').ok_or_else(|| Error::MalformedAttribute {
            path: path.to_path_buf(),
            attribute: part.to_string(),
        })?;
        attrs.insert(key.to_string(), value.to_string());
    }
    Ok(attrs)
}

fn subfolders(parent: &Path) -> Result<Vec<PathBuf>> {
    let mut folders = Vec::new();
    for entry in WalkDir::new(parent)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| Error::io(parent, io::Error::from(e)))?;
        if entry.file_type().is_dir() {
            folders.push(entry.into_path());
        }
    }
    Ok(folders)
}

fn entry_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Upper-case every letter that follows a non-letter, lower-case the rest.
///
/// Digits end a word, so `2nd_run` becomes `2Nd_Run`.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}
