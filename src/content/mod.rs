//! Blog post discovery and loading.
//!
//! Posts are Markdown files (with YAML frontmatter) under the posts directory
//! and Jupyter notebooks under the notebooks directory.

mod detection;
mod frontmatter;

use chrono::NaiveDate;
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::ActionConfig;
use crate::error::ActionError;

pub use detection::{detect_changed_posts, filter_post_paths, get_all_posts};
pub use frontmatter::{parse_frontmatter, parse_notebook_header, Frontmatter, StringOrList};

/// A blog post ready to be turned into a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    /// Path relative to the repository root.
    pub file_path: PathBuf,
    pub title: String,
    /// Body text without the frontmatter block.
    pub content: String,
    pub frontmatter: Frontmatter,
    pub canonical_url: Option<String>,
    pub categories: Vec<String>,
    pub summary: Option<String>,
    pub publish: bool,
    pub auto_post: bool,
    pub slug: String,
    pub date: Option<NaiveDate>,
}

impl BlogPost {
    /// Builds a post from raw file text.
    ///
    /// Notebooks (`.ipynb`) are flattened to Markdown first; every other file
    /// is treated as Markdown with optional frontmatter.
    ///
    /// # Parameters
    ///
    /// - `relative_path`: Path of the post relative to the repository root
    /// - `raw`: The file contents
    /// - `config`: Supplies `site_url` for canonical URLs
    pub fn from_source(
        relative_path: &Path,
        raw: &str,
        config: &ActionConfig,
    ) -> Result<Self, ActionError> {
        let is_notebook = relative_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("ipynb"))
            .unwrap_or(false);

        let (frontmatter, content) = if is_notebook {
            parse_notebook(raw)?
        } else {
            parse_frontmatter(raw)?
        };

        let (file_date, slug) = slug_from_path(relative_path);
        let date = frontmatter
            .date
            .as_deref()
            .and_then(parse_post_date)
            .or(file_date);

        let title = frontmatter
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| first_heading(&content))
            .unwrap_or_else(|| title_from_slug(&slug));

        let canonical_url = frontmatter.canonical_url.clone().or_else(|| {
            let site = config.site_url.as_deref()?.trim_end_matches('/');
            match (&frontmatter.permalink, date) {
                (Some(permalink), _) => {
                    Some(format!("{}/{}", site, permalink.trim_start_matches('/')))
                }
                (None, Some(date)) => Some(format!(
                    "{}/{}/{}.html",
                    site,
                    date.format("%Y/%m/%d"),
                    slug
                )),
                (None, None) => None,
            }
        });

        debug!(
            "Loaded post '{}' ({}), publish={:?}, auto_post={:?}",
            title,
            relative_path.display(),
            frontmatter.publish,
            frontmatter.auto_post
        );

        Ok(BlogPost {
            file_path: relative_path.to_path_buf(),
            title,
            categories: frontmatter.categories(),
            summary: frontmatter.summary(),
            publish: frontmatter.publish.unwrap_or(true),
            auto_post: frontmatter.auto_post.unwrap_or(false),
            canonical_url,
            content,
            frontmatter,
            slug,
            date,
        })
    }

    /// Number of whitespace separated words in the body.
    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

/// Reads and parses the post at `repo_root/relative_path`.
pub async fn load_post(
    repo_root: &Path,
    relative_path: &Path,
    config: &ActionConfig,
) -> Result<BlogPost, ActionError> {
    let full_path = repo_root.join(relative_path);
    let raw = tokio::fs::read_to_string(&full_path)
        .await
        .map_err(|e| ActionError::file(&full_path, e))?;
    BlogPost::from_source(relative_path, &raw, config)
}

/// Flattens a notebook to Markdown.
///
/// The first non-empty cell, when markdown or raw, may hold the frontmatter, either as a YAML
/// `---` block or in the fastpages header layout. Code cells are emitted as
/// fenced blocks tagged with the kernel language.
fn parse_notebook(raw: &str) -> Result<(Frontmatter, String), ActionError> {
    let notebook: serde_json::Value = serde_json::from_str(raw)?;
    let cells = notebook
        .get("cells")
        .and_then(|c| c.as_array())
        .ok_or_else(|| ActionError::Content("notebook has no cells array".to_string()))?;

    let language = notebook
        .pointer("/metadata/kernelspec/language")
        .or_else(|| notebook.pointer("/metadata/language_info/name"))
        .and_then(|v| v.as_str())
        .unwrap_or("python")
        .to_string();

    let mut frontmatter = Frontmatter::default();
    let mut parts = Vec::new();

    let mut seen_content = false;
    for cell in cells {
        let cell_type = cell.get("cell_type").and_then(|t| t.as_str()).unwrap_or("");
        let source = cell_source(cell);
        if source.trim().is_empty() {
            continue;
        }

        // only the first non-empty cell can carry the header
        let first = !std::mem::replace(&mut seen_content, true);
        if first && (cell_type == "markdown" || cell_type == "raw") {
            if source.trim_start().starts_with("---") {
                let (fm, rest) = parse_frontmatter(source.trim_start())?;
                frontmatter = fm;
                if !rest.trim().is_empty() {
                    parts.push(rest);
                }
                continue;
            }
            if let Some(fm) = parse_notebook_header(&source) {
                frontmatter = fm;
                continue;
            }
        }

        match cell_type {
            "markdown" => parts.push(source),
            "code" => parts.push(format!("```{}\n{}\n```", language, source.trim_end())),
            _ => {}
        }
    }

    Ok((frontmatter, parts.join("\n\n")))
}

/// Cell source, which nbformat stores either as one string or a list of lines.
fn cell_source(cell: &serde_json::Value) -> String {
    match cell.get("source") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Array(lines)) => {
            lines.iter().filter_map(|l| l.as_str()).collect::<String>()
        }
        _ => String::new(),
    }
}

/// Splits `2024-03-01-my-post.md` into its date and slug `my-post`.
pub fn slug_from_path(path: &Path) -> (Option<NaiveDate>, String) {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("post");

    let (date, rest) = match (stem.get(..10), stem.get(10..11), stem.get(11..)) {
        (Some(head), Some("-"), Some(rest)) if !rest.is_empty() => {
            match NaiveDate::parse_from_str(head, "%Y-%m-%d") {
                Ok(date) => (Some(date), rest),
                Err(_) => (None, stem),
            }
        }
        _ => (None, stem),
    };

    (date, slugify(rest))
}

/// Lowercases and replaces every run of non-alphanumeric characters with `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "post".to_string()
    } else {
        slug
    }
}

fn parse_post_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let head = value.get(..10)?;
    match NaiveDate::parse_from_str(head, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(e) => {
            warn!("Ignoring unparseable post date '{}': {}", value, e);
            None
        }
    }
}

fn first_heading(content: &str) -> Option<String> {
    let re = Regex::new(r"(?m)^#\s+(.+?)\s*$").ok()?;
    re.captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn title_from_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
