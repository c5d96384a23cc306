//! Frontmatter extraction for Markdown posts and Jupyter notebooks.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::error::ActionError;

/// A frontmatter value that may be written either as a list or as a
/// space/comma separated string (`categories: [rust, cli]` or `categories: rust cli`).
///
/// Scalars of any type are accepted, so `categories: [python, 3]` keeps `3`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    List(Vec<serde_yaml::Value>),
    Single(serde_yaml::Value),
}

impl StringOrList {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            StringOrList::List(items) => items
                .iter()
                .filter_map(scalar_to_string)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            StringOrList::Single(value) => scalar_to_string(value)
                .unwrap_or_default()
                .split(|c: char| c == ',' || c.is_whitespace())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

/// Text of a YAML scalar; `None` for null, sequences and mappings.
fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        _ => None,
    }
}

/// Reads any scalar as text, so `title: 2024` or `date: 20240301` still parse.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_to_string))
}

/// Post metadata. Unknown keys are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frontmatter {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: Option<String>,
    #[serde(default)]
    pub publish: Option<bool>,
    #[serde(default)]
    pub auto_post: Option<bool>,
    #[serde(default)]
    pub categories: Option<StringOrList>,
    #[serde(default)]
    pub tags: Option<StringOrList>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default)]
    pub canonical_url: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Frontmatter {
    /// Parses a YAML mapping. Blank input gives an empty frontmatter.
    pub fn from_yaml(yaml: &str) -> Result<Self, ActionError> {
        if yaml.trim().is_empty() {
            return Ok(Frontmatter::default());
        }
        serde_yaml::from_str(yaml)
            .map_err(|e| ActionError::Content(format!("invalid frontmatter: {}", e)))
    }

    /// Categories and tags merged, without duplicates, in declaration order.
    pub fn categories(&self) -> Vec<String> {
        let mut all: Vec<String> = Vec::new();
        for source in [&self.categories, &self.tags].into_iter().flatten() {
            for item in source.to_vec() {
                if !all.contains(&item) {
                    all.push(item);
                }
            }
        }
        all
    }

    /// `summary`, falling back to `description`.
    pub fn summary(&self) -> Option<String> {
        self.summary
            .clone()
            .or_else(|| self.description.clone())
            .filter(|s| !s.trim().is_empty())
    }
}

/// Splits a Markdown document into its frontmatter and body.
///
/// The frontmatter block must start on the first line with `---` and end with a
/// line containing only `---` or `...`. Documents without a (closed) block have
/// an empty frontmatter and the whole text as body.
///
/// # Returns
///
/// - `Ok((Frontmatter, body))`: The parsed metadata and the remaining text
/// - `Err(ActionError::Content)`: If the block exists but is not valid YAML
pub fn parse_frontmatter(text: &str) -> Result<(Frontmatter, String), ActionError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text.split_inclusive('\n');

    match lines.next() {
        Some(first) if first.trim_end() == "---" => {}
        _ => return Ok((Frontmatter::default(), text.to_string())),
    }

    let mut yaml = String::new();
    let mut consumed = text.split_inclusive('\n').next().map_or(0, str::len);
    for line in lines {
        consumed += line.len();
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            let frontmatter = Frontmatter::from_yaml(&yaml)?;
            let body = text[consumed..].trim_start_matches(['\r', '\n']).to_string();
            return Ok((frontmatter, body));
        }
        yaml.push_str(line);
    }

    Ok((Frontmatter::default(), text.to_string()))
}

/// Parses the "fastpages" notebook header: a markdown cell of the form
///
/// ```text
/// # Title
/// > Summary sentence.
///
/// - toc: true
/// - categories: [jupyter, rust]
/// ```
///
/// Returns `None` when the cell does not follow that layout.
pub fn parse_notebook_header(cell: &str) -> Option<Frontmatter> {
    let mut title = None;
    let mut summary = None;
    let mut yaml = String::new();

    for line in cell.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("# ") {
            if title.is_none() {
                title = Some(rest.trim().to_string());
            }
        } else if let Some(rest) = line.strip_prefix("> ") {
            if summary.is_none() {
                summary = Some(rest.trim().to_string());
            }
        } else if let Some(rest) = line.strip_prefix("- ") {
            if rest.contains(':') {
                yaml.push_str(rest);
                yaml.push('\n');
            }
        }
    }

    title.as_ref()?;

    let mut frontmatter = Frontmatter::from_yaml(&yaml).unwrap_or_default();
    if frontmatter.title.is_none() {
        frontmatter.title = title;
    }
    if frontmatter.summary.is_none() {
        frontmatter.summary = summary;
    }
    Some(frontmatter)
}
