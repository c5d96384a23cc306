//! The thread draft file written for every processed post.

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::content::BlogPost;
use crate::engagement::Thread;
use crate::error::ActionError;
use crate::validation::ValidationReport;

/// Everything a reviewer (or a later posting step) needs about one thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadArtifact {
    pub post_title: String,
    pub post_file: String,
    pub slug: String,
    pub canonical_url: Option<String>,
    pub auto_post: bool,
    pub thread: Thread,
    pub validation: ValidationReport,
    pub created_at: DateTime<Utc>,
}

impl ThreadArtifact {
    pub fn new(post: &BlogPost, thread: Thread, validation: ValidationReport) -> Self {
        ThreadArtifact {
            post_title: post.title.clone(),
            post_file: post.file_path.display().to_string(),
            slug: post.slug.clone(),
            canonical_url: post.canonical_url.clone(),
            auto_post: post.auto_post,
            thread,
            validation,
            created_at: Utc::now(),
        }
    }

    /// Repository-relative path of the draft, `<output_dir>/<slug>-thread.json`.
    pub fn relative_path(output_dir: &str, slug: &str) -> String {
        format!("{}/{}-thread.json", output_dir.trim_end_matches('/'), slug)
    }

    pub fn to_json(&self) -> Result<String, ActionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the draft below `repo_root` and returns its path.
    pub fn save(&self, repo_root: &Path, output_dir: &str) -> Result<PathBuf, ActionError> {
        let path = repo_root.join(Self::relative_path(output_dir, &self.slug));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ActionError::file(parent, e))?;
        }
        std::fs::write(&path, self.to_json()?).map_err(|e| ActionError::file(&path, e))?;
        info!("Saved thread draft to {}", path.display());
        Ok(path)
    }
}
