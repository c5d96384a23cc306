//! On-disk record of published threads, used to never post a blog post twice.
//!
//! One JSON file per post slug lives in the posted directory. After a thread is
//! published the pipeline commits the record to the base branch, so later
//! workflow runs check out the record with the rest of the repository.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

use crate::content::{slugify, BlogPost};
use crate::error::ActionError;

/// Metadata written after a successful auto-post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostedRecord {
    pub slug: String,
    pub post_file: String,
    /// SHA-256 of the post body at posting time.
    pub content_hash: String,
    pub tweet_ids: Vec<String>,
    pub thread_url: String,
    pub posted_at: DateTime<Utc>,
}

/// Hex SHA-256 of a post's body.
pub fn content_hash(post: &BlogPost) -> String {
    let mut hasher = Sha256::new();
    hasher.update(post.content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Directory of [`PostedRecord`] files.
pub struct PostedStore {
    dir: PathBuf,
}

impl PostedStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        PostedStore { dir: dir.into() }
    }

    fn record_path(&self, slug: &str) -> PathBuf {
        self.dir.join(record_file_name(slug))
    }

    /// Repository-relative path of the record for `slug`.
    pub fn relative_path(posted_dir: &str, slug: &str) -> String {
        format!("{}/{}", posted_dir.trim_end_matches('/'), record_file_name(slug))
    }

    /// The record for `slug`, if the post was already published.
    pub fn load(&self, slug: &str) -> Result<Option<PostedRecord>, ActionError> {
        let path = self.record_path(slug);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path).map_err(|e| ActionError::file(&path, e))?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Fails with [`ActionError::Duplicate`] when `post` was already published.
    ///
    /// An unreadable record still counts as published.
    pub fn ensure_not_posted(&self, post: &BlogPost) -> Result<(), ActionError> {
        match self.load(&post.slug) {
            Ok(None) => {
                debug!("Duplicate check for '{}': not posted", post.slug);
                Ok(())
            }
            Ok(Some(record)) => {
                info!(
                    "'{}' was posted at {} ({})",
                    post.slug, record.posted_at, record.thread_url
                );
                Err(ActionError::Duplicate(post.slug.clone()))
            }
            Err(e) => {
                warn!("Unreadable posting record for '{}': {}", post.slug, e);
                Err(ActionError::Duplicate(post.slug.clone()))
            }
        }
    }

    /// Writes the record for a freshly published thread.
    pub fn save(&self, record: &PostedRecord) -> Result<PathBuf, ActionError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| ActionError::file(&self.dir, e))?;
        let path = self.record_path(&record.slug);
        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(&path, json).map_err(|e| ActionError::file(&path, e))?;
        info!("Saved posting record to {}", path.display());
        Ok(path)
    }
}

fn record_file_name(slug: &str) -> String {
    format!("{}.json", slugify(slug))
}
