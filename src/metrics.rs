//! Run metrics and GitHub Action reporting.
//!
//! Counters and stage timings are collected during the run, then written as
//! JSON to the output directory, as step outputs (`$GITHUB_OUTPUT`) and as a
//! Markdown dashboard in the job summary (`$GITHUB_STEP_SUMMARY`).

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::ActionError;
use crate::recovery::ErrorRecord;

/// What happened to one post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PostOutcome {
    Posted { thread_url: String, tweets: usize },
    PullRequest { url: String, number: u64 },
    DryRun { draft_path: String },
    Skipped { reason: String },
    Failed { error: String },
}

/// Outcome of one post, as listed in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostReport {
    pub post_file: String,
    pub title: String,
    pub outcome: PostOutcome,
    pub engagement_score: Option<f64>,
}

/// Counters for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub posts_detected: usize,
    pub threads_generated: usize,
    pub regenerations: usize,
    pub pull_requests: usize,
    pub threads_posted: usize,
    pub posts_skipped: usize,
    pub posts_failed: usize,
    pub retries: u32,
    /// Milliseconds spent per stage, summed over posts.
    pub stage_durations_ms: BTreeMap<String, u128>,
    pub posts: Vec<PostReport>,
    #[serde(skip_deserializing)]
    pub errors: Vec<ErrorRecord>,
}

impl RunMetrics {
    pub fn start() -> Self {
        RunMetrics {
            started_at: Some(Utc::now()),
            ..RunMetrics::default()
        }
    }

    /// Adds the time elapsed since `started` to `stage`.
    pub fn record_stage(&mut self, stage: &str, started: Instant) {
        *self
            .stage_durations_ms
            .entry(stage.to_string())
            .or_insert(0) += started.elapsed().as_millis();
    }

    /// Records a post outcome and bumps the matching counter.
    pub fn record_post(&mut self, report: PostReport) {
        match &report.outcome {
            PostOutcome::Posted { .. } => self.threads_posted += 1,
            PostOutcome::PullRequest { .. } => self.pull_requests += 1,
            PostOutcome::DryRun { .. } => {}
            PostOutcome::Skipped { .. } => self.posts_skipped += 1,
            PostOutcome::Failed { .. } => self.posts_failed += 1,
        }
        self.posts.push(report);
    }

    pub fn finish(&mut self, errors: Vec<ErrorRecord>, retries: u32) {
        self.finished_at = Some(Utc::now());
        self.errors = errors;
        self.retries = retries;
    }

    /// First pull request URL of the run, if any.
    pub fn first_pr_url(&self) -> Option<&str> {
        self.posts.iter().find_map(|p| match &p.outcome {
            PostOutcome::PullRequest { url, .. } => Some(url.as_str()),
            _ => None,
        })
    }

    /// Step outputs as `(name, value)` pairs.
    pub fn action_outputs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("posts_processed", self.posts.len().to_string()),
            ("threads_generated", self.threads_generated.to_string()),
            ("pr_created", (self.pull_requests > 0).to_string()),
            ("auto_posted", (self.threads_posted > 0).to_string()),
            (
                "pr_url",
                self.first_pr_url().unwrap_or_default().to_string(),
            ),
        ]
    }

    /// Markdown dashboard for the job summary.
    pub fn render_summary(&self) -> String {
        let mut md = String::from("## 🧵 Blog thread generator\n\n");
        md.push_str("| Metric | Value |\n|---|---|\n");
        md.push_str(&format!("| Posts detected | {} |\n", self.posts_detected));
        md.push_str(&format!("| Threads generated | {} |\n", self.threads_generated));
        md.push_str(&format!("| Regenerations | {} |\n", self.regenerations));
        md.push_str(&format!("| Pull requests | {} |\n", self.pull_requests));
        md.push_str(&format!("| Threads posted | {} |\n", self.threads_posted));
        md.push_str(&format!("| Skipped | {} |\n", self.posts_skipped));
        md.push_str(&format!("| Failed | {} |\n", self.posts_failed));
        md.push_str(&format!("| Retries | {} |\n", self.retries));

        if !self.posts.is_empty() {
            md.push_str("\n### Posts\n\n| Post | Result | Score |\n|---|---|---|\n");
            for post in &self.posts {
                let result = match &post.outcome {
                    PostOutcome::Posted { thread_url, tweets } => {
                        format!("✅ posted {} tweets: {}", tweets, thread_url)
                    }
                    PostOutcome::PullRequest { url, number } => format!("📝 PR [#{}]({})", number, url),
                    PostOutcome::DryRun { draft_path } => format!("🧪 dry run: `{}`", draft_path),
                    PostOutcome::Skipped { reason } => format!("⏭️ skipped: {}", reason),
                    PostOutcome::Failed { error } => format!("❌ {}", error.replace('|', "\\|")),
                };
                let score = post
                    .engagement_score
                    .map(|s| format!("{:.2}", s))
                    .unwrap_or_else(|| "-".to_string());
                md.push_str(&format!("| {} | {} | {} |\n", post.title, result, score));
            }
        }

        if !self.stage_durations_ms.is_empty() {
            md.push_str("\n### Timings\n\n");
            for (stage, ms) in &self.stage_durations_ms {
                md.push_str(&format!("- {}: {} ms\n", stage, ms));
            }
        }
        md
    }

    /// Writes `run-metrics.json` into `dir`.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, ActionError> {
        std::fs::create_dir_all(dir).map_err(|e| ActionError::file(dir, e))?;
        let path = dir.join("run-metrics.json");
        std::fs::write(&path, serde_json::to_string_pretty(self)?)
            .map_err(|e| ActionError::file(&path, e))?;
        info!("Saved run metrics to {}", path.display());
        Ok(path)
    }
}

/// Appends `name=value` lines to the file named by `$GITHUB_OUTPUT`.
///
/// Outside GitHub Actions the outputs are only logged.
pub fn write_action_outputs(outputs: &[(&str, String)]) -> Result<(), ActionError> {
    for (name, value) in outputs {
        info!("Output {}={}", name, value);
    }
    let Ok(path) = std::env::var("GITHUB_OUTPUT") else {
        return Ok(());
    };
    let mut file = open_append(Path::new(&path))?;
    for (name, value) in outputs {
        writeln!(file, "{}={}", name, value.replace('\n', " "))
            .map_err(|e| ActionError::file(&path, e))?;
    }
    Ok(())
}

/// Appends `markdown` to the job summary named by `$GITHUB_STEP_SUMMARY`.
pub fn write_step_summary(markdown: &str) -> Result<(), ActionError> {
    let Ok(path) = std::env::var("GITHUB_STEP_SUMMARY") else {
        warn!("GITHUB_STEP_SUMMARY is not set, skipping job summary");
        return Ok(());
    };
    let mut file = open_append(Path::new(&path))?;
    file.write_all(markdown.as_bytes())
        .map_err(|e| ActionError::file(&path, e))
}

fn open_append(path: &Path) -> Result<std::fs::File, ActionError> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ActionError::file(path, e))
}
