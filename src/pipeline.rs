//! End-to-end orchestration of one action run.
//!
//! detect → analyze style → for each post: generate → optimize → validate
//! (regenerating on failure) → save draft → auto-post or open a review PR.
//!
//! A failing post is reported and the run moves on to the next one; only
//! critical errors (bad credentials, invalid configuration) abort the run.

use log::{debug, error, info, warn};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::artifact::ThreadArtifact;
use crate::config::ActionConfig;
use crate::content::{detect_changed_posts, get_all_posts, load_post, BlogPost};
use crate::engagement::{EngagementOptimizer, Thread};
use crate::error::ActionError;
use crate::github::GitHubClient;
use crate::metrics::{PostOutcome, PostReport, RunMetrics};
use crate::openrouter::OpenRouterClient;
use crate::recovery::{ErrorHandler, ErrorSeverity, RecoveryStrategy};
use crate::style::{build_or_load_profile, StyleProfile, PROFILE_FILE_NAME};
use crate::twitter::{content_hash, PostedRecord, PostedStore, TwitterClient};
use crate::validation::{ThreadValidator, ValidationReport};

const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// External clients, created once per run.
struct Services {
    openrouter: OpenRouterClient,
    github: Option<GitHubClient>,
    twitter: Option<TwitterClient>,
    optimizer: EngagementOptimizer,
    validator: ThreadValidator,
    posted: PostedStore,
}

/// One run of the action over a repository checkout.
pub struct Pipeline {
    config: ActionConfig,
    repo_root: PathBuf,
    handler: ErrorHandler,
    http: Client,
}

impl Pipeline {
    pub fn new(config: ActionConfig, repo_root: impl Into<PathBuf>) -> Result<Self, ActionError> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ActionError::network("http", e))?;
        Ok(Pipeline {
            handler: ErrorHandler::new(&config.retry),
            config,
            repo_root: repo_root.into(),
            http,
        })
    }

    /// Runs the whole pipeline.
    ///
    /// # Returns
    ///
    /// - `Ok(RunMetrics)`: The run completed; individual posts may still have failed
    /// - `Err(ActionError)`: A critical error aborted the run
    pub async fn run(&self) -> Result<RunMetrics, ActionError> {
        let mut metrics = RunMetrics::start();
        self.config.validate()?;

        let stage = Instant::now();
        let changed = detect_changed_posts(&self.repo_root, &self.config).await?;
        metrics.record_stage("detect", stage);
        metrics.posts_detected = changed.len();

        if changed.is_empty() {
            info!("No new or changed posts - nothing to do");
            self.finish(&mut metrics);
            return Ok(metrics);
        }

        let stage = Instant::now();
        let profile = self.build_style_profile().await;
        metrics.record_stage("style_analysis", stage);

        let services = self.services()?;

        for path in &changed {
            let result = self
                .process_post(path, &profile, &services, &mut metrics)
                .await;
            match result {
                Ok(report) => metrics.record_post(report),
                Err(err) => {
                    let policy = self
                        .handler
                        .record_unhandled(&format!("process {}", path.display()), &err);
                    if policy.severity == ErrorSeverity::Critical {
                        error!("Critical error while processing {}: {}", path.display(), err);
                        self.finish(&mut metrics);
                        return Err(err);
                    }
                    error!("Failed to process {}: {}", path.display(), err);
                    metrics.record_post(PostReport {
                        post_file: path.display().to_string(),
                        title: path.display().to_string(),
                        outcome: PostOutcome::Failed {
                            error: err.to_string(),
                        },
                        engagement_score: None,
                    });
                }
            }
        }

        self.finish(&mut metrics);
        Ok(metrics)
    }

    fn services(&self) -> Result<Services, ActionError> {
        let github = if self.config.dry_run {
            None
        } else {
            Some(GitHubClient::new(self.http.clone(), &self.config)?)
        };
        let twitter = if self.config.can_auto_post() {
            Some(TwitterClient::new(self.http.clone(), &self.config)?)
        } else {
            None
        };

        Ok(Services {
            openrouter: OpenRouterClient::new(self.http.clone(), &self.config)?,
            github,
            twitter,
            optimizer: EngagementOptimizer::new()?,
            validator: ThreadValidator::new(self.config.max_tweets_per_thread)?,
            posted: PostedStore::new(self.repo_root.join(&self.config.posted_directory)),
        })
    }

    /// Analyzes every published post and caches the profile in the output directory.
    async fn build_style_profile(&self) -> StyleProfile {
        let posts = get_all_posts(&self.repo_root, &self.config).await;
        let path = self
            .repo_root
            .join(&self.config.output_directory)
            .join(PROFILE_FILE_NAME);
        build_or_load_profile(&posts, &path)
    }

    async fn process_post(
        &self,
        path: &Path,
        profile: &StyleProfile,
        services: &Services,
        metrics: &mut RunMetrics,
    ) -> Result<PostReport, ActionError> {
        let post = load_post(&self.repo_root, path, &self.config).await?;
        info!("Processing post '{}' ({})", post.title, path.display());

        let skipped = |reason: &str| PostReport {
            post_file: path.display().to_string(),
            title: post.title.clone(),
            outcome: PostOutcome::Skipped {
                reason: reason.to_string(),
            },
            engagement_score: None,
        };

        if !post.publish {
            info!("Skipping '{}': publish is false", post.title);
            return Ok(skipped("publish: false"));
        }

        let auto_post = post.auto_post && self.config.can_auto_post();
        if auto_post {
            if let Err(err) = services.posted.ensure_not_posted(&post) {
                let policy = self.handler.record("duplicate_check", &err, 0);
                debug!("Duplicate check policy: {:?}", policy);
                info!("Skipping '{}': {}", post.title, err);
                return Ok(skipped("already posted"));
            }
        }

        let stage = Instant::now();
        let (thread, report) = self
            .generate_valid_thread(&post, profile, services, metrics)
            .await?;
        metrics.record_stage("generate", stage);
        metrics.threads_generated += 1;

        let artifact = ThreadArtifact::new(&post, thread, report);
        let draft_path = artifact.save(&self.repo_root, &self.config.output_directory)?;
        let score = Some(artifact.thread.engagement_score);

        let outcome = if self.config.dry_run {
            info!("Dry run - thread for '{}' saved only", post.title);
            PostOutcome::DryRun {
                draft_path: draft_path.display().to_string(),
            }
        } else if auto_post && artifact.validation.warnings().next().is_none() {
            let stage = Instant::now();
            let outcome = self.auto_post(&post, &artifact.thread, services).await?;
            metrics.record_stage("post", stage);
            outcome
        } else {
            if auto_post {
                warn!(
                    "Thread for '{}' has review warnings - opening a pull request instead of auto-posting",
                    post.title
                );
            }
            let github = services.github.as_ref().ok_or_else(|| {
                ActionError::Configuration("GitHub client is not configured".to_string())
            })?;
            let stage = Instant::now();
            let pr = github
                .open_review_pull_request(&artifact, &post, &self.config, &self.handler)
                .await?;
            metrics.record_stage("pull_request", stage);
            PostOutcome::PullRequest {
                url: pr.html_url,
                number: pr.number,
            }
        };

        Ok(PostReport {
            post_file: path.display().to_string(),
            title: post.title.clone(),
            outcome,
            engagement_score: score,
        })
    }

    /// Generates, optimizes and validates a thread, regenerating up to
    /// `max_regenerations` times when the content is unusable or invalid.
    async fn generate_valid_thread(
        &self,
        post: &BlogPost,
        profile: &StyleProfile,
        services: &Services,
        metrics: &mut RunMetrics,
    ) -> Result<(Thread, ValidationReport), ActionError> {
        let max_attempts = self.config.max_regenerations + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = match services
                .openrouter
                .generate_thread(post, profile, &self.config, &self.handler)
                .await
            {
                Ok(draft) => {
                    let thread = services.optimizer.optimize(&draft, post, &self.config);
                    let report = services.validator.validate(&thread.tweets);
                    report.into_result().map(|report| (thread, report))
                }
                Err(err) => Err(err),
            };

            match result {
                Ok(valid) => return Ok(valid),
                Err(err) => {
                    let policy = ErrorHandler::classify(&err);
                    if policy.strategy == RecoveryStrategy::Regenerate && attempt < max_attempts {
                        warn!(
                            "Thread for '{}' rejected ({}), regenerating (attempt {}/{})",
                            post.title,
                            err,
                            attempt + 1,
                            max_attempts
                        );
                        metrics.regenerations += 1;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Posts the thread and records it so it is never posted twice.
    async fn auto_post(
        &self,
        post: &BlogPost,
        thread: &Thread,
        services: &Services,
    ) -> Result<PostOutcome, ActionError> {
        let twitter = services.twitter.as_ref().ok_or_else(|| {
            ActionError::Configuration("Twitter client is not configured".to_string())
        })?;

        info!("Auto-posting thread for '{}'", post.title);
        let posted = twitter.post_thread(&thread.tweets, &self.handler).await?;

        let record = PostedRecord {
            slug: post.slug.clone(),
            post_file: post.file_path.display().to_string(),
            content_hash: content_hash(post),
            tweet_ids: posted.tweet_ids.clone(),
            thread_url: posted.thread_url.clone(),
            posted_at: chrono::Utc::now(),
        };
        // the thread is live; losing the record only risks a duplicate later
        if let Err(e) = services.posted.save(&record) {
            error!("Thread posted but the posting record could not be saved: {}", e);
        }
        if let Err(e) = self.commit_posted_record(&record, services).await {
            error!(
                "Thread posted but the posting record was not committed to {}: {}",
                self.config.base_branch, e
            );
        }

        Ok(PostOutcome::Posted {
            thread_url: posted.thread_url,
            tweets: posted.tweet_ids.len(),
        })
    }

    /// Commits the posting record to the base branch so the next run sees it.
    async fn commit_posted_record(
        &self,
        record: &PostedRecord,
        services: &Services,
    ) -> Result<(), ActionError> {
        let github = services.github.as_ref().ok_or_else(|| {
            ActionError::Configuration("GitHub client is not configured".to_string())
        })?;
        let path = PostedStore::relative_path(&self.config.posted_directory, &record.slug);
        let content = serde_json::to_string_pretty(record)?;
        let message = format!("Record posted thread for {}", record.slug);
        github
            .commit_file(
                &path,
                &self.config.base_branch,
                &content,
                &message,
                &self.handler,
            )
            .await
    }

    fn finish(&self, metrics: &mut RunMetrics) {
        metrics.finish(self.handler.records(), self.handler.retry_count());
        let dir = self.repo_root.join(&self.config.output_directory);
        if let Err(e) = metrics.save(&dir) {
            warn!("Could not save run metrics: {}", e);
        }
        info!(
            "Run finished: {} detected, {} generated, {} PR(s), {} posted, {} skipped, {} failed",
            metrics.posts_detected,
            metrics.threads_generated,
            metrics.pull_requests,
            metrics.threads_posted,
            metrics.posts_skipped,
            metrics.posts_failed
        );
    }
}
