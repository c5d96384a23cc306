//! Pull request output through the GitHub REST API.
//!
//! For every thread that needs human review the draft file is committed to a
//! `tweet-thread/<slug>` branch and a pull request is opened (or updated) with
//! the thread rendered in its description.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, info, warn};
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::artifact::ThreadArtifact;
use crate::config::ActionConfig;
use crate::content::BlogPost;
use crate::engagement::Thread;
use crate::error::{parse_retry_after, ActionError};
use crate::recovery::ErrorHandler;
use crate::twitter::sanitize_for_logging;
use crate::validation::{weighted_length, ValidationReport};

/// Labels added to every review pull request.
const PR_LABELS: [&str; 2] = ["tweet-thread", "needs-review"];

/// An opened or updated pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
    /// False when an existing pull request was updated.
    pub created: bool,
}

/// Minimal GitHub REST client scoped to one repository.
pub struct GitHubClient {
    client: Client,
    base_url: String,
    token: String,
    owner: String,
    repo: String,
}

impl GitHubClient {
    /// Creates a client for `GITHUB_REPOSITORY`.
    pub fn new(client: Client, config: &ActionConfig) -> Result<Self, ActionError> {
        let token = config
            .secrets
            .github_token
            .clone()
            .ok_or_else(|| ActionError::Configuration("GITHUB_TOKEN is not set".to_string()))?;
        let repository = config.secrets.github_repository.as_deref().ok_or_else(|| {
            ActionError::Configuration("GITHUB_REPOSITORY is not set".to_string())
        })?;
        let (owner, repo) = repository.split_once('/').ok_or_else(|| {
            ActionError::Configuration(format!(
                "GITHUB_REPOSITORY '{}' is not in owner/repo form",
                repository
            ))
        })?;

        Ok(GitHubClient {
            client,
            base_url: config.api.github_url.trim_end_matches('/').to_string(),
            token,
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}{}",
            self.base_url, self.owner, self.repo, path
        )
    }

    /// Sends one request and returns the status with the parsed body.
    ///
    /// Statuses listed in `accepted` are returned to the caller instead of
    /// being turned into errors (for example 404 on lookups).
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        accepted: &[StatusCode],
        operation_name: &str,
    ) -> Result<(StatusCode, Value), ActionError> {
        debug!("GitHub {} {} ({})", method, url, operation_name);

        let mut request = self
            .client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", "threadsmith");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ActionError::network("github", e))?;
        let status = response.status();
        let rate_limited = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            == Some("0");
        let retry_after = parse_retry_after(response.headers());
        let text = response
            .text()
            .await
            .map_err(|e| ActionError::network("github", e))?;

        let json: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text.clone()))
        };

        if status.is_success() || accepted.contains(&status) {
            return Ok((status, json));
        }

        let message = json
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| sanitize_for_logging(&text, 200));
        warn!(
            "GitHub operation '{}' failed - Status: {}: {}",
            operation_name, status, message
        );

        if status == StatusCode::FORBIDDEN && rate_limited {
            return Err(ActionError::RateLimit {
                service: "github",
                retry_after,
            });
        }
        Err(ActionError::from_status(
            "github",
            status.as_u16(),
            message,
            retry_after,
        ))
    }

    /// SHA of the commit at the head of `branch`, or `None` if it does not exist.
    pub async fn branch_sha(&self, branch: &str) -> Result<Option<String>, ActionError> {
        let url = self.repo_url(&format!("/git/ref/heads/{}", encode_path(branch)));
        let (status, json) = self
            .request(Method::GET, &url, None, &[StatusCode::NOT_FOUND], "get_branch")
            .await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(json
            .pointer("/object/sha")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// Creates `branch` at `sha`. An existing branch is reused.
    pub async fn create_branch(&self, branch: &str, sha: &str) -> Result<(), ActionError> {
        let url = self.repo_url("/git/refs");
        let body = json!({ "ref": format!("refs/heads/{}", branch), "sha": sha });
        let (status, json) = self
            .request(
                Method::POST,
                &url,
                Some(&body),
                &[StatusCode::UNPROCESSABLE_ENTITY],
                "create_branch",
            )
            .await?;
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let message = json.get("message").and_then(Value::as_str).unwrap_or_default();
            if !message.to_lowercase().contains("already exists") {
                return Err(ActionError::Api {
                    service: "github",
                    status: status.as_u16(),
                    message: format!("cannot create branch {}: {}", branch, message),
                    retryable: false,
                });
            }
            info!("Branch {} already exists, reusing it", branch);
        } else {
            info!("Created branch {}", branch);
        }
        Ok(())
    }

    /// Blob SHA of `path` on `branch`, needed to update an existing file.
    pub async fn file_sha(&self, path: &str, branch: &str) -> Result<Option<String>, ActionError> {
        let url = format!(
            "{}?ref={}",
            self.repo_url(&format!("/contents/{}", encode_path(path))),
            urlencoding::encode(branch)
        );
        let (status, json) = self
            .request(Method::GET, &url, None, &[StatusCode::NOT_FOUND], "get_file")
            .await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(json.get("sha").and_then(Value::as_str).map(str::to_string))
    }

    /// Creates or updates `path` on `branch` with `content`.
    pub async fn put_file(
        &self,
        path: &str,
        branch: &str,
        content: &str,
        message: &str,
        existing_sha: Option<&str>,
    ) -> Result<(), ActionError> {
        let url = self.repo_url(&format!("/contents/{}", encode_path(path)));
        let mut body = json!({
            "message": message,
            "content": STANDARD.encode(content.as_bytes()),
            "branch": branch,
        });
        if let Some(sha) = existing_sha {
            body["sha"] = json!(sha);
        }
        self.request(Method::PUT, &url, Some(&body), &[], "put_file")
            .await?;
        info!("Committed {} to {}", path, branch);
        Ok(())
    }

    /// The open pull request whose head is `branch`, if any.
    pub async fn find_open_pull_request(
        &self,
        branch: &str,
    ) -> Result<Option<PullRequest>, ActionError> {
        let url = format!(
            "{}?state=open&head={}",
            self.repo_url("/pulls"),
            urlencoding::encode(&format!("{}:{}", self.owner, branch))
        );
        let (_, json) = self
            .request(Method::GET, &url, None, &[], "find_pull_request")
            .await?;
        Ok(json
            .as_array()
            .and_then(|prs| prs.first())
            .and_then(|pr| pull_request_from_json(pr, false)))
    }

    pub async fn create_pull_request(
        &self,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<PullRequest, ActionError> {
        let url = self.repo_url("/pulls");
        let payload = json!({ "title": title, "head": head, "base": base, "body": body });
        let (_, json) = self
            .request(Method::POST, &url, Some(&payload), &[], "create_pull_request")
            .await?;
        pull_request_from_json(&json, true).ok_or_else(|| ActionError::Api {
            service: "github",
            status: 201,
            message: "create pull request response has no number".to_string(),
            retryable: false,
        })
    }

    pub async fn update_pull_request_body(
        &self,
        number: u64,
        body: &str,
    ) -> Result<(), ActionError> {
        let url = self.repo_url(&format!("/pulls/{}", number));
        let payload = json!({ "body": body });
        self.request(Method::PATCH, &url, Some(&payload), &[], "update_pull_request")
            .await?;
        Ok(())
    }

    pub async fn add_labels(&self, number: u64, labels: &[&str]) -> Result<(), ActionError> {
        let url = self.repo_url(&format!("/issues/{}/labels", number));
        let payload = json!({ "labels": labels });
        self.request(Method::POST, &url, Some(&payload), &[], "add_labels")
            .await?;
        Ok(())
    }

    /// Creates or updates `path` on `branch`, looking up the blob SHA first.
    pub async fn commit_file(
        &self,
        path: &str,
        branch: &str,
        content: &str,
        message: &str,
        handler: &ErrorHandler,
    ) -> Result<(), ActionError> {
        let existing = handler
            .run("get_file", || self.file_sha(path, branch))
            .await?;
        handler
            .run("put_file", || {
                self.put_file(path, branch, content, message, existing.as_deref())
            })
            .await
    }

    /// Commits the draft to the review branch and opens or updates its pull request.
    ///
    /// Every API call is retried by `handler`. Labels are best effort: a failure
    /// to label is logged and does not fail the review.
    pub async fn open_review_pull_request(
        &self,
        artifact: &ThreadArtifact,
        post: &BlogPost,
        config: &ActionConfig,
        handler: &ErrorHandler,
    ) -> Result<PullRequest, ActionError> {
        let branch = format!("tweet-thread/{}", post.slug);
        let file_path = ThreadArtifact::relative_path(&config.output_directory, &post.slug);
        let content = artifact.to_json()?;
        let body = render_pr_body(post, &artifact.thread, &artifact.validation);

        let base_sha = handler
            .run("get_base_branch", || self.branch_sha(&config.base_branch))
            .await?
            .ok_or_else(|| {
                ActionError::Configuration(format!(
                    "base branch '{}' does not exist",
                    config.base_branch
                ))
            })?;

        handler
            .run("create_branch", || self.create_branch(&branch, &base_sha))
            .await?;

        let message = format!("Add tweet thread draft for \"{}\"", post.title);
        self.commit_file(&file_path, &branch, &content, &message, handler)
            .await?;

        let pull_request = match handler
            .run("find_pull_request", || self.find_open_pull_request(&branch))
            .await?
        {
            Some(pr) => {
                info!("Updating existing pull request #{}", pr.number);
                handler
                    .run("update_pull_request", || {
                        self.update_pull_request_body(pr.number, &body)
                    })
                    .await?;
                pr
            }
            None => {
                let title = format!("🧵 Tweet thread: {}", post.title);
                handler
                    .run("create_pull_request", || {
                        self.create_pull_request(&title, &branch, &config.base_branch, &body)
                    })
                    .await?
            }
        };

        if let Err(e) = self.add_labels(pull_request.number, &PR_LABELS).await {
            warn!(
                "Could not label pull request #{}: {}",
                pull_request.number, e
            );
        }

        info!("Review pull request: {}", pull_request.html_url);
        Ok(pull_request)
    }
}

fn pull_request_from_json(json: &Value, created: bool) -> Option<PullRequest> {
    Some(PullRequest {
        number: json.get("number")?.as_u64()?,
        html_url: json.get("html_url")?.as_str()?.to_string(),
        created,
    })
}

/// Percent-encodes each segment of a repository path, keeping the slashes.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Markdown description of the review pull request.
pub fn render_pr_body(post: &BlogPost, thread: &Thread, report: &ValidationReport) -> String {
    let mut body = String::new();
    body.push_str(&format!("## 🧵 Thread draft for \"{}\"\n\n", post.title));
    body.push_str(&format!("**Source:** `{}`", post.file_path.display()));
    if let Some(url) = &post.canonical_url {
        body.push_str(&format!(" · [published post]({})", url));
    }
    body.push_str("\n\n### Tweets\n\n");

    let total = thread.tweets.len();
    for (index, tweet) in thread.tweets.iter().enumerate() {
        body.push_str(&format!(
            "**{}/{}** ({} characters)\n",
            index + 1,
            total,
            weighted_length(tweet)
        ));
        for line in tweet.lines() {
            body.push_str("> ");
            body.push_str(line);
            body.push('\n');
        }
        body.push('\n');
    }

    if !thread.hashtags.is_empty() {
        body.push_str(&format!("**Hashtags:** {}\n\n", thread.hashtags.join(" ")));
    }

    let claims: Vec<_> = report.numeric_claims().collect();
    if !claims.is_empty() {
        body.push_str("### 🔍 Claims to verify\n\n");
        for issue in claims {
            body.push_str(&format!(
                "- [ ] tweet {}: {}\n",
                issue.tweet_index.map_or(0, |i| i + 1),
                issue.message
            ));
        }
        body.push('\n');
    }

    let other_warnings: Vec<_> = report
        .warnings()
        .filter(|i| i.kind != crate::validation::IssueKind::NumericClaim)
        .collect();
    if !other_warnings.is_empty() {
        body.push_str("### ⚠️ Review notes\n\n");
        for issue in other_warnings {
            match issue.tweet_index {
                Some(i) => body.push_str(&format!("- tweet {}: {}\n", i + 1, issue.message)),
                None => body.push_str(&format!("- {}\n", issue.message)),
            }
        }
        body.push('\n');
    }

    body.push_str("### Details\n\n");
    body.push_str(&format!("- Model: `{}`\n", thread.model));
    body.push_str(&format!(
        "- Engagement score: {:.2}\n",
        thread.engagement_score
    ));
    body.push_str(&format!(
        "- Generated: {}\n",
        thread.generated_at.format("%Y-%m-%d %H:%M UTC")
    ));
    if post.auto_post {
        body.push_str("- This post requested auto-posting; the thread was routed here for review instead.\n");
    }
    body.push_str("\nEdit the draft file on this branch to adjust the thread, then merge to approve it.\n");
    body
}
