//! Thread drafting through the OpenRouter chat-completions API.
//!
//! The prompt combines the author's style profile with the post, and the model
//! is asked to answer with a JSON object:
//!
//! ```json
//! { "hooks": ["..."], "tweets": ["..."], "hashtags": ["#rust"] }
//! ```

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::{ActionConfig, EngagementLevel};
use crate::content::BlogPost;
use crate::error::{parse_retry_after, ActionError};
use crate::recovery::{ErrorHandler, RecoveryStrategy};
use crate::style::StyleProfile;
use crate::twitter::sanitize_for_logging;

/// Post bodies are cut to this many characters before prompting.
const MAX_CONTENT_CHARS: usize = 8_000;

/// A thread as drafted by the model, before optimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadDraft {
    pub hooks: Vec<String>,
    pub tweets: Vec<String>,
    pub hashtags: Vec<String>,
    pub model: String,
    pub generated_at: DateTime<Utc>,
}

/// Client for the OpenRouter chat-completions endpoint.
pub struct OpenRouterClient {
    client: Client,
    base_url: String,
    api_key: String,
    referer: Option<String>,
}

impl OpenRouterClient {
    /// Creates a client from the run configuration.
    ///
    /// # Returns
    ///
    /// - `Err(ActionError::Configuration)`: If `OPENROUTER_API_KEY` is missing
    pub fn new(client: Client, config: &ActionConfig) -> Result<Self, ActionError> {
        let api_key = config.secrets.openrouter_api_key.clone().ok_or_else(|| {
            ActionError::Configuration("OPENROUTER_API_KEY is not set".to_string())
        })?;
        Ok(OpenRouterClient {
            client,
            base_url: config.api.openrouter_url.trim_end_matches('/').to_string(),
            api_key,
            referer: config
                .secrets
                .github_repository
                .as_ref()
                .map(|repo| format!("https://github.com/{}", repo)),
        })
    }

    /// Drafts a thread for `post`.
    ///
    /// Transient failures are retried by `handler`. When the primary model fails
    /// with a non-retryable API error and a fallback model is configured, the
    /// request is replayed once with the fallback model.
    pub async fn generate_thread(
        &self,
        post: &BlogPost,
        profile: &StyleProfile,
        config: &ActionConfig,
        handler: &ErrorHandler,
    ) -> Result<ThreadDraft, ActionError> {
        let system_prompt = build_system_prompt(profile, config);
        let user_prompt = build_user_prompt(post, config);

        info!(
            "Generating thread for '{}' with model {}",
            post.title, config.model
        );

        let primary = handler
            .run("openrouter_generate", || {
                self.complete(&config.model, &system_prompt, &user_prompt, config)
            })
            .await;

        match (primary, &config.fallback_model) {
            (Err(err), Some(fallback))
                if ErrorHandler::classify(&err).strategy == RecoveryStrategy::Fallback =>
            {
                warn!(
                    "Model {} failed ({}), retrying with fallback model {}",
                    config.model, err, fallback
                );
                handler
                    .run("openrouter_generate_fallback", || {
                        self.complete(fallback, &system_prompt, &user_prompt, config)
                    })
                    .await
            }
            (result, _) => result,
        }
    }

    /// Sends one chat-completion request and parses the answer into a draft.
    async fn complete(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        config: &ActionConfig,
    ) -> Result<ThreadDraft, ActionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = json!({
            "model": model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt }
            ],
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
            "response_format": { "type": "json_object" }
        });

        debug!("Sending POST request to {}", url);
        debug!("Request headers: Authorization: Bearer [REDACTED], Content-Type: application/json");

        let mut request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("X-Title", "threadsmith")
            .json(&payload);
        if let Some(referer) = &self.referer {
            request = request.header("HTTP-Referer", referer);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ActionError::network("openrouter", e))?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| ActionError::network("openrouter", e))?;

        info!("Received response with status: {} from OpenRouter", status);

        if !status.is_success() {
            debug!(
                "OpenRouter error response: {}",
                sanitize_for_logging(&body, 200)
            );
            return Err(ActionError::from_status(
                "openrouter",
                status.as_u16(),
                error_message(&body),
                retry_after,
            ));
        }

        let json: Value = serde_json::from_str(&body)?;
        if let Some(usage) = json.get("usage") {
            debug!(
                "Token usage: prompt={}, completion={}",
                usage.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0),
                usage.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0)
            );
        }

        let content = json
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| ActionError::Content("response has no message content".to_string()))?;

        let mut draft = parse_thread_response(content)?;
        draft.model = json
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(model)
            .to_string();

        info!(
            "Draft received: {} tweet(s), {} hook(s), {} hashtag(s)",
            draft.tweets.len(),
            draft.hooks.len(),
            draft.hashtags.len()
        );
        Ok(draft)
    }
}

/// Extracts `error.message` from an OpenRouter error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| sanitize_for_logging(body, 200))
}

/// System prompt: role, output contract, style and engagement guidance.
pub fn build_system_prompt(profile: &StyleProfile, config: &ActionConfig) -> String {
    let engagement = match config.engagement_level {
        EngagementLevel::Low => {
            "Keep the thread informative and understated. No clickbait, at most one emoji in the whole thread."
        }
        EngagementLevel::Medium => {
            "Open with a hook that gives the reader a reason to keep reading. Use emojis only where they fit the author's style."
        }
        EngagementLevel::High => {
            "Open with a bold, curiosity-driven hook (a surprising fact, a question or a strong claim). Make each tweet end with a reason to read the next one and close with a clear call to action."
        }
    };

    format!(
        "You are a social media writer who turns blog posts into Twitter/X threads in the author's own voice.\n\n\
         Author style:\n{style}\n\n\
         Engagement guidance: {engagement}\n\n\
         Rules:\n\
         - Write at most {max_tweets} tweets; every tweet must be under 260 characters.\n\
         - Provide {hooks} alternative opening hooks.\n\
         - Do not invent facts, statistics or quotes that are not in the post.\n\
         - Do not number the tweets and do not include the post URL; both are added later.\n\
         - Suggest up to {hashtags} relevant hashtags.\n\n\
         Respond with only a JSON object of the form \
         {{\"hooks\": [string], \"tweets\": [string], \"hashtags\": [string]}}.",
        style = profile.prompt_summary(),
        engagement = engagement,
        max_tweets = config.max_tweets_per_thread,
        hooks = config.hook_variations_count,
        hashtags = config.max_hashtags.max(1),
    )
}

/// User prompt carrying the post itself.
pub fn build_user_prompt(post: &BlogPost, config: &ActionConfig) -> String {
    let mut prompt = format!("Title: {}\n", post.title);
    if let Some(summary) = &post.summary {
        prompt.push_str(&format!("Summary: {}\n", summary));
    }
    if !post.categories.is_empty() {
        prompt.push_str(&format!("Categories: {}\n", post.categories.join(", ")));
    }
    if let Some(url) = &post.canonical_url {
        prompt.push_str(&format!("URL: {}\n", url));
    }

    let body = truncate_chars(&post.content, MAX_CONTENT_CHARS);
    if body.len() < post.content.len() {
        debug!(
            "Post '{}' truncated to {} characters for the prompt",
            post.slug, MAX_CONTENT_CHARS
        );
    }
    prompt.push_str(&format!(
        "\nWrite a thread of at most {} tweets about this post:\n\n{}",
        config.max_tweets_per_thread, body
    ));
    prompt
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// Parses the model's answer into a draft.
///
/// Accepts a bare JSON object, one wrapped in a fenced code block, or the first
/// `{ ... }` span inside surrounding prose. Tweets and hooks may be strings or
/// objects with a `text` field.
///
/// # Returns
///
/// - `Err(ActionError::Content)`: If no JSON object is found or it has no tweets
pub fn parse_thread_response(content: &str) -> Result<ThreadDraft, ActionError> {
    let json = extract_json_object(content).ok_or_else(|| {
        ActionError::Content(format!(
            "no JSON object in model response: {}",
            sanitize_for_logging(content, 120)
        ))
    })?;

    let tweets = string_list(json.get("tweets"));
    if tweets.is_empty() {
        return Err(ActionError::Content(
            "model response contains no tweets".to_string(),
        ));
    }

    let mut hashtags: Vec<String> = Vec::new();
    for tag in string_list(json.get("hashtags")) {
        let normalized = normalize_hashtag(&tag);
        if normalized.len() > 1 && !hashtags.contains(&normalized) {
            hashtags.push(normalized);
        }
    }

    Ok(ThreadDraft {
        hooks: string_list(json.get("hooks")),
        tweets,
        hashtags,
        model: String::new(),
        generated_at: Utc::now(),
    })
}

fn extract_json_object(content: &str) -> Option<Value> {
    let trimmed = content.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if let Ok(fence) = Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```") {
        if let Some(inner) = fence.captures(trimmed).and_then(|c| c.get(1)) {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(inner.as_str()) {
                return Some(value);
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(_) => item
                        .get("text")
                        .or_else(|| item.get("content"))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    _ => None,
                })
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// `"rust lang"`, `"##rust"` and `"rust"` all become `#rustlang` / `#rust`.
pub fn normalize_hashtag(tag: &str) -> String {
    let body: String = tag
        .trim()
        .trim_start_matches('#')
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    format!("#{}", body)
}
