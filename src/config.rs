//! Configuration module for the action.
//!
//! Settings come from three layers, later layers winning:
//!
//! 1. built-in defaults,
//! 2. the YAML file `.github/tweet-generator-config.yml`,
//! 3. GitHub Action inputs exposed as `INPUT_<NAME>` environment variables.
//!
//! Secrets (API keys and tokens) are only ever read from the environment.

use log::{debug, error, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::error::ActionError;

/// Default location of the configuration file, relative to the repository root.
pub const DEFAULT_CONFIG_PATH: &str = ".github/tweet-generator-config.yml";

/// How aggressively the generated thread is tuned for engagement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngagementLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl std::str::FromStr for EngagementLevel {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(EngagementLevel::Low),
            "medium" => Ok(EngagementLevel::Medium),
            "high" => Ok(EngagementLevel::High),
            other => Err(ActionError::Configuration(format!(
                "unknown engagement level '{}' (expected low, medium or high)",
                other
            ))),
        }
    }
}

/// Retry behaviour shared by every external call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
        }
    }
}

/// Base URLs of the remote APIs. Overridable so tests can target a mock server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiEndpoints {
    pub openrouter_url: String,
    pub github_url: String,
    pub twitter_url: String,
    pub twitter_token_url: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        ApiEndpoints {
            openrouter_url: "https://openrouter.ai/api/v1".to_string(),
            github_url: "https://api.github.com".to_string(),
            twitter_url: "https://api.x.com/2".to_string(),
            twitter_token_url: "https://api.x.com/2/oauth2/token".to_string(),
        }
    }
}

/// Credentials for the Twitter/X API v2.
///
/// Posting uses OAuth 2.0 User Context (Access Token). The refresh token and
/// client credentials are optional and enable automatic token renewal when
/// the API answers 401.
#[derive(Debug, Clone, Default)]
pub struct TwitterCredentials {
    /// The Access Token for OAuth 2.0 User Context authentication
    pub access_token: String,
    /// The Refresh Token for automatically refreshing expired access tokens
    pub refresh_token: Option<String>,
    /// The Client ID for OAuth 2.0 operations
    pub client_id: Option<String>,
    /// The Client Secret for OAuth 2.0 operations
    pub client_secret: Option<String>,
}

impl TwitterCredentials {
    /// Checks if automatic token refresh is available.
    ///
    /// Returns true if all required credentials (client_id, client_secret, refresh_token)
    /// are available for automatic token refresh.
    pub fn can_refresh_token(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some() && self.refresh_token.is_some()
    }

    /// Attempts to refresh the access token using the stored refresh token and client credentials.
    ///
    /// On success the access token (and the refresh token, when Twitter rotates it)
    /// is updated in place. The new tokens only live for the duration of the run;
    /// a warning reminds the operator to update the repository secrets.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: If the token was successfully refreshed
    /// - `Err(ActionError::Authentication)`: If refresh failed or credentials are missing
    pub async fn refresh_access_token(
        &mut self,
        client: &Client,
        token_url: &str,
    ) -> Result<(), ActionError> {
        info!("Attempting to refresh access token");

        let (client_id, client_secret, refresh_token) = match (
            self.client_id.as_ref(),
            self.client_secret.as_ref(),
            self.refresh_token.as_ref(),
        ) {
            (Some(id), Some(secret), Some(token)) => (id, secret, token),
            _ => {
                error!("Cannot refresh token: missing required credentials");
                if self.client_id.is_none() {
                    error!("Missing TWITTER_CLIENT_ID");
                }
                if self.client_secret.is_none() {
                    error!("Missing TWITTER_CLIENT_SECRET");
                }
                if self.refresh_token.is_none() {
                    error!("Missing TWITTER_REFRESH_TOKEN");
                }
                return Err(ActionError::Authentication {
                    service: "twitter",
                    message: "missing required credentials for token refresh".to_string(),
                });
            }
        };

        let (new_access_token, new_refresh_token) = crate::oauth::refresh_access_token(
            client,
            token_url,
            client_id,
            client_secret,
            refresh_token,
        )
        .await?;

        self.access_token = new_access_token;
        debug!(
            "Updated access token (masked): {}",
            mask_secret(&self.access_token)
        );

        if let Some(new_refresh) = new_refresh_token {
            self.refresh_token = Some(new_refresh);
            warn!("Refresh token was rotated - update the TWITTER_REFRESH_TOKEN secret");
        }
        warn!("Access token has been refreshed - consider updating the TWITTER_ACCESS_TOKEN secret");

        Ok(())
    }

    /// Loads Twitter credentials through `lookup`.
    ///
    /// Returns `None` when no access token is configured.
    fn from_lookup<F>(lookup: &F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access_token = match lookup("TWITTER_ACCESS_TOKEN") {
            Some(token) => {
                info!(
                    "Found TWITTER_ACCESS_TOKEN with length: {}",
                    token.len()
                );
                debug!("Access token (masked): {}", mask_secret(&token));
                if token.len() < 10 {
                    warn!(
                        "Access token seems unusually short ({} characters)",
                        token.len()
                    );
                }
                token
            }
            None => {
                info!("No TWITTER_ACCESS_TOKEN found - auto-posting is unavailable");
                return None;
            }
        };

        let credentials = TwitterCredentials {
            access_token,
            refresh_token: lookup("TWITTER_REFRESH_TOKEN"),
            client_id: lookup("TWITTER_CLIENT_ID"),
            client_secret: lookup("TWITTER_CLIENT_SECRET"),
        };

        if credentials.refresh_token.is_some()
            && (credentials.client_id.is_none() || credentials.client_secret.is_none())
        {
            warn!("Refresh token is provided but client credentials are missing - automatic token refresh will be disabled");
        }

        if credentials.can_refresh_token() {
            info!("Automatic token refresh is enabled");
        } else {
            info!("Automatic token refresh is disabled - manual token refresh required");
        }

        Some(credentials)
    }
}

/// API keys and tokens. Never serialized.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub openrouter_api_key: Option<String>,
    pub github_token: Option<String>,
    /// `owner/repo`, as provided by the `GITHUB_REPOSITORY` variable.
    pub github_repository: Option<String>,
    pub twitter: Option<TwitterCredentials>,
}

impl Secrets {
    fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let openrouter_api_key = lookup("OPENROUTER_API_KEY")
            .or_else(|| lookup("INPUT_OPENROUTER_API_KEY"));
        let github_token = lookup("GITHUB_TOKEN").or_else(|| lookup("INPUT_GITHUB_TOKEN"));

        if let Some(key) = &openrouter_api_key {
            debug!("OpenRouter API key (masked): {}", mask_secret(key));
        }

        Secrets {
            openrouter_api_key,
            github_token,
            github_repository: lookup("GITHUB_REPOSITORY"),
            twitter: TwitterCredentials::from_lookup(lookup),
        }
    }
}

/// Complete configuration of one action run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    /// OpenRouter model identifier used for generation.
    pub model: String,
    /// Model used once when the primary model answers with a non-retryable error.
    pub fallback_model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub engagement_level: EngagementLevel,
    pub max_tweets_per_thread: usize,
    pub hook_variations_count: usize,
    pub max_hashtags: usize,
    pub include_thread_numbering: bool,
    /// Global switch; a post must also set `auto_post: true` in its frontmatter.
    pub auto_post_enabled: bool,
    pub dry_run: bool,
    /// Treat every post as changed instead of diffing against the base branch.
    pub process_all: bool,
    pub posts_directory: String,
    pub notebooks_directory: String,
    pub output_directory: String,
    pub posted_directory: String,
    pub base_branch: String,
    /// Used to build canonical URLs from `permalink` frontmatter.
    pub site_url: Option<String>,
    /// How many times a thread failing validation is regenerated.
    pub max_regenerations: u32,
    pub retry: RetryConfig,
    pub api: ApiEndpoints,
    #[serde(skip)]
    pub secrets: Secrets,
}

impl Default for ActionConfig {
    fn default() -> Self {
        ActionConfig {
            model: "anthropic/claude-3-haiku".to_string(),
            fallback_model: None,
            max_tokens: 2_000,
            temperature: 0.7,
            engagement_level: EngagementLevel::Medium,
            max_tweets_per_thread: 10,
            hook_variations_count: 3,
            max_hashtags: 2,
            include_thread_numbering: true,
            auto_post_enabled: false,
            dry_run: false,
            process_all: false,
            posts_directory: "_posts".to_string(),
            notebooks_directory: "_notebooks".to_string(),
            output_directory: ".generated".to_string(),
            posted_directory: ".posted".to_string(),
            base_branch: "main".to_string(),
            site_url: None,
            max_regenerations: 1,
            retry: RetryConfig::default(),
            api: ApiEndpoints::default(),
            secrets: Secrets::default(),
        }
    }
}

impl ActionConfig {
    /// Loads the YAML configuration file at `path`.
    ///
    /// A missing file is not an error: the defaults are returned.
    ///
    /// # Returns
    ///
    /// - `Ok(ActionConfig)`: Parsed configuration (secrets not yet loaded)
    /// - `Err(ActionError::Configuration)`: If the file exists but is not valid YAML
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ActionError> {
        let path = path.as_ref();
        if !path.exists() {
            info!(
                "No configuration file at {}, using defaults",
                path.display()
            );
            return Ok(ActionConfig::default());
        }

        info!("Loading configuration from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| ActionError::file(path, e))?;
        Self::from_yaml(&text)
    }

    /// Parses configuration from YAML text. An empty document yields the defaults.
    pub fn from_yaml(text: &str) -> Result<Self, ActionError> {
        if text.trim().is_empty() {
            return Ok(ActionConfig::default());
        }
        serde_yaml::from_str(text)
            .map_err(|e| ActionError::Configuration(format!("invalid config file: {}", e)))
    }

    /// Builds the run configuration from the environment of a GitHub Action step.
    ///
    /// # Environment Variables
    ///
    /// - `INPUT_CONFIG_FILE` / `CONFIG_FILE`: Alternative configuration file path
    /// - `INPUT_*`: Action inputs overriding individual settings
    /// - `OPENROUTER_API_KEY`: OpenRouter API key (required)
    /// - `GITHUB_TOKEN`, `GITHUB_REPOSITORY`: Required to open pull requests
    /// - `TWITTER_ACCESS_TOKEN`: Required to auto-post
    /// - `TWITTER_REFRESH_TOKEN`, `TWITTER_CLIENT_ID`, `TWITTER_CLIENT_SECRET`: Optional, enable token refresh
    pub fn from_env() -> Result<Self, ActionError> {
        info!("Loading action configuration from environment");
        let lookup = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());

        let path = lookup("INPUT_CONFIG_FILE")
            .or_else(|| lookup("CONFIG_FILE"))
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let mut config = Self::load(&path)?;
        config.apply_overrides(&lookup)?;
        config.secrets = Secrets::from_lookup(&lookup);

        info!(
            "Configuration loaded: model={}, engagement={:?}, auto_post_enabled={}, dry_run={}",
            config.model, config.engagement_level, config.auto_post_enabled, config.dry_run
        );
        Ok(config)
    }

    /// Applies `INPUT_<NAME>` action inputs found through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: &F) -> Result<(), ActionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let input = |name: &str| lookup(&format!("INPUT_{}", name.to_uppercase()));

        if let Some(model) = input("openrouter_model") {
            self.model = model;
        }
        if let Some(model) = input("fallback_model") {
            self.fallback_model = Some(model);
        }
        if let Some(level) = input("engagement_level") {
            self.engagement_level = level.parse()?;
        }
        if let Some(value) = input("max_tweets_per_thread") {
            self.max_tweets_per_thread = parse_input("max_tweets_per_thread", &value)?;
        }
        if let Some(value) = input("hook_variations_count") {
            self.hook_variations_count = parse_input("hook_variations_count", &value)?;
        }
        if let Some(value) = input("max_tokens") {
            self.max_tokens = parse_input("max_tokens", &value)?;
        }
        if let Some(value) = input("temperature") {
            self.temperature = parse_input("temperature", &value)?;
        }
        if let Some(value) = input("auto_post_enabled") {
            self.auto_post_enabled = parse_bool("auto_post_enabled", &value)?;
        }
        if let Some(value) = input("dry_run") {
            self.dry_run = parse_bool("dry_run", &value)?;
        }
        if let Some(value) = input("process_all") {
            self.process_all = parse_bool("process_all", &value)?;
        }
        if let Some(dir) = input("posts_directory") {
            self.posts_directory = dir;
        }
        if let Some(dir) = input("notebooks_directory") {
            self.notebooks_directory = dir;
        }
        if let Some(dir) = input("output_directory") {
            self.output_directory = dir;
        }
        if let Some(branch) = input("base_branch") {
            self.base_branch = branch;
        }
        if let Some(url) = input("site_url") {
            self.site_url = Some(url);
        }
        Ok(())
    }

    /// Checks ranges and required secrets.
    ///
    /// Only the secrets needed by the enabled features are required: GitHub
    /// credentials are not needed for dry runs and Twitter credentials only when
    /// auto-posting is enabled outside a dry run.
    pub fn validate(&self) -> Result<(), ActionError> {
        let mut problems = Vec::new();

        if self.secrets.openrouter_api_key.is_none() {
            problems.push("OPENROUTER_API_KEY is not set".to_string());
        }
        if !self.dry_run {
            if self.secrets.github_token.is_none() {
                problems.push("GITHUB_TOKEN is not set".to_string());
            }
            match &self.secrets.github_repository {
                Some(repo) if repo.split('/').count() == 2 => {}
                Some(repo) => problems.push(format!(
                    "GITHUB_REPOSITORY '{}' is not in owner/repo form",
                    repo
                )),
                None => problems.push("GITHUB_REPOSITORY is not set".to_string()),
            }
            if self.auto_post_enabled && self.secrets.twitter.is_none() {
                problems.push(
                    "auto_post_enabled is true but TWITTER_ACCESS_TOKEN is not set".to_string(),
                );
            }
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            problems.push(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            ));
        }
        if self.max_tokens == 0 {
            problems.push("max_tokens must be greater than zero".to_string());
        }
        if !(1..=25).contains(&self.max_tweets_per_thread) {
            problems.push(format!(
                "max_tweets_per_thread must be between 1 and 25, got {}",
                self.max_tweets_per_thread
            ));
        }
        if self.hook_variations_count == 0 {
            problems.push("hook_variations_count must be at least 1".to_string());
        }
        if self.retry.max_attempts == 0 {
            problems.push("retry.max_attempts must be at least 1".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            for problem in &problems {
                error!("Configuration problem: {}", problem);
            }
            Err(ActionError::Configuration(problems.join("; ")))
        }
    }

    /// True when threads may be published without review.
    pub fn can_auto_post(&self) -> bool {
        self.auto_post_enabled && !self.dry_run && self.secrets.twitter.is_some()
    }
}

fn parse_input<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ActionError> {
    value.trim().parse().map_err(|_| {
        ActionError::Configuration(format!("input '{}' has invalid value '{}'", name, value))
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ActionError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(ActionError::Configuration(format!(
            "input '{}' must be true or false, got '{}'",
            name, value
        ))),
    }
}

/// Masks a secret for logging, keeping at most the first and last 8 characters.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    let len = chars.len();
    let prefix: String = chars.iter().take(len.min(8)).collect();
    if len > 16 {
        let suffix: String = chars[len - 8..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else if len > 8 {
        format!("{}...", prefix)
    } else {
        "***".to_string()
    }
}
