//! Core Twitter API utilities.
//!
//! This module contains the authenticated client used for every Twitter API v2
//! call, including automatic token refresh on 401 errors and rate-limit
//! detection on 429 errors.

use log::{debug, error, info, warn};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::{ActionConfig, TwitterCredentials};
use crate::error::{parse_retry_after, ActionError};
use crate::oauth::build_oauth2_user_context_header;

/// Sanitizes text for safe logging by truncating and escaping control characters.
///
/// This function:
/// - Truncates long text to prevent log flooding
/// - Replaces control characters that could manipulate log output
/// - Escapes newlines to prevent log injection
///
/// # Parameters
///
/// - `text`: The text to sanitize
/// - `max_len`: Maximum number of characters before truncation
///
/// # Returns
///
/// A sanitized string safe for logging
pub fn sanitize_for_logging(text: &str, max_len: usize) -> String {
    let sanitized: String = text
        .chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' => ' ',
            c if c.is_control() => '?',
            c => c,
        })
        .collect();

    match sanitized.char_indices().nth(max_len) {
        Some((cut, _)) => format!(
            "{}... [truncated, {} total bytes]",
            &sanitized[..cut],
            text.len()
        ),
        None => sanitized,
    }
}

/// Delay until the rate-limit window resets, from `x-rate-limit-reset` (epoch seconds).
fn rate_limit_reset(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let reset = headers
        .get("x-rate-limit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())?;
    let wait = reset - chrono::Utc::now().timestamp();
    Some(Duration::from_secs(wait.max(0) as u64))
}

/// Authenticated client for the Twitter/X API v2.
///
/// Credentials sit behind a lock so a token refreshed by one request is used
/// by every following request of the run.
pub struct TwitterClient {
    client: Client,
    base_url: String,
    token_url: String,
    credentials: RwLock<TwitterCredentials>,
}

impl TwitterClient {
    /// Creates a client from the run configuration.
    ///
    /// # Returns
    ///
    /// - `Err(ActionError::Configuration)`: If no Twitter credentials are configured
    pub fn new(client: Client, config: &ActionConfig) -> Result<Self, ActionError> {
        let credentials = config.secrets.twitter.clone().ok_or_else(|| {
            ActionError::Configuration("TWITTER_ACCESS_TOKEN is not set".to_string())
        })?;
        Ok(TwitterClient {
            client,
            base_url: config.api.twitter_url.trim_end_matches('/').to_string(),
            token_url: config.api.twitter_token_url.clone(),
            credentials: RwLock::new(credentials),
        })
    }

    async fn send(
        &self,
        method: &Method,
        url: &str,
        payload: Option<&Value>,
    ) -> Result<reqwest::Response, ActionError> {
        let auth_header = {
            let credentials = self.credentials.read().await;
            build_oauth2_user_context_header(&credentials.access_token)
        };

        let mut request = self
            .client
            .request(method.clone(), url)
            .header("Authorization", auth_header);
        if let Some(payload) = payload {
            request = request
                .header("Content-Type", "application/json")
                .json(payload);
        }

        request
            .send()
            .await
            .map_err(|e| ActionError::network("twitter", e))
    }

    /// Makes an authenticated request to the Twitter API with automatic token refresh on 401 errors.
    ///
    /// # Parameters
    ///
    /// - `method`: HTTP method
    /// - `path`: Path below the API base URL (for example `/tweets`)
    /// - `payload`: Optional JSON body
    /// - `operation_name`: Human-readable name for the operation (for logging)
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The API response body on success
    /// - `Err(ActionError)`: Rate limit, authentication, API or network failure
    pub(crate) async fn make_authenticated_request(
        &self,
        method: Method,
        path: &str,
        payload: Option<Value>,
        operation_name: &str,
    ) -> Result<String, ActionError> {
        info!(
            "Making authenticated request for operation: {}",
            operation_name
        );
        let url = format!("{}{}", self.base_url, path);

        let mut response = self.send(&method, &url, payload.as_ref()).await?;
        let mut status = response.status();
        info!(
            "Received response with status: {} for operation: {}",
            status, operation_name
        );

        // Handle 401 Unauthorized - token might be expired
        if status == StatusCode::UNAUTHORIZED {
            warn!(
                "Received 401 Unauthorized for operation '{}' - access token may be expired",
                operation_name
            );

            let mut credentials = self.credentials.write().await;
            if !credentials.can_refresh_token() {
                error!(
                    "Cannot refresh token for operation '{}' - missing refresh credentials",
                    operation_name
                );
                return Err(ActionError::Authentication {
                    service: "twitter",
                    message: format!(
                        "401 for operation '{}' and token refresh not available",
                        operation_name
                    ),
                });
            }

            info!(
                "Attempting automatic token refresh for operation '{}'",
                operation_name
            );
            credentials
                .refresh_access_token(&self.client, &self.token_url)
                .await?;
            drop(credentials);

            info!(
                "Token refreshed successfully, retrying operation '{}'",
                operation_name
            );
            response = self.send(&method, &url, payload.as_ref()).await?;
            status = response.status();
            info!(
                "Retry response status: {} for operation '{}'",
                status, operation_name
            );
        }

        let retry_after =
            rate_limit_reset(response.headers()).or_else(|| parse_retry_after(response.headers()));
        let body = response
            .text()
            .await
            .map_err(|e| ActionError::network("twitter", e))?;

        if status.is_success() {
            info!("Operation '{}' completed successfully", operation_name);
            debug!(
                "Response summary for '{}': {} bytes received",
                operation_name,
                body.len()
            );
            return Ok(body);
        }

        error!("Operation '{}' failed - Status: {}", operation_name, status);
        debug!(
            "Error response for '{}': {}",
            operation_name,
            sanitize_for_logging(&body, 200)
        );
        let message = format!(
            "operation '{}' failed: {}",
            operation_name,
            sanitize_for_logging(&body, 200)
        );
        // Twitter answers 403 for duplicate content and policy rejections too;
        // expired credentials already surfaced as 401 above.
        if status == StatusCode::FORBIDDEN {
            return Err(ActionError::Api {
                service: "twitter",
                status: status.as_u16(),
                message,
                retryable: false,
            });
        }
        Err(ActionError::from_status(
            "twitter",
            status.as_u16(),
            message,
            retry_after,
        ))
    }
}
