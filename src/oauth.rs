//! OAuth helpers for the Twitter/X API integration.
//!
//! Posting uses OAuth 2.0 User Context authentication: a bearer access token
//! obtained through the Authorization Code Flow, refreshed with the stored
//! refresh token when it expires.

use log::{debug, error, info};
use reqwest::Client;

use crate::error::ActionError;

/// Builds the Authorization header for OAuth 2.0 User Context authentication.
///
/// # Format
///
/// ```text
/// Bearer YOUR_ACCESS_TOKEN_HERE
/// ```
///
/// # Example
///
/// ```rust
/// use threadsmith::build_oauth2_user_context_header;
///
/// let header = build_oauth2_user_context_header("your_access_token");
/// assert_eq!(header, "Bearer your_access_token");
/// ```
pub fn build_oauth2_user_context_header(access_token: &str) -> String {
    format!("Bearer {}", access_token)
}

/// Exchanges a refresh token for a new access token.
///
/// # Parameters
///
/// - `client`: HTTP client used for the token request
/// - `token_url`: The OAuth 2.0 token endpoint
/// - `client_id` / `client_secret`: App credentials sent as HTTP basic auth
/// - `refresh_token`: The refresh token issued with the current access token
///
/// # Returns
///
/// - `Ok((access_token, Some(refresh_token)))`: When Twitter rotated the refresh token
/// - `Ok((access_token, None))`: When only the access token was renewed
/// - `Err(ActionError::Authentication)`: If the token endpoint rejected the request
pub async fn refresh_access_token(
    client: &Client,
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<(String, Option<String>), ActionError> {
    info!("Requesting new access token from {}", token_url);

    let params = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", client_id),
    ];

    let response = client
        .post(token_url)
        .basic_auth(client_id, Some(client_secret))
        .form(&params)
        .send()
        .await
        .map_err(|e| ActionError::network("twitter", e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ActionError::network("twitter", e))?;

    if !status.is_success() {
        error!("Token refresh failed with status {}", status);
        debug!(
            "Token refresh error body: {}",
            crate::twitter::sanitize_for_logging(&body, 200)
        );
        return Err(ActionError::Authentication {
            service: "twitter",
            message: format!("token refresh failed ({})", status),
        });
    }

    let json: serde_json::Value = serde_json::from_str(&body)?;
    let access_token = json
        .get("access_token")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ActionError::Authentication {
            service: "twitter",
            message: "no access_token in token response".to_string(),
        })?;

    let new_refresh_token = json
        .get("refresh_token")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    if new_refresh_token.is_some() {
        info!("Token endpoint rotated the refresh token");
    }

    Ok((access_token.to_string(), new_refresh_token))
}
