//! # Tests Module
//!
//! Unit tests for the individual stages and integration tests for the remote
//! APIs and the full pipeline.
//!
//! ## Test Categories
//!
//! ### Unit Tests
//! - Configuration parsing, overrides and validation
//! - Post parsing, slugs and diff filtering
//! - Style analysis, validation checks and engagement optimization
//! - Error classification and backoff
//!
//! ### Integration Tests
//! - OpenRouter, GitHub and Twitter clients against a `wiremock` server
//! - Pipeline runs over a temporary repository checkout
//!
//! ## Test Environment
//!
//! No test touches the real APIs or the process environment. Every HTTP call
//! goes to a local mock server and every file is written to a temporary
//! directory that is removed when the test finishes.

mod config;
mod metrics;
mod style;
mod twitter;
mod validation;

use serde_json::{json, Value};
use std::path::Path;

use crate::config::{ActionConfig, ApiEndpoints, RetryConfig, Secrets, TwitterCredentials};
use crate::content::BlogPost;

/// A Markdown post with every frontmatter field the pipeline reads.
pub(crate) const SAMPLE_POST: &str = "---
title: \"Hello Rust\"
date: 2024-03-01
categories: [rust, programming]
tags: cli
summary: A first look at ownership.
auto_post: true
---

# Hello Rust

Rust makes memory safety practical. I love how the compiler catches mistakes early!

Have you tried the borrow checker yet? It feels strict at first.
";

/// Repository-relative path used for [`SAMPLE_POST`].
pub(crate) const SAMPLE_POST_PATH: &str = "_posts/2024-03-01-hello-rust.md";

/// Creates a configuration whose APIs all point at `server_uri`.
///
/// Retries are kept but their delays are cut to a few milliseconds so retry
/// tests stay fast.
pub(crate) fn test_config(server_uri: &str) -> ActionConfig {
    ActionConfig {
        api: ApiEndpoints {
            openrouter_url: server_uri.to_string(),
            github_url: server_uri.to_string(),
            twitter_url: server_uri.to_string(),
            twitter_token_url: format!("{}/oauth2/token", server_uri),
        },
        retry: RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        },
        secrets: Secrets {
            openrouter_api_key: Some("test-openrouter-key".to_string()),
            github_token: Some("test-github-token".to_string()),
            github_repository: Some("octo/blog".to_string()),
            twitter: Some(TwitterCredentials {
                access_token: "old-access-token".to_string(),
                refresh_token: Some("refresh-token-1".to_string()),
                client_id: Some("client-id".to_string()),
                client_secret: Some("client-secret".to_string()),
            }),
        },
        ..ActionConfig::default()
    }
}

/// Parses [`SAMPLE_POST`] with the given configuration.
pub(crate) fn sample_post(config: &ActionConfig) -> BlogPost {
    BlogPost::from_source(Path::new(SAMPLE_POST_PATH), SAMPLE_POST, config)
        .expect("sample post should parse")
}

/// The thread the mocked model answers with.
pub(crate) fn sample_thread_json() -> Value {
    json!({
        "hooks": [
            "Why do Rust developers stop worrying about memory bugs? Here is what I learned from the borrow checker 🦀"
        ],
        "tweets": [
            "Rust makes memory safety practical.",
            "The compiler catches mistakes early, before they reach production.",
            "The borrow checker feels strict at first, then it becomes a pair programmer."
        ],
        "hashtags": ["rust", "#programming"]
    })
}

/// Wraps `content` in an OpenRouter chat-completion response body.
pub(crate) fn completion_body(model: &str, content: &Value) -> Value {
    json!({
        "id": "gen-123",
        "model": model,
        "choices": [
            {
                "index": 0,
                "message": { "role": "assistant", "content": content.to_string() },
                "finish_reason": "stop"
            }
        ],
        "usage": { "prompt_tokens": 812, "completion_tokens": 164 }
    })
}
