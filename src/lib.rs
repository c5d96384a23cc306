//! # Threadsmith Library
//!
//! A GitHub Action that turns new blog posts into Twitter/X threads. Changed
//! posts are detected from the git diff, a thread is drafted by an LLM through
//! OpenRouter in the author's own writing style, validated and optimized for
//! engagement, and then either proposed in a pull request for human review or
//! posted directly via the Twitter/X API v2 using OAuth 2.0 User Context
//! authentication.
//!
//! ## Features
//!
//! - Markdown and Jupyter notebook posts with YAML frontmatter (`publish`, `auto_post`)
//! - Writing style analysis across all published posts
//! - Thread drafting with hooks and hashtags, with regeneration on invalid output
//! - Character limit, profanity, personal data and numeric claim checks
//! - Review pull requests or auto-posting with duplicate detection and cleanup
//! - Retry with exponential backoff and jitter for every external call
//! - Structured logging, run metrics and a job summary dashboard
//!
//! ## Configuration
//!
//! - `.github/tweet-generator-config.yml`: Optional YAML settings file
//! - `INPUT_*`: GitHub Action inputs overriding individual settings
//! - `OPENROUTER_API_KEY`: OpenRouter API key
//! - `GITHUB_TOKEN`, `GITHUB_REPOSITORY`: Pull request creation
//! - `TWITTER_ACCESS_TOKEN` (+ optional refresh credentials): Auto-posting

pub mod artifact;
pub mod config;
pub mod content;
pub mod engagement;
pub mod error;
pub mod github;
pub mod metrics;
pub mod oauth;
pub mod openrouter;
pub mod pipeline;
pub mod recovery;
pub mod style;
pub mod twitter;
pub mod validation;

// Re-export commonly used types and functions
pub use config::{ActionConfig, EngagementLevel, TwitterCredentials};
pub use content::BlogPost;
pub use engagement::Thread;
pub use error::ActionError;
pub use oauth::build_oauth2_user_context_header;
pub use pipeline::Pipeline;
pub use recovery::ErrorHandler;

#[cfg(test)]
mod tests;
