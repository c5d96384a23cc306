//! Twitter/X API integration module.
//!
//! This module contains the client used to auto-post threads with OAuth 2.0
//! User Context authentication, and the record of threads already posted.

mod api;
mod posted;
mod tweets;

pub use api::{sanitize_for_logging, TwitterClient};
pub use posted::{content_hash, PostedRecord, PostedStore};
pub use tweets::{tweet_url, PostedThread};
