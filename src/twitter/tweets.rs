//! Tweet operations for Twitter API.
//!
//! This module contains functions for posting, replying to and deleting
//! tweets, and for publishing a whole thread as a reply chain.

use log::{debug, error, info, warn};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::api::TwitterClient;
use crate::error::ActionError;
use crate::recovery::ErrorHandler;

/// Result of publishing a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostedThread {
    /// Tweet IDs in thread order.
    pub tweet_ids: Vec<String>,
    /// Link to the first tweet.
    pub thread_url: String,
}

/// Link to a tweet that works without knowing the author's handle.
pub fn tweet_url(tweet_id: &str) -> String {
    format!("https://x.com/i/web/status/{}", tweet_id)
}

/// Extracts `data.id` from a create-tweet response.
fn created_tweet_id(response: &str) -> Result<String, ActionError> {
    let json: serde_json::Value = serde_json::from_str(response)?;
    json.pointer("/data/id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ActionError::Api {
            service: "twitter",
            status: 200,
            message: "create tweet response has no data.id".to_string(),
            retryable: false,
        })
}

impl TwitterClient {
    /// Posts a tweet using the API v2 endpoint.
    ///
    /// # Parameters
    ///
    /// - `text`: The text content of the tweet to post
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The ID of the new tweet
    /// - `Err(ActionError)`: If authentication fails, network error, or API error
    pub async fn post_tweet(&self, text: &str) -> Result<String, ActionError> {
        info!("Starting tweet post operation ({} characters)", text.chars().count());

        let payload = json!({
            "text": text
        });
        debug!("Tweet payload: {}", payload);

        let response = self
            .make_authenticated_request(Method::POST, "/tweets", Some(payload), "post_tweet")
            .await?;
        created_tweet_id(&response)
    }

    /// Replies to a tweet by including the `reply` parameter in the tweet payload.
    ///
    /// # Parameters
    ///
    /// - `text`: The text content of the reply tweet
    /// - `reply_to_tweet_id`: The ID of the tweet to reply to
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The ID of the reply tweet
    /// - `Err(ActionError)`: If authentication fails, network error, or API error
    pub async fn reply_to_tweet(
        &self,
        text: &str,
        reply_to_tweet_id: &str,
    ) -> Result<String, ActionError> {
        info!("Starting reply operation to tweet {}", reply_to_tweet_id);

        let payload = json!({
            "text": text,
            "reply": {
                "in_reply_to_tweet_id": reply_to_tweet_id
            }
        });
        debug!("Reply payload: {}", payload);

        let response = self
            .make_authenticated_request(Method::POST, "/tweets", Some(payload), "reply_to_tweet")
            .await?;
        created_tweet_id(&response)
    }

    /// Deletes one of the authenticated user's tweets.
    pub async fn delete_tweet(&self, tweet_id: &str) -> Result<(), ActionError> {
        info!("Deleting tweet {}", tweet_id);
        let path = format!("/tweets/{}", urlencoding::encode(tweet_id));
        self.make_authenticated_request(Method::DELETE, &path, None, "delete_tweet")
            .await?;
        Ok(())
    }

    /// Publishes `tweets` as a thread: the first as a standalone tweet, every
    /// following one as a reply to its predecessor.
    ///
    /// Each tweet goes through `handler`, so rate limits and network failures are
    /// retried with backoff. If a tweet still fails, the tweets already posted
    /// are deleted (best effort, newest first) so no half thread stays online.
    ///
    /// # Returns
    ///
    /// - `Ok(PostedThread)`: IDs of every posted tweet and the thread URL
    /// - `Err(ActionError)`: The error that stopped the thread
    pub async fn post_thread(
        &self,
        tweets: &[String],
        handler: &ErrorHandler,
    ) -> Result<PostedThread, ActionError> {
        if tweets.is_empty() {
            return Err(ActionError::Validation(
                "cannot post an empty thread".to_string(),
            ));
        }

        info!("Posting thread of {} tweet(s)", tweets.len());
        let mut tweet_ids: Vec<String> = Vec::with_capacity(tweets.len());

        for (index, text) in tweets.iter().enumerate() {
            let result = match tweet_ids.last() {
                None => handler.run("post_tweet", || self.post_tweet(text)).await,
                Some(previous) => {
                    handler
                        .run("reply_to_tweet", || self.reply_to_tweet(text, previous))
                        .await
                }
            };

            match result {
                Ok(id) => {
                    debug!("Posted tweet {}/{}: {}", index + 1, tweets.len(), id);
                    tweet_ids.push(id);
                }
                Err(err) => {
                    error!(
                        "Thread posting stopped at tweet {}/{}: {}",
                        index + 1,
                        tweets.len(),
                        err
                    );
                    self.cleanup_partial_thread(&tweet_ids).await;
                    return Err(err);
                }
            }
        }

        let thread_url = tweet_url(&tweet_ids[0]);
        info!("Thread posted: {}", thread_url);
        Ok(PostedThread {
            tweet_ids,
            thread_url,
        })
    }

    /// Deletes already posted tweets of a failed thread, newest first.
    async fn cleanup_partial_thread(&self, tweet_ids: &[String]) {
        if tweet_ids.is_empty() {
            return;
        }
        warn!(
            "Deleting {} tweet(s) of the partially posted thread",
            tweet_ids.len()
        );
        for id in tweet_ids.iter().rev() {
            if let Err(e) = self.delete_tweet(id).await {
                error!("Failed to delete tweet {} during cleanup: {}", id, e);
            }
        }
    }
}
