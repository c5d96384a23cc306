use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{sample_post, test_config};
use crate::config::ActionConfig;
use crate::error::ActionError;
use crate::recovery::ErrorHandler;
use crate::twitter::{
    content_hash, sanitize_for_logging, tweet_url, PostedRecord, PostedStore, TwitterClient,
};

fn created(id: &str) -> ResponseTemplate {
    ResponseTemplate::new(201).set_body_json(json!({ "data": { "id": id, "text": "..." } }))
}

fn client_for(config: &ActionConfig) -> TwitterClient {
    TwitterClient::new(reqwest::Client::new(), config).unwrap()
}

fn thread(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Tests the log sanitizer.
#[test]
fn test_sanitize_for_logging() {
    assert_eq!(sanitize_for_logging("line\nbreak\ttab", 100), "line break tab");
    assert_eq!(sanitize_for_logging("bell\u{7}", 100), "bell?");

    let long = "é".repeat(50);
    let sanitized = sanitize_for_logging(&long, 10);
    assert!(sanitized.starts_with(&"é".repeat(10)));
    assert!(sanitized.ends_with("... [truncated, 100 total bytes]"));
}

#[test]
fn test_tweet_url() {
    assert_eq!(tweet_url("1234"), "https://x.com/i/web/status/1234");
}

/// Integration test: every tweet after the first replies to its predecessor.
#[tokio::test]
async fn test_post_thread_builds_reply_chain() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tweets"))
        .and(header("Authorization", "Bearer old-access-token"))
        .and(body_partial_json(json!({ "text": "first" })))
        .respond_with(created("100"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tweets"))
        .and(body_partial_json(
            json!({ "text": "second", "reply": { "in_reply_to_tweet_id": "100" } }),
        ))
        .respond_with(created("101"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tweets"))
        .and(body_partial_json(
            json!({ "text": "third", "reply": { "in_reply_to_tweet_id": "101" } }),
        ))
        .respond_with(created("102"))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let handler = ErrorHandler::new(&config.retry);
    let posted = client_for(&config)
        .post_thread(&thread(&["first", "second", "third"]), &handler)
        .await
        .unwrap();

    assert_eq!(posted.tweet_ids, vec!["100", "101", "102"]);
    assert_eq!(posted.thread_url, "https://x.com/i/web/status/100");
}

/// Integration test: a failing tweet removes the tweets already posted.
#[tokio::test]
async fn test_post_thread_cleans_up_partial_thread() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tweets"))
        .and(body_partial_json(json!({ "text": "first" })))
        .respond_with(created("200"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tweets"))
        .and(body_partial_json(json!({ "text": "second" })))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "title": "Forbidden",
            "detail": "You are not allowed to create a Tweet with duplicate content."
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/tweets/200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "deleted": true } })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let handler = ErrorHandler::new(&config.retry);
    let err = client_for(&config)
        .post_thread(&thread(&["first", "second", "third"]), &handler)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ActionError::Api {
            service: "twitter",
            status: 403,
            retryable: false,
            ..
        }
    ));
}

/// Integration test: server errors are retried before giving up on a tweet.
#[tokio::test]
async fn test_post_thread_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tweets"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tweets"))
        .respond_with(created("300"))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let handler = ErrorHandler::new(&config.retry);
    let posted = client_for(&config)
        .post_thread(&thread(&["only"]), &handler)
        .await
        .unwrap();

    assert_eq!(posted.tweet_ids, vec!["300"]);
    assert_eq!(handler.retry_count(), 2);
}

/// Tests that an empty thread is rejected before any request.
#[tokio::test]
async fn test_post_thread_rejects_empty_thread() {
    let config = test_config("http://127.0.0.1:9");
    let handler = ErrorHandler::new(&config.retry);
    let result = client_for(&config).post_thread(&[], &handler).await;
    assert!(matches!(result, Err(ActionError::Validation(_))));
}

/// Integration test: a 401 refreshes the access token and replays the request.
#[tokio::test]
async fn test_expired_token_is_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tweets"))
        .and(header("Authorization", "Bearer old-access-token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "title": "Unauthorized" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "bearer",
            "access_token": "new-access-token",
            "refresh_token": "refresh-token-2",
            "expires_in": 7200
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tweets"))
        .and(header("Authorization", "Bearer new-access-token"))
        .respond_with(created("555"))
        .expect(2)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let client = client_for(&config);

    assert_eq!(client.post_tweet("hello").await.unwrap(), "555");
    // the refreshed token is kept for later requests
    assert_eq!(client.post_tweet("again").await.unwrap(), "555");
}

/// Integration test: a 401 without refresh credentials is an authentication error.
#[tokio::test]
async fn test_expired_token_without_refresh_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tweets"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri());
    if let Some(twitter) = config.secrets.twitter.as_mut() {
        twitter.refresh_token = None;
    }

    let err = client_for(&config).post_tweet("hello").await.unwrap_err();
    assert!(matches!(
        err,
        ActionError::Authentication {
            service: "twitter",
            ..
        }
    ));
}

/// Integration test: a rejected refresh is an authentication error.
#[tokio::test]
async fn test_refresh_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tweets"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_request",
            "error_description": "Value passed for the token was invalid."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let err = client_for(&config).post_tweet("hello").await.unwrap_err();
    assert!(matches!(err, ActionError::Authentication { .. }));
}

/// Integration test: 429 responses become rate-limit errors.
#[tokio::test]
async fn test_rate_limit_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tweets"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("x-rate-limit-reset", Utc::now().timestamp().to_string().as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let err = client_for(&config).post_tweet("hello").await.unwrap_err();
    assert!(matches!(
        err,
        ActionError::RateLimit {
            service: "twitter",
            retry_after: Some(_)
        }
    ));
}

/// Tests the posting record used for duplicate detection.
#[test]
fn test_posted_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = PostedStore::new(dir.path().join(".posted"));
    let config = test_config("http://localhost");
    let post = sample_post(&config);

    assert!(store.ensure_not_posted(&post).is_ok());
    assert_eq!(store.load(&post.slug).unwrap(), None);

    let record = PostedRecord {
        slug: post.slug.clone(),
        post_file: post.file_path.display().to_string(),
        content_hash: content_hash(&post),
        tweet_ids: vec!["1".to_string(), "2".to_string()],
        thread_url: tweet_url("1"),
        posted_at: Utc::now(),
    };
    let saved = store.save(&record).unwrap();
    assert_eq!(saved, dir.path().join(".posted/hello-rust.json"));

    assert!(matches!(
        store.ensure_not_posted(&post),
        Err(ActionError::Duplicate(slug)) if slug == "hello-rust"
    ));
    assert_eq!(store.load("hello-rust").unwrap(), Some(record));
}

/// Tests that a corrupt record still blocks reposting.
#[test]
fn test_posted_store_unreadable_record_counts_as_posted() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hello-rust.json"), "{ not json").unwrap();
    let store = PostedStore::new(dir.path());
    let post = sample_post(&test_config("http://localhost"));

    assert!(store.load("hello-rust").is_err());
    assert!(matches!(
        store.ensure_not_posted(&post),
        Err(ActionError::Duplicate(_))
    ));
}

#[test]
fn test_posted_record_relative_path() {
    assert_eq!(
        PostedStore::relative_path(".posted/", "hello-rust"),
        ".posted/hello-rust.json"
    );
}

/// Tests the content hash of a post body.
#[test]
fn test_content_hash() {
    let config = test_config("http://localhost");
    let post = sample_post(&config);
    let hash = content_hash(&post);

    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(hash, content_hash(&post.clone()));

    let mut edited = post.clone();
    edited.content.push_str("\nUpdate: fixed a typo.");
    assert_ne!(content_hash(&edited), hash);
}
