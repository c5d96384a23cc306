use std::collections::HashMap;
use tokio_test::{assert_err, assert_ok};

use super::test_config;
use crate::config::{mask_secret, ActionConfig, EngagementLevel, Secrets};
use crate::error::ActionError;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name: &str| map.get(name).cloned()
}

/// Tests that an empty configuration file yields the built-in defaults.
#[test]
fn test_from_yaml_empty_uses_defaults() {
    let config = ActionConfig::from_yaml("").unwrap();
    assert_eq!(config.model, "anthropic/claude-3-haiku");
    assert_eq!(config.max_tweets_per_thread, 10);
    assert_eq!(config.engagement_level, EngagementLevel::Medium);
    assert!(config.include_thread_numbering);
    assert!(!config.auto_post_enabled);
    assert_eq!(config.posts_directory, "_posts");
    assert_eq!(config.retry.max_attempts, 3);
}

/// Tests that YAML settings override defaults, including nested sections.
#[test]
fn test_from_yaml_overrides_defaults() {
    let yaml = r#"
model: openai/gpt-4o-mini
fallback_model: anthropic/claude-3-haiku
engagement_level: high
max_tweets_per_thread: 6
auto_post_enabled: true
site_url: https://blog.example.com
retry:
  max_attempts: 5
  base_delay_ms: 250
"#;
    let config = ActionConfig::from_yaml(yaml).unwrap();

    assert_eq!(config.model, "openai/gpt-4o-mini");
    assert_eq!(config.fallback_model.as_deref(), Some("anthropic/claude-3-haiku"));
    assert_eq!(config.engagement_level, EngagementLevel::High);
    assert_eq!(config.max_tweets_per_thread, 6);
    assert!(config.auto_post_enabled);
    assert_eq!(config.site_url.as_deref(), Some("https://blog.example.com"));
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.base_delay_ms, 250);
    // untouched nested default
    assert_eq!(config.retry.max_delay_ms, 60_000);
}

/// Tests that malformed YAML is reported as a configuration error.
#[test]
fn test_from_yaml_invalid_is_configuration_error() {
    let result = ActionConfig::from_yaml("max_tweets_per_thread: [not, a, number]");
    assert!(matches!(result, Err(ActionError::Configuration(_))));
}

/// Tests loading from a file on disk and the missing-file fallback.
#[test]
fn test_load_from_file_and_missing_file() {
    let dir = tempfile::tempdir().unwrap();

    let missing = assert_ok!(ActionConfig::load(dir.path().join("nope.yml")));
    assert_eq!(missing.model, ActionConfig::default().model);

    let path = dir.path().join("tweet-generator-config.yml");
    std::fs::write(&path, "dry_run: true\nbase_branch: trunk\n").unwrap();
    let config = ActionConfig::load(&path).unwrap();
    assert!(config.dry_run);
    assert_eq!(config.base_branch, "trunk");
}

/// Tests that action inputs override file settings.
#[test]
fn test_apply_overrides_from_inputs() {
    let mut config = ActionConfig::default();
    let lookup = lookup_from(&[
        ("INPUT_OPENROUTER_MODEL", "meta-llama/llama-3-70b"),
        ("INPUT_ENGAGEMENT_LEVEL", "Low"),
        ("INPUT_MAX_TWEETS_PER_THREAD", "4"),
        ("INPUT_TEMPERATURE", "0.2"),
        ("INPUT_DRY_RUN", "yes"),
        ("INPUT_AUTO_POST_ENABLED", "false"),
        ("INPUT_POSTS_DIRECTORY", "content/posts"),
    ]);

    config.apply_overrides(&lookup).unwrap();

    assert_eq!(config.model, "meta-llama/llama-3-70b");
    assert_eq!(config.engagement_level, EngagementLevel::Low);
    assert_eq!(config.max_tweets_per_thread, 4);
    assert!((config.temperature - 0.2).abs() < f32::EPSILON);
    assert!(config.dry_run);
    assert!(!config.auto_post_enabled);
    assert_eq!(config.posts_directory, "content/posts");
}

/// Tests that unparseable inputs are rejected instead of silently ignored.
#[test]
fn test_apply_overrides_rejects_invalid_values() {
    let mut config = ActionConfig::default();
    let bad_bool = lookup_from(&[("INPUT_DRY_RUN", "maybe")]);
    assert!(matches!(
        config.apply_overrides(&bad_bool),
        Err(ActionError::Configuration(_))
    ));

    let bad_number = lookup_from(&[("INPUT_MAX_TOKENS", "lots")]);
    assert!(config.apply_overrides(&bad_number).is_err());

    let bad_level = lookup_from(&[("INPUT_ENGAGEMENT_LEVEL", "extreme")]);
    assert!(config.apply_overrides(&bad_level).is_err());
}

/// Tests that a dry run only needs the OpenRouter key.
#[test]
fn test_validate_dry_run_requires_only_openrouter_key() {
    let mut config = ActionConfig {
        dry_run: true,
        ..ActionConfig::default()
    };
    assert_err!(config.validate());

    config.secrets = Secrets {
        openrouter_api_key: Some("key".to_string()),
        ..Secrets::default()
    };
    assert_ok!(config.validate());
}

/// Tests that every problem is reported at once.
#[test]
fn test_validate_collects_all_problems() {
    let config = ActionConfig {
        temperature: 3.5,
        max_tweets_per_thread: 40,
        auto_post_enabled: true,
        secrets: Secrets {
            openrouter_api_key: Some("key".to_string()),
            github_token: None,
            github_repository: Some("not-a-repo".to_string()),
            twitter: None,
        },
        ..ActionConfig::default()
    };

    let message = match config.validate() {
        Err(ActionError::Configuration(message)) => message,
        other => panic!("expected configuration error, got {:?}", other),
    };
    assert!(message.contains("GITHUB_TOKEN"));
    assert!(message.contains("owner/repo"));
    assert!(message.contains("TWITTER_ACCESS_TOKEN"));
    assert!(message.contains("temperature"));
    assert!(message.contains("max_tweets_per_thread"));
}

/// Tests when auto-posting is possible.
#[test]
fn test_can_auto_post() {
    let mut config = test_config("http://localhost");
    assert!(!config.can_auto_post());

    config.auto_post_enabled = true;
    assert!(config.can_auto_post());

    config.dry_run = true;
    assert!(!config.can_auto_post());

    config.dry_run = false;
    config.secrets.twitter = None;
    assert!(!config.can_auto_post());
}

/// Tests secret masking for logs.
#[test]
fn test_mask_secret() {
    assert_eq!(mask_secret("short"), "***");
    assert_eq!(mask_secret("123456789abc"), "12345678...");
    assert_eq!(
        mask_secret("abcdefgh-middle-part-12345678"),
        "abcdefgh...12345678"
    );
}

/// Tests that the refresh capability needs all three refresh credentials.
#[test]
fn test_twitter_credentials_can_refresh_token() {
    let mut credentials = test_config("http://localhost").secrets.twitter.unwrap();
    assert!(credentials.can_refresh_token());

    credentials.client_secret = None;
    assert!(!credentials.can_refresh_token());
}

/// Tests that the action metadata declares every input read and every output written.
#[test]
fn test_action_metadata_matches_inputs_and_outputs() {
    let metadata: serde_yaml::Value =
        serde_yaml::from_str(include_str!("../../action.yml")).unwrap();
    let inputs = metadata["inputs"].as_mapping().unwrap();
    let outputs = metadata["outputs"].as_mapping().unwrap();

    for name in [
        "openrouter_model",
        "fallback_model",
        "engagement_level",
        "max_tweets_per_thread",
        "hook_variations_count",
        "max_tokens",
        "temperature",
        "auto_post_enabled",
        "dry_run",
        "process_all",
        "posts_directory",
        "notebooks_directory",
        "output_directory",
        "base_branch",
        "site_url",
        "config_file",
        "log_level",
        "openrouter_api_key",
        "github_token",
    ] {
        assert!(inputs.contains_key(name), "input {} is not declared", name);
        // an input default would shadow the config file
        if !name.ends_with("_token") {
            assert!(inputs[name].get("default").is_none(), "input {} has a default", name);
        }
    }

    for (name, _) in crate::metrics::RunMetrics::start().action_outputs() {
        assert!(outputs.contains_key(name), "output {} is not declared", name);
    }
}
