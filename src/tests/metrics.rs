use std::time::Instant;

use crate::metrics::{PostOutcome, PostReport, RunMetrics};

fn report(title: &str, outcome: PostOutcome) -> PostReport {
    PostReport {
        post_file: format!("_posts/{}.md", title),
        title: title.to_string(),
        outcome,
        engagement_score: Some(0.5),
    }
}

fn sample_metrics() -> RunMetrics {
    let mut metrics = RunMetrics::start();
    metrics.posts_detected = 4;
    metrics.threads_generated = 2;
    metrics.record_post(report(
        "first",
        PostOutcome::PullRequest {
            url: "https://github.com/octo/blog/pull/3".to_string(),
            number: 3,
        },
    ));
    metrics.record_post(report(
        "second",
        PostOutcome::Posted {
            thread_url: "https://x.com/i/web/status/9".to_string(),
            tweets: 4,
        },
    ));
    metrics.record_post(report(
        "third",
        PostOutcome::Skipped {
            reason: "publish: false".to_string(),
        },
    ));
    metrics.record_post(report(
        "fourth",
        PostOutcome::Failed {
            error: "openrouter API error (400): bad | request".to_string(),
        },
    ));
    metrics
}

/// Tests that outcomes bump the matching counters.
#[test]
fn test_record_post_counters() {
    let metrics = sample_metrics();
    assert_eq!(metrics.pull_requests, 1);
    assert_eq!(metrics.threads_posted, 1);
    assert_eq!(metrics.posts_skipped, 1);
    assert_eq!(metrics.posts_failed, 1);
    assert_eq!(metrics.posts.len(), 4);
    assert_eq!(
        metrics.first_pr_url(),
        Some("https://github.com/octo/blog/pull/3")
    );
}

/// Tests the step outputs.
#[test]
fn test_action_outputs() {
    let outputs = sample_metrics().action_outputs();
    let get = |name: &str| {
        outputs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.clone())
    };

    assert_eq!(get("posts_processed").as_deref(), Some("4"));
    assert_eq!(get("threads_generated").as_deref(), Some("2"));
    assert_eq!(get("pr_created").as_deref(), Some("true"));
    assert_eq!(get("auto_posted").as_deref(), Some("true"));
    assert_eq!(
        get("pr_url").as_deref(),
        Some("https://github.com/octo/blog/pull/3")
    );

    let empty = RunMetrics::start().action_outputs();
    assert!(empty.contains(&("pr_created", "false".to_string())));
    assert!(empty.contains(&("pr_url", String::new())));
}

/// Tests the job summary dashboard.
#[test]
fn test_render_summary() {
    let mut metrics = sample_metrics();
    metrics.record_stage("generate", Instant::now());

    let summary = metrics.render_summary();
    assert!(summary.starts_with("## 🧵 Blog thread generator"));
    assert!(summary.contains("| Posts detected | 4 |"));
    assert!(summary.contains("| Pull requests | 1 |"));
    assert!(summary.contains("📝 PR [#3](https://github.com/octo/blog/pull/3)"));
    assert!(summary.contains("✅ posted 4 tweets"));
    assert!(summary.contains("⏭️ skipped: publish: false"));
    // pipes would break the table
    assert!(summary.contains("bad \\| request"));
    assert!(summary.contains("| 0.50 |"));
    assert!(summary.contains("### Timings"));
    assert!(summary.contains("- generate: "));
}

/// Tests saving the metrics file.
#[test]
fn test_save_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let mut metrics = sample_metrics();
    metrics.finish(Vec::new(), 3);

    let path = metrics.save(&dir.path().join(".generated")).unwrap();
    assert!(path.ends_with("run-metrics.json"));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["retries"], 3);
    assert_eq!(json["posts"][0]["outcome"]["status"], "pull_request");
    assert_eq!(json["posts"][1]["outcome"]["status"], "posted");
    assert!(json["finished_at"].is_string());
}
