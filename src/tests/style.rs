use std::path::Path;

use crate::config::ActionConfig;
use crate::content::BlogPost;
use crate::style::{
    build_or_load_profile, is_emoji, load_profile, save_profile, StyleAnalyzer, StyleProfile,
};

fn post(name: &str, body: &str) -> BlogPost {
    BlogPost::from_source(
        Path::new(&format!("_posts/2024-01-01-{}.md", name)),
        body,
        &ActionConfig::default(),
    )
    .unwrap()
}

fn corpus() -> Vec<BlogPost> {
    vec![
        post(
            "async",
            "---\ntitle: Async Rust\n---\n# Async Rust\n\nI love async Rust! My first server was a mess. Why did it block? The runtime explained it.\n\n```rust\nasync fn main() {}\n```\n\n- use tokio\n- avoid blocking calls\n\nIt's awesome 🚀",
        ),
        post(
            "cli",
            "---\ntitle: Building a CLI\n---\nI built a CLI in Rust. The compiler caught every mistake. Have you tried it? 🚀🦀\n\nThe API is simple and the JSON parsing is fast.",
        ),
    ]
}

/// Tests that an empty corpus yields the neutral profile.
#[test]
fn test_analyze_empty_corpus() {
    let analyzer = StyleAnalyzer::new().unwrap();
    let profile = analyzer.analyze(&[]);

    assert_eq!(profile.posts_analyzed, 0);
    assert_eq!(profile.tone.formality, 0.5);
    assert!(profile.vocabulary.common_words.is_empty());
    assert!(profile
        .prompt_summary()
        .starts_with("No previous posts were available"));
}

/// Tests the vocabulary, tone, structure and emoji figures of a small corpus.
#[test]
fn test_analyze_corpus() {
    let analyzer = StyleAnalyzer::new().unwrap();
    let profile = analyzer.analyze(&corpus());

    assert_eq!(profile.posts_analyzed, 2);
    assert!(profile
        .vocabulary
        .technical_terms
        .iter()
        .any(|t| t == "rust"));
    assert!(profile.vocabulary.technical_terms.iter().any(|t| t == "CLI"));
    assert!(profile.vocabulary.common_words.iter().any(|w| w == "rust"));
    assert!(profile.vocabulary.vocabulary_diversity > 0.0);
    assert!(profile.vocabulary.vocabulary_diversity <= 1.0);

    assert!(profile.structure.question_frequency > 0.0);
    assert!((profile.structure.code_blocks_per_post - 0.5).abs() < f64::EPSILON);
    assert!(profile.structure.headers_per_post > 0.0);
    assert!(profile.structure.list_usage > 0.0);

    assert!(profile.tone.personal_anecdotes > 0.0);
    for score in [
        profile.tone.enthusiasm,
        profile.tone.formality,
        profile.tone.humor,
        profile.tone.confidence,
        profile.tone.personal_anecdotes,
    ] {
        assert!((0.0..=1.0).contains(&score));
    }

    assert_eq!(profile.emoji.common_emojis.first().map(String::as_str), Some("🚀"));
    assert!(profile.emoji.emojis_per_100_words > 0.0);
}

/// Tests that code blocks do not count as prose.
#[test]
fn test_analyze_ignores_code_blocks() {
    let analyzer = StyleAnalyzer::new().unwrap();
    let profile = analyzer.analyze(&[post(
        "code",
        "Short intro.\n\n```python\nprint('hello world?')\nprint('again?')\n```",
    )]);
    assert_eq!(profile.structure.question_frequency, 0.0);
    assert!(!profile.vocabulary.common_words.iter().any(|w| w == "print"));
}

/// Tests the prompt summary of an analyzed profile.
#[test]
fn test_prompt_summary_mentions_terms_and_emojis() {
    let analyzer = StyleAnalyzer::new().unwrap();
    let summary = analyzer.analyze(&corpus()).prompt_summary();

    assert!(summary.starts_with("Tone: "));
    assert!(summary.contains("Frequent technical terms:"));
    assert!(summary.contains("🚀"));
    assert!(summary.contains("Often asks the reader questions."));
}

/// Tests saving and loading the cached profile.
#[test]
fn test_save_and_load_profile() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".generated/writing-style-profile.json");

    assert_eq!(load_profile(&path).unwrap(), None);

    let profile = StyleAnalyzer::new().unwrap().analyze(&corpus());
    save_profile(&profile, &path).unwrap();

    let loaded: StyleProfile = load_profile(&path).unwrap().unwrap();
    assert_eq!(loaded.posts_analyzed, 2);
    assert_eq!(loaded.vocabulary.common_words, profile.vocabulary.common_words);
    assert_eq!(loaded.emoji.common_emojis, profile.emoji.common_emojis);
}

#[test]
fn test_is_emoji() {
    assert!(is_emoji('🚀'));
    assert!(is_emoji('🦀'));
    assert!(is_emoji('☕'));
    assert!(!is_emoji('a'));
    assert!(!is_emoji('é'));
}

/// Tests that an empty corpus reuses the cached profile and a real corpus refreshes it.
#[test]
fn test_build_or_load_profile() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".generated/writing-style-profile.json");

    assert_eq!(build_or_load_profile(&[], &path).posts_analyzed, 0);
    assert!(!path.exists());

    let cached = StyleProfile {
        posts_analyzed: 7,
        ..StyleProfile::default()
    };
    save_profile(&cached, &path).unwrap();
    assert_eq!(build_or_load_profile(&[], &path).posts_analyzed, 7);

    let fresh = build_or_load_profile(&corpus(), &path);
    assert_eq!(fresh.posts_analyzed, corpus().len());
    assert_eq!(
        load_profile(&path).unwrap().unwrap().posts_analyzed,
        corpus().len()
    );
}
