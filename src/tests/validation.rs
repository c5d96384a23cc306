use crate::error::ActionError;
use crate::validation::{
    weighted_length, IssueKind, IssueSeverity, ThreadValidator, TWEET_CHAR_LIMIT, URL_WEIGHT,
};

fn validator() -> ThreadValidator {
    ThreadValidator::new(10).unwrap()
}

fn tweets(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Tests the weighted length used for the character limit.
#[test]
fn test_weighted_length() {
    assert_eq!(weighted_length("hello"), 5);
    assert_eq!(
        weighted_length("read https://example.com/a/very/long/path/that/goes/on"),
        5 + URL_WEIGHT
    );
    assert_eq!(
        weighted_length("http://a.io and https://b.io"),
        URL_WEIGHT + 5 + URL_WEIGHT
    );
    assert_eq!(weighted_length("🧵"), 2);
    assert_eq!(weighted_length("naïve"), 5);
}

/// Tests that a clean thread passes without issues.
#[test]
fn test_validate_clean_thread() {
    let report = validator().validate(&tweets(&[
        "Rust makes memory safety practical.",
        "The borrow checker feels strict at first.",
        "Read the full post: https://blog.example.com/hello-rust #rust",
    ]));
    assert!(report.is_valid());
    assert!(report.issues.is_empty(), "unexpected issues: {:?}", report.issues);
}

/// Tests the thread-level length checks.
#[test]
fn test_validate_thread_length() {
    let report = validator().validate(&[]);
    assert!(!report.is_valid());
    assert_eq!(report.issues[0].kind, IssueKind::ThreadLength);

    let long_thread: Vec<String> = (0..12).map(|i| format!("Tweet number {}", i)).collect();
    let report = validator().validate(&long_thread);
    assert!(report
        .errors()
        .any(|i| i.kind == IssueKind::ThreadLength && i.tweet_index.is_none()));
}

/// Tests the per-tweet character limit and empty tweets.
#[test]
fn test_validate_character_limit_and_empty() {
    let too_long = "a".repeat(TWEET_CHAR_LIMIT + 1);
    let exactly = "b".repeat(TWEET_CHAR_LIMIT);
    let report = validator().validate(&[exactly, too_long, "   ".to_string()]);

    let errors: Vec<_> = report.errors().collect();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].kind, IssueKind::CharacterLimit);
    assert_eq!(errors[0].tweet_index, Some(1));
    assert_eq!(errors[1].kind, IssueKind::EmptyTweet);
    assert_eq!(errors[1].tweet_index, Some(2));
}

/// Tests profanity and personal information detection.
#[test]
fn test_validate_safety_checks() {
    let report = validator().validate(&tweets(&[
        "This bug was a total shitshow.",
        "Questions? Mail me at jane.doe@example.com",
        "Call 555-123-4567 for details",
        "My SSN is 123-45-6789",
        "Card 4111 1111 1111 1111 on file",
        "Order 1234 5678 9012 3456 was shipped",
    ]));

    let kinds_at = |index: usize| -> Vec<IssueKind> {
        report
            .errors()
            .filter(|i| i.tweet_index == Some(index))
            .map(|i| i.kind)
            .collect()
    };

    assert_eq!(kinds_at(0), vec![IssueKind::Profanity]);
    assert!(kinds_at(1).contains(&IssueKind::PersonalInfo));
    assert!(kinds_at(2).contains(&IssueKind::PersonalInfo));
    assert!(kinds_at(3).contains(&IssueKind::PersonalInfo));
    assert!(report
        .errors()
        .any(|i| i.tweet_index == Some(4) && i.message.contains("credit card")));
    // fails the Luhn check, so it is not a card number
    assert!(!report
        .errors()
        .any(|i| i.tweet_index == Some(5) && i.message.contains("credit card")));
}

/// Tests that words merely containing a profanity are not flagged.
#[test]
fn test_validate_profanity_word_boundaries() {
    let report = validator().validate(&tweets(&["Scunthorpe and Essex are lovely places."]));
    assert!(report.is_valid());
}

/// Tests the warning-level checks that need human review.
#[test]
fn test_validate_warnings() {
    let report = validator().validate(&tweets(&[
        "Rust builds are 10x faster than before.",
        "Studies show 85% of bugs are memory related.",
        "Same tweet twice.",
        "same tweet twice.",
        "Tags #one #two #three #four",
    ]));

    assert!(report.is_valid());
    let claims: Vec<_> = report.numeric_claims().collect();
    assert!(claims.iter().any(|i| i.tweet_index == Some(0)));
    assert!(claims.iter().filter(|i| i.tweet_index == Some(1)).count() >= 2);
    assert!(report
        .warnings()
        .any(|i| i.kind == IssueKind::DuplicateTweet && i.tweet_index == Some(3)));
    assert!(report
        .warnings()
        .any(|i| i.kind == IssueKind::HashtagOveruse && i.tweet_index == Some(4)));
}

/// Tests the informational caps check.
#[test]
fn test_validate_excessive_caps_is_info() {
    let report = validator().validate(&tweets(&["THIS IS THE BIGGEST RELEASE OF THE YEAR"]));
    assert!(report.is_valid());
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].severity, IssueSeverity::Info);
    assert_eq!(report.issues[0].kind, IssueKind::ExcessiveCaps);

    // short acronyms do not count
    let report = validator().validate(&tweets(&["Use the CLI and API"]));
    assert!(report.issues.is_empty());
}

/// Tests the conversion of a failing report into an error.
#[test]
fn test_into_result() {
    let ok = validator()
        .validate(&tweets(&["A fine tweet."]))
        .into_result();
    assert!(ok.is_ok());

    let err = validator()
        .validate(&tweets(&["fine", ""]))
        .into_result()
        .unwrap_err();
    match err {
        ActionError::Validation(message) => assert_eq!(message, "tweet 2: tweet is empty"),
        other => panic!("expected validation error, got {:?}", other),
    }
}
