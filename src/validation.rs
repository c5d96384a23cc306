//! Thread validation and safety checks.
//!
//! Errors block publication (the thread is regenerated); warnings are shown to
//! the reviewer in the pull request; info items are purely advisory.

use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ActionError;
use crate::style::is_emoji;

/// Maximum weighted length of one tweet.
pub const TWEET_CHAR_LIMIT: usize = 280;
/// Every URL counts as this many characters, whatever its real length.
pub const URL_WEIGHT: usize = 23;
const MAX_HASHTAGS_PER_TWEET: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    CharacterLimit,
    EmptyTweet,
    ThreadLength,
    DuplicateTweet,
    Profanity,
    PersonalInfo,
    NumericClaim,
    HashtagOveruse,
    ExcessiveCaps,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// 0-based tweet index; `None` for thread-level issues.
    pub tweet_index: Option<usize>,
    pub severity: IssueSeverity,
    pub kind: IssueKind,
    pub message: String,
}

/// Every issue found in one thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// True when there is no error-level issue.
    pub fn is_valid(&self) -> bool {
        !self
            .issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Warning)
    }

    /// Statements with numbers that a human should fact-check.
    pub fn numeric_claims(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.kind == IssueKind::NumericClaim)
    }

    /// Converts a failing report into [`ActionError::Validation`].
    pub fn into_result(self) -> Result<ValidationReport, ActionError> {
        if self.is_valid() {
            return Ok(self);
        }
        let messages: Vec<String> = self
            .errors()
            .map(|issue| match issue.tweet_index {
                Some(i) => format!("tweet {}: {}", i + 1, issue.message),
                None => issue.message.clone(),
            })
            .collect();
        Err(ActionError::Validation(messages.join("; ")))
    }

    fn push(
        &mut self,
        tweet_index: Option<usize>,
        severity: IssueSeverity,
        kind: IssueKind,
        message: String,
    ) {
        self.issues.push(ValidationIssue {
            tweet_index,
            severity,
            kind,
            message,
        });
    }
}

/// Length of `text` as Twitter counts it: URLs weigh [`URL_WEIGHT`], emojis 2.
pub fn weighted_length(text: &str) -> usize {
    let mut length = 0;
    let mut rest = text;
    while let Some(start) = find_url_start(rest) {
        length += char_weight(&rest[..start]);
        let url_len = rest[start..]
            .find(char::is_whitespace)
            .unwrap_or(rest.len() - start);
        length += URL_WEIGHT;
        rest = &rest[start + url_len..];
    }
    length + char_weight(rest)
}

fn find_url_start(text: &str) -> Option<usize> {
    match (text.find("http://"), text.find("https://")) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn char_weight(text: &str) -> usize {
    text.chars().map(|c| if is_emoji(c) { 2 } else { 1 }).sum()
}

/// Runs every check against a thread.
pub struct ThreadValidator {
    max_tweets: usize,
    profanity_re: Regex,
    pii_patterns: Vec<(&'static str, Regex)>,
    card_re: Regex,
    claim_patterns: Vec<Regex>,
}

impl ThreadValidator {
    pub fn new(max_tweets: usize) -> Result<Self, ActionError> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| ActionError::Configuration(format!("bad validation regex: {}", e)))
        };

        Ok(ThreadValidator {
            max_tweets,
            profanity_re: compile(
                r"(?i)\b(fuck\w*|shit\w*|bitch\w*|bastard\w*|asshole\w*|cunt\w*|dickhead\w*|motherf\w*|wank\w*|slut\w*)\b",
            )?,
            pii_patterns: vec![
                ("email address", compile(r"\b[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}\b")?),
                ("social security number", compile(r"\b\d{3}-\d{2}-\d{4}\b")?),
                (
                    "phone number",
                    compile(r"(?:\+\d{1,3}[\s.\-]?)?\(?\b\d{3}\)?[\s.\-]\d{3}[\s.\-]\d{4}\b")?,
                ),
            ],
            card_re: compile(r"\b(?:\d[ \-]?){12,18}\d\b")?,
            claim_patterns: vec![
                compile(r"\b\d+(?:\.\d+)?\s?%")?,
                compile(r"(?i)\b\d+(?:\.\d+)?\s?(?:x\b|times\b)")?,
                compile(r"(?i)\b\d+(?:[.,]\d+)?\s?(?:thousand|million|billion|trillion)\b")?,
                compile(r"(?i)\b(?:studies|research|data|experts|surveys?)\s+(?:show|shows|suggest|suggests|prove|proves|found)\b")?,
            ],
        })
    }

    /// Validates `tweets` and returns every issue found.
    pub fn validate(&self, tweets: &[String]) -> ValidationReport {
        let mut report = ValidationReport::default();

        if tweets.is_empty() {
            report.push(
                None,
                IssueSeverity::Error,
                IssueKind::ThreadLength,
                "thread has no tweets".to_string(),
            );
            return report;
        }
        if tweets.len() > self.max_tweets {
            report.push(
                None,
                IssueSeverity::Error,
                IssueKind::ThreadLength,
                format!(
                    "thread has {} tweets, the maximum is {}",
                    tweets.len(),
                    self.max_tweets
                ),
            );
        }

        let mut seen = HashSet::new();
        for (index, tweet) in tweets.iter().enumerate() {
            self.check_tweet(index, tweet, &mut report);

            let normalized = tweet.trim().to_lowercase();
            if !normalized.is_empty() && !seen.insert(normalized) {
                report.push(
                    Some(index),
                    IssueSeverity::Warning,
                    IssueKind::DuplicateTweet,
                    "tweet repeats an earlier tweet".to_string(),
                );
            }
        }

        info!(
            "Validation finished: {} error(s), {} warning(s)",
            report.errors().count(),
            report.warnings().count()
        );
        report
    }

    fn check_tweet(&self, index: usize, tweet: &str, report: &mut ValidationReport) {
        let i = Some(index);

        if tweet.trim().is_empty() {
            report.push(
                i,
                IssueSeverity::Error,
                IssueKind::EmptyTweet,
                "tweet is empty".to_string(),
            );
            return;
        }

        let length = weighted_length(tweet);
        if length > TWEET_CHAR_LIMIT {
            report.push(
                i,
                IssueSeverity::Error,
                IssueKind::CharacterLimit,
                format!(
                    "tweet is {} characters, the limit is {}",
                    length, TWEET_CHAR_LIMIT
                ),
            );
        }

        if let Some(m) = self.profanity_re.find(tweet) {
            report.push(
                i,
                IssueSeverity::Error,
                IssueKind::Profanity,
                format!("tweet contains profanity ('{}')", m.as_str()),
            );
        }

        for (label, re) in &self.pii_patterns {
            if re.is_match(tweet) {
                report.push(
                    i,
                    IssueSeverity::Error,
                    IssueKind::PersonalInfo,
                    format!("tweet appears to contain a {}", label),
                );
            }
        }
        if self
            .card_re
            .find_iter(tweet)
            .any(|m| luhn_valid(m.as_str()))
        {
            report.push(
                i,
                IssueSeverity::Error,
                IssueKind::PersonalInfo,
                "tweet appears to contain a credit card number".to_string(),
            );
        }

        for re in &self.claim_patterns {
            if let Some(m) = re.find(tweet) {
                debug!("Numeric claim in tweet {}: {}", index + 1, m.as_str());
                report.push(
                    i,
                    IssueSeverity::Warning,
                    IssueKind::NumericClaim,
                    format!("verify the claim '{}'", m.as_str().trim()),
                );
            }
        }

        let hashtags = tweet
            .split_whitespace()
            .filter(|w| w.starts_with('#') && w.len() > 1)
            .count();
        if hashtags > MAX_HASHTAGS_PER_TWEET {
            report.push(
                i,
                IssueSeverity::Warning,
                IssueKind::HashtagOveruse,
                format!("tweet has {} hashtags", hashtags),
            );
        }

        let letters: Vec<char> = tweet
            .split_whitespace()
            .filter(|w| !w.starts_with("http") && !w.starts_with('#') && !w.starts_with('@'))
            .flat_map(str::chars)
            .filter(|c| c.is_alphabetic())
            .collect();
        let upper = letters.iter().filter(|c| c.is_uppercase()).count();
        if letters.len() >= 20 && upper * 2 > letters.len() {
            report.push(
                i,
                IssueSeverity::Info,
                IssueKind::ExcessiveCaps,
                "tweet is mostly capital letters".to_string(),
            );
        }
    }
}

/// Luhn checksum over the digits of `candidate`.
fn luhn_valid(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if !(13..=19).contains(&digits.len()) {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}
