//! Engagement optimization of drafted threads.
//!
//! Turns a [`ThreadDraft`] into the final [`Thread`]: picks the strongest
//! opening hook, caps the length, adds the link back to the post, hashtags and
//! `n/N` numbering, all without pushing any tweet over the character limit.

use chrono::{DateTime, Utc};
use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{ActionConfig, EngagementLevel};
use crate::content::BlogPost;
use crate::openrouter::ThreadDraft;
use crate::style::is_emoji;
use crate::validation::{weighted_length, TWEET_CHAR_LIMIT};

const POWER_WORDS: &[&str] = &[
    "secret", "mistake", "mistakes", "learned", "lessons", "why", "how", "never", "stop",
    "surprising", "truth", "finally", "nobody", "everything", "wrong", "faster", "simple",
];

const THREAD_EMOJI: &str = "🧵";

/// A thread ready for review or posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub tweets: Vec<String>,
    /// The hook that replaced the drafted opening, if any.
    pub hook: Option<String>,
    pub hashtags: Vec<String>,
    pub engagement_score: f64,
    pub model: String,
    pub generated_at: DateTime<Utc>,
}

/// Scores an opening tweet in `0.0..=1.0`.
pub fn score_hook(hook: &str) -> f64 {
    let lower = hook.to_lowercase();
    let length = hook.chars().count();
    let mut score: f64 = 0.0;

    if hook.contains('?') {
        score += 0.25;
    }
    if hook.chars().any(|c| c.is_ascii_digit()) {
        score += 0.2;
    }
    if lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| POWER_WORDS.contains(&w))
    {
        score += 0.2;
    }
    if (70..=200).contains(&length) {
        score += 0.2;
    } else if length >= 30 {
        score += 0.1;
    }
    if hook.chars().any(is_emoji) {
        score += 0.15;
    }
    score.min(1.0)
}

/// Overall engagement estimate for a finished thread, in `0.0..=1.0`.
pub fn engagement_score(thread: &Thread) -> f64 {
    let Some(first) = thread.tweets.first() else {
        return 0.0;
    };

    let hook = score_hook(first);

    let well_sized = thread
        .tweets
        .iter()
        .filter(|t| (100..=260).contains(&weighted_length(t)))
        .count() as f64
        / thread.tweets.len() as f64;

    let length_fit = match thread.tweets.len() {
        3..=8 => 1.0,
        2 | 9 | 10 => 0.7,
        _ => 0.4,
    };

    let has_link = thread
        .tweets
        .last()
        .map_or(false, |t| t.contains("http://") || t.contains("https://"));
    let has_question = thread.tweets.iter().any(|t| t.contains('?'));
    let hashtag_fit = matches!(thread.hashtags.len(), 1..=2);

    let score = 0.35 * hook
        + 0.2 * well_sized
        + 0.15 * length_fit
        + 0.1 * f64::from(u8::from(has_link))
        + 0.1 * f64::from(u8::from(has_question))
        + 0.1 * f64::from(u8::from(hashtag_fit));
    score.clamp(0.0, 1.0)
}

/// Applies hook selection, length capping, call to action, hashtags and numbering.
pub struct EngagementOptimizer {
    numbering_re: Regex,
}

impl EngagementOptimizer {
    pub fn new() -> Result<Self, crate::error::ActionError> {
        Ok(EngagementOptimizer {
            // "1/5 ", "(2/5)" or "3." at either end of a tweet
            numbering_re: Regex::new(r"^\s*\(?\d+\s*/\s*\d+\)?\s*|\s*\(?\d+\s*/\s*\d+\)?\s*$|^\s*\d+\.\s+")
                .map_err(|e| {
                    crate::error::ActionError::Configuration(format!("bad numbering regex: {}", e))
                })?,
        })
    }

    /// Builds the final thread from a draft.
    pub fn optimize(&self, draft: &ThreadDraft, post: &BlogPost, config: &ActionConfig) -> Thread {
        let mut tweets: Vec<String> = draft
            .tweets
            .iter()
            .map(|t| self.numbering_re.replace_all(t.trim(), "").trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let hook = self.select_hook(draft, &mut tweets);

        let max = config.max_tweets_per_thread.max(1);
        if tweets.len() > max {
            debug!("Capping thread from {} to {} tweets", tweets.len(), max);
            tweets.truncate(max);
        }

        // room kept free on every tweet for the " n/N" suffix
        let reserve = if config.include_thread_numbering && max > 1 {
            numbering_width(max)
        } else {
            0
        };

        if config.engagement_level == EngagementLevel::High && tweets.len() > 1 {
            if let Some(first) = tweets.first_mut() {
                if !first.chars().any(is_emoji) && fits(&format!("{} {}", first, THREAD_EMOJI), reserve) {
                    first.push(' ');
                    first.push_str(THREAD_EMOJI);
                }
            }
        }

        if let Some(url) = &post.canonical_url {
            add_call_to_action(&mut tweets, url, max, reserve);
        }

        let hashtags = add_hashtags(&mut tweets, &draft.hashtags, config.max_hashtags, reserve);

        if config.include_thread_numbering && tweets.len() > 1 {
            number_tweets(&mut tweets);
        }

        let mut thread = Thread {
            tweets,
            hook,
            hashtags,
            engagement_score: 0.0,
            model: draft.model.clone(),
            generated_at: draft.generated_at,
        };
        thread.engagement_score = engagement_score(&thread);

        info!(
            "Optimized thread for '{}': {} tweet(s), engagement score {:.2}",
            post.title,
            thread.tweets.len(),
            thread.engagement_score
        );
        thread
    }

    /// Puts the best-scoring hook in place of the opening tweet unless it repeats it.
    fn select_hook(&self, draft: &ThreadDraft, tweets: &mut Vec<String>) -> Option<String> {
        let best = draft
            .hooks
            .iter()
            .map(|h| self.numbering_re.replace_all(h.trim(), "").trim().to_string())
            .filter(|h| !h.is_empty() && weighted_length(h) <= TWEET_CHAR_LIMIT)
            .max_by(|a, b| score_hook(a).total_cmp(&score_hook(b)))?;

        match tweets.first_mut() {
            Some(first) if first.eq_ignore_ascii_case(&best) => None,
            Some(first) => {
                debug!("Using hook (score {:.2}) as opening tweet", score_hook(&best));
                *first = best.clone();
                Some(best)
            }
            None => {
                tweets.push(best.clone());
                Some(best)
            }
        }
    }
}

fn fits(text: &str, reserve: usize) -> bool {
    weighted_length(text) + reserve <= TWEET_CHAR_LIMIT
}

/// Width of the longest " n/N" suffix for a thread of up to `max` tweets.
fn numbering_width(max: usize) -> usize {
    1 + 2 * max.to_string().len() + 1
}

/// Appends the link to the final tweet, or adds it as its own final tweet.
fn add_call_to_action(tweets: &mut Vec<String>, url: &str, max: usize, reserve: usize) {
    let cta = format!("Read the full post: {}", url);

    if let Some(last) = tweets.last_mut() {
        let combined = format!("{}\n\n{}", last, cta);
        if fits(&combined, reserve) {
            *last = combined;
            return;
        }
    }

    if tweets.len() >= max {
        tweets.truncate(max.saturating_sub(1));
    }
    tweets.push(cta);
}

/// Appends as many hashtags as fit to the final tweet; returns the ones used.
fn add_hashtags(
    tweets: &mut [String],
    hashtags: &[String],
    max_hashtags: usize,
    reserve: usize,
) -> Vec<String> {
    let Some(last) = tweets.last_mut() else {
        return Vec::new();
    };

    let mut used = Vec::new();
    for tag in hashtags.iter().take(max_hashtags) {
        if last.to_lowercase().contains(&tag.to_lowercase()) {
            used.push(tag.clone());
            continue;
        }
        let candidate = format!("{} {}", last, tag);
        if fits(&candidate, reserve) {
            *last = candidate;
            used.push(tag.clone());
        }
    }
    used
}

fn number_tweets(tweets: &mut [String]) {
    let total = tweets.len();
    for (index, tweet) in tweets.iter_mut().enumerate() {
        let numbered = format!("{} {}/{}", tweet, index + 1, total);
        if weighted_length(&numbered) <= TWEET_CHAR_LIMIT {
            *tweet = numbered;
        } else {
            debug!("Tweet {} left unnumbered to stay within the limit", index + 1);
        }
    }
}
