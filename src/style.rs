//! Writing style analysis.
//!
//! Builds a statistical profile of the author's existing posts (vocabulary,
//! tone, structure and emoji habits). The profile is stored as JSON next to the
//! generated threads and summarized into the LLM prompt so drafts sound like
//! the author.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::content::BlogPost;
use crate::error::ActionError;

/// File name of the cached profile inside the output directory.
pub const PROFILE_FILE_NAME: &str = "writing-style-profile.json";

const TOP_WORDS: usize = 20;
const TOP_TERMS: usize = 15;
const TOP_EMOJIS: usize = 10;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "if", "then", "so", "of", "to", "in", "on", "at", "by",
    "for", "with", "from", "as", "is", "are", "was", "were", "be", "been", "being", "it", "its",
    "this", "that", "these", "those", "i", "you", "he", "she", "we", "they", "me", "my", "your",
    "our", "their", "his", "her", "them", "us", "not", "no", "do", "does", "did", "have", "has",
    "had", "will", "would", "can", "could", "should", "may", "might", "just", "also", "there",
    "here", "what", "which", "who", "when", "where", "how", "why", "all", "any", "some", "more",
    "most", "into", "about", "than", "out", "up", "one", "like", "get", "use", "using",
];

const TECH_LEXICON: &[&str] = &[
    "api", "async", "algorithm", "backend", "cache", "cli", "compiler", "container", "database",
    "deploy", "docker", "framework", "frontend", "function", "git", "github", "http", "json",
    "kubernetes", "latency", "library", "llm", "model", "neural", "python", "query", "runtime",
    "rust", "schema", "server", "sql", "thread", "tensor", "typescript", "yaml", "pipeline",
    "dataset", "gradient", "inference", "embedding", "regex", "benchmark",
];

const ENTHUSIASM_WORDS: &[&str] = &[
    "amazing", "awesome", "excited", "love", "incredible", "fantastic", "great", "wow", "cool",
    "thrilled", "delighted", "brilliant",
];

const HEDGE_WORDS: &[&str] = &[
    "maybe", "perhaps", "possibly", "might", "probably", "somewhat", "guess", "seems", "arguably",
    "likely",
];

const HUMOR_MARKERS: &[&str] = &["lol", "haha", "😂", "🤣", "😅", "pun intended", "joke", "funny"];

/// Words the author reaches for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VocabularyProfile {
    pub common_words: Vec<String>,
    pub technical_terms: Vec<String>,
    pub average_word_length: f64,
    /// Distinct words divided by total words.
    pub vocabulary_diversity: f64,
}

/// Tone scores, each in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToneProfile {
    pub enthusiasm: f64,
    pub formality: f64,
    pub humor: f64,
    pub confidence: f64,
    /// Share of sentences written in the first person.
    pub personal_anecdotes: f64,
}

impl Default for ToneProfile {
    fn default() -> Self {
        ToneProfile {
            enthusiasm: 0.5,
            formality: 0.5,
            humor: 0.0,
            confidence: 0.5,
            personal_anecdotes: 0.0,
        }
    }
}

/// How posts are laid out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureProfile {
    /// Words per sentence.
    pub average_sentence_length: f64,
    /// Sentences per paragraph.
    pub average_paragraph_length: f64,
    /// Share of paragraphs that are lists.
    pub list_usage: f64,
    /// Fenced code blocks per post.
    pub code_blocks_per_post: f64,
    /// Headers per post.
    pub headers_per_post: f64,
    /// Share of sentences that are questions.
    pub question_frequency: f64,
}

/// Emoji habits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmojiProfile {
    pub emojis_per_100_words: f64,
    pub common_emojis: Vec<String>,
}

/// The author's writing style, derived from their published posts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleProfile {
    pub vocabulary: VocabularyProfile,
    pub tone: ToneProfile,
    pub structure: StructureProfile,
    pub emoji: EmojiProfile,
    pub posts_analyzed: usize,
    pub generated_at: DateTime<Utc>,
}

impl Default for StyleProfile {
    fn default() -> Self {
        StyleProfile {
            vocabulary: VocabularyProfile::default(),
            tone: ToneProfile::default(),
            structure: StructureProfile::default(),
            emoji: EmojiProfile::default(),
            posts_analyzed: 0,
            generated_at: Utc::now(),
        }
    }
}

impl StyleProfile {
    /// A few lines describing the style, embedded in the system prompt.
    pub fn prompt_summary(&self) -> String {
        if self.posts_analyzed == 0 {
            return "No previous posts were available; write in a clear, friendly, technical voice."
                .to_string();
        }

        let mut lines = Vec::new();
        lines.push(format!(
            "Tone: {}, {}, {}.",
            describe(self.tone.formality, "casual", "balanced", "formal"),
            describe(self.tone.enthusiasm, "measured", "upbeat", "enthusiastic"),
            describe(self.tone.confidence, "tentative", "confident", "assertive"),
        ));
        if self.tone.humor > 0.2 {
            lines.push("The author uses light humor.".to_string());
        }
        if self.tone.personal_anecdotes > 0.2 {
            lines.push("The author often writes in the first person and shares experiences.".to_string());
        }
        lines.push(format!(
            "Sentences average {:.0} words.",
            self.structure.average_sentence_length
        ));
        if !self.vocabulary.technical_terms.is_empty() {
            lines.push(format!(
                "Frequent technical terms: {}.",
                self.vocabulary.technical_terms.join(", ")
            ));
        }
        if !self.vocabulary.common_words.is_empty() {
            let words: Vec<&str> = self
                .vocabulary
                .common_words
                .iter()
                .take(10)
                .map(String::as_str)
                .collect();
            lines.push(format!("Characteristic words: {}.", words.join(", ")));
        }
        if self.emoji.emojis_per_100_words >= 0.5 && !self.emoji.common_emojis.is_empty() {
            lines.push(format!(
                "Uses emojis regularly, favourites: {}.",
                self.emoji.common_emojis.join(" ")
            ));
        } else {
            lines.push("Uses emojis sparingly.".to_string());
        }
        if self.structure.question_frequency > 0.1 {
            lines.push("Often asks the reader questions.".to_string());
        }
        lines.join("\n")
    }
}

fn describe(score: f64, low: &'static str, mid: &'static str, high: &'static str) -> &'static str {
    if score < 0.35 {
        low
    } else if score < 0.65 {
        mid
    } else {
        high
    }
}

/// Computes a [`StyleProfile`] over a corpus of posts.
pub struct StyleAnalyzer {
    word_re: Regex,
    sentence_re: Regex,
    code_block_re: Regex,
    technical_re: Regex,
}

impl StyleAnalyzer {
    pub fn new() -> Result<Self, ActionError> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| ActionError::Configuration(format!("bad style regex: {}", e)))
        };
        Ok(StyleAnalyzer {
            word_re: compile(r"[A-Za-z][A-Za-z0-9_'\-]*")?,
            sentence_re: compile(r"[^.!?]+[.!?]+")?,
            code_block_re: compile(r"(?s)```.*?```")?,
            // CamelCase, snake_case or ACRONYMS
            technical_re: compile(r"\b(?:[a-z]+[A-Z][A-Za-z]*|[a-z]+_[a-z_]+|[A-Z]{2,6})\b")?,
        })
    }

    /// Analyzes every post. An empty corpus yields the neutral default profile.
    pub fn analyze(&self, posts: &[BlogPost]) -> StyleProfile {
        if posts.is_empty() {
            warn!("No posts available for style analysis, using a neutral profile");
            return StyleProfile::default();
        }

        info!("Analyzing writing style across {} post(s)", posts.len());

        let mut word_counts: HashMap<String, usize> = HashMap::new();
        let mut term_counts: HashMap<String, usize> = HashMap::new();
        let mut emoji_counts: HashMap<String, usize> = HashMap::new();

        let mut total_words = 0usize;
        let mut total_word_chars = 0usize;
        let mut total_sentences = 0usize;
        let mut exclamations = 0usize;
        let mut questions = 0usize;
        let mut first_person_sentences = 0usize;
        let mut enthusiasm_hits = 0usize;
        let mut hedge_hits = 0usize;
        let mut humor_hits = 0usize;
        let mut contractions = 0usize;
        let mut paragraphs = 0usize;
        let mut list_paragraphs = 0usize;
        let mut code_blocks = 0usize;
        let mut headers = 0usize;

        for post in posts {
            code_blocks += self.code_block_re.find_iter(&post.content).count();
            let prose = self.code_block_re.replace_all(&post.content, " ");

            for m in self.technical_re.find_iter(&prose) {
                *term_counts.entry(m.as_str().to_string()).or_insert(0) += 1;
            }

            for c in prose.chars().filter(|c| is_emoji(*c)) {
                *emoji_counts.entry(c.to_string()).or_insert(0) += 1;
            }

            let lowered = prose.to_lowercase();
            humor_hits += HUMOR_MARKERS
                .iter()
                .map(|m| lowered.matches(m).count())
                .sum::<usize>();

            for paragraph in prose.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
                if paragraph.starts_with('#') {
                    headers += 1;
                    continue;
                }
                paragraphs += 1;
                let is_list = paragraph.lines().all(|l| {
                    let l = l.trim_start();
                    l.starts_with("- ")
                        || l.starts_with("* ")
                        || l.split_once(". ").map_or(false, |(n, _)| {
                            !n.is_empty() && n.chars().all(|c| c.is_ascii_digit())
                        })
                });
                if is_list {
                    list_paragraphs += 1;
                }
            }

            for sentence in self.sentence_re.find_iter(&prose) {
                let sentence = sentence.as_str().trim();
                if sentence.is_empty() {
                    continue;
                }
                total_sentences += 1;
                if sentence.ends_with('!') {
                    exclamations += 1;
                }
                if sentence.ends_with('?') {
                    questions += 1;
                }
                let lower = sentence.to_lowercase();
                if lower
                    .split_whitespace()
                    .any(|w| matches!(w.trim_matches(|c: char| !c.is_alphanumeric()), "i" | "my" | "me"))
                {
                    first_person_sentences += 1;
                }
            }

            for word in self.word_re.find_iter(&prose) {
                let word = word.as_str();
                let lower = word.to_lowercase();
                total_words += 1;
                total_word_chars += word.chars().count();
                if word.contains('\'') {
                    contractions += 1;
                }
                if ENTHUSIASM_WORDS.contains(&lower.as_str()) {
                    enthusiasm_hits += 1;
                }
                if HEDGE_WORDS.contains(&lower.as_str()) {
                    hedge_hits += 1;
                }
                if TECH_LEXICON.contains(&lower.as_str()) {
                    *term_counts.entry(lower.clone()).or_insert(0) += 1;
                }
                if lower.len() > 2 && !STOP_WORDS.contains(&lower.as_str()) {
                    *word_counts.entry(lower).or_insert(0) += 1;
                }
            }
        }

        let post_count = posts.len() as f64;
        let words = total_words.max(1) as f64;
        let sentences = total_sentences.max(1) as f64;

        let distinct_words = word_counts.len();
        let emoji_total: usize = emoji_counts.values().sum();

        let vocabulary = VocabularyProfile {
            common_words: top_n(word_counts, TOP_WORDS),
            technical_terms: top_n(term_counts, TOP_TERMS),
            average_word_length: total_word_chars as f64 / words,
            vocabulary_diversity: (distinct_words as f64 / words).min(1.0),
        };

        // per-1000-word rates scaled into 0..=1
        let per_k = |hits: usize| hits as f64 * 1000.0 / words;
        let tone = ToneProfile {
            enthusiasm: clamp01(0.3 + exclamations as f64 / sentences + per_k(enthusiasm_hits) / 20.0),
            formality: clamp01(0.8 - per_k(contractions) / 40.0),
            humor: clamp01(per_k(humor_hits) / 5.0),
            confidence: clamp01(0.8 - per_k(hedge_hits) / 15.0),
            personal_anecdotes: clamp01(first_person_sentences as f64 / sentences),
        };

        let structure = StructureProfile {
            average_sentence_length: total_words as f64 / sentences,
            average_paragraph_length: total_sentences as f64 / paragraphs.max(1) as f64,
            list_usage: list_paragraphs as f64 / paragraphs.max(1) as f64,
            code_blocks_per_post: code_blocks as f64 / post_count,
            headers_per_post: headers as f64 / post_count,
            question_frequency: questions as f64 / sentences,
        };

        let emoji = EmojiProfile {
            emojis_per_100_words: emoji_total as f64 * 100.0 / words,
            common_emojis: top_n(emoji_counts, TOP_EMOJIS),
        };

        debug!(
            "Style profile: {} words, {} sentences, {} code blocks",
            total_words, total_sentences, code_blocks
        );

        StyleProfile {
            vocabulary,
            tone,
            structure,
            emoji,
            posts_analyzed: posts.len(),
            generated_at: Utc::now(),
        }
    }
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Keys sorted by descending count, ties broken alphabetically.
fn top_n(counts: HashMap<String, usize>, n: usize) -> Vec<String> {
    let mut entries: Vec<(String, usize)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.into_iter().take(n).map(|(k, _)| k).collect()
}

/// True for characters in the common emoji blocks.
pub fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x1F300..=0x1F5FF
        | 0x1F600..=0x1F64F
        | 0x1F680..=0x1F6FF
        | 0x1F900..=0x1F9FF
        | 0x1FA70..=0x1FAFF
        | 0x2600..=0x26FF
        | 0x2700..=0x27BF)
}

/// Writes the profile as pretty JSON, creating parent directories.
pub fn save_profile(profile: &StyleProfile, path: &Path) -> Result<(), ActionError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ActionError::file(parent, e))?;
    }
    let json = serde_json::to_string_pretty(profile)?;
    std::fs::write(path, json).map_err(|e| ActionError::file(path, e))?;
    info!("Saved style profile to {}", path.display());
    Ok(())
}

/// Reads a profile written by [`save_profile`].
///
/// # Returns
///
/// - `Ok(Some(profile))`: If the file exists and parses
/// - `Ok(None)`: If there is no saved profile
/// - `Err(...)`: If the file exists but cannot be read or parsed
pub fn load_profile(path: &Path) -> Result<Option<StyleProfile>, ActionError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(|e| ActionError::file(path, e))?;
    let profile = serde_json::from_str(&text)?;
    Ok(Some(profile))
}

/// Builds the profile for this run and caches it at `path`.
///
/// When there is nothing to analyze, the profile cached by an earlier run is
/// reused, then the neutral default.
pub fn build_or_load_profile(posts: &[BlogPost], path: &Path) -> StyleProfile {
    let analyzed = match StyleAnalyzer::new() {
        Ok(analyzer) if !posts.is_empty() => Some(analyzer.analyze(posts)),
        Ok(_) => None,
        Err(e) => {
            warn!("Style analysis unavailable: {}", e);
            None
        }
    };

    if let Some(profile) = analyzed {
        if let Err(e) = save_profile(&profile, path) {
            warn!("Could not save style profile: {}", e);
        }
        return profile;
    }

    match load_profile(path) {
        Ok(Some(profile)) => {
            info!(
                "Reusing cached style profile ({} post(s) analyzed)",
                profile.posts_analyzed
            );
            profile
        }
        Ok(None) => StyleProfile::default(),
        Err(e) => {
            warn!("Cached style profile unreadable ({}), using a neutral profile", e);
            StyleProfile::default()
        }
    }
}
