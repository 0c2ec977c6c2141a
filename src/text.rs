//! Tokenization, similarity and sentence helpers shared by the clusterer,
//! selector and synthesizer.
//!
//! Two tokenizers exist on purpose:
//! - [`word_tokens`] keeps every alphanumeric word (used for title similarity
//!   and bullet overlap, no stopword filtering)
//! - [`extract_keywords`] keeps only longer, non-stopword words (used for the
//!   relaxed clustering fallback and entry filtering)

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

pub(crate) static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("valid word regex"));
static KEYWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-z]{4,}\b").expect("valid keyword regex"));
static SENTENCE_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+").expect("valid sentence regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Words that never count as title keywords.
pub const KEYWORD_STOPWORDS: &[&str] = &[
    "this", "that", "with", "from", "have", "been", "will", "news", "says", "could", "would",
    "should", "what", "when", "where", "which", "there", "their", "these", "those", "about",
    "after", "before", "more", "over", "into", "than", "they", "were", "live", "video",
];

/// Words ignored when computing corpus-wide word frequencies for sentence scoring.
pub const FREQUENCY_STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "her", "was", "one", "our",
    "out", "day", "get", "has", "him", "his", "how", "its", "may", "new", "now", "old", "see",
    "two", "way", "who", "did", "let", "put", "say", "she", "too", "use", "from", "into", "that",
    "with", "have", "this", "they", "said", "were", "been", "will", "which", "their", "there",
    "about", "after", "would", "could",
];

/// Lowercased alphanumeric word set of `text`.
pub fn word_tokens(text: &str) -> BTreeSet<String> {
    WORD_RE
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// `|A ∩ B| / |A ∪ B|`, or 0.0 when either side is empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    inter / union
}

/// Jaccard similarity of two titles over their word tokens.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    jaccard(&word_tokens(a), &word_tokens(b))
}

/// `|A ∩ B| / max(|A|, |B|)`, or 0.0 when both are empty.
pub fn overlap_ratio(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let denom = a.len().max(b.len());
    if denom == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / denom as f64
}

/// Title keywords: lowercase words of four or more letters, minus stopwords,
/// deduplicated in title order and capped at `cap`.
pub fn extract_keywords(title: &str, cap: usize) -> Vec<String> {
    let lower = title.to_lowercase();
    let mut out: Vec<String> = Vec::new();
    for m in KEYWORD_RE.find_iter(&lower) {
        let word = m.as_str();
        if KEYWORD_STOPWORDS.contains(&word) || out.iter().any(|w| w == word) {
            continue;
        }
        out.push(word.to_string());
        if out.len() >= cap {
            break;
        }
    }
    out
}

/// Collapse all whitespace runs into single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

/// Split text at `.`, `!` or `?` followed by whitespace.
///
/// Pieces are trimmed, lose any trailing terminal punctuation, and empty
/// pieces are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    SENTENCE_BREAK_RE
        .split(text)
        .map(|s| s.trim().trim_end_matches(['.', '!', '?']).trim_end().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Number of characters (not bytes) in `s`.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// The first `max` characters of `s`, cut on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Condense plain text to at most `max_len` characters of whole sentences.
///
/// Short text is returned as-is. Otherwise sentences of five or more
/// characters are accumulated while they fit; when that yields almost
/// nothing the text is cut at a word boundary and marked with `...`.
pub fn summarize_content(content: &str, max_len: usize) -> String {
    let content = collapse_whitespace(content);
    if content.is_empty() || char_len(&content) <= max_len {
        return content;
    }

    let mut summary = String::new();
    for sentence in split_sentences(&content) {
        if char_len(&sentence) < 5 {
            continue;
        }
        if char_len(&summary) + char_len(&sentence) + 2 <= max_len {
            summary.push_str(&sentence);
            summary.push_str(". ");
        } else {
            break;
        }
    }

    if char_len(summary.trim()) < 15 {
        let head = truncate_chars(&content, max_len);
        let words: Vec<&str> = head.split_whitespace().collect();
        summary = if words.len() > 1 {
            format!("{}...", words[..words.len() - 1].join(" "))
        } else {
            format!("{head}...")
        };
    }

    summary.trim().to_string()
}

/// Whether `s` contains at least one digit.
pub fn has_digit(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit())
}
