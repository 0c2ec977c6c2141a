//! Bullet-point synthesis from per-source summaries.
//!
//! Two paths, tried in order:
//!
//! 1. **Generative**: one prompt asking for 3-7 bullets on different facets
//!    of the story. The reply is parsed line by line; enumeration markers and
//!    markdown emphasis are stripped and short lines dropped. Any failure
//!    falls through.
//! 2. **Extractive**: sentences from the combined summaries, scored by
//!    digits, length and corpus word frequency, then deduplicated by token
//!    overlap. Fully deterministic.
//!
//! Both paths share the same overlap filter, so no two bullets in a result
//! have a token overlap ratio above `overlap_threshold`.

use crate::api::AskAsync;
use crate::config::{MAX_BULLETS_CAP, SynthesisConfig};
use crate::error::CandidateSkip;
use crate::models::SourceSummary;
use crate::text::{FREQUENCY_STOPWORDS, char_len, has_digit, overlap_ratio, split_sentences, word_tokens};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, instrument, warn};

static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[-•*–]+\s*|\(?\d{1,2}[.)]\s+)").expect("valid marker regex")
});

/// Which path produced the bullets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulletSource {
    Generative,
    Extractive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesis {
    pub bullets: Vec<String>,
    pub source: BulletSource,
}

/// Prompt for the generative path.
pub fn bullet_prompt(title: &str, summaries: &[SourceSummary]) -> String {
    let reporting = summaries
        .iter()
        .enumerate()
        .map(|(i, s)| format!("Report {}: {}", i + 1, s.summary_text))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Story: {title}\n\n{reporting}\n\n\
         Write between 3 and 7 bullet points that together summarize this story. \
         Each bullet must cover a different facet: what happened, who is involved, \
         when and where, consequences, reactions, or background. \
         Do not repeat the same fact twice and do not mention the reports or outlets. \
         Output one bullet per line starting with \"- \"."
    )
}

/// Bullets from a generative reply.
///
/// When any line carries an enumeration marker only marked lines count, so a
/// chatty preamble is ignored. Lines shorter than `min_chars` are dropped.
pub fn parse_generated_bullets(reply: &str, min_chars: usize) -> Vec<String> {
    let lines: Vec<&str> = reply.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let any_marked = lines.iter().any(|l| MARKER_RE.is_match(l));

    lines
        .into_iter()
        .filter(|l| !any_marked || MARKER_RE.is_match(l))
        .map(|l| {
            let stripped = MARKER_RE.replace(l, "");
            stripped.replace("**", "").replace("__", "").trim().to_string()
        })
        .filter(|b| char_len(b) >= min_chars)
        .collect()
}

/// Keep bullets in order, dropping any whose token overlap with an already
/// kept bullet exceeds `threshold`, until `max` are kept.
pub fn dedupe_bullets<I>(candidates: I, threshold: f64, max: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut kept: Vec<String> = Vec::new();
    let mut kept_tokens: Vec<BTreeSet<String>> = Vec::new();

    for candidate in candidates {
        if kept.len() >= max {
            break;
        }
        let tokens = word_tokens(&candidate);
        if tokens.is_empty() {
            continue;
        }
        if kept_tokens
            .iter()
            .any(|seen| overlap_ratio(&tokens, seen) > threshold)
        {
            debug!(bullet = %candidate, "Dropped overlapping bullet");
            continue;
        }
        kept.push(candidate);
        kept_tokens.push(tokens);
    }
    kept
}

/// Frequency of every non-stopword token longer than three characters.
fn word_frequencies(text: &str) -> HashMap<String, usize> {
    let mut freq = HashMap::new();
    for m in crate::text::WORD_RE.find_iter(&text.to_lowercase()) {
        let word = m.as_str();
        if word.chars().count() > 3 && !FREQUENCY_STOPWORDS.contains(&word) {
            *freq.entry(word.to_string()).or_insert(0) += 1;
        }
    }
    freq
}

/// Score of one candidate sentence against the corpus frequencies.
pub fn sentence_score(sentence: &str, freq: &HashMap<String, usize>) -> usize {
    let len = char_len(sentence);
    let mut score = 0;
    if has_digit(sentence) {
        score += 2;
    }
    if (60..=160).contains(&len) {
        score += 1;
    }
    score
        + word_tokens(sentence)
            .iter()
            .filter_map(|t| freq.get(t))
            .sum::<usize>()
}

/// Deterministic bullets extracted from the summaries themselves.
pub fn extractive_bullets(summaries: &[SourceSummary], config: &SynthesisConfig) -> Vec<String> {
    let full_text = summaries
        .iter()
        .map(|s| s.summary_text.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if full_text.is_empty() {
        return Vec::new();
    }

    let window = config.min_sentence_chars..=config.max_sentence_chars;
    let sentences: Vec<String> = split_sentences(&full_text)
        .into_iter()
        .filter(|s| window.contains(&char_len(s)))
        .collect();

    let freq = word_frequencies(&full_text);
    let mut scored: Vec<(usize, String)> = sentences
        .into_iter()
        .map(|s| (sentence_score(&s, &freq), s))
        .collect();
    scored.sort_by_key(|(score, _)| Reverse(*score));

    let max = config.max_bullets.min(MAX_BULLETS_CAP);
    dedupe_bullets(
        scored.into_iter().map(|(_, s)| format!("{s}.")),
        config.overlap_threshold,
        max,
    )
}

/// Produce bullets for a candidate story, or skip it.
#[instrument(level = "info", skip_all, fields(sources = summaries.len()))]
pub async fn synthesize_bullets<A>(
    title: &str,
    summaries: &[SourceSummary],
    ask: Option<&A>,
    config: &SynthesisConfig,
) -> Result<Synthesis, CandidateSkip>
where
    A: AskAsync<Response = String>,
{
    if let Some(ask) = ask {
        match ask.ask(&bullet_prompt(title, summaries)).await {
            Ok(reply) => {
                let bullets = dedupe_bullets(
                    parse_generated_bullets(&reply, config.min_generated_chars),
                    config.overlap_threshold,
                    MAX_BULLETS_CAP,
                );
                if bullets.len() >= config.min_bullets {
                    info!(bullets = bullets.len(), "Generated bullet points");
                    return Ok(Synthesis {
                        bullets,
                        source: BulletSource::Generative,
                    });
                }
                warn!(found = bullets.len(), "Generated reply unusable; extracting instead");
            }
            Err(e) => warn!(error = %e, "Generative synthesis failed; extracting instead"),
        }
    }

    let bullets = extractive_bullets(summaries, config);
    if bullets.len() < config.min_bullets {
        return Err(CandidateSkip::TooFewBullets {
            found: bullets.len(),
            needed: config.min_bullets,
        });
    }
    info!(bullets = bullets.len(), "Extracted bullet points");
    Ok(Synthesis {
        bullets,
        source: BulletSource::Extractive,
    })
}
