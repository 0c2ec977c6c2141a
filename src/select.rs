//! Story selection: novelty ranking and per-source summaries.

use crate::config::SelectionConfig;
use crate::error::CandidateSkip;
use crate::models::{CandidateStory, NormalizedEntry, SourceSummary, StoryGroup};
use crate::text::{char_len, summarize_content, title_similarity};
use crate::utils::truncate_for_log;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Highest title similarity between `title` and any excluded title.
pub fn max_similarity_to_excluded(title: &str, exclude_titles: &[String]) -> f64 {
    exclude_titles
        .iter()
        .map(|known| title_similarity(title, known))
        .fold(0.0, f64::max)
}

/// Score every group against the known titles and return the eligible ones,
/// most sources first and then least similar to anything already known.
///
/// A group is eligible when it has at least `min_sources` distinct domains
/// and no known title is more similar than `exclusion_threshold`.
pub fn rank_candidates(
    groups: Vec<StoryGroup>,
    exclude_titles: &[String],
    min_sources: usize,
    exclusion_threshold: f64,
) -> Vec<CandidateStory> {
    let mut candidates: Vec<CandidateStory> = groups
        .into_iter()
        .filter_map(|group| {
            let title = group.title().to_string();
            let source_count = group.source_count();
            let max_similarity_to_excluded = max_similarity_to_excluded(&title, exclude_titles);

            if source_count < min_sources {
                debug!(title = %truncate_for_log(&title, 60), source_count, "Too few sources");
                return None;
            }
            if max_similarity_to_excluded > exclusion_threshold {
                debug!(
                    title = %truncate_for_log(&title, 60),
                    similarity = max_similarity_to_excluded,
                    "Already known"
                );
                return None;
            }
            Some(CandidateStory {
                group,
                title,
                source_count,
                max_similarity_to_excluded,
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.source_count
            .cmp(&a.source_count)
            .then(a.max_similarity_to_excluded.total_cmp(&b.max_similarity_to_excluded))
    });
    info!(eligible = candidates.len(), "Ranked candidate stories");
    candidates
}

/// Whether an entry's feed summary is too thin to use on its own.
pub fn needs_article_text(entry: &NormalizedEntry, config: &SelectionConfig) -> bool {
    char_len(entry.clean_summary.trim()) <= config.min_summary_chars
}

/// One condensed summary per distinct domain, in member order.
///
/// `article_text` maps entry links to scraped page text and is consulted only
/// when the feed summary is trivial. Fewer than `min_summaries` usable
/// summaries skips the candidate.
pub fn build_source_summaries(
    group: &StoryGroup,
    article_text: &HashMap<String, String>,
    config: &SelectionConfig,
) -> Result<Vec<SourceSummary>, CandidateSkip> {
    let mut seen = HashSet::new();
    let mut summaries = Vec::new();

    for member in &group.members {
        if !seen.insert(member.domain()) {
            continue;
        }
        let text = if needs_article_text(member, config) {
            article_text.get(member.link()).map(String::as_str).unwrap_or("")
        } else {
            member.clean_summary.as_str()
        };
        if char_len(text.trim()) <= config.min_summary_chars {
            continue;
        }
        let condensed = summarize_content(text, config.summary_max_chars);
        if char_len(&condensed) > config.min_summary_chars {
            summaries.push(SourceSummary {
                source_name: member.source_name.clone(),
                summary_text: condensed,
                source_url: member.link().to_string(),
            });
        }
    }

    if summaries.len() < config.min_summaries {
        return Err(CandidateSkip::TooFewSummaries {
            found: summaries.len(),
            needed: config.min_summaries,
        });
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::entry;

    fn group(members: Vec<NormalizedEntry>) -> StoryGroup {
        StoryGroup { members }
    }

    fn known(titles: &[&str]) -> Vec<String> {
        titles.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_max_similarity_with_no_known_titles_is_zero() {
        assert_eq!(max_similarity_to_excluded("Anything at all", &[]), 0.0);
    }

    #[test]
    fn test_excludes_known_stories() {
        let groups = vec![group(vec![
            entry("Storm hits the coast", "https://a.example/1", ""),
            entry("Storm hits coast", "https://b.example/2", ""),
        ])];
        let ranked = rank_candidates(groups.clone(), &known(&["Storm hits the coast"]), 2, 0.5);
        assert!(ranked.is_empty());

        let ranked = rank_candidates(groups, &known(&["Budget vote delayed"]), 2, 0.5);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].title, "Storm hits the coast");
    }

    #[test]
    fn test_orders_by_sources_then_novelty() {
        let two_fresh = group(vec![
            entry("Bridge reopens downtown", "https://a.example/1", ""),
            entry("Downtown bridge reopens", "https://b.example/2", ""),
        ]);
        let two_familiar = group(vec![
            entry("Council votes on transit plan", "https://a.example/3", ""),
            entry("Transit plan vote", "https://b.example/4", ""),
        ]);
        let three = group(vec![
            entry("Heatwave grips region", "https://a.example/5", ""),
            entry("Region gripped by heatwave", "https://b.example/6", ""),
            entry("Heatwave continues", "https://c.example/7", ""),
        ]);
        let ranked = rank_candidates(
            vec![two_familiar, two_fresh, three],
            &known(&["Council transit budget"]),
            2,
            0.5,
        );
        let titles: Vec<&str> = ranked.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Heatwave grips region", "Bridge reopens downtown", "Council votes on transit plan"]
        );
        assert!(ranked.iter().all(|c| c.max_similarity_to_excluded <= 0.5));
    }

    #[test]
    fn test_summaries_need_two_usable_sources() {
        let g = group(vec![
            entry("Storm", "https://a.example/1", "<p>Winds reached 120 km/h overnight.</p>"),
            entry("Storm", "https://b.example/2", "<p>Short</p>"),
        ]);
        let config = SelectionConfig::default();
        let err = build_source_summaries(&g, &HashMap::new(), &config).unwrap_err();
        assert_eq!(err, CandidateSkip::TooFewSummaries { found: 1, needed: 2 });

        let scraped = HashMap::from([(
            "https://b.example/2".to_string(),
            "Residents were told to stay indoors until noon.".to_string(),
        )]);
        let summaries = build_source_summaries(&g, &scraped, &config).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].summary_text, "Winds reached 120 km/h overnight.");
        assert_eq!(summaries[1].source_url, "https://b.example/2");
        assert_eq!(summaries[1].source_name, "B");
    }

    #[test]
    fn test_summaries_are_condensed() {
        let long = "The first sentence explains what happened in detail. ".repeat(10);
        let g = group(vec![
            entry("Story", "https://a.example/1", &long),
            entry("Story", "https://b.example/2", &long),
        ]);
        let summaries = build_source_summaries(&g, &HashMap::new(), &SelectionConfig::default()).unwrap();
        assert!(summaries.iter().all(|s| char_len(&s.summary_text) <= 200));
    }
}
