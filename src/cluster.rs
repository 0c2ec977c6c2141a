//! Topic clustering of normalized entries into multi-source stories.
//!
//! # Algorithm
//!
//! Single-pass greedy grouping: every not-yet-assigned entry seeds a group
//! and pulls in each later unassigned entry that matches the seed and comes
//! from a domain the group does not have yet. Groups with fewer than
//! `min_sources` members are dropped and their non-seed members go back to
//! the pool.
//!
//! # Fallback order
//!
//! 1. Title Jaccard similarity, entries with at least `strict_min_keywords` keywords
//! 2. Title Jaccard similarity, entries with at least `loose_min_keywords` keywords
//! 3. Relaxed match: one shared keyword, or one title contains the other
//! 4. Degenerate: the first `min_sources` entries with distinct domains
//!
//! The first step that yields any group wins. A degenerate result is a weak
//! signal and is reported as such through [`ClusterStrategy`].

use crate::config::ClusterConfig;
use crate::models::{NormalizedEntry, StoryGroup};
use crate::text::title_similarity;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

/// Which fallback step produced a [`Clustering`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterStrategy {
    Similarity { min_keywords: usize },
    Relaxed,
    Degenerate,
}

impl fmt::Display for ClusterStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterStrategy::Similarity { min_keywords } => {
                write!(f, "similarity (>= {min_keywords} keywords)")
            }
            ClusterStrategy::Relaxed => write!(f, "relaxed keyword/substring"),
            ClusterStrategy::Degenerate => write!(f, "degenerate"),
        }
    }
}

/// Story groups in seed order, plus how they were found.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    pub groups: Vec<StoryGroup>,
    pub strategy: ClusterStrategy,
}

impl Clustering {
    pub fn is_weak(&self) -> bool {
        self.strategy == ClusterStrategy::Degenerate
    }
}

/// Greedy seed grouping with a pluggable match predicate.
fn greedy_groups<F>(entries: &[&NormalizedEntry], min_sources: usize, matches: F) -> Vec<StoryGroup>
where
    F: Fn(&NormalizedEntry, &NormalizedEntry) -> bool,
{
    let mut assigned = vec![false; entries.len()];
    let mut groups = Vec::new();

    for i in 0..entries.len() {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        let seed = entries[i];
        let mut members = vec![i];
        let mut domains: HashSet<&str> = HashSet::from([seed.domain()]);

        for j in (i + 1)..entries.len() {
            let candidate = entries[j];
            if assigned[j] || domains.contains(candidate.domain()) {
                continue;
            }
            if matches(seed, candidate) {
                domains.insert(candidate.domain());
                members.push(j);
            }
        }

        if members.len() >= min_sources {
            for &j in &members {
                assigned[j] = true;
            }
            groups.push(StoryGroup {
                members: members.iter().map(|&j| entries[j].clone()).collect(),
            });
        }
    }
    groups
}

/// Group by title similarity against the seed.
pub fn cluster_by_similarity(
    entries: &[&NormalizedEntry],
    threshold: f64,
    min_sources: usize,
) -> Vec<StoryGroup> {
    greedy_groups(entries, min_sources, |seed, other| {
        title_similarity(seed.title(), other.title()) >= threshold
    })
}

/// Whether two entries share a keyword or one title contains the other.
pub fn relaxed_match(a: &NormalizedEntry, b: &NormalizedEntry) -> bool {
    if a.keywords.iter().any(|k| b.keywords.contains(k)) {
        return true;
    }
    let ta = a.title().to_lowercase();
    let tb = b.title().to_lowercase();
    !ta.is_empty() && !tb.is_empty() && (ta.contains(&tb) || tb.contains(&ta))
}

/// Group by [`relaxed_match`] against the seed.
pub fn cluster_relaxed(entries: &[&NormalizedEntry], min_sources: usize) -> Vec<StoryGroup> {
    greedy_groups(entries, min_sources, relaxed_match)
}

/// The first `min_sources` entries with distinct domains, as one group.
pub fn degenerate_group(entries: &[&NormalizedEntry], min_sources: usize) -> Option<StoryGroup> {
    let mut seen = HashSet::new();
    let members: Vec<NormalizedEntry> = entries
        .iter()
        .filter(|e| seen.insert(e.domain()))
        .take(min_sources)
        .map(|e| (*e).clone())
        .collect();
    (members.len() >= min_sources).then_some(StoryGroup { members })
}

fn with_keywords(entries: &[NormalizedEntry], floor: usize) -> Vec<&NormalizedEntry> {
    entries.iter().filter(|e| e.keywords.len() >= floor).collect()
}

/// Run the full fallback chain. Returns `None` when even the degenerate
/// step cannot find `min_sources` distinct domains.
pub fn cluster_entries(entries: &[NormalizedEntry], config: &ClusterConfig) -> Option<Clustering> {
    let min_sources = config.min_sources;

    let mut floors = vec![config.strict_min_keywords];
    if config.loose_min_keywords < config.strict_min_keywords {
        floors.push(config.loose_min_keywords);
    }
    for min_keywords in floors {
        let pool = with_keywords(entries, min_keywords);
        let groups = cluster_by_similarity(&pool, config.similarity_threshold, min_sources);
        debug!(min_keywords, pool = pool.len(), groups = groups.len(), "Similarity clustering");
        if !groups.is_empty() {
            info!(groups = groups.len(), min_keywords, "Clustered by title similarity");
            return Some(Clustering {
                groups,
                strategy: ClusterStrategy::Similarity { min_keywords },
            });
        }
    }

    let pool = with_keywords(entries, config.loose_min_keywords);
    let groups = cluster_relaxed(&pool, min_sources);
    if !groups.is_empty() {
        info!(groups = groups.len(), "Clustered by relaxed keyword match");
        return Some(Clustering {
            groups,
            strategy: ClusterStrategy::Relaxed,
        });
    }

    let all: Vec<&NormalizedEntry> = entries.iter().collect();
    let group = degenerate_group(&all, min_sources)?;
    warn!(title = %group.title(), "No related titles; using degenerate group");
    Some(Clustering {
        groups: vec![group],
        strategy: ClusterStrategy::Degenerate,
    })
}
