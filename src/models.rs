//! Data models that flow through one pipeline run.
//!
//! Everything here lives for a single call of
//! [`StoryFetcher::fetch_next_story`](crate::orchestrator::StoryFetcher::fetch_next_story):
//! - [`RawEntry`]: one feed item as parsed from RSS/Atom
//! - [`NormalizedEntry`]: a raw entry plus keywords, plain-text summary and image candidates
//! - [`StoryGroup`] / [`CandidateStory`]: clustered entries and their ranking metadata
//! - [`SourceSummary`]: one condensed summary per distinct source of the chosen story
//! - [`SynthesizedArticle`]: the final payload handed back to the caller

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where in the feed item an image reference was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRefKind {
    /// `media:content` with an image type or medium.
    MediaContent,
    /// `enclosure` with an `image/*` type.
    Enclosure,
    /// `media:thumbnail`.
    Thumbnail,
}

/// An image reference exactly as the feed declared it, possibly relative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImageRef {
    pub url: String,
    pub kind: ImageRefKind,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// One entry from one feed, before any normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    pub title: String,
    pub link: String,
    /// Summary (or description/content when the summary is absent), still HTML.
    pub summary_html: String,
    pub published_at: Option<DateTime<Utc>>,
    /// Host of `link` without a leading `www.`; empty when the link has no host.
    pub source_domain: String,
    pub raw_image_refs: Vec<RawImageRef>,
}

/// How much an image candidate can be trusted, best first.
///
/// The derived ordering is the preference order: structured media beats
/// thumbnails, which beat images embedded in the summary HTML, which beat
/// images scraped from the live article page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfidenceTier {
    Media,
    Thumbnail,
    Inline,
    PageMeta,
}

/// An absolute image URL with whatever size information was available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    pub url: String,
    pub pixel_area: Option<u64>,
    pub tier: ConfidenceTier,
}

/// A [`RawEntry`] enriched for clustering and synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEntry {
    pub raw: RawEntry,
    /// Outlet display name derived from the domain (e.g. "BBC News").
    pub source_name: String,
    /// Lowercased title keywords, in title order, deduplicated and capped.
    pub keywords: Vec<String>,
    pub clean_summary: String,
    /// Always absolute URLs, ordered by tier and then by larger pixel area.
    pub image_candidates: Vec<ImageCandidate>,
}

impl NormalizedEntry {
    pub fn title(&self) -> &str {
        &self.raw.title
    }

    pub fn domain(&self) -> &str {
        &self.raw.source_domain
    }

    pub fn link(&self) -> &str {
        &self.raw.link
    }
}

/// Entries believed to cover the same story, one per source domain.
///
/// The first member is the seed; its title is the group's title.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryGroup {
    pub members: Vec<NormalizedEntry>,
}

impl StoryGroup {
    pub fn title(&self) -> &str {
        self.members.first().map(|m| m.title()).unwrap_or_default()
    }

    pub fn source_count(&self) -> usize {
        let mut domains: Vec<&str> = self.members.iter().map(|m| m.domain()).collect();
        domains.sort_unstable();
        domains.dedup();
        domains.len()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// A story group with the metadata used to rank it.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateStory {
    pub group: StoryGroup,
    pub title: String,
    pub source_count: usize,
    /// Highest title similarity to any caller-supplied title, in `[0, 1]`.
    pub max_similarity_to_excluded: f64,
}

/// One condensed summary per distinct source in the chosen story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    pub source_name: String,
    pub summary_text: String,
    pub source_url: String,
}

/// Attribution for one source of a synthesized article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub source_name: String,
    pub url: String,
}

/// The final synthesized story.
///
/// Persisting it is the caller's business; the CLI writes it out as JSON
/// and Markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizedArticle {
    /// At most 200 characters.
    pub title: String,
    /// Between 2 and 7 deduplicated bullet points.
    pub bullet_points: Vec<String>,
    pub sources: Vec<SourceRef>,
    pub photo: Option<String>,
    pub source_count: usize,
    /// Link of the seed entry.
    pub primary_url: String,
}
