//! The fetch orchestrator: one call in, one story (or a reason why not) out.
//!
//! # Stages
//!
//! ```text
//! Clustering -> Ranking -> Summarizing(1) -> Done
//!                              | skip
//!                          Summarizing(2) -> Done
//!                              | skip
//!                             ...          -> Exhausted
//! ```
//!
//! - **Clustering**: ingest feeds, normalize, group into multi-source stories
//! - **Ranking**: drop known stories, order by source count then novelty
//! - **Summarizing(n)**: per-source summaries, bullets, image for candidate `n`
//!
//! Nothing in here fails. Network trouble degrades a single feed, page or
//! generative call; running out of material ends in
//! [`StoryOutcome::Exhausted`] with the reason attached.

use crate::api::{AskAsync, NoGenerative};
use crate::cluster::cluster_entries;
use crate::config::FetcherConfig;
use crate::error::{CandidateSkip, ConfigError, ExhaustedReason};
use crate::feeds::ingest_feeds;
use crate::http::HttpFetch;
use crate::images::{choose_image, rank_images};
use crate::models::{
    CandidateStory, ImageCandidate, RawEntry, SourceRef, StoryGroup, SynthesizedArticle,
};
use crate::normalize::normalize_entries;
use crate::scrapers::page;
use crate::select::{build_source_summaries, needs_article_text, rank_candidates};
use crate::synthesize::synthesize_bullets;
use crate::text::{char_len, truncate_chars};
use crate::utils::truncate_for_log;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// Titles shorter than this are replaced with a generic one.
const MIN_TITLE_CHARS: usize = 10;
const MAX_TITLE_CHARS: usize = 200;

/// Where the orchestrator is, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Clustering,
    Ranking,
    Summarizing(usize),
    Done,
    Exhausted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Clustering => write!(f, "clustering"),
            Stage::Ranking => write!(f, "ranking"),
            Stage::Summarizing(n) => write!(f, "summarizing #{n}"),
            Stage::Done => write!(f, "done"),
            Stage::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Result of one orchestration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryOutcome {
    Done(SynthesizedArticle),
    Exhausted(ExhaustedReason),
}

impl StoryOutcome {
    pub fn into_article(self) -> Option<SynthesizedArticle> {
        match self {
            StoryOutcome::Done(article) => Some(article),
            StoryOutcome::Exhausted(_) => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StoryOutcome::Done(_))
    }
}

/// Title for the article: the candidate title, or a generic one when that is
/// too short, capped at 200 characters.
pub fn article_title(candidate_title: &str, source_count: usize) -> String {
    let title = candidate_title.trim();
    if char_len(title) < MIN_TITLE_CHARS {
        return format!("News Story from {source_count} Sources");
    }
    truncate_chars(title, MAX_TITLE_CHARS).trim_end().to_string()
}

/// Turns the configured feeds into a [`SynthesizedArticle`].
///
/// The HTTP capability is always required; the generative one is optional
/// and attached with [`StoryFetcher::with_generative`].
#[derive(Debug)]
pub struct StoryFetcher<H, A = NoGenerative> {
    config: FetcherConfig,
    http: H,
    ask: Option<A>,
}

impl<H: HttpFetch> StoryFetcher<H, NoGenerative> {
    /// Validate `config` and build a fetcher without generative support.
    pub fn new(config: FetcherConfig, http: H) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            http,
            ask: None,
        })
    }
}

impl<H, A> StoryFetcher<H, A> {
    /// Attach a generative capability for bullets and image validation.
    pub fn with_generative<B>(self, ask: B) -> StoryFetcher<H, B> {
        StoryFetcher {
            config: self.config,
            http: self.http,
            ask: Some(ask),
        }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }
}

impl<H, A> StoryFetcher<H, A>
where
    H: HttpFetch,
    A: AskAsync<Response = String>,
{
    /// Fetch feeds and synthesize the best story not already in `exclude_titles`.
    #[instrument(level = "info", skip_all, fields(excluded = exclude_titles.len()))]
    pub async fn fetch_next_story(&self, exclude_titles: &[String]) -> StoryOutcome {
        let raw = ingest_feeds(&self.http, &self.config).await;
        self.synthesize_from_entries(raw, exclude_titles).await
    }

    /// Run everything after ingestion on entries the caller already has.
    pub async fn synthesize_from_entries(
        &self,
        raw: Vec<RawEntry>,
        exclude_titles: &[String],
    ) -> StoryOutcome {
        let cfg = &self.config;

        info!(stage = %Stage::Clustering, entries = raw.len(), "Orchestrator stage");
        let entries = normalize_entries(raw, cfg.cluster.keyword_cap, cfg.images.min_dimension);
        if entries.is_empty() {
            return exhausted(ExhaustedReason::NoEntries);
        }
        let Some(clustering) = cluster_entries(&entries, &cfg.cluster) else {
            return exhausted(ExhaustedReason::NoGroups);
        };
        if clustering.is_weak() {
            warn!(strategy = %clustering.strategy, "Only a weak story grouping is available");
        }

        info!(stage = %Stage::Ranking, groups = clustering.groups.len(), "Orchestrator stage");
        let candidates = rank_candidates(
            clustering.groups,
            exclude_titles,
            cfg.cluster.min_sources,
            cfg.selection.exclusion_threshold,
        );
        if candidates.is_empty() {
            return exhausted(ExhaustedReason::NoEligibleCandidates);
        }

        let mut skips = Vec::new();
        for (idx, candidate) in candidates
            .iter()
            .take(cfg.selection.max_candidates)
            .enumerate()
        {
            info!(
                stage = %Stage::Summarizing(idx + 1),
                candidate = %truncate_for_log(&candidate.title, 80),
                sources = candidate.source_count,
                "Orchestrator stage"
            );
            match self.try_candidate(candidate).await {
                Ok(article) => {
                    info!(
                        stage = %Stage::Done,
                        title = %truncate_for_log(&article.title, 80),
                        bullets = article.bullet_points.len(),
                        has_photo = article.photo.is_some(),
                        "Story synthesized"
                    );
                    return StoryOutcome::Done(article);
                }
                Err(skip) => {
                    info!(reason = %skip, "Candidate skipped");
                    skips.push(skip);
                }
            }
        }
        exhausted(ExhaustedReason::CandidatesFailed(skips))
    }

    async fn try_candidate(
        &self,
        candidate: &CandidateStory,
    ) -> Result<SynthesizedArticle, CandidateSkip> {
        let cfg = &self.config;
        let article_text = if cfg.scrape_article_text {
            self.scrape_thin_summaries(&candidate.group).await
        } else {
            HashMap::new()
        };

        let summaries = build_source_summaries(&candidate.group, &article_text, &cfg.selection)?;
        let synthesis =
            synthesize_bullets(&candidate.title, &summaries, self.ask.as_ref(), &cfg.synthesis)
                .await?;
        let photo = self
            .select_photo(&candidate.group, &candidate.title, &synthesis.bullets)
            .await;

        let sources: Vec<SourceRef> = summaries
            .iter()
            .map(|s| SourceRef {
                source_name: s.source_name.clone(),
                url: s.source_url.clone(),
            })
            .collect();
        let source_count = sources.len();
        let primary_url = candidate
            .group
            .members
            .first()
            .map(|m| m.link().to_string())
            .unwrap_or_default();

        Ok(SynthesizedArticle {
            title: article_title(&candidate.title, source_count),
            bullet_points: synthesis.bullets,
            sources,
            photo,
            source_count,
            primary_url,
        })
    }

    /// Page text for members whose feed summary is too thin, keyed by link.
    async fn scrape_thin_summaries(&self, group: &StoryGroup) -> HashMap<String, String> {
        let timeout = self.config.page_timeout();
        let thin: Vec<&str> = group
            .members
            .iter()
            .filter(|m| needs_article_text(m, &self.config.selection))
            .map(|m| m.link())
            .collect();

        stream::iter(thin)
            .map(|link| async move {
                match page::scrape_article_text(&self.http, link, timeout).await {
                    Ok(Some(text)) => Some((link.to_string(), text)),
                    Ok(None) => {
                        debug!(%link, "No article body found");
                        None
                    }
                    Err(e) => {
                        warn!(%link, error = %e, "Article text scrape failed");
                        None
                    }
                }
            })
            .buffered(self.config.fetch_concurrency.max(1))
            .filter_map(|pair| async move { pair })
            .collect()
            .await
    }

    /// Page-level image candidates for every member, in member order.
    async fn scrape_page_images(&self, group: &StoryGroup) -> Vec<(ImageCandidate, String)> {
        let timeout = self.config.page_timeout();
        let per_member: Vec<Vec<(ImageCandidate, String)>> = stream::iter(group.members.iter())
            .map(|member| async move {
                match page::scrape_page_images(&self.http, member.link(), timeout).await {
                    Ok(found) => found
                        .into_iter()
                        .map(|c| (c, member.source_name.clone()))
                        .collect(),
                    Err(e) => {
                        warn!(link = %member.link(), error = %e, "Page image scrape failed");
                        Vec::new()
                    }
                }
            })
            .buffered(self.config.fetch_concurrency.max(1))
            .collect()
            .await;
        per_member.into_iter().flatten().collect()
    }

    async fn select_photo(
        &self,
        group: &StoryGroup,
        title: &str,
        bullets: &[String],
    ) -> Option<String> {
        let images = &self.config.images;
        let mut pool: Vec<(ImageCandidate, String)> = group
            .members
            .iter()
            .flat_map(|m| {
                m.image_candidates
                    .iter()
                    .cloned()
                    .map(|c| (c, m.source_name.clone()))
            })
            .collect();
        if pool.is_empty() && images.scrape_page_meta {
            pool = self.scrape_page_images(group).await;
        }

        let ranked = rank_images(pool, &images.reputable_domains);
        let ask = if images.validate_with_generative {
            self.ask.as_ref()
        } else {
            None
        };
        choose_image(&ranked, title, bullets, ask, images.validation_candidates).await
    }
}

fn exhausted(reason: ExhaustedReason) -> StoryOutcome {
    info!(stage = %Stage::Exhausted, %reason, "No story this time");
    StoryOutcome::Exhausted(reason)
}
