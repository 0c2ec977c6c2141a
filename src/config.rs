//! Pipeline configuration.
//!
//! Every knob has a default, so an empty YAML document (or no file at all)
//! yields a working configuration. [`FetcherConfig::validate`] is the only
//! place a run can be refused.

use crate::error::ConfigError;
use crate::feeds::FeedFormat;
use crate::http::DEFAULT_USER_AGENT;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Upper bound on bullet points in any synthesized article.
pub const MAX_BULLETS_CAP: usize = 7;

/// Feeds used when the caller supplies none of its own.
pub fn default_feeds() -> Vec<String> {
    [
        "https://feeds.bbci.co.uk/news/rss.xml",
        "https://feeds.bbci.co.uk/news/world/rss.xml",
        "https://rss.cnn.com/rss/edition.rss",
        "https://rss.cnn.com/rss/edition_world.rss",
        "https://feeds.npr.org/1001/rss.xml",
        "https://feeds.npr.org/1004/rss.xml",
        "https://www.theguardian.com/world/rss",
        "https://rss.nytimes.com/services/xml/rss/nyt/World.xml",
        "https://www.aljazeera.com/xml/rss/all.xml",
        "https://rss.cbc.ca/lineup/world.xml",
        "https://feeds.abcnews.com/abcnews/topstories",
        "https://www.cbsnews.com/latest/rss/main",
        "https://feeds.foxnews.com/foxnews/latest",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Top-level configuration for one [`StoryFetcher`](crate::orchestrator::StoryFetcher).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub feeds: Vec<String>,
    /// How many feeds are sampled per run.
    pub max_feeds: usize,
    /// How many entries are read from each feed.
    pub entries_per_feed: usize,
    pub feed_format: FeedFormat,
    pub feed_timeout_secs: u64,
    pub page_timeout_secs: u64,
    /// Parallel feed fetches / page scrapes.
    pub fetch_concurrency: usize,
    /// Fixed seed for feed sampling; random when unset.
    pub shuffle_seed: Option<u64>,
    pub user_agent: String,
    /// Fetch article pages when an RSS summary is too thin to use.
    pub scrape_article_text: bool,
    pub cluster: ClusterConfig,
    pub selection: SelectionConfig,
    pub synthesis: SynthesisConfig,
    pub images: ImageConfig,
    pub generative: Option<GenerativeConfig>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            feeds: default_feeds(),
            max_feeds: 8,
            entries_per_feed: 25,
            feed_format: FeedFormat::default(),
            feed_timeout_secs: 6,
            page_timeout_secs: 4,
            fetch_concurrency: 4,
            shuffle_seed: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            scrape_article_text: false,
            cluster: ClusterConfig::default(),
            selection: SelectionConfig::default(),
            synthesis: SynthesisConfig::default(),
            images: ImageConfig::default(),
            generative: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Minimum title Jaccard similarity to join a seed's group.
    pub similarity_threshold: f64,
    /// Minimum distinct source domains for a group to count as a story.
    pub min_sources: usize,
    /// Keyword floor for the first clustering attempt.
    pub strict_min_keywords: usize,
    /// Keyword floor once the strict attempt found nothing.
    pub loose_min_keywords: usize,
    pub keyword_cap: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.25,
            min_sources: 2,
            strict_min_keywords: 2,
            loose_min_keywords: 1,
            keyword_cap: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Candidates more similar than this to a known title are skipped.
    pub exclusion_threshold: f64,
    /// How many ranked candidates are tried before giving up.
    pub max_candidates: usize,
    pub min_summaries: usize,
    pub summary_max_chars: usize,
    /// Summaries of this many characters or fewer are ignored.
    pub min_summary_chars: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            exclusion_threshold: 0.5,
            max_candidates: 5,
            min_summaries: 2,
            summary_max_chars: 200,
            min_summary_chars: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Bullets produced by the extractive path.
    pub max_bullets: usize,
    pub min_bullets: usize,
    pub min_sentence_chars: usize,
    pub max_sentence_chars: usize,
    /// Bullets whose token overlap with an earlier bullet exceeds this are dropped.
    pub overlap_threshold: f64,
    /// Generated bullets shorter than this are discarded.
    pub min_generated_chars: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_bullets: 5,
            min_bullets: 2,
            min_sentence_chars: 30,
            max_sentence_chars: 200,
            overlap_threshold: 0.55,
            min_generated_chars: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Scrape `og:image`/`twitter:image` from article pages lacking feed images.
    pub scrape_page_meta: bool,
    /// `<img>` tags declaring a smaller width or height are skipped.
    pub min_dimension: u32,
    pub reputable_domains: Vec<String>,
    /// Let the generative capability pick among the top candidates.
    pub validate_with_generative: bool,
    pub validation_candidates: usize,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            scrape_page_meta: true,
            min_dimension: 100,
            reputable_domains: [
                "bbc.co.uk",
                "bbci.co.uk",
                "bbc.com",
                "reuters.com",
                "apnews.com",
                "npr.org",
                "theguardian.com",
                "guim.co.uk",
                "nytimes.com",
                "nyt.com",
                "washingtonpost.com",
                "cnn.com",
                "aljazeera.com",
                "cbc.ca",
                "abcnews.com",
                "cbsnews.com",
                "nbcnews.com",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            validate_with_generative: true,
            validation_candidates: 5,
        }
    }
}

/// OpenAI-compatible endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerativeConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: 0.3,
            max_tokens: 400,
            timeout_secs: 20,
            max_retries: 0,
            retry_base_delay_ms: 1000,
        }
    }
}

impl GenerativeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl FetcherConfig {
    /// Load from a YAML file. Missing keys take their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml_str(&raw).map_err(|e| match e {
            ConfigError::Unreadable { message, .. } => ConfigError::Unreadable {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).map_err(|e| ConfigError::Unreadable {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    /// Reject configurations the pipeline cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feeds.iter().all(|f| f.trim().is_empty()) {
            return Err(ConfigError::EmptyFeedList);
        }
        for (field, value) in [
            ("max_feeds", self.max_feeds),
            ("entries_per_feed", self.entries_per_feed),
            ("fetch_concurrency", self.fetch_concurrency),
            ("selection.max_candidates", self.selection.max_candidates),
            ("cluster.keyword_cap", self.cluster.keyword_cap),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }

        unit_interval("cluster.similarity_threshold", self.cluster.similarity_threshold)?;
        unit_interval("selection.exclusion_threshold", self.selection.exclusion_threshold)?;
        unit_interval("synthesis.overlap_threshold", self.synthesis.overlap_threshold)?;

        in_range(
            "cluster.min_sources",
            self.cluster.min_sources,
            2,
            usize::MAX,
        )?;
        in_range(
            "selection.min_summaries",
            self.selection.min_summaries,
            2,
            usize::MAX,
        )?;
        in_range(
            "synthesis.max_bullets",
            self.synthesis.max_bullets,
            2,
            MAX_BULLETS_CAP,
        )?;
        in_range(
            "synthesis.min_bullets",
            self.synthesis.min_bullets,
            2,
            self.synthesis.max_bullets,
        )?;
        in_range(
            "cluster.loose_min_keywords",
            self.cluster.loose_min_keywords,
            0,
            self.cluster.strict_min_keywords,
        )?;
        Ok(())
    }
}

fn unit_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            min: 0.0,
            max: 1.0,
            value,
        })
    }
}

fn in_range(field: &'static str, value: usize, min: usize, max: usize) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            min: min as f64,
            max: max as f64,
            value: value as f64,
        })
    }
}
