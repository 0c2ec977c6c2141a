//! Command-line interface definitions for story_synth.
//!
//! Flags override whatever the optional YAML config file sets. The generative
//! endpoint can also be configured through environment variables.

use crate::config::{FetcherConfig, GenerativeConfig};
use crate::feeds::FeedFormat;
use clap::Parser;

/// Command-line arguments for the story_synth binary.
///
/// # Examples
///
/// ```sh
/// # Default feeds, deterministic synthesis
/// story_synth -j ./json
///
/// # Skip stories already published, with a generative endpoint
/// story_synth -j ./json -m ./markdown --exclude-file published.txt \
///     --api-base http://localhost:8080/v1 --model qwen2.5
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Feed URL to sample from (repeatable; replaces the configured list)
    #[arg(short, long = "feed")]
    pub feeds: Vec<String>,

    /// Title of a story that must not be produced again (repeatable)
    #[arg(short, long = "exclude")]
    pub exclude: Vec<String>,

    /// File with one already-published title per line
    #[arg(long)]
    pub exclude_file: Option<String>,

    /// Number of feeds sampled per run
    #[arg(long)]
    pub max_feeds: Option<usize>,

    /// Entries read from each feed
    #[arg(long)]
    pub entries_per_feed: Option<usize>,

    /// Use the regex-based feed scanner that tolerates malformed XML
    #[arg(long)]
    pub lenient_feeds: bool,

    /// Output directory for the JSON article file
    #[arg(short, long)]
    pub json_output_dir: Option<String>,

    /// Output directory for the Markdown article file
    #[arg(short, long)]
    pub markdown_output_dir: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_API_BASE")]
    pub api_base: Option<String>,

    /// API key for the generative endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model name for the generative endpoint
    #[arg(long, env = "OPENAI_MODEL")]
    pub model: Option<String>,
}

impl Cli {
    /// Layer the flags on top of `config`.
    ///
    /// Any of `--api-base`, `--api-key` or `--model` switches the generative
    /// path on, starting from the configured endpoint or the defaults.
    pub fn apply(&self, mut config: FetcherConfig) -> FetcherConfig {
        if !self.feeds.is_empty() {
            config.feeds = self.feeds.clone();
        }
        if let Some(n) = self.max_feeds {
            config.max_feeds = n;
        }
        if let Some(n) = self.entries_per_feed {
            config.entries_per_feed = n;
        }
        if self.lenient_feeds {
            config.feed_format = FeedFormat::Lenient;
        }

        if self.api_base.is_some() || self.api_key.is_some() || self.model.is_some() {
            let mut generative = config.generative.take().unwrap_or_default();
            if let Some(base) = &self.api_base {
                generative.base_url = base.clone();
            }
            if let Some(key) = &self.api_key {
                generative.api_key = Some(key.clone());
            }
            if let Some(model) = &self.model {
                generative.model = model.clone();
            }
            config.generative = Some(generative);
        }
        config
    }
}

/// Titles from an exclude file: one per line, blanks and `#` comments skipped.
pub fn parse_exclude_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect()
}
