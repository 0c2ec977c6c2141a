//! # story_synth
//!
//! Samples a set of news RSS/Atom feeds, finds a story covered by at least
//! two outlets that has not been published before, and writes a short
//! deduplicated bullet-point article about it.
//!
//! ## Usage
//!
//! ```sh
//! story_synth -j ./json -m ./markdown --exclude-file published.txt
//! ```
//!
//! ## Architecture
//!
//! 1. **Ingest**: fetch a shuffled sample of feeds concurrently
//! 2. **Cluster**: group entries about the same event across domains
//! 3. **Select**: skip already-published stories and rank the rest
//! 4. **Synthesize**: bullets from per-source summaries, plus a photo
//! 5. **Output**: JSON and Markdown files
//!
//! An empty run is normal: the binary says so and exits successfully.

use clap::Parser;
use std::error::Error;
use story_synth::api::build_generative;
use story_synth::cli::{Cli, parse_exclude_lines};
use story_synth::config::FetcherConfig;
use story_synth::http::ReqwestFetcher;
use story_synth::orchestrator::{StoryFetcher, StoryOutcome};
use story_synth::outputs::{json, markdown};
use story_synth::utils::{ensure_writable_dir, placeholder_photo, truncate_for_log};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("story_synth starting up");

    let args = Cli::parse();
    debug!(?args.json_output_dir, ?args.markdown_output_dir, ?args.config, "Parsed CLI arguments");

    let base = match &args.config {
        Some(path) => FetcherConfig::from_yaml_file(path)?,
        None => FetcherConfig::default(),
    };
    let config = args.apply(base);

    // Early check: output dirs must be writable before any network work
    for dir in [&args.json_output_dir, &args.markdown_output_dir]
        .into_iter()
        .flatten()
    {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "Output directory is not writable");
            return Err(e);
        }
    }

    let mut exclude = args.exclude.clone();
    if let Some(path) = &args.exclude_file {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => exclude.extend(parse_exclude_lines(&raw)),
            Err(e) => warn!(%path, error = %e, "Could not read exclude file; continuing without it"),
        }
    }
    info!(excluded = exclude.len(), feeds = config.feeds.len(), "Configuration loaded");

    let http = ReqwestFetcher::new(&config.user_agent)?;
    let generative = build_generative(config.generative.as_ref());
    let fetcher = StoryFetcher::new(config, http)?;

    let outcome = match generative {
        Some(ask) => {
            info!("Generative endpoint configured");
            fetcher.with_generative(ask).fetch_next_story(&exclude).await
        }
        None => fetcher.fetch_next_story(&exclude).await,
    };

    let mut article = match outcome {
        StoryOutcome::Done(article) => article,
        StoryOutcome::Exhausted(reason) => {
            info!(%reason, elapsed_ms = start_time.elapsed().as_millis() as u64, "No story produced");
            println!("No new story could be put together right now. Try again shortly.");
            return Ok(());
        }
    };

    if article.photo.is_none() {
        article.photo = Some(placeholder_photo(&article.title));
    }

    if let Some(dir) = &args.json_output_dir {
        json::write_article(&article, dir).await?;
    }
    if let Some(dir) = &args.markdown_output_dir {
        markdown::write_article(&article, dir).await?;
    }
    if args.json_output_dir.is_none() && args.markdown_output_dir.is_none() {
        println!("{}", serde_json::to_string_pretty(&article)?);
    }

    info!(
        title = %truncate_for_log(&article.title, 80),
        sources = article.source_count,
        bullets = article.bullet_points.len(),
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "story_synth finished"
    );
    Ok(())
}
