//! # story_synth
//!
//! Multi-source story clustering and bullet-point synthesis over news feeds.
//!
//! [`orchestrator::StoryFetcher::fetch_next_story`] is the single entry
//! point: it samples feeds, groups entries that report the same event across
//! different outlets, skips stories the caller already has, and returns one
//! [`models::SynthesizedArticle`] or the reason none could be produced.
//!
//! Network access and generative text are injected through
//! [`http::HttpFetch`] and [`api::AskAsync`], so the whole pipeline runs
//! offline against canned responses in tests.

pub mod api;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod error;
pub mod feeds;
pub mod http;
pub mod images;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod outputs;
pub mod scrapers;
pub mod select;
pub mod synthesize;
pub mod text;
pub mod utils;
