//! JSON output for a single synthesized article.
//!
//! Files are grouped by local date and named after the title slug:
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     └── storm-batters-coast.json
//! ```
//! A second story with the same slug on the same day overwrites the first.

use super::dated_path;
use crate::models::SynthesizedArticle;
use chrono::{Local, NaiveDate};
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write `article` under today's date directory and return the file path.
pub async fn write_article(
    article: &SynthesizedArticle,
    json_output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    write_article_dated(article, json_output_dir, Local::now().date_naive()).await
}

/// Write `article` as pretty JSON to `{json_output_dir}/{date}/{slug}.json`.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir, %date))]
pub async fn write_article_dated(
    article: &SynthesizedArticle,
    json_output_dir: &str,
    date: NaiveDate,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(article)?;
    let path = dated_path(json_output_dir, date, article, "json");

    if let Some(dir) = path.parent() {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
            return Err(e.into());
        }
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote JSON article");
    Ok(path)
}
