//! Markdown rendering of a synthesized article.
//!
//! ```text
//! # Storm batters coast
//!
//! ![Storm batters coast](https://.../photo.jpg)
//!
//! - Winds reached 120 km/h overnight.
//! - Thousands lost power across the region.
//!
//! ## Sources (2)
//!
//! - [BBC News](https://www.bbc.co.uk/news/1)
//! - [CNN](https://edition.cnn.com/2)
//! ```

use super::dated_path;
use crate::models::SynthesizedArticle;
use chrono::{Local, NaiveDate};
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Markdown link text with the characters that would end it escaped.
fn escape_link_text(s: &str) -> String {
    s.replace('[', "\\[").replace(']', "\\]")
}

pub fn article_to_markdown(article: &SynthesizedArticle) -> String {
    let mut md = format!("# {}\n\n", article.title);

    if let Some(photo) = &article.photo {
        md.push_str(&format!("![{}]({})\n\n", escape_link_text(&article.title), photo));
    }

    for bullet in &article.bullet_points {
        md.push_str(&format!("- {bullet}\n"));
    }

    md.push_str(&format!("\n## Sources ({})\n\n", article.source_count));
    for source in &article.sources {
        md.push_str(&format!(
            "- [{}]({})\n",
            escape_link_text(&source.source_name),
            source.url
        ));
    }
    md
}

pub async fn write_article(
    article: &SynthesizedArticle,
    markdown_output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    write_article_dated(article, markdown_output_dir, Local::now().date_naive()).await
}

/// Write the rendered article to `{markdown_output_dir}/{date}/{slug}.md`.
#[instrument(level = "info", skip_all, fields(markdown_output_dir = %markdown_output_dir, %date))]
pub async fn write_article_dated(
    article: &SynthesizedArticle,
    markdown_output_dir: &str,
    date: NaiveDate,
) -> Result<PathBuf, Box<dyn Error>> {
    let path = dated_path(markdown_output_dir, date, article, "md");
    if let Some(dir) = path.parent() {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create Markdown dir");
            return Err(e.into());
        }
    }

    fs::write(&path, article_to_markdown(article)).await?;
    info!(path = %path.display(), "Wrote Markdown article");
    Ok(path)
}
