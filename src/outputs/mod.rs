//! Output generation for synthesized articles.
//!
//! # Submodules
//!
//! - [`json`]: Writes a [`SynthesizedArticle`](crate::models::SynthesizedArticle) as a JSON file
//! - [`markdown`]: Renders an article as a Markdown document and writes it
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     └── wildfire-forces-evacuation-in-california-towns.json
//!
//! markdown_output_dir/
//! └── 2025-05-06/
//!     └── wildfire-forces-evacuation-in-california-towns.md
//! ```

pub mod json;
pub mod markdown;

use crate::models::SynthesizedArticle;
use crate::utils::slugify_title;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// `{dir}/{date}/{slug}.{ext}` for an article.
pub(crate) fn dated_path(dir: &str, date: NaiveDate, article: &SynthesizedArticle, ext: &str) -> PathBuf {
    Path::new(dir)
        .join(date.format("%Y-%m-%d").to_string())
        .join(format!("{}.{ext}", slugify_title(&article.title)))
}
