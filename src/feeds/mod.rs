//! Feed ingestion.
//!
//! Fetches a shuffled sample of the configured feeds with bounded,
//! order-preserving concurrency and parses each body with the configured
//! [`FeedParser`]. A feed that times out, answers with an error status or
//! fails to parse is logged and contributes nothing; ingestion itself never
//! fails.
//!
//! # Parsers
//!
//! | Format | Module | Notes |
//! |--------|--------|-------|
//! | `strict` | [`xml`] | `feed-rs`; RSS 2.0, RDF, Atom, Media RSS, enclosures |
//! | `lenient` | [`lenient`] | Regex scanner; survives bare `&` and broken nesting |

pub mod lenient;
pub mod xml;

use crate::config::FetcherConfig;
use crate::error::FetchError;
use crate::http::HttpFetch;
use crate::models::{ImageRefKind, RawEntry, RawImageRef};
use crate::normalize::{absolutize, source_domain, strip_html};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{SeedableRng, rng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

/// Turns a feed document into raw entries.
pub trait FeedParser: Send + Sync {
    /// Parse at most `limit` entries from `body`, in document order.
    fn parse(&self, body: &str, limit: usize) -> Result<Vec<RawEntry>, FetchError>;
}

/// Which [`FeedParser`] a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    #[default]
    Strict,
    Lenient,
}

impl FeedFormat {
    pub fn parser(self) -> &'static dyn FeedParser {
        match self {
            FeedFormat::Strict => &xml::StrictParser,
            FeedFormat::Lenient => &lenient::LenientParser,
        }
    }
}

/// Attributes of one element, keys lowercased.
pub(crate) type Attrs = HashMap<String, String>;

/// Accumulates the fields of one `<item>`/`<entry>` while a parser walks it.
#[derive(Debug, Default)]
pub(crate) struct EntryBuilder {
    title: String,
    link: String,
    summary: String,
    description: String,
    content: String,
    published: String,
    updated: String,
    image_refs: Vec<RawImageRef>,
}

impl EntryBuilder {
    /// Append text found inside the direct child element `field`.
    pub(crate) fn push_text(&mut self, field: &str, text: &str) {
        let slot = match field {
            "title" => &mut self.title,
            "link" => &mut self.link,
            "summary" => &mut self.summary,
            "description" => &mut self.description,
            "content:encoded" | "content" => &mut self.content,
            "pubdate" | "published" | "dc:date" => &mut self.published,
            "updated" => &mut self.updated,
            _ => return,
        };
        slot.push_str(text);
    }

    /// Atom-style `<link href=".." rel=".."/>`.
    pub(crate) fn link_element(&mut self, attrs: &Attrs) {
        let Some(href) = attrs.get("href") else {
            return;
        };
        match attrs.get("rel").map(String::as_str) {
            None | Some("alternate") if self.link.trim().is_empty() => self.link = href.clone(),
            Some("enclosure") => self.media_element("enclosure", attrs),
            _ => {}
        }
    }

    /// `media:content`, `media:thumbnail` or `enclosure`.
    pub(crate) fn media_element(&mut self, tag: &str, attrs: &Attrs) {
        let Some(url) = attrs
            .get("url")
            .or_else(|| attrs.get("href"))
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
        else {
            return;
        };
        let mime = attrs.get("type").map(String::as_str).unwrap_or("");
        let medium = attrs.get("medium").map(String::as_str).unwrap_or("");

        let kind = match tag {
            "media:content"
                if medium == "image"
                    || mime.starts_with("image")
                    || (medium.is_empty() && mime.is_empty()) =>
            {
                ImageRefKind::MediaContent
            }
            "media:thumbnail" => ImageRefKind::Thumbnail,
            "enclosure" if mime.starts_with("image") => ImageRefKind::Enclosure,
            _ => return,
        };
        self.image_refs.push(RawImageRef {
            url: url.to_string(),
            kind,
            width: parse_dimension(attrs.get("width")),
            height: parse_dimension(attrs.get("height")),
        });
    }

    /// Finished entry, or `None` when it has neither title nor link.
    pub(crate) fn finish(self) -> Option<RawEntry> {
        let title = strip_html(&self.title);
        let link = self.link.trim().to_string();
        if title.is_empty() && link.is_empty() {
            return None;
        }
        let summary_html = [self.summary, self.description, self.content]
            .into_iter()
            .map(|s| s.trim().to_string())
            .find(|s| !s.is_empty())
            .unwrap_or_default();
        let published_at = parse_published(&self.published).or_else(|| parse_published(&self.updated));

        Some(RawEntry {
            source_domain: source_domain(&link),
            title,
            link,
            summary_html,
            published_at,
            raw_image_refs: self.image_refs,
        })
    }
}

fn parse_dimension(value: Option<&String>) -> Option<u32> {
    value?.trim().parse().ok()
}

/// RFC 2822 (RSS) or RFC 3339 (Atom) timestamp.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Shuffle the feed list (seeded when asked) and keep the first `max`.
pub fn sample_feeds(feeds: &[String], max: usize, seed: Option<u64>) -> Vec<String> {
    let mut feeds: Vec<String> = feeds.iter().unique().cloned().collect();
    match seed {
        Some(seed) => feeds.shuffle(&mut StdRng::seed_from_u64(seed)),
        None => feeds.shuffle(&mut rng()),
    }
    feeds.truncate(max);
    feeds
}

/// Fetch and parse one feed. Relative entry links resolve against the
/// feed's final URL.
#[instrument(level = "debug", skip(http, parser, config))]
pub async fn fetch_feed<H: HttpFetch>(
    http: &H,
    parser: &dyn FeedParser,
    feed_url: &str,
    config: &FetcherConfig,
) -> Result<Vec<RawEntry>, FetchError> {
    let page = http.get_text(feed_url, config.feed_timeout()).await?;
    let mut entries = parser.parse(&page.body, config.entries_per_feed)?;
    for entry in entries.iter_mut().filter(|e| e.source_domain.is_empty()) {
        if let Some(absolute) = absolutize(&entry.link, &page.final_url) {
            entry.source_domain = source_domain(&absolute);
            entry.link = absolute;
        }
    }
    debug!(entries = entries.len(), "Parsed feed");
    Ok(entries)
}

/// Fetch up to `max_feeds` feeds and return their entries, deduplicated by link.
///
/// Entries keep feed order (in sampled order) and document order within a feed.
#[instrument(level = "info", skip_all, fields(configured = config.feeds.len()))]
pub async fn ingest_feeds<H: HttpFetch>(http: &H, config: &FetcherConfig) -> Vec<RawEntry> {
    let selected = sample_feeds(&config.feeds, config.max_feeds, config.shuffle_seed);
    let parser = config.feed_format.parser();

    let per_feed: Vec<Vec<RawEntry>> = stream::iter(selected.iter())
        .map(|feed| async move {
            match fetch_feed(http, parser, feed, config).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(%feed, error = %e, "Feed skipped");
                    Vec::new()
                }
            }
        })
        .buffered(config.fetch_concurrency.max(1))
        .collect()
        .await;

    let contributing = per_feed.iter().filter(|v| !v.is_empty()).count();
    let entries: Vec<RawEntry> = per_feed
        .into_iter()
        .flatten()
        .filter(|e| !e.link.is_empty())
        .unique_by(|e| e.link.clone())
        .collect();

    info!(
        feeds = selected.len(),
        contributing,
        entries = entries.len(),
        "Ingested feeds"
    );
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::fake::FakeHttp;

    fn rss(items: &[(&str, &str)]) -> String {
        let body: String = items
            .iter()
            .map(|(title, link)| {
                format!("<item><title>{title}</title><link>{link}</link><description>Body text for {title}.</description></item>")
            })
            .collect();
        format!("<?xml version=\"1.0\"?><rss version=\"2.0\"><channel><title>T</title>{body}</channel></rss>")
    }

    fn config(feeds: &[&str]) -> FetcherConfig {
        FetcherConfig {
            feeds: feeds.iter().map(|f| f.to_string()).collect(),
            shuffle_seed: Some(7),
            ..FetcherConfig::default()
        }
    }

    #[test]
    fn test_parse_published_formats() {
        let rss = parse_published("Tue, 10 Jun 2025 14:30:00 GMT").unwrap();
        assert_eq!(rss.to_rfc3339(), "2025-06-10T14:30:00+00:00");
        let atom = parse_published("2025-06-10T16:30:00+02:00").unwrap();
        assert_eq!(atom, rss);
        assert!(parse_published("yesterday").is_none());
        assert!(parse_published("  ").is_none());
    }

    #[test]
    fn test_sample_feeds_is_seeded_and_capped() {
        let feeds: Vec<String> = (0..10).map(|i| format!("https://f{i}.example/rss")).collect();
        let a = sample_feeds(&feeds, 4, Some(42));
        let b = sample_feeds(&feeds, 4, Some(42));
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
        assert!(a.iter().all(|f| feeds.contains(f)));
    }

    #[test]
    fn test_sample_feeds_drops_duplicates() {
        let feeds = vec!["https://a/rss".to_string(), "https://a/rss".to_string()];
        assert_eq!(sample_feeds(&feeds, 5, Some(1)).len(), 1);
    }

    #[test]
    fn test_builder_prefers_summary_then_description() {
        let mut b = EntryBuilder::default();
        b.push_text("title", "Fish &amp; chips");
        b.push_text("link", " https://www.example.com/a ");
        b.push_text("description", "<p>desc</p>");
        b.push_text("content:encoded", "<p>full</p>");
        let entry = b.finish().unwrap();
        assert_eq!(entry.title, "Fish & chips");
        assert_eq!(entry.link, "https://www.example.com/a");
        assert_eq!(entry.source_domain, "example.com");
        assert_eq!(entry.summary_html, "<p>desc</p>");
    }

    #[test]
    fn test_builder_media_rules() {
        let attrs = |pairs: &[(&str, &str)]| -> Attrs {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };
        let mut b = EntryBuilder::default();
        b.media_element("media:content", &attrs(&[("url", "https://x/a.jpg"), ("width", "640"), ("height", "360")]));
        b.media_element("media:content", &attrs(&[("url", "https://x/v.mp4"), ("type", "video/mp4")]));
        b.media_element("enclosure", &attrs(&[("url", "https://x/p.mp3"), ("type", "audio/mpeg")]));
        b.media_element("enclosure", &attrs(&[("url", "https://x/e.png"), ("type", "image/png")]));
        b.media_element("media:thumbnail", &attrs(&[("url", "https://x/t.jpg")]));
        b.link_element(&attrs(&[("rel", "enclosure"), ("type", "image/jpeg"), ("href", "https://x/l.jpg")]));

        let kinds: Vec<(ImageRefKind, &str)> = b
            .image_refs
            .iter()
            .map(|r| (r.kind, r.url.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (ImageRefKind::MediaContent, "https://x/a.jpg"),
                (ImageRefKind::Enclosure, "https://x/e.png"),
                (ImageRefKind::Thumbnail, "https://x/t.jpg"),
                (ImageRefKind::Enclosure, "https://x/l.jpg"),
            ]
        );
        assert_eq!(b.image_refs[0].width, Some(640));
        assert_eq!(b.image_refs[0].height, Some(360));
    }

    #[tokio::test]
    async fn test_ingest_skips_failing_feeds_and_dedupes() {
        let http = FakeHttp::new()
            .with_page(
                "https://a.example/rss",
                &rss(&[("One", "https://a.example/1"), ("Two", "https://shared.example/x")]),
            )
            .with_page(
                "https://b.example/rss",
                &rss(&[("Three", "https://shared.example/x"), ("Four", "https://b.example/4")]),
            )
            .with_status("https://down.example/rss", 503)
            .with_page("https://junk.example/rss", "<html><body>not a feed</body></html>");

        let cfg = config(&[
            "https://a.example/rss",
            "https://b.example/rss",
            "https://down.example/rss",
            "https://junk.example/rss",
            "https://missing.example/rss",
        ]);
        let entries = ingest_feeds(&http, &cfg).await;

        let mut links: Vec<&str> = entries.iter().map(|e| e.link.as_str()).collect();
        links.sort_unstable();
        assert_eq!(
            links,
            vec!["https://a.example/1", "https://b.example/4", "https://shared.example/x"]
        );
    }

    #[tokio::test]
    async fn test_ingest_respects_caps() {
        let items: Vec<(String, String)> = (0..10)
            .map(|i| (format!("Title {i}"), format!("https://a.example/{i}")))
            .collect();
        let refs: Vec<(&str, &str)> = items.iter().map(|(t, l)| (t.as_str(), l.as_str())).collect();
        let http = FakeHttp::new().with_page("https://a.example/rss", &rss(&refs));

        let mut cfg = config(&["https://a.example/rss"]);
        cfg.entries_per_feed = 3;
        let entries = ingest_feeds(&http, &cfg).await;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].title, "Title 0");
    }

    #[tokio::test]
    async fn test_ingest_resolves_relative_links() {
        let http = FakeHttp::new().with_page(
            "https://www.local.example/rss",
            &rss(&[("Relative", "/stories/1")]),
        );
        let entries = ingest_feeds(&http, &config(&["https://www.local.example/rss"])).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].link, "https://www.local.example/stories/1");
        assert_eq!(entries[0].source_domain, "local.example");
    }

    #[tokio::test]
    async fn test_ingest_with_no_reachable_feeds_is_empty() {
        let http = FakeHttp::new();
        let entries = ingest_feeds(&http, &config(&["https://nowhere.example/rss"])).await;
        assert!(entries.is_empty());
    }
}
