//! Well-formed RSS 2.0, RSS 1.0 (RDF) and Atom via `feed-rs`.
//!
//! Media RSS (`media:content`, `media:thumbnail`, including `media:group`)
//! and RSS `<enclosure>` both arrive as media objects; Atom enclosures stay
//! in the link list with `rel="enclosure"`.

use super::FeedParser;
use crate::error::FetchError;
use crate::models::{ImageRefKind, RawEntry, RawImageRef};
use crate::normalize::{source_domain, strip_html};
use feed_rs::model::Entry;
use feed_rs::parser;

/// The `feed-rs` backed [`FeedParser`]. Rejects malformed documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictParser;

fn is_image_type(mime: &str) -> bool {
    mime.trim().to_ascii_lowercase().starts_with("image")
}

/// The article link: first link with no rel or `rel="alternate"`.
fn entry_link(entry: &Entry) -> String {
    entry
        .links
        .iter()
        .filter(|l| !l.href.trim().is_empty())
        .find(|l| {
            l.rel
                .as_deref()
                .is_none_or(|rel| rel.is_empty() || rel.eq_ignore_ascii_case("alternate"))
        })
        .map(|l| l.href.trim().to_string())
        .unwrap_or_default()
}

fn image_refs(entry: &Entry) -> Vec<RawImageRef> {
    let mut refs = Vec::new();

    for media in &entry.media {
        for content in &media.content {
            let Some(url) = content.url.as_ref().map(|u| u.to_string()) else {
                continue;
            };
            let image = content
                .content_type
                .as_ref()
                .is_none_or(|m| is_image_type(&m.to_string()));
            if image {
                refs.push(RawImageRef {
                    url,
                    kind: ImageRefKind::MediaContent,
                    width: content.width,
                    height: content.height,
                });
            }
        }
        for thumb in &media.thumbnails {
            let url = thumb.image.uri.trim();
            if !url.is_empty() {
                refs.push(RawImageRef {
                    url: url.to_string(),
                    kind: ImageRefKind::Thumbnail,
                    width: thumb.image.width,
                    height: thumb.image.height,
                });
            }
        }
    }

    for link in &entry.links {
        let enclosure = link
            .rel
            .as_deref()
            .is_some_and(|rel| rel.eq_ignore_ascii_case("enclosure"));
        if enclosure && link.media_type.as_deref().is_some_and(is_image_type) {
            refs.push(RawImageRef {
                url: link.href.trim().to_string(),
                kind: ImageRefKind::Enclosure,
                width: None,
                height: None,
            });
        }
    }
    refs
}

/// Convert one parsed entry, or `None` when it has neither title nor link.
fn raw_entry(entry: Entry) -> Option<RawEntry> {
    let title = entry
        .title
        .as_ref()
        .map(|t| strip_html(&t.content))
        .unwrap_or_default();
    let link = entry_link(&entry);
    if title.is_empty() && link.is_empty() {
        return None;
    }

    let summary_html = [
        entry.summary.as_ref().map(|s| s.content.clone()),
        entry.content.as_ref().and_then(|c| c.body.clone()),
    ]
    .into_iter()
    .flatten()
    .map(|s| s.trim().to_string())
    .find(|s| !s.is_empty())
    .unwrap_or_default();

    Some(RawEntry {
        source_domain: source_domain(&link),
        raw_image_refs: image_refs(&entry),
        published_at: entry.published.or(entry.updated),
        title,
        link,
        summary_html,
    })
}

impl FeedParser for StrictParser {
    fn parse(&self, body: &str, limit: usize) -> Result<Vec<RawEntry>, FetchError> {
        let feed = parser::parse(body.as_bytes()).map_err(|e| FetchError::Parse {
            what: "feed XML",
            message: e.to_string(),
        })?;
        Ok(feed
            .entries
            .into_iter()
            .filter_map(raw_entry)
            .take(limit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>World</title>
    <link>https://www.example.com/</link>
    <description>World news</description>
    <item>
      <title>Markets rally as rates hold &amp; inflation cools</title>
      <link>https://www.example.com/markets/1</link>
      <description><![CDATA[<p>Stocks rose <b>sharply</b> on Tuesday.</p><img src="/img/hero.jpg" width="800" height="450">]]></description>
      <pubDate>Tue, 10 Jun 2025 14:30:00 GMT</pubDate>
      <media:content url="https://cdn.example.com/full/1.jpg" medium="image" width="1024" height="576"/>
      <media:thumbnail url="https://cdn.example.com/thumb/1.jpg" width="144" height="81"/>
      <enclosure url="https://cdn.example.com/1.mp3" type="audio/mpeg" length="10"/>
    </item>
    <item>
      <title>Second story</title>
      <link>https://www.example.com/other/2</link>
      <description>Plain text &lt;i&gt;escaped&lt;/i&gt; body</description>
      <media:group>
        <media:content url="https://cdn.example.com/g.jpg" type="image/jpeg"/>
      </media:group>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <id>urn:feed</id>
  <title>Atom feed</title>
  <updated>2025-06-09T08:00:00Z</updated>
  <entry>
    <id>urn:entry:1</id>
    <title type="html">Bridge reopens after repairs</title>
    <link rel="self" href="https://atom.example.org/self/1"/>
    <link rel="alternate" href="https://atom.example.org/bridge"/>
    <link rel="enclosure" type="image/png" href="https://atom.example.org/bridge.png"/>
    <updated>2025-06-09T08:00:00Z</updated>
    <summary>The bridge carried traffic again on Monday morning.</summary>
    <content type="html">&lt;p&gt;Longer body&lt;/p&gt;</content>
  </entry>
</feed>"#;

    #[test]
    fn test_parses_rss_items_with_media() {
        let entries = StrictParser.parse(RSS, 10).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.title, "Markets rally as rates hold & inflation cools");
        assert_eq!(first.link, "https://www.example.com/markets/1");
        assert_eq!(first.source_domain, "example.com");
        assert!(first.summary_html.contains("Stocks rose <b>sharply</b>"));
        assert!(first.published_at.is_some());

        let full = first
            .raw_image_refs
            .iter()
            .find(|r| r.kind == ImageRefKind::MediaContent)
            .unwrap();
        assert_eq!(full.url, "https://cdn.example.com/full/1.jpg");
        assert_eq!(full.width, Some(1024));
        assert!(first.raw_image_refs.iter().any(|r| r.kind == ImageRefKind::Thumbnail));
        assert!(first.raw_image_refs.iter().all(|r| !r.url.ends_with(".mp3")));

        let second = &entries[1];
        assert!(second.summary_html.contains("<i>escaped</i>"));
        assert_eq!(second.raw_image_refs.len(), 1);
        assert_eq!(second.raw_image_refs[0].url, "https://cdn.example.com/g.jpg");
    }

    #[test]
    fn test_parses_atom_entries() {
        let entries = StrictParser.parse(ATOM, 10).unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.title, "Bridge reopens after repairs");
        assert_eq!(entry.link, "https://atom.example.org/bridge");
        assert_eq!(entry.summary_html, "The bridge carried traffic again on Monday morning.");
        assert_eq!(entry.raw_image_refs.len(), 1);
        assert_eq!(entry.raw_image_refs[0].kind, ImageRefKind::Enclosure);
        assert!(entry.published_at.is_some());
    }

    #[test]
    fn test_respects_limit() {
        let entries = StrictParser.parse(RSS, 1).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].link, "https://www.example.com/markets/1");
    }

    #[test]
    fn test_rejects_non_feed_documents() {
        let html = "<html><body><p>hello</p></body></html>";
        assert!(matches!(
            StrictParser.parse(html, 10),
            Err(FetchError::Parse { .. })
        ));
        assert!(StrictParser.parse("not xml at all", 10).is_err());
    }
}
