//! Regex-based feed scanner for documents an XML parser would reject.
//!
//! Plenty of real feeds ship bare ampersands, unclosed HTML inside
//! `<description>` or mismatched tags. This scanner only looks for
//! `<item>`/`<entry>` blocks and the handful of child elements the pipeline
//! needs, so damage elsewhere in the document does not matter.

use super::{Attrs, EntryBuilder, FeedParser};
use crate::error::FetchError;
use crate::models::RawEntry;
use once_cell::sync::Lazy;
use regex::Regex;

static ITEM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(item|entry)(?:\s[^>]*)?>(.*?)</(?:item|entry)\s*>").expect("valid item regex")
});
static CDATA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("valid cdata regex"));
static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([\w:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid attribute regex")
});
static MEDIA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(media:content|media:thumbnail|enclosure)\b([^>]*)>").expect("valid media regex")
});
static LINK_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<link\b([^>]*)>").expect("valid link regex"));

/// Child elements read as text, in the form the builder expects them.
const TEXT_FIELDS: &[(&str, &str)] = &[
    ("title", "title"),
    ("link", "link"),
    ("summary", "summary"),
    ("description", "description"),
    ("content:encoded", "content:encoded"),
    ("content", "content"),
    ("pubDate", "pubdate"),
    ("published", "published"),
    ("dc:date", "dc:date"),
    ("updated", "updated"),
];

static FIELD_RES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    TEXT_FIELDS
        .iter()
        .map(|(tag, field)| {
            let tag = regex::escape(tag);
            let re = Regex::new(&format!(r"(?is)<{tag}(?:\s[^>]*)?>(.*?)</{tag}\s*>"))
                .expect("valid field regex");
            (*field, re)
        })
        .collect()
});

/// The regex-based [`FeedParser`]. Only fails when no item is found at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct LenientParser;

/// Unwrap CDATA sections and decode the five XML entities.
///
/// Anything else (HTML entities, a stray `&`) is left for the HTML stripper.
fn decode_text(raw: &str) -> String {
    if let Some(caps) = CDATA_RE.captures(raw) {
        return caps[1].to_string();
    }
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn parse_attrs(raw: &str) -> Attrs {
    ATTR_RE
        .captures_iter(raw)
        .map(|c| {
            let value = c.get(2).or_else(|| c.get(3)).map_or("", |m| m.as_str());
            (c[1].to_lowercase(), decode_text(value))
        })
        .collect()
}

fn parse_block(block: &str) -> Option<RawEntry> {
    let mut builder = EntryBuilder::default();
    for (field, re) in FIELD_RES.iter() {
        if let Some(caps) = re.captures(block) {
            builder.push_text(field, decode_text(&caps[1]).trim());
        }
    }
    for caps in LINK_TAG_RE.captures_iter(block) {
        let attrs = parse_attrs(&caps[1]);
        if attrs.contains_key("href") {
            builder.link_element(&attrs);
        }
    }
    for caps in MEDIA_RE.captures_iter(block) {
        builder.media_element(&caps[1].to_lowercase(), &parse_attrs(&caps[2]));
    }
    builder.finish()
}

impl FeedParser for LenientParser {
    fn parse(&self, body: &str, limit: usize) -> Result<Vec<RawEntry>, FetchError> {
        let blocks: Vec<&str> = ITEM_RE
            .captures_iter(body)
            .filter_map(|c| c.get(2).map(|m| m.as_str()))
            .collect();
        if blocks.is_empty() {
            return Err(FetchError::Parse {
                what: "feed markup",
                message: "no item or entry blocks".to_string(),
            });
        }
        Ok(blocks.into_iter().filter_map(parse_block).take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageRefKind;

    const BROKEN: &str = r#"<rss><channel>
<item>
  <title>Floods & landslides hit the valley</title>
  <link>https://www.example.net/floods</link>
  <description><p>Heavy rain <b>overnight</description>
  <media:thumbnail url='https://img.example.net/thumb/f.jpg' width='120' height='80' />
  <pubDate>Wed, 11 Jun 2025 06:00:00 +0000</pubDate>
</item>
<item>
  <title><![CDATA[Council approves budget]]></title>
  <link>https://news.example.org/budget</link>
  <content:encoded><![CDATA[<p>The vote passed 7-2.</p>]]></content:encoded>
  <enclosure url="https://news.example.org/b.jpg" type="image/jpeg" />
</item>
</channel>"#;

    #[test]
    fn test_reads_broken_markup() {
        let entries = LenientParser.parse(BROKEN, 10).unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].title, "Floods & landslides hit the valley");
        assert_eq!(entries[0].source_domain, "example.net");
        assert_eq!(entries[0].summary_html, "<p>Heavy rain <b>overnight");
        assert_eq!(entries[0].raw_image_refs[0].kind, ImageRefKind::Thumbnail);
        assert_eq!(entries[0].raw_image_refs[0].width, Some(120));
        assert!(entries[0].published_at.is_some());

        assert_eq!(entries[1].title, "Council approves budget");
        assert_eq!(entries[1].summary_html, "<p>The vote passed 7-2.</p>");
        assert_eq!(entries[1].raw_image_refs[0].kind, ImageRefKind::Enclosure);
    }

    #[test]
    fn test_content_does_not_shadow_content_encoded() {
        let body = "<item><title>T</title><link>https://a.example/1</link>\
                    <content:encoded>encoded body</content:encoded></item>";
        let entries = LenientParser.parse(body, 10).unwrap();
        assert_eq!(entries[0].summary_html, "encoded body");
    }

    #[test]
    fn test_atom_links_by_attribute() {
        let body = r#"<feed><entry><title>Atom</title>
            <link rel="alternate" href="https://atom.example/a"/>
            <summary>Sum &amp; more</summary></entry></feed>"#;
        let entries = LenientParser.parse(body, 10).unwrap();
        assert_eq!(entries[0].link, "https://atom.example/a");
        assert_eq!(entries[0].summary_html, "Sum & more");
    }

    #[test]
    fn test_no_items_is_a_parse_error() {
        assert!(matches!(
            LenientParser.parse("<html>nothing</html>", 10),
            Err(FetchError::Parse { .. })
        ));
    }

    #[test]
    fn test_limit() {
        assert_eq!(LenientParser.parse(BROKEN, 1).unwrap().len(), 1);
    }
}
