//! Turn raw feed entries into [`NormalizedEntry`] values.
//!
//! Normalization is pure: it never touches the network. Page-level image
//! scraping (the last-resort image tier) happens later and only for the
//! entries of the story that was actually chosen, see
//! [`scrapers::page`](crate::scrapers::page).

use crate::images::upgrade_image_url;
use crate::models::{ConfidenceTier, ImageCandidate, ImageRefKind, NormalizedEntry, RawEntry};
use crate::text::{collapse_whitespace, extract_keywords};
use crate::utils::upcase;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::cmp::Reverse;
use tracing::debug;
use url::Url;

static IMG_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img").expect("valid img selector"));

/// Host of `link`, lowercased, without `www.` or port. Empty if unparseable.
pub fn source_domain(link: &str) -> String {
    Url::parse(link.trim())
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .map(|h| h.strip_prefix("www.").map(str::to_string).unwrap_or(h))
        .unwrap_or_default()
}

/// Outlet name for a domain, e.g. `feeds.bbci.co.uk` -> "BBC News".
///
/// Unknown domains fall back to their first meaningful label, title-cased.
pub fn source_display_name(domain: &str) -> String {
    const KNOWN: &[(&str, &str)] = &[
        ("bbc", "BBC News"),
        ("cnn", "CNN"),
        ("reuters", "Reuters"),
        ("npr", "NPR"),
        ("guardian", "The Guardian"),
        ("abcnews", "ABC News"),
        ("nytimes", "New York Times"),
        ("washingtonpost", "Washington Post"),
        ("aljazeera", "Al Jazeera"),
        ("time.com", "Time"),
        ("nbcnews", "NBC News"),
        ("cbsnews", "CBS News"),
        ("cbc.ca", "CBC News"),
        ("foxnews", "Fox News"),
        ("apnews", "AP News"),
    ];

    let lower = domain.to_lowercase();
    if let Some((_, name)) = KNOWN.iter().find(|(needle, _)| lower.contains(needle)) {
        return name.to_string();
    }

    let label = lower
        .split('.')
        .find(|l| !matches!(*l, "www" | "rss" | "feeds" | "m" | "edition"))
        .unwrap_or("");
    if label.is_empty() {
        "Unknown".to_string()
    } else {
        upcase(label)
    }
}

/// Plain text of an HTML fragment with whitespace collapsed.
pub fn strip_html(html: &str) -> String {
    if !html.contains('<') && !html.contains('&') {
        return collapse_whitespace(html);
    }
    let fragment = Html::parse_fragment(html);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
}

/// Resolve `raw` against `base`, accepting only http(s) results.
pub fn absolutize(raw: &str, base: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("data:") {
        return None;
    }
    let resolved = if let Some(rest) = raw.strip_prefix("//") {
        Url::parse(&format!("https://{rest}")).ok()?
    } else {
        match Url::parse(raw) {
            Ok(u) => u,
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(base).ok()?.join(raw).ok()?,
            Err(_) => return None,
        }
    };
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

fn parse_dimension(value: Option<&str>) -> Option<u32> {
    value?
        .trim()
        .trim_end_matches("px")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u32)
}

fn pixel_area(width: Option<u32>, height: Option<u32>) -> Option<u64> {
    match (width, height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Some(w as u64 * h as u64),
        _ => None,
    }
}

/// `<img>` tags inside summary HTML, skipping ones declared smaller than
/// `min_dimension` in either direction.
pub fn inline_images(html: &str, base: &str, min_dimension: u32) -> Vec<ImageCandidate> {
    if !html.contains("<img") && !html.contains("<IMG") {
        return Vec::new();
    }
    let fragment = Html::parse_fragment(html);
    fragment
        .select(&IMG_SELECTOR)
        .filter_map(|img| {
            let el = img.value();
            let src = el.attr("src").or_else(|| el.attr("data-src"))?;
            let width = parse_dimension(el.attr("width"));
            let height = parse_dimension(el.attr("height"));
            if width.is_some_and(|w| w < min_dimension) || height.is_some_and(|h| h < min_dimension)
            {
                return None;
            }
            Some(ImageCandidate {
                url: absolutize(src, base)?,
                pixel_area: pixel_area(width, height),
                tier: ConfidenceTier::Inline,
            })
        })
        .collect()
}

/// Image candidates for one entry, best first.
///
/// Feed media beats thumbnails beats inline `<img>`; within a tier a larger
/// declared pixel area wins. Thumbnails go through the resolution upgrade.
pub fn image_candidates(raw: &RawEntry, min_dimension: u32) -> Vec<ImageCandidate> {
    let mut candidates: Vec<ImageCandidate> = raw
        .raw_image_refs
        .iter()
        .filter_map(|r| {
            let url = absolutize(&r.url, &raw.link)?;
            let (url, tier) = match r.kind {
                ImageRefKind::MediaContent | ImageRefKind::Enclosure => (url, ConfidenceTier::Media),
                ImageRefKind::Thumbnail => (upgrade_image_url(&url), ConfidenceTier::Thumbnail),
            };
            Some(ImageCandidate {
                url,
                pixel_area: pixel_area(r.width, r.height),
                tier,
            })
        })
        .collect();
    candidates.extend(inline_images(&raw.summary_html, &raw.link, min_dimension));

    candidates.sort_by_key(|c| (c.tier, Reverse(c.pixel_area.unwrap_or(0))));
    candidates.into_iter().unique_by(|c| c.url.clone()).collect()
}

/// Normalize one entry. Never fails; filtering happens in [`normalize_entries`].
pub fn normalize_entry(raw: RawEntry, keyword_cap: usize, min_dimension: u32) -> NormalizedEntry {
    let keywords = extract_keywords(&raw.title, keyword_cap);
    let clean_summary = strip_html(&raw.summary_html);
    let image_candidates = image_candidates(&raw, min_dimension);
    let source_name = source_display_name(&raw.source_domain);
    NormalizedEntry {
        raw,
        source_name,
        keywords,
        clean_summary,
        image_candidates,
    }
}

/// Normalize a batch, dropping entries without a usable domain.
///
/// Keyword floors are applied by the clusterer so that a looser floor can be
/// retried without normalizing twice.
pub fn normalize_entries(
    raws: Vec<RawEntry>,
    keyword_cap: usize,
    min_dimension: u32,
) -> Vec<NormalizedEntry> {
    let total = raws.len();
    let normalized: Vec<NormalizedEntry> = raws
        .into_iter()
        .filter(|r| !r.source_domain.is_empty())
        .map(|r| normalize_entry(r, keyword_cap, min_dimension))
        .collect();
    debug!(
        total,
        kept = normalized.len(),
        "Normalized entries"
    );
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawImageRef;
    use crate::models::fixtures::raw;

    #[test]
    fn test_source_domain() {
        assert_eq!(source_domain("https://www.bbc.co.uk/news/123"), "bbc.co.uk");
        assert_eq!(source_domain("http://Edition.CNN.com:8080/x"), "edition.cnn.com");
        assert_eq!(source_domain("not a url"), "");
        assert_eq!(source_domain(""), "");
    }

    #[test]
    fn test_source_display_name() {
        assert_eq!(source_display_name("feeds.bbci.co.uk"), "BBC News");
        assert_eq!(source_display_name("edition.cnn.com"), "CNN");
        assert_eq!(source_display_name("theguardian.com"), "The Guardian");
        assert_eq!(source_display_name("example.org"), "Example");
        assert_eq!(source_display_name("rss.localpaper.net"), "Localpaper");
        assert_eq!(source_display_name(""), "Unknown");
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(
            strip_html("<p>Hello <b>world</b>&nbsp;&amp; friends</p>\n<br/>"),
            "Hello world & friends"
        );
        assert_eq!(strip_html("  plain   text "), "plain text");
    }

    #[test]
    fn test_absolutize() {
        let base = "https://www.example.com/news/story.html";
        assert_eq!(
            absolutize("/img/a.jpg", base).as_deref(),
            Some("https://www.example.com/img/a.jpg")
        );
        assert_eq!(
            absolutize("//cdn.example.com/a.jpg", base).as_deref(),
            Some("https://cdn.example.com/a.jpg")
        );
        assert_eq!(
            absolutize("b.jpg", base).as_deref(),
            Some("https://www.example.com/news/b.jpg")
        );
        assert_eq!(absolutize("data:image/png;base64,AAAA", base), None);
        assert_eq!(absolutize("ftp://example.com/a.jpg", base), None);
        assert_eq!(absolutize("", base), None);
    }

    #[test]
    fn test_inline_images_skip_small() {
        let html = r#"<p>x</p><img src="/pixel.gif" width="1" height="1">
                      <img src="/hero.jpg" width="800" height="450">
                      <img src="/unsized.jpg">"#;
        let imgs = inline_images(html, "https://example.com/a", 100);
        let urls: Vec<&str> = imgs.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://example.com/hero.jpg", "https://example.com/unsized.jpg"]
        );
        assert_eq!(imgs[0].pixel_area, Some(360_000));
        assert_eq!(imgs[1].pixel_area, None);
    }

    #[test]
    fn test_image_candidates_priority() {
        let mut entry = raw(
            "Storm hits",
            "https://news.example.com/story/1",
            r#"<img src="https://news.example.com/inline.jpg" width="1200" height="800">"#,
        );
        entry.raw_image_refs = vec![
            RawImageRef {
                url: "/thumb/t.jpg?width=120".to_string(),
                kind: ImageRefKind::Thumbnail,
                width: Some(120),
                height: Some(80),
            },
            RawImageRef {
                url: "https://cdn.example.com/small-media.jpg".to_string(),
                kind: ImageRefKind::MediaContent,
                width: Some(300),
                height: Some(200),
            },
            RawImageRef {
                url: "https://cdn.example.com/big-media.jpg".to_string(),
                kind: ImageRefKind::MediaContent,
                width: Some(1024),
                height: Some(576),
            },
        ];

        let candidates = image_candidates(&entry, 100);
        let urls: Vec<&str> = candidates.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://cdn.example.com/big-media.jpg",
                "https://cdn.example.com/small-media.jpg",
                "https://news.example.com/t.jpg",
                "https://news.example.com/inline.jpg",
            ]
        );
        assert!(candidates.iter().all(|c| c.url.starts_with("https://")));
    }

    #[test]
    fn test_normalize_entry_fields() {
        let entry = normalize_entry(
            raw(
                "Wildfire forces evacuation in northern California towns",
                "https://www.npr.org/2024/fire",
                "<p>Thousands were told to leave.</p>",
            ),
            6,
            100,
        );
        assert_eq!(entry.source_name, "NPR");
        assert_eq!(entry.domain(), "npr.org");
        assert_eq!(entry.clean_summary, "Thousands were told to leave.");
        assert_eq!(
            entry.keywords,
            vec!["wildfire", "forces", "evacuation", "northern", "california", "towns"]
        );
    }

    #[test]
    fn test_normalize_entries_drops_missing_domain() {
        let entries = normalize_entries(
            vec![
                raw("Good entry here", "https://example.com/a", ""),
                raw("No domain entry", "/relative/only", ""),
            ],
            6,
            100,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title(), "Good entry here");
    }
}
