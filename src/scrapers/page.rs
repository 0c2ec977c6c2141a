//! Live article page scraping.
//!
//! Two things are ever taken from an article page:
//! - a representative image, from `og:image`/`twitter:image` meta tags or,
//!   failing that, the largest non-logo `<img>` inside the article body
//! - paragraph text, when the feed summary is too thin to summarize
//!
//! Parsing is synchronous; `scraper::Html` never lives across an `.await`.

use crate::error::FetchError;
use crate::http::HttpFetch;
use crate::models::{ConfidenceTier, ImageCandidate};
use crate::normalize::absolutize;
use crate::text::{char_len, collapse_whitespace, summarize_content};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, instrument};

/// Longest article text returned by [`extract_article_text`].
pub const MAX_ARTICLE_CHARS: usize = 800;
/// Shortest container text accepted as the article body.
const MIN_ARTICLE_CHARS: usize = 150;

const META_IMAGE_KEYS: &[&str] = &[
    "og:image",
    "og:image:url",
    "og:image:secure_url",
    "twitter:image",
    "twitter:image:src",
    "article:image",
];

const ARTICLE_CONTAINERS: &str = "article, [role='article'], .article-body, .story-body, \
     .post-content, .entry-content, main";

const SKIP_IMAGE_HINTS: &[&str] = &["icon", "logo", "sprite", "avatar", "pixel", "spacer"];

static META_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta[content]").expect("valid meta selector"));
static CONTAINER_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(ARTICLE_CONTAINERS).expect("valid container selector"));
static IMG_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img").expect("valid img selector"));
static PARAGRAPH_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p").expect("valid paragraph selector"));

/// The first usable social-card image declared in the page head.
pub fn extract_meta_image(html: &str, base_url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let metas: Vec<(String, &str)> = document
        .select(&META_SELECTOR)
        .filter_map(|m| {
            let el = m.value();
            let key = el.attr("property").or_else(|| el.attr("name"))?;
            Some((key.to_lowercase(), el.attr("content")?))
        })
        .collect();

    META_IMAGE_KEYS.iter().find_map(|wanted| {
        metas
            .iter()
            .filter(|(key, _)| key == wanted)
            .find_map(|(_, content)| absolutize(content, base_url))
    })
}

/// The largest `<img>` inside the article body that does not look like a
/// logo or icon. Undeclared sizes count as the smallest possible area.
pub fn extract_body_image(html: &str, base_url: &str) -> Option<ImageCandidate> {
    let document = Html::parse_document(html);
    let mut best: Option<(u64, String)> = None;

    for container in document.select(&CONTAINER_SELECTOR) {
        for img in container.select(&IMG_SELECTOR) {
            let el = img.value();
            let Some(src) = ["src", "data-src", "data-lazy-src", "data-original"]
                .iter()
                .find_map(|a| el.attr(a))
            else {
                continue;
            };
            let lower = src.to_lowercase();
            if SKIP_IMAGE_HINTS.iter().any(|hint| lower.contains(hint)) {
                continue;
            }
            let Some(url) = absolutize(src, base_url) else {
                continue;
            };
            let dim = |name: &str| el.attr(name).and_then(|v| v.trim().parse::<u32>().ok());
            let area = match (dim("width"), dim("height")) {
                (Some(w), Some(h)) if w > 0 && h > 0 => u64::from(w) * u64::from(h),
                _ => 1,
            };
            if best.as_ref().is_none_or(|(a, _)| area > *a) {
                best = Some((area, url));
            }
        }
    }

    best.map(|(area, url)| ImageCandidate {
        url,
        pixel_area: (area > 1).then_some(area),
        tier: ConfidenceTier::PageMeta,
    })
}

/// Page-level image candidates: meta image first, then the best body image.
pub fn page_image_candidates(html: &str, base_url: &str) -> Vec<ImageCandidate> {
    let mut out = Vec::new();
    if let Some(url) = extract_meta_image(html, base_url) {
        out.push(ImageCandidate {
            url,
            pixel_area: None,
            tier: ConfidenceTier::PageMeta,
        });
    }
    if let Some(body) = extract_body_image(html, base_url) {
        if out.iter().all(|c| c.url != body.url) {
            out.push(body);
        }
    }
    out
}

/// Paragraph text of the first article container with a real body,
/// condensed to at most [`MAX_ARTICLE_CHARS`].
pub fn extract_article_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document.select(&CONTAINER_SELECTOR).find_map(|container| {
        let text = container
            .select(&PARAGRAPH_SELECTOR)
            .map(|p| p.text().collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join(" ");
        let text = collapse_whitespace(&text);
        (char_len(&text) >= MIN_ARTICLE_CHARS).then(|| summarize_content(&text, MAX_ARTICLE_CHARS))
    })
}

/// Fetch an article page and return its image candidates.
#[instrument(level = "debug", skip(http, timeout))]
pub async fn scrape_page_images<H: HttpFetch>(
    http: &H,
    url: &str,
    timeout: Duration,
) -> Result<Vec<ImageCandidate>, FetchError> {
    let page = http.get_text(url, timeout).await?;
    let candidates = page_image_candidates(&page.body, &page.final_url);
    debug!(found = candidates.len(), "Scraped page images");
    Ok(candidates)
}

/// Fetch an article page and return its body text, if it has one.
#[instrument(level = "debug", skip(http, timeout))]
pub async fn scrape_article_text<H: HttpFetch>(
    http: &H,
    url: &str,
    timeout: Duration,
) -> Result<Option<String>, FetchError> {
    let page = http.get_text(url, timeout).await?;
    let text = extract_article_text(&page.body);
    debug!(chars = text.as_deref().map_or(0, char_len), "Scraped article text");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::fake::FakeHttp;

    const BASE: &str = "https://www.example.com/news/story";

    fn long_paragraph(seed: &str) -> String {
        format!(
            "{seed} officials confirmed the figures on Monday. The report covers every district \
             in the region and was published after a two week review by independent auditors."
        )
    }

    #[test]
    fn test_meta_image_prefers_open_graph() {
        let html = r#"<html><head>
            <meta name="twitter:image" content="https://cdn.example.com/tw.jpg">
            <meta property="og:image" content="//cdn.example.com/og.jpg">
            </head><body></body></html>"#;
        assert_eq!(
            extract_meta_image(html, BASE).as_deref(),
            Some("https://cdn.example.com/og.jpg")
        );
    }

    #[test]
    fn test_meta_image_twitter_fallback_and_relative() {
        let html = r#"<head><meta name="twitter:image:src" content="/img/card.png"></head>"#;
        assert_eq!(
            extract_meta_image(html, BASE).as_deref(),
            Some("https://www.example.com/img/card.png")
        );
        assert_eq!(extract_meta_image("<head></head>", BASE), None);
    }

    #[test]
    fn test_body_image_skips_logos_and_prefers_area() {
        let html = r#"<body><article>
            <img src="/static/logo.png" width="2000" height="2000">
            <img src="/a.jpg" width="300" height="200">
            <img data-src="/b.jpg" width="800" height="600">
            <img src="/c.jpg">
            </article><img src="/outside.jpg" width="5000" height="5000"></body>"#;
        let best = extract_body_image(html, BASE).unwrap();
        assert_eq!(best.url, "https://www.example.com/b.jpg");
        assert_eq!(best.pixel_area, Some(480_000));
        assert_eq!(best.tier, ConfidenceTier::PageMeta);
    }

    #[test]
    fn test_body_image_with_oversized_dimensions() {
        let html = r#"<article>
            <img src="/huge.jpg" width="99999999999" height="99999999999">
            </article>"#;
        let best = extract_body_image(html, BASE).unwrap();
        assert_eq!(best.url, "https://www.example.com/huge.jpg");
        assert_eq!(best.pixel_area, None);

        let html = r#"<article>
            <img src="/huge.jpg" width="99999999999" height="99999999999">
            <img src="/max.jpg" width="4294967295" height="4294967295">
            </article>"#;
        let best = extract_body_image(html, BASE).unwrap();
        assert_eq!(best.url, "https://www.example.com/max.jpg");
        assert_eq!(best.pixel_area, Some(u64::from(u32::MAX) * u64::from(u32::MAX)));
    }

    #[test]
    fn test_article_text_requires_substance() {
        let html = format!(
            "<body><main><p>Short.</p></main><article><p>{}</p><p>{}</p></article></body>",
            long_paragraph("City"),
            long_paragraph("County")
        );
        let text = extract_article_text(&html).unwrap();
        assert!(text.starts_with("City officials confirmed"));
        assert!(char_len(&text) <= MAX_ARTICLE_CHARS);

        assert_eq!(extract_article_text("<main><p>Too short.</p></main>"), None);
    }

    #[tokio::test]
    async fn test_scrape_page_images_fetches_and_parses() {
        let http = FakeHttp::new().with_page(
            BASE,
            r#"<head><meta property="og:image" content="https://cdn.example.com/og.jpg"></head>
               <body><article><img src="/hero.jpg" width="1200" height="800"></article></body>"#,
        );
        let found = scrape_page_images(&http, BASE, Duration::from_secs(1)).await.unwrap();
        let urls: Vec<&str> = found.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://cdn.example.com/og.jpg", "https://www.example.com/hero.jpg"]
        );
    }

    #[tokio::test]
    async fn test_scrape_failures_surface_as_errors() {
        let http = FakeHttp::new().with_status(BASE, 404);
        assert!(scrape_page_images(&http, BASE, Duration::from_secs(1)).await.is_err());
        assert!(scrape_article_text(&http, BASE, Duration::from_secs(1)).await.is_err());
    }
}
