//! Image selection across the sources of a story.
//!
//! Candidates are scored on URL shape alone: a reputable host, a path that
//! hints at a full-size rendition, and the absence of size parameters all
//! count in favor; thumbnail-looking paths count against. The winner goes
//! through [`upgrade_image_url`], a best-effort attempt at reaching the
//! full-resolution variant.

use crate::api::AskAsync;
use crate::models::{ConfidenceTier, ImageCandidate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Reverse;
use tracing::{debug, info, warn};
use url::Url;

/// Query parameters that only ever resize or recompress an image.
const SIZE_QUERY_KEYS: &[&str] = &[
    "w", "width", "h", "height", "size", "resize", "scale", "quality",
];

/// Path fragments that point at a reduced rendition, and their replacements.
const PATH_UPGRADES: &[(&str, &str)] = &[
    ("/thumbnails/", "/"),
    ("/thumbnail/", "/"),
    ("/thumbs/", "/"),
    ("/thumb/", "/"),
    ("/small/", "/"),
    ("_thumbnail.", "."),
    ("_thumb.", "."),
    ("-thumb.", "."),
    ("_small.", "."),
    ("-small.", "."),
];

const FULL_SIZE_HINTS: &[&str] = &["full", "original", "large"];
const REDUCED_SIZE_HINTS: &[&str] = &["thumb", "small", "medium"];

/// BBC's image CDN encodes the rendition width as a path segment.
static BBC_WIDTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(standard|news|ace/standard|ace/ws)/(\d{2,4})/").expect("valid bbc regex"));
const BBC_FULL_WIDTH: u32 = 976;

/// An image candidate together with the source it came from and its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredImage {
    pub candidate: ImageCandidate,
    pub source_name: String,
    pub score: i32,
}

/// Strip size parameters and thumbnail path segments from an image URL.
///
/// Unparseable input is returned unchanged.
pub fn upgrade_image_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };

    if url.query().is_some() {
        let all: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let kept: Vec<&(String, String)> = all
            .iter()
            .filter(|(k, _)| !SIZE_QUERY_KEYS.contains(&k.to_ascii_lowercase().as_str()))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else if kept.len() != all.len() {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    let mut path = url.path().to_string();
    for (from, to) in PATH_UPGRADES {
        path = path.replace(from, to);
    }
    if url
        .host_str()
        .is_some_and(|h| h.ends_with("ichef.bbci.co.uk"))
    {
        path = BBC_WIDTH_RE
            .replace(&path, |caps: &regex::Captures| {
                let width: u32 = caps[2].parse().unwrap_or(BBC_FULL_WIDTH);
                if width < 800 {
                    format!("/{}/{}/", &caps[1], BBC_FULL_WIDTH)
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned();
    }
    url.set_path(&path);
    url.to_string()
}

fn has_size_query(url: &Url) -> bool {
    url.query_pairs()
        .any(|(k, _)| SIZE_QUERY_KEYS.contains(&k.to_ascii_lowercase().as_str()))
}

/// Heuristic quality score of one image URL.
///
/// | signal | points |
/// |--------|--------|
/// | host under a reputable domain | +3 |
/// | path mentions full/original/large | +2 |
/// | path mentions thumb/small/medium | -2 |
/// | no size query parameters | +1 |
pub fn score_image(url: &str, reputable_domains: &[String]) -> i32 {
    let Ok(parsed) = Url::parse(url) else {
        return i32::MIN / 2;
    };
    let host = parsed.host_str().unwrap_or("").to_lowercase();
    let path = parsed.path().to_lowercase();

    let mut score = 0;
    if reputable_domains
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")))
    {
        score += 3;
    }
    if FULL_SIZE_HINTS.iter().any(|h| path.contains(h)) {
        score += 2;
    }
    if REDUCED_SIZE_HINTS.iter().any(|h| path.contains(h)) {
        score -= 2;
    }
    if !has_size_query(&parsed) {
        score += 1;
    }
    score
}

/// Score and order candidates, best first.
///
/// Ties go to the better confidence tier, then the larger declared area,
/// then the earlier source.
pub fn rank_images(
    candidates: Vec<(ImageCandidate, String)>,
    reputable_domains: &[String],
) -> Vec<ScoredImage> {
    let mut scored: Vec<ScoredImage> = candidates
        .into_iter()
        .map(|(candidate, source_name)| ScoredImage {
            score: score_image(&candidate.url, reputable_domains),
            candidate,
            source_name,
        })
        .collect();
    scored.sort_by_key(|s| {
        (
            Reverse(s.score),
            s.candidate.tier,
            Reverse(s.candidate.pixel_area.unwrap_or(0)),
        )
    });
    let mut seen = std::collections::HashSet::new();
    scored.retain(|s| seen.insert(s.candidate.url.clone()));
    scored
}

/// Prompt asking the model to pick the most relevant image by number.
pub fn image_choice_prompt(title: &str, bullets: &[String], ranked: &[ScoredImage]) -> String {
    let mut prompt = format!(
        "A news story is titled \"{title}\".\nKey points:\n{}\n\nCandidate images:\n",
        bullets
            .iter()
            .map(|b| format!("- {b}"))
            .collect::<Vec<_>>()
            .join("\n")
    );
    for (i, image) in ranked.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. {} (from {})\n",
            i + 1,
            image.candidate.url,
            image.source_name
        ));
    }
    prompt.push_str(
        "\nWhich image most likely illustrates this story? \
         Answer with the number of the image only.",
    );
    prompt
}

/// First integer in a reply, as a zero-based index into `count` candidates.
pub fn parse_image_choice(reply: &str, count: usize) -> Option<usize> {
    static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid number regex"));
    let n: usize = NUMBER_RE.find(reply)?.as_str().parse().ok()?;
    (1..=count).contains(&n).then(|| n - 1)
}

/// Pick the story image.
///
/// With a generative capability the top `validation_candidates` are offered
/// to the model; any failure or nonsense reply keeps the deterministic winner.
/// The chosen URL is always passed through [`upgrade_image_url`].
pub async fn choose_image<A>(
    ranked: &[ScoredImage],
    title: &str,
    bullets: &[String],
    ask: Option<&A>,
    validation_candidates: usize,
) -> Option<String>
where
    A: AskAsync<Response = String>,
{
    let best = ranked.first()?;
    let mut chosen = best;

    if let Some(ask) = ask {
        let shown = &ranked[..ranked.len().min(validation_candidates)];
        if shown.len() > 1 {
            match ask.ask(&image_choice_prompt(title, bullets, shown)).await {
                Ok(reply) => match parse_image_choice(&reply, shown.len()) {
                    Some(idx) => {
                        debug!(index = idx, "Generative image choice accepted");
                        chosen = &shown[idx];
                    }
                    None => warn!(reply = %reply, "Unusable image choice; keeping top score"),
                },
                Err(e) => warn!(error = %e, "Image validation call failed; keeping top score"),
            }
        }
    }

    let url = upgrade_image_url(&chosen.candidate.url);
    info!(
        url = %url,
        source = %chosen.source_name,
        score = chosen.score,
        page_meta = chosen.candidate.tier == ConfidenceTier::PageMeta,
        "Selected story image"
    );
    Some(url)
}
