//! Error and skip types for the story pipeline.
//!
//! Only [`ConfigError`] ever aborts a run. Everything else is either a
//! recoverable per-step failure ([`FetchError`], [`AskError`]) that degrades a
//! single feed, page or generative call, or an explicit "nothing usable here"
//! value ([`CandidateSkip`], [`ExhaustedReason`]) that the orchestrator branches on.

use std::fmt;

/// A network step failed. The caller drops the affected feed or page.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("could not parse {what}: {message}")]
    Parse { what: &'static str, message: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl FetchError {
    pub(crate) fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout { url: url.to_string() }
        } else if let Some(status) = e.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}

/// A generative-text call failed or returned something unusable.
#[derive(Debug, thiserror::Error)]
pub enum AskError {
    #[error("generative capability is not configured")]
    NotConfigured,

    #[error("generative request failed: {0}")]
    Request(String),

    #[error("generative endpoint returned HTTP {0}")]
    Status(u16),

    #[error("generative response had no text content")]
    EmptyResponse,
}

/// Contract violation in the caller's configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("feed list is empty")]
    EmptyFeedList,

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("could not read config file {path}: {message}")]
    Unreadable { path: String, message: String },
}

/// Why a ranked candidate story was passed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSkip {
    TooFewSummaries { found: usize, needed: usize },
    TooFewBullets { found: usize, needed: usize },
}

impl fmt::Display for CandidateSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateSkip::TooFewSummaries { found, needed } => {
                write!(f, "only {found} usable summaries (need {needed})")
            }
            CandidateSkip::TooFewBullets { found, needed } => {
                write!(f, "only {found} bullet points (need {needed})")
            }
        }
    }
}

/// Why a run ended without a synthesized story. None of these are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExhaustedReason {
    NoEntries,
    NoGroups,
    NoEligibleCandidates,
    CandidatesFailed(Vec<CandidateSkip>),
}

impl fmt::Display for ExhaustedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExhaustedReason::NoEntries => write!(f, "no feed entries were fetched"),
            ExhaustedReason::NoGroups => write!(f, "no story is covered by multiple sources"),
            ExhaustedReason::NoEligibleCandidates => {
                write!(f, "every multi-source story is already known")
            }
            ExhaustedReason::CandidatesFailed(skips) => {
                write!(f, "{} candidate stories tried, none usable", skips.len())
            }
        }
    }
}
