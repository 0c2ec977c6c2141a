//! Generative-text capability with optional exponential backoff.
//!
//! The pipeline only ever needs "prompt in, text out", so everything goes
//! through [`AskAsync`]:
//! - [`OpenAiAsk`]: any OpenAI-compatible `/chat/completions` endpoint
//! - [`RetryAsk`]: decorator that retries a failing inner client
//! - [`NoGenerative`]: the "not configured" capability
//!
//! # Retry Strategy
//!
//! `RetryAsk` waits `base_delay * 2^(attempt-1)` capped at 30 seconds, plus
//! 0-250ms of jitter. The configured default is zero retries, so a story
//! costs exactly one call per generative step unless an operator opts in.

use crate::config::GenerativeConfig;
use crate::error::AskError;
use rand::{Rng, rng};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

const SYSTEM_PROMPT: &str = "You are a careful news editor. You merge reporting from several \
     outlets into short, factual statements. You never compare or name the outlets.";

/// Trait for async generative-text interaction.
pub trait AskAsync {
    /// The type of response returned by the model.
    type Response;

    /// Send a prompt and receive the model's reply.
    async fn ask(&self, text: &str) -> Result<Self::Response, AskError>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
pub struct RetryAsk<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Wrap `inner`; `max_retries` of zero means a single attempt.
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    type Response = T::Response;

    #[instrument(level = "debug", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, AskError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1).min(16));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Client for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiAsk {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
    timeout: StdDuration,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiAsk {
    pub fn new(config: &GenerativeConfig) -> Result<Self, AskError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AskError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.timeout(),
        })
    }
}

impl AskAsync for OpenAiAsk {
    type Response = String;

    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn ask(&self, text: &str) -> Result<Self::Response, AskError> {
        let t0 = Instant::now();
        let url = format!("{}/chat/completions", self.base_url);
        let payload = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut request = self.client.post(&url).timeout(self.timeout).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| AskError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AskError::Status(resp.status().as_u16()));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| AskError::Request(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(AskError::EmptyResponse)?;

        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            chars = content.len(),
            "Generative call succeeded"
        );
        Ok(content)
    }
}

/// The absent generative capability. Every call fails with
/// [`AskError::NotConfigured`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGenerative;

impl AskAsync for NoGenerative {
    type Response = String;

    async fn ask(&self, _text: &str) -> Result<Self::Response, AskError> {
        Err(AskError::NotConfigured)
    }
}

/// Build the configured generative client, if any.
pub fn build_generative(config: Option<&GenerativeConfig>) -> Option<RetryAsk<OpenAiAsk>> {
    let config = config?;
    match OpenAiAsk::new(config) {
        Ok(client) => Some(RetryAsk::new(
            client,
            config.max_retries,
            StdDuration::from_millis(config.retry_base_delay_ms),
        )),
        Err(e) => {
            warn!(error = %e, "Could not build generative client; continuing without it");
            None
        }
    }
}
