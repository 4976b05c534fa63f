//! Fetch Layer
//!
//! Blocking HTTP access with bounded retry and exponential backoff, plus the
//! `Renderer` seam for full browser rendering. Extractors only ever see the
//! two traits so they can be driven by canned pages in tests.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::config::ScrapeConfig;

/// Base delay for exponential backoff (milliseconds)
const BASE_BACKOFF_MS: u64 = 500;

/// Upper bound for a single backoff sleep (milliseconds)
const MAX_BACKOFF_MS: u64 = 4000;

/// Response bodies are cut to this many characters in error messages.
const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{method} {url} failed (status {}): {snippet}", fmt_status(.status))]
    Request {
        method: String,
        url: String,
        status: Option<u16>,
        snippet: String,
    },

    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("browser renderer unavailable: {0}")]
    RendererUnavailable(String),

    #[error("rendering {url} failed: {message}")]
    Render { url: String, message: String },
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Static page access.
pub trait Fetcher {
    fn fetch_text(&self, url: &str) -> FetchResult<String>;

    fn fetch_json(&self, url: &str, payload: &Value, headers: &[(&str, &str)]) -> FetchResult<Value>;
}

/// Full browser rendering for pages that only reveal content through script.
pub trait Renderer {
    /// Load `url` and return the final DOM, optionally expanding paged rows first.
    fn render_page(&self, url: &str, expand_rows: bool) -> FetchResult<String>;

    /// Load `url`, keep revealing more results for up to `max_iterations`
    /// rounds and return `(title, href)` pairs of job-title links.
    fn render_and_collect_links(&self, url: &str, max_iterations: u32) -> FetchResult<Vec<(String, String)>>;
}

/// Blocking HTTP client with retry.
pub struct HttpClient {
    client: Client,
    attempts: u32,
}

impl HttpClient {
    pub fn new(config: &ScrapeConfig) -> FetchResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::Request {
                method: "INIT".to_string(),
                url: String::new(),
                status: None,
                snippet: e.to_string(),
            })?;

        Ok(Self {
            client,
            attempts: config.fetch_attempts.max(1),
        })
    }

    /// Run `op` up to `self.attempts` times, sleeping between failures.
    fn with_retry<T>(&self, url: &str, mut op: impl FnMut() -> FetchResult<T>) -> FetchResult<T> {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.attempts => {
                    let delay = backoff_delay(attempt);
                    log::debug!("Retrying {} in {:?} after attempt {} failed: {}", url, delay, attempt, e);
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn get_once(&self, url: &str) -> FetchResult<String> {
        let resp = self.client.get(url).send().map_err(|e| send_error("GET", url, e))?;
        let status = resp.status();
        let body = resp.text().map_err(|e| send_error("GET", url, e))?;
        if !status.is_success() {
            return Err(FetchError::Request {
                method: "GET".to_string(),
                url: url.to_string(),
                status: Some(status.as_u16()),
                snippet: snippet(&body),
            });
        }
        Ok(body)
    }

    fn post_json_once(&self, url: &str, payload: &Value, headers: &[(&str, &str)]) -> FetchResult<Value> {
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .json(payload);
        for (name, value) in headers {
            if let (Ok(name), Ok(value)) = (HeaderName::try_from(*name), HeaderValue::try_from(*value)) {
                request = request.header(name, value);
            }
        }

        let resp = request.send().map_err(|e| send_error("POST", url, e))?;
        let status = resp.status();
        let body = resp.text().map_err(|e| send_error("POST", url, e))?;
        if !status.is_success() {
            return Err(FetchError::Request {
                method: "POST".to_string(),
                url: url.to_string(),
                status: Some(status.as_u16()),
                snippet: snippet(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: format!("{} (body: {})", e, snippet(&body)),
        })
    }
}

impl Fetcher for HttpClient {
    fn fetch_text(&self, url: &str) -> FetchResult<String> {
        self.with_retry(url, || self.get_once(url))
    }

    fn fetch_json(&self, url: &str, payload: &Value, headers: &[(&str, &str)]) -> FetchResult<Value> {
        self.with_retry(url, || self.post_json_once(url, payload, headers))
    }
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| s.to_string()).unwrap_or_else(|| "none".to_string())
}

fn send_error(method: &str, url: &str, e: reqwest::Error) -> FetchError {
    FetchError::Request {
        method: method.to_string(),
        url: url.to_string(),
        status: e.status().map(|s| s.as_u16()),
        snippet: snippet(&e.to_string()),
    }
}

/// Exponential backoff: 0.5s, 1s, 2s, 4s, 4s...
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u64 << attempt.saturating_sub(1).min(16);
    Duration::from_millis((BASE_BACKOFF_MS * factor).min(MAX_BACKOFF_MS))
}

/// First `SNIPPET_CHARS` characters of a body, whitespace collapsed.
pub fn snippet(body: &str) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= SNIPPET_CHARS {
        collapsed
    } else {
        let cut: String = collapsed.chars().take(SNIPPET_CHARS).collect();
        format!("{}...", cut)
    }
}
