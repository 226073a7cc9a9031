//! Page fetching boundary and the default HTTP backend.
//!
//! The orchestrator fetches through the [`PageFetcher`] trait so that a
//! heavyweight rendering backend (headless browser) can be plugged in
//! without touching the pipeline. The built-in [`HttpFetcher`] issues a
//! plain GET with browser-like headers and rotating User-Agents; it never
//! executes JavaScript and does not produce screenshots.

use std::path::PathBuf;
use std::time::Duration;

use rand::seq::SliceRandom;

use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::task::TaskDefinition;

/// Realistic browser User-Agent strings, rotated per request.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// A fetched page: raw markup plus an optional screenshot reference.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Raw page content as served (or as rendered, for browser backends).
    pub html: String,
    /// Screenshot path, when the backend captured one.
    pub screenshot: Option<PathBuf>,
}

/// A pluggable page-fetch backend.
///
/// Implementors own their transport entirely: connection handling,
/// rendering, timeouts, and optional screenshot capture. All
/// implementations must be `Send + Sync`; the orchestrator may be shared
/// across task loops.
pub trait PageFetcher: Send + Sync {
    /// Fetch the content of a task's source locator.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Fetch`] on any transport or rendering
    /// failure. Fetch failures are the only retryable fault in a run.
    fn fetch(
        &self,
        task: &TaskDefinition,
        config: &MonitorConfig,
    ) -> impl std::future::Future<Output = Result<FetchedPage>> + Send;
}

/// Default fetch backend: plain HTTP GET via [`reqwest`].
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher;

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, task: &TaskDefinition, config: &MonitorConfig) -> Result<FetchedPage> {
        if task.screenshot {
            tracing::debug!(task = %task.name, "HTTP backend cannot capture screenshots, skipping");
        }

        let client = build_client(config)?;
        let response = client
            .get(task.url.clone())
            .send()
            .await
            .map_err(|e| MonitorError::Fetch(format!("GET {}: {e}", task.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::Fetch(format!(
                "GET {} returned status {status}",
                task.url
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| MonitorError::Fetch(format!("read body of {}: {e}", task.url)))?;

        tracing::debug!(task = %task.name, bytes = html.len(), "page fetched");
        Ok(FetchedPage {
            html,
            screenshot: None,
        })
    }
}

/// Build a [`reqwest::Client`] configured for page monitoring.
///
/// Cookie store enabled, timeout from config, random User-Agent from the
/// built-in rotation list (or a custom one if configured).
///
/// # Errors
///
/// Returns [`MonitorError::Fetch`] if the client cannot be constructed.
pub fn build_client(config: &MonitorConfig) -> Result<reqwest::Client> {
    let ua = match config.user_agent {
        Some(ref custom) => custom.clone(),
        None => random_user_agent().to_owned(),
    };

    reqwest::Client::builder()
        .cookie_store(true)
        .timeout(Duration::from_secs(config.fetch_timeout_secs))
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| MonitorError::Fetch(format!("failed to build HTTP client: {e}")))
}

/// Select a random User-Agent string from the rotation list.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .copied()
        // SAFETY: USER_AGENTS is a non-empty const array, choose only returns None on empty slices
        .unwrap_or(USER_AGENTS[0])
}
