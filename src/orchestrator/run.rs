//! The per-task run pipeline: fetch, extract, compare, format, deliver.
//!
//! A run is one complete pass for one task. All scheduled runs hold the
//! scheduled gate for their full span, including retries, so the heavyweight
//! fetch backend is never invoked concurrently. Only fetch failures are
//! retried; every downstream failure fails the run outright and leaves the
//! task's baseline untouched, so the same change is re-detected next tick.

use std::time::Duration;

use tokio::sync::Mutex;

use crate::baseline::BaselineStore;
use crate::config::MonitorConfig;
use crate::dedup::NotificationCache;
use crate::error::Result;
use crate::extract::extract;
use crate::fetch::PageFetcher;
use crate::fields;
use crate::formatter::FormatterBackend;
use crate::notify::{NotificationPayload, Notifier};
use crate::task::{TaskDefinition, TaskMeta};

use super::gate::RunGate;

/// How a successful run concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// First observation; the baseline was recorded, nothing compared.
    BaselineInitialized,
    /// Extracted content matched the baseline.
    Unchanged,
    /// A change was detected but the task has no formatter yet. The baseline
    /// stays put so the change is re-detected once a formatter arrives.
    AwaitingFormatter,
    /// The rendered notification was a duplicate within the cooldown window.
    Suppressed,
    /// A notification was delivered and the baseline advanced.
    Notified,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::BaselineInitialized => "baseline initialized",
            Self::Unchanged => "unchanged",
            Self::AwaitingFormatter => "awaiting formatter",
            Self::Suppressed => "suppressed",
            Self::Notified => "notified",
        };
        f.write_str(label)
    }
}

/// Drives the monitoring pipeline for individual tasks.
///
/// Generic over the fetch and delivery boundaries; the formatter backend is
/// held behind a trait object so deployments can swap scripting engines
/// without re-parameterizing every caller.
pub struct Orchestrator<F, N> {
    fetcher: F,
    notifier: N,
    baseline: BaselineStore,
    formatter: Box<dyn FormatterBackend>,
    dedup: Mutex<NotificationCache>,
    scheduled_gate: RunGate,
    interactive_gate: RunGate,
    config: MonitorConfig,
}

impl<F: PageFetcher, N: Notifier> Orchestrator<F, N> {
    /// Assemble an orchestrator from its boundaries and configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MonitorError::Config`] when the configuration fails
    /// validation.
    pub fn new(
        fetcher: F,
        notifier: N,
        baseline: BaselineStore,
        formatter: Box<dyn FormatterBackend>,
        config: MonitorConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            fetcher,
            notifier,
            baseline,
            formatter,
            dedup: Mutex::new(NotificationCache::new(Duration::from_secs(
                config.cooldown_secs,
            ))),
            scheduled_gate: RunGate::new(
                "scheduled",
                Duration::from_secs(config.scheduled_gate_timeout_secs),
            ),
            interactive_gate: RunGate::new(
                "interactive",
                Duration::from_secs(config.interactive_gate_timeout_secs),
            ),
            config,
        })
    }

    /// The configuration this orchestrator runs under.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// The baseline store backing change detection.
    pub fn baseline(&self) -> &BaselineStore {
        &self.baseline
    }

    /// Execute one scheduled run for a task, with retries.
    ///
    /// Acquires the scheduled gate once and holds it across every attempt.
    /// Fetch failures are retried with a fixed delay up to the configured
    /// attempt limit; all other failures are terminal immediately.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MonitorError::GateTimeout`] when the gate cannot be
    /// acquired in time, or the last attempt's error once retries are
    /// exhausted.
    pub async fn run_scheduled(&self, task: &TaskDefinition) -> Result<RunOutcome> {
        let _permit = self.scheduled_gate.acquire().await?;

        let mut attempt = 1u32;
        loop {
            match self.run_once(task).await {
                Ok(outcome) => {
                    tracing::info!(task = %task.name, %outcome, attempt, "run complete");
                    return Ok(outcome);
                }
                Err(err) if err.is_retryable() && attempt < self.config.max_attempts => {
                    tracing::warn!(
                        task = %task.name,
                        attempt,
                        max_attempts = self.config.max_attempts,
                        error = %err,
                        "run attempt failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(task = %task.name, attempt, error = %err, "run failed");
                    return Err(err);
                }
            }
        }
    }

    /// Fetch and extract a task's current content without touching any
    /// pipeline state. Serialized behind the interactive gate, independent
    /// of scheduled runs.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MonitorError::GateTimeout`] or
    /// [`crate::MonitorError::Fetch`].
    pub async fn fetch_preview(&self, task: &TaskDefinition) -> Result<String> {
        let _permit = self.interactive_gate.acquire().await?;
        let page = self.fetcher.fetch(task, &self.config).await?;
        Ok(extract(&page.html, &task.extraction_rule()))
    }

    /// One attempt of the full pipeline.
    async fn run_once(&self, task: &TaskDefinition) -> Result<RunOutcome> {
        let page = self.fetcher.fetch(task, &self.config).await?;
        let current = extract(&page.html, &task.extraction_rule());

        let Some(previous) = self.baseline.get(&task.name) else {
            tracing::info!(task = %task.name, "first run, recording baseline");
            // A failed initial write is not fatal: the next tick simply
            // observes a first run again.
            if let Err(err) = self.baseline.put(&task.name, &current) {
                tracing::warn!(task = %task.name, error = %err, "baseline initialization failed");
            }
            return Ok(RunOutcome::BaselineInitialized);
        };

        if current == previous {
            tracing::debug!(task = %task.name, "no change detected");
            return Ok(RunOutcome::Unchanged);
        }
        tracing::info!(task = %task.name, "change detected");

        if !task.has_formatter() {
            tracing::info!(task = %task.name, "no formatter configured, baseline left in place");
            return Ok(RunOutcome::AwaitingFormatter);
        }
        let source = task.formatter_source.as_deref().unwrap_or_default();

        let resolved = fields::resolve(&task.field_rules, &previous, &current);
        let meta = TaskMeta::for_task(task);
        let message = self.formatter.execute(source, &resolved, &meta)?;

        {
            let mut dedup = self.dedup.lock().await;
            if !dedup.should_send(&task.name, &message) {
                return Ok(RunOutcome::Suppressed);
            }
        }

        let payload = NotificationPayload {
            text: message,
            screenshot: page.screenshot.clone(),
        };
        self.notifier.notify(task, &payload).await?;

        // The baseline advances only after delivery succeeded. A failed
        // write here means the change will be re-notified next tick, which
        // the dedup cache absorbs.
        if let Err(err) = self.baseline.put(&task.name, &current) {
            tracing::warn!(task = %task.name, error = %err, "baseline update failed after delivery");
        }
        Ok(RunOutcome::Notified)
    }
}
