//! Web-content monitoring pipeline.
//!
//! sitewatch watches configured pages for meaningful changes and turns them
//! into notifications. Each task describes a URL, a check frequency, and an
//! extraction rule; on every tick the pipeline fetches the page, extracts
//! the watched fragment, compares it against the task's persisted baseline,
//! resolves a field map from the old and new snapshots, renders notification
//! text through a sandboxed task-supplied formatter, de-duplicates, and
//! delivers.
//!
//! # Architecture
//!
//! - [`task`]: task definitions and the metadata handed to formatters
//! - [`rule`] / [`extract`]: typed rule strings and whole-document extraction
//! - [`baseline`]: persisted per-task comparison snapshots
//! - [`fields`]: per-field resolution against the old/new snapshot pair
//! - [`formatter`]: sandboxed execution of task-supplied formatting logic
//! - [`dedup`]: cooldown-window suppression of repeated notifications
//! - [`fetch`] / [`notify`]: pluggable transport boundaries
//! - [`orchestrator`]: the per-task run pipeline behind serialization gates
//! - [`scheduler`]: per-task interval loops feeding the orchestrator
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sitewatch::{
//!     BaselineStore, HttpFetcher, MonitorConfig, NotificationPayload, Notifier, Orchestrator,
//!     Result, RhaiFormatter, Scheduler, TaskDefinition,
//! };
//!
//! struct LogNotifier;
//!
//! impl Notifier for LogNotifier {
//!     async fn notify(&self, task: &TaskDefinition, payload: &NotificationPayload) -> Result<()> {
//!         println!("[{}] {}", task.name, payload.text);
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> Result<()> {
//! let orchestrator = Orchestrator::new(
//!     HttpFetcher,
//!     LogNotifier,
//!     BaselineStore::open("./baselines")?,
//!     Box::new(RhaiFormatter::new()),
//!     MonitorConfig::default(),
//! )?;
//!
//! let task: TaskDefinition = serde_json::from_str(
//!     r#"{
//!         "name": "releases",
//!         "url": "https://example.com/releases",
//!         "frequency": "10m",
//!         "rule": "css:div.latest"
//!     }"#,
//! )
//! .map_err(|e| sitewatch::MonitorError::Config(e.to_string()))?;
//!
//! let mut scheduler = Scheduler::new(Arc::new(orchestrator));
//! scheduler.schedule(&task)?;
//! # Ok(())
//! # }
//! ```

pub mod baseline;
pub mod config;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod fields;
pub mod formatter;
pub mod notify;
pub mod orchestrator;
pub mod rule;
pub mod scheduler;
pub mod task;

pub use baseline::BaselineStore;
pub use config::MonitorConfig;
pub use dedup::NotificationCache;
pub use error::{MonitorError, Result};
pub use extract::extract;
pub use fetch::{FetchedPage, HttpFetcher, PageFetcher};
pub use fields::{resolve, FieldMap};
pub use formatter::{FormatterBackend, HeuristicPolicy, RhaiFormatter};
pub use notify::{NotificationPayload, Notifier};
pub use orchestrator::{Orchestrator, RunGate, RunOutcome};
pub use rule::{CssExtract, CssTarget, ExtractionRule, FieldRule};
pub use scheduler::{parse_frequency, Scheduler};
pub use task::{TaskDefinition, TaskMeta};
