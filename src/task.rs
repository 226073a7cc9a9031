//! Task definitions: the configured monitoring targets.
//!
//! [`TaskDefinition`] is owned by the external configuration surface and is
//! read-only to the monitoring pipeline. The optional field-rule set and
//! formatter source are opaque artifacts produced by an out-of-band
//! derivation step; the pipeline consumes them without regenerating them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::rule::ExtractionRule;

/// A configured monitoring target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Unique task name; also the baseline and dedup key.
    pub name: String,
    /// Source locator of the monitored page.
    pub url: Url,
    /// Check frequency, e.g. `"30s"`, `"10m"`, `"1h"`, `"2d"`.
    pub frequency: String,
    /// Whole-document extraction rule string (`css:` / `xpath:` / `regex:`).
    pub rule: String,
    /// Disabled tasks are never scheduled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Whether the fetch backend should capture a screenshot.
    #[serde(default)]
    pub screenshot: bool,
    /// Derived field-extraction rule set, name → rule string. Deterministic
    /// ordering so the field map is stable across runs.
    #[serde(default)]
    pub field_rules: BTreeMap<String, String>,
    /// Derived formatter source. A change with no formatter configured is a
    /// valid "not yet configured" outcome, not an error.
    #[serde(default)]
    pub formatter_source: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl TaskDefinition {
    /// Parse the whole-document rule string into its typed form.
    pub fn extraction_rule(&self) -> ExtractionRule {
        ExtractionRule::parse(&self.rule)
    }

    /// Whether a formatter has been configured for this task.
    pub fn has_formatter(&self) -> bool {
        self.formatter_source
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}

/// Task metadata handed to the formatter alongside the field map.
///
/// Enriched with the current time at execution so formatter logic never
/// needs clock access of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMeta {
    /// Task name.
    pub name: String,
    /// Monitored URL as a string.
    pub url: String,
    /// Current local time, `YYYY-MM-DD HH:MM:SS`.
    pub current_time: String,
    /// Current local date, `YYYY-MM-DD`.
    pub current_date: String,
}

impl TaskMeta {
    /// Build metadata for a task, stamped with the current time.
    pub fn for_task(task: &TaskDefinition) -> Self {
        let now = chrono::Local::now();
        Self {
            name: task.name.clone(),
            url: task.url.to_string(),
            current_time: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            current_date: now.format("%Y-%m-%d").to_string(),
        }
    }
}
