//! Interval scheduling of monitoring tasks.
//!
//! Each enabled task gets its own tokio loop ticking at the task's
//! configured frequency. The first run happens one full interval after
//! scheduling, not immediately. Loops funnel into the shared orchestrator,
//! whose scheduled gate serializes the actual runs; a tick that finds the
//! gate saturated past its timeout fails that run and waits for the next
//! tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{MonitorError, Result};
use crate::fetch::PageFetcher;
use crate::notify::Notifier;
use crate::orchestrator::Orchestrator;
use crate::task::TaskDefinition;

/// Parse a frequency string like `"30s"`, `"10m"`, `"1h"`, or `"2d"`.
///
/// # Errors
///
/// Returns [`MonitorError::Config`] for anything that is not a positive
/// integer followed by one of the unit suffixes `s`, `m`, `h`, `d`.
pub fn parse_frequency(frequency: &str) -> Result<Duration> {
    let caps = frequency_re()
        .captures(frequency.trim())
        .ok_or_else(|| {
            MonitorError::Config(format!(
                "invalid frequency '{frequency}', expected e.g. 30s, 10m, 1h, 2d"
            ))
        })?;

    let amount: u64 = caps[1]
        .parse()
        .map_err(|_| MonitorError::Config(format!("frequency amount out of range: '{frequency}'")))?;
    if amount == 0 {
        return Err(MonitorError::Config(format!(
            "frequency must be positive: '{frequency}'"
        )));
    }

    let seconds = match &caps[2] {
        "s" => amount,
        "m" => amount * 60,
        "h" => amount * 3600,
        "d" => amount * 86_400,
        _ => unreachable!("regex restricts the unit"),
    };
    Ok(Duration::from_secs(seconds))
}

fn frequency_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)([smhd])$").expect("static regex is valid"))
}

/// Owns the per-task run loops.
///
/// Dropping the scheduler aborts every loop.
pub struct Scheduler<F, N> {
    orchestrator: Arc<Orchestrator<F, N>>,
    loops: HashMap<String, JoinHandle<()>>,
}

impl<F, N> Scheduler<F, N>
where
    F: PageFetcher + 'static,
    N: Notifier + 'static,
{
    /// Create a scheduler feeding runs into the given orchestrator.
    pub fn new(orchestrator: Arc<Orchestrator<F, N>>) -> Self {
        Self {
            orchestrator,
            loops: HashMap::new(),
        }
    }

    /// Start (or restart) the run loop for a task.
    ///
    /// A disabled task is never scheduled; scheduling one removes any loop
    /// left over from when it was enabled. Re-scheduling an active task
    /// replaces its loop, so frequency edits take effect immediately.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Config`] when the task's frequency string is
    /// malformed.
    pub fn schedule(&mut self, task: &TaskDefinition) -> Result<()> {
        if !task.enabled {
            if self.remove(&task.name) {
                tracing::info!(task = %task.name, "task disabled, loop stopped");
            } else {
                tracing::debug!(task = %task.name, "task disabled, not scheduled");
            }
            return Ok(());
        }

        let interval = parse_frequency(&task.frequency)?;
        self.remove(&task.name);

        tracing::info!(
            task = %task.name,
            interval_secs = interval.as_secs(),
            "task scheduled"
        );

        let orchestrator = Arc::clone(&self.orchestrator);
        let name = task.name.clone();
        let task = task.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval completes immediately;
            // consume it so runs start one interval after scheduling.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match orchestrator.run_scheduled(&task).await {
                    Ok(outcome) => {
                        tracing::info!(task = %task.name, %outcome, "scheduled run finished");
                    }
                    Err(err) => {
                        tracing::error!(task = %task.name, error = %err, "scheduled run failed");
                    }
                }
            }
        });
        self.loops.insert(name, handle);
        Ok(())
    }

    /// Stop a task's run loop. Returns whether a loop was running.
    pub fn remove(&mut self, task_name: &str) -> bool {
        match self.loops.remove(task_name) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Whether a run loop is active for this task.
    pub fn is_scheduled(&self, task_name: &str) -> bool {
        self.loops.contains_key(task_name)
    }

    /// Number of active run loops.
    pub fn len(&self) -> usize {
        self.loops.len()
    }

    /// Whether no run loops are active.
    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// Stop all run loops.
    pub fn shutdown(&mut self) {
        for (name, handle) in self.loops.drain() {
            tracing::debug!(task = %name, "stopping run loop");
            handle.abort();
        }
    }
}

impl<F, N> Drop for Scheduler<F, N> {
    fn drop(&mut self) {
        for handle in self.loops.values() {
            handle.abort();
        }
    }
}
