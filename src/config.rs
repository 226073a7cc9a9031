//! Monitoring configuration with sensible defaults.
//!
//! [`MonitorConfig`] controls retry behaviour, the notification cooldown
//! window, gate acquire timeouts, and fetch behaviour. The defaults match
//! a polite, low-frequency monitoring deployment.

use crate::error::MonitorError;

/// Configuration for the monitoring pipeline.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Maximum attempts per run. Whole-run faults (fetch failures) are
    /// retried up to this bound; everything else terminates on first failure.
    pub max_attempts: u32,
    /// Fixed delay in seconds between whole-run retry attempts.
    pub retry_delay_secs: u64,
    /// Notification de-duplication cooldown window in seconds. An identical
    /// payload for the same task is suppressed within this window.
    pub cooldown_secs: u64,
    /// Acquire timeout in seconds for the scheduled-run serialization gate.
    pub scheduled_gate_timeout_secs: u64,
    /// Acquire timeout in seconds for the interactive preview gate. Longer
    /// than the scheduled timeout so on-demand requests are not starved.
    pub interactive_gate_timeout_secs: u64,
    /// Per-request fetch timeout in seconds.
    pub fetch_timeout_secs: u64,
    /// Custom User-Agent string. If `None`, the HTTP fetch backend rotates
    /// through a built-in list of realistic browser User-Agents.
    pub user_agent: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_secs: 30,
            cooldown_secs: 300,
            scheduled_gate_timeout_secs: 60,
            interactive_gate_timeout_secs: 180,
            fetch_timeout_secs: 30,
            user_agent: None,
        }
    }
}

impl MonitorConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `max_attempts` must be greater than 0
    /// - `fetch_timeout_secs` must be greater than 0
    /// - both gate timeouts must be greater than 0
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.max_attempts == 0 {
            return Err(MonitorError::Config(
                "max_attempts must be greater than 0".into(),
            ));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(MonitorError::Config(
                "fetch_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.scheduled_gate_timeout_secs == 0 || self.interactive_gate_timeout_secs == 0 {
            return Err(MonitorError::Config(
                "gate timeouts must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
