//! Error types for the sitewatch crate.
//!
//! Only whole-run faults surface as [`MonitorError`] values. Per-rule
//! extraction failures degrade to fallback text and per-field resolution
//! failures degrade to `None`. Both are absorbed where they occur and
//! never reach this enum.

/// Errors that can occur during a monitoring run.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Fetching the page content failed. Transient; the whole run is retried.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Formatter source failed static validation. Hard stop, no retry.
    #[error("formatter rejected: {0}")]
    FormatterRejected(String),

    /// Formatter logic failed at runtime or returned a non-string value.
    /// Hard stop, no retry, no degraded placeholder output.
    #[error("formatter runtime error: {0}")]
    FormatterRuntime(String),

    /// The notifier collaborator failed to deliver. Baseline stays untouched.
    #[error("notify error: {0}")]
    Notify(String),

    /// Baseline persistence failed. Baseline stays stale for the next run.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The run-serialization gate could not be acquired within its timeout.
    #[error("gate acquire timed out: {0}")]
    GateTimeout(String),

    /// Invalid monitoring configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl MonitorError {
    /// Whether this fault warrants retrying the whole run.
    ///
    /// Only fetch failures are retryable. Formatter, notify, persistence,
    /// and gate faults terminate the run; the next scheduled tick recomputes
    /// the same diff against the unchanged baseline.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }
}

/// Convenience type alias for sitewatch results.
pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_fetch() {
        let err = MonitorError::Fetch("connection refused".into());
        assert_eq!(err.to_string(), "fetch error: connection refused");
    }

    #[test]
    fn display_formatter_rejected() {
        let err = MonitorError::FormatterRejected("missing entry point".into());
        assert_eq!(err.to_string(), "formatter rejected: missing entry point");
    }

    #[test]
    fn display_formatter_runtime() {
        let err = MonitorError::FormatterRuntime("returned integer".into());
        assert_eq!(err.to_string(), "formatter runtime error: returned integer");
    }

    #[test]
    fn display_gate_timeout() {
        let err = MonitorError::GateTimeout("scheduled gate after 60s".into());
        assert_eq!(
            err.to_string(),
            "gate acquire timed out: scheduled gate after 60s"
        );
    }

    #[test]
    fn only_fetch_is_retryable() {
        assert!(MonitorError::Fetch("timeout".into()).is_retryable());
        assert!(!MonitorError::FormatterRejected("x".into()).is_retryable());
        assert!(!MonitorError::FormatterRuntime("x".into()).is_retryable());
        assert!(!MonitorError::Notify("x".into()).is_retryable());
        assert!(!MonitorError::Persistence("x".into()).is_retryable());
        assert!(!MonitorError::GateTimeout("x".into()).is_retryable());
        assert!(!MonitorError::Config("x".into()).is_retryable());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MonitorError>();
    }
}
