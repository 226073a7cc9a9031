//! Run-serialization gates with bounded acquire timeouts.
//!
//! All scheduled runs serialize behind a single gate because fetching leans
//! on a shared heavyweight resource that must not be invoked concurrently.
//! Interactive preview fetches get their own independent gate with a longer
//! timeout, so neither path can starve the other. Acquiring beyond the
//! timeout fails that invocation. It is logged, not silently dropped, and
//! not queued for retry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{MonitorError, Result};

/// A mutual-exclusion gate with a bounded acquire timeout.
#[derive(Debug)]
pub struct RunGate {
    name: &'static str,
    semaphore: Arc<Semaphore>,
    acquire_timeout: Duration,
}

impl RunGate {
    /// Create a gate admitting one holder at a time.
    pub fn new(name: &'static str, acquire_timeout: Duration) -> Self {
        Self {
            name,
            semaphore: Arc::new(Semaphore::new(1)),
            acquire_timeout,
        }
    }

    /// Acquire the gate, waiting at most the configured timeout.
    ///
    /// The returned permit holds the gate until dropped, so callers keep it
    /// alive across the complete fetch-through-persist span.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::GateTimeout`] when the gate stays held past
    /// the acquire timeout.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        match tokio::time::timeout(
            self.acquire_timeout,
            Arc::clone(&self.semaphore).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => Ok(permit),
            // The semaphore is never closed; this arm is unreachable in practice.
            Ok(Err(err)) => Err(MonitorError::GateTimeout(format!(
                "{} gate closed: {err}",
                self.name
            ))),
            Err(_) => {
                tracing::warn!(
                    gate = self.name,
                    timeout_secs = self.acquire_timeout.as_secs(),
                    "gate acquire timed out"
                );
                Err(MonitorError::GateTimeout(format!(
                    "{} gate not acquired within {:?}",
                    self.name, self.acquire_timeout
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uncontended_gate_acquires_immediately() {
        let gate = RunGate::new("test", Duration::from_millis(50));
        let permit = gate.acquire().await;
        assert!(permit.is_ok());
    }

    #[tokio::test]
    async fn held_gate_times_out() {
        let gate = RunGate::new("test", Duration::from_millis(20));
        let _held = gate.acquire().await.expect("first acquire");

        let err = gate.acquire().await.unwrap_err();
        assert!(matches!(err, MonitorError::GateTimeout(_)), "{err}");
        assert!(err.to_string().contains("test gate"));
    }

    #[tokio::test]
    async fn released_gate_reacquires() {
        let gate = RunGate::new("test", Duration::from_millis(20));
        let permit = gate.acquire().await.expect("first acquire");
        drop(permit);
        assert!(gate.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn independent_gates_do_not_contend() {
        let scheduled = RunGate::new("scheduled", Duration::from_millis(20));
        let interactive = RunGate::new("interactive", Duration::from_millis(20));

        let _held = scheduled.acquire().await.expect("scheduled acquire");
        // The interactive gate is unaffected by the held scheduled gate.
        assert!(interactive.acquire().await.is_ok());
    }
}
