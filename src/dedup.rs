//! Notification de-duplication over a short cooldown window.
//!
//! Keyed by (task, content hash): an identical payload for the same task is
//! suppressed while the cooldown window is open. Entries older than twice
//! the window are pruned opportunistically on every call. This is the only
//! place stale state is cleaned, so pruning must not be moved to a timer.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

/// Composite dedup key: task name + payload content hash.
///
/// Entries are strictly per-task; two tasks emitting identical content
/// never suppress each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    task: String,
    content_hash: u64,
}

/// In-memory de-duplication gate for notification payloads.
#[derive(Debug)]
pub struct NotificationCache {
    cooldown: Duration,
    sent: HashMap<DedupKey, Instant>,
}

impl NotificationCache {
    /// Create a cache with the given cooldown window.
    ///
    /// A zero cooldown disables suppression entirely.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            sent: HashMap::new(),
        }
    }

    /// Whether a payload should be delivered, recording it if so.
    ///
    /// Returns `false` when the same (task, content) pair was accepted
    /// within the cooldown window; the suppression is logged with the
    /// elapsed time. Stale entries are pruned on every invocation.
    pub fn should_send(&mut self, task: &str, content: &str) -> bool {
        let now = Instant::now();
        self.prune(now);

        if self.cooldown.is_zero() {
            return true;
        }

        let key = DedupKey {
            task: task.to_owned(),
            content_hash: hash_content(content),
        };

        if let Some(last_sent) = self.sent.get(&key) {
            let elapsed = now.duration_since(*last_sent);
            if elapsed < self.cooldown {
                tracing::info!(
                    task,
                    elapsed_secs = elapsed.as_secs(),
                    cooldown_secs = self.cooldown.as_secs(),
                    "duplicate notification suppressed"
                );
                return false;
            }
        }

        self.sent.insert(key, now);
        true
    }

    /// Drop entries older than twice the cooldown window.
    fn prune(&mut self, now: Instant) {
        let horizon = self.cooldown * 2;
        if horizon.is_zero() {
            self.sent.clear();
            return;
        }
        self.sent
            .retain(|_, sent_at| now.duration_since(*sent_at) < horizon);
    }

    /// Number of live dedup entries.
    pub fn len(&self) -> usize {
        self.sent.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}

/// Deterministic hash of notification content.
fn hash_content(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}
