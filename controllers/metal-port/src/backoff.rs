//! # Fibonacci Backoff
//!
//! Requeue delays for failed reconciles. The sequence is computed in minutes,
//! matching GitOps tool conventions: 1m, 1m, 2m, 3m, 5m, 8m, 10m (max).
//!
//! Each MetalPort keeps its own position in the sequence; a successful
//! reconcile resets it.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Fibonacci sequence of delays, capped at a maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FibonacciBackoff {
    min_minutes: u64,
    max_minutes: u64,
}

impl FibonacciBackoff {
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            max_minutes,
        }
    }

    /// Delay after `failures` consecutive failures (1-based; 0 is treated as 1)
    #[must_use]
    pub fn delay(&self, failures: u32) -> Duration {
        let (mut prev, mut current) = (0u64, self.min_minutes);
        for _ in 1..failures.max(1) {
            let next = prev.saturating_add(current).min(self.max_minutes);
            prev = current;
            current = next;
            if current >= self.max_minutes {
                break;
            }
        }
        Duration::from_secs(current.min(self.max_minutes) * 60)
    }

    #[must_use]
    pub fn max(&self) -> Duration {
        Duration::from_secs(self.max_minutes * 60)
    }
}

impl Default for FibonacciBackoff {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

/// Consecutive failure counts per object key (`namespace/name`)
#[derive(Debug, Default)]
pub struct BackoffTracker {
    backoff: FibonacciBackoff,
    failures: Mutex<HashMap<String, u32>>,
}

impl BackoffTracker {
    pub fn new(backoff: FibonacciBackoff) -> Self {
        Self {
            backoff,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failure for `key` and return how long to wait before retrying
    pub fn next_delay(&self, key: &str) -> Duration {
        let mut failures = self
            .failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let count = failures.entry(key.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        self.backoff.delay(*count)
    }

    /// Forget the failures of `key` after a successful reconcile
    pub fn reset(&self, key: &str) {
        self.failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(key);
    }

    /// Delay used for errors that retrying will not fix
    pub fn max(&self) -> Duration {
        self.backoff.max()
    }
}
