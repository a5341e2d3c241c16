//! Time budget shared by every wait in one reconciliation

use std::time::Duration;
use tokio::time::Instant;

/// Wall-clock budget for one call
///
/// Later waits get whatever earlier steps left over, minus a safety margin
/// kept back for the final re-fetch and status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationBudget {
    pub started: Instant,
    pub total: Duration,
    pub safety_margin: Duration,
}

impl OperationBudget {
    /// Start a budget now
    pub fn start(total: Duration, safety_margin: Duration) -> Self {
        Self {
            started: Instant::now(),
            total,
            safety_margin,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// `total - elapsed - safety_margin`, never below zero
    pub fn remaining(&self) -> Duration {
        self.total
            .saturating_sub(self.elapsed())
            .saturating_sub(self.safety_margin)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining().is_zero()
    }
}
