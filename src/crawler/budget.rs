//! Execution budget of a crawl run
//!
//! A scheduled run gets a fixed amount of wall-clock time. Two thresholds on
//! the remaining time decide when to stop: below the soft threshold no new
//! item (or feed page) is started, below the hard threshold not even the next
//! media file of the current item is fetched.

use crate::config::CrawlerConfig;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct Budget {
    deadline: Instant,
    soft: Duration,
    hard: Duration,
}

impl Budget {
    pub fn new(total: Duration, soft: Duration, hard: Duration) -> Self {
        Self {
            deadline: Instant::now() + total,
            soft,
            hard,
        }
    }

    /// Builds the budget of a run, optionally overriding the configured total
    pub fn from_config(config: &CrawlerConfig, budget_seconds: Option<u64>) -> Self {
        Self::new(
            Duration::from_secs(budget_seconds.unwrap_or(config.budget_seconds)),
            Duration::from_secs(config.soft_deadline_seconds),
            Duration::from_secs(config.hard_deadline_seconds),
        )
    }

    /// A budget that never runs out, for on-demand commands
    pub fn unlimited() -> Self {
        Self::new(
            Duration::from_secs(60 * 60 * 24 * 365),
            Duration::ZERO,
            Duration::ZERO,
        )
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// No new item or page should be started
    pub fn soft_exhausted(&self) -> bool {
        self.remaining() <= self.soft
    }

    /// Not even the next media file should be fetched
    pub fn hard_exhausted(&self) -> bool {
        self.remaining() <= self.hard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_budget_is_exhausted() {
        let budget = Budget::new(Duration::ZERO, Duration::from_secs(60), Duration::from_secs(10));
        assert!(budget.soft_exhausted());
        assert!(budget.hard_exhausted());
    }

    #[test]
    fn test_soft_before_hard() {
        let budget = Budget::new(
            Duration::from_secs(30),
            Duration::from_secs(60),
            Duration::from_secs(10),
        );
        assert!(budget.soft_exhausted());
        assert!(!budget.hard_exhausted());
    }

    #[test]
    fn test_fresh_budget() {
        let budget = Budget::from_config(&CrawlerConfig::default(), None);
        assert!(!budget.soft_exhausted());
        assert!(budget.remaining() > Duration::from_secs(800));

        let overridden = Budget::from_config(&CrawlerConfig::default(), Some(0));
        assert!(overridden.soft_exhausted());
    }

    #[test]
    fn test_unlimited() {
        assert!(!Budget::unlimited().soft_exhausted());
    }
}
