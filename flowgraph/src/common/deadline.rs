//! Overall analysis deadline
//!
//! Filesystem search and inline expansion are the two unbounded-cost stages, so
//! both check the deadline before they start rather than being cancelled midway.

use std::time::{Duration, Instant};
use thiserror::Error;

/// The deadline passed before a stage could start
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Analysis deadline of {budget:?} exceeded before {stage} (elapsed {elapsed:?})")]
pub struct DeadlineExceeded {
    /// The stage that was about to start
    pub stage: &'static str,
    /// The configured budget
    pub budget: Duration,
    /// Time spent when the check failed
    pub elapsed: Duration,
}

/// Wall-clock budget for one analysis run
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Option<Duration>,
}

impl Deadline {
    /// A deadline that never expires
    pub fn none() -> Self {
        Self {
            started: Instant::now(),
            budget: None,
        }
    }

    /// A deadline expiring `budget` from now
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget: Some(budget),
        }
    }

    /// Build from an optional budget
    pub fn from_budget(budget: Option<Duration>) -> Self {
        budget.map_or_else(Self::none, Self::after)
    }

    /// Time since the deadline was created
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fail if the budget is spent
    pub fn check(&self, stage: &'static str) -> Result<(), DeadlineExceeded> {
        match self.budget {
            Some(budget) => {
                let elapsed = self.elapsed();
                if elapsed >= budget {
                    tracing::warn!("Deadline exceeded before {} ({:?} >= {:?})", stage, elapsed, budget);
                    Err(DeadlineExceeded {
                        stage,
                        budget,
                        elapsed,
                    })
                } else {
                    Ok(())
                }
            }
            None => Ok(()),
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}
