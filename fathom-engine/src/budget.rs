// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Wall-clock budget for the search loops.

use std::time::{Duration, Instant};

use crate::types::{CheckResult, SizingError};

#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    started: Instant,
    budget: Option<Duration>,
}

impl Deadline {
    #[must_use]
    pub fn new(budget: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(None)
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fail with [SizingError::SolverTimeout] once the budget is spent.
    pub fn check(&self, stage: &str) -> CheckResult {
        match self.budget {
            Some(budget) if self.started.elapsed() > budget => {
                Err(SizingError::SolverTimeout(format!(
                    "{stage} exceeded its {:.3}s budget; retry with a smaller horizon or a larger budget",
                    budget.as_secs_f64()
                )))
            }
            _ => Ok(()),
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::unlimited()
    }
}
