// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Analysis window resolution.

use num::integer::lcm;

use crate::types::{CheckResult, SizingOutcome};
use crate::validation_error;

/// Minimum number of whole overall periods covered by an automatic horizon.
pub const DEFAULT_KMIN_BLOCKS: u64 = 4;

/// Each blind window (round trip) must fit this many times in the horizon.
pub const BLIND_WINDOW_REPEATS: u64 = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HorizonRequest {
    #[default]
    Auto,
    Cycles(u64),
}

/// Everything needed to turn a request into a concrete horizon.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HorizonPolicy {
    pub request: HorizonRequest,

    /// Minimum repetitions of the overall period. When not given this is
    /// [DEFAULT_KMIN_BLOCKS] for an automatic horizon and one block for an
    /// explicit one, so that an explicit request is only rounded up.
    pub kmin_blocks: Option<u64>,

    pub blind_window_cycles: u64,
}

impl HorizonPolicy {
    #[must_use]
    pub fn auto() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn cycles(horizon: u64) -> Self {
        Self {
            request: HorizonRequest::Cycles(horizon),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn kmin_blocks(&self) -> u64 {
        match (self.kmin_blocks, self.request) {
            (Some(kmin), _) => kmin,
            (None, HorizonRequest::Auto) => DEFAULT_KMIN_BLOCKS,
            (None, HorizonRequest::Cycles(_)) => 1,
        }
    }

    pub fn validate(&self) -> CheckResult {
        if self.request == HorizonRequest::Cycles(0) {
            return validation_error!("horizon must be > 0 (got 0)");
        }
        if self.kmin_blocks == Some(0) {
            return validation_error!("kmin_blocks must be >= 1 (got 0)");
        }
        Ok(())
    }
}

/// The joint period of the write and read patterns.
#[must_use]
pub fn overall_period(write_period: u64, read_period: u64) -> u64 {
    lcm(write_period, read_period)
}

#[must_use]
pub fn ceil_to_multiple(value: u64, multiple: u64) -> u64 {
    if multiple == 0 {
        return value;
    }
    value.div_ceil(multiple) * multiple
}

/// Resolve the horizon for a pattern with the given overall period.
///
/// `horizon = ceil_to_multiple(max(explicit, kmin * period, 4 * blind),
/// period)`
pub fn resolve_horizon(policy: &HorizonPolicy, overall_period: u64) -> SizingOutcome<u64> {
    policy.validate()?;
    if overall_period == 0 {
        return validation_error!("overall period must be > 0 (got 0)");
    }

    let explicit = match policy.request {
        HorizonRequest::Auto => 0,
        HorizonRequest::Cycles(horizon) => horizon,
    };
    let base = explicit
        .max(policy.kmin_blocks() * overall_period)
        .max(BLIND_WINDOW_REPEATS * policy.blind_window_cycles);
    Ok(ceil_to_multiple(base, overall_period))
}

/// Check whether the horizon can hold a full write burst followed by a full
/// drain. Returns a description of the problem if it cannot.
#[must_use]
pub fn sufficiency_warning(
    horizon: u64,
    sum_w_max: u64,
    w_max: u64,
    sum_r_max: u64,
    r_max: u64,
) -> Option<String> {
    let write_cycles = if w_max == 0 { 0 } else { sum_w_max.div_ceil(w_max) };
    let read_cycles = if r_max == 0 { 0 } else { sum_r_max.div_ceil(r_max) };
    let needed = write_cycles + read_cycles;
    if horizon < needed {
        Some(format!(
            "horizon={horizon} may be too short to expose the true peak \
             (sum_w_max/w_max + sum_r_max/r_max = {needed})"
        ))
    } else {
        None
    }
}
