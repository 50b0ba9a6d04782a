// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Traffic descriptions and their resolution into masks and bounds.

use log::info;

use crate::compiler::compile_layered;
use crate::horizon::{HorizonPolicy, sufficiency_warning};
use crate::layers::TrafficProfile;
use crate::mask::ValidMask;
use crate::types::{CheckResult, Side, SizingOutcome};
use crate::validation_error;

/// Unstructured traffic: every cycle is valid on both sides and the totals
/// are bounded explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlatTraffic {
    pub horizon: u64,
    pub w_max: u64,
    pub r_max: u64,
    pub sum_w_min: u64,
    pub sum_w_max: u64,
    pub sum_r_min: u64,
    pub sum_r_max: u64,
}

impl FlatTraffic {
    pub fn validate(&self) -> CheckResult {
        if self.horizon == 0 {
            return validation_error!("horizon must be > 0 (got 0)");
        }
        if self.sum_w_min > self.sum_w_max {
            return validation_error!(
                "sum_w_min={} must be <= sum_w_max={}",
                self.sum_w_min,
                self.sum_w_max
            );
        }
        if self.sum_r_min > self.sum_r_max {
            return validation_error!(
                "sum_r_min={} must be <= sum_r_max={}",
                self.sum_r_min,
                self.sum_r_max
            );
        }
        if self.sum_w_max > self.horizon * self.w_max {
            return validation_error!(
                "sum_w_max={} must be <= horizon * w_max = {}",
                self.sum_w_max,
                self.horizon * self.w_max
            );
        }
        if self.sum_r_max > self.horizon * self.r_max {
            return validation_error!(
                "sum_r_max={} must be <= horizon * r_max = {}",
                self.sum_r_max,
                self.horizon * self.r_max
            );
        }
        Ok(())
    }
}

/// Structured traffic described by a profile on each side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayeredTraffic {
    pub write: TrafficProfile,
    pub read: TrafficProfile,
    pub horizon: HorizonPolicy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Traffic {
    Flat(FlatTraffic),
    Layered(LayeredTraffic),
}

impl Traffic {
    pub fn validate(&self) -> CheckResult {
        match self {
            Traffic::Flat(flat) => flat.validate(),
            Traffic::Layered(layered) => {
                layered.write.validate(Side::Write)?;
                layered.read.validate(Side::Read)?;
                layered.horizon.validate()
            }
        }
    }

    #[must_use]
    pub fn is_layered(&self) -> bool {
        matches!(self, Traffic::Layered(_))
    }

    /// Per-cycle write cap, known without compiling any masks.
    #[must_use]
    pub fn w_max(&self) -> u64 {
        match self {
            Traffic::Flat(flat) => flat.w_max,
            Traffic::Layered(layered) => layered.write.items_per_cycle(),
        }
    }

    #[must_use]
    pub fn r_max(&self) -> u64 {
        match self {
            Traffic::Flat(flat) => flat.r_max,
            Traffic::Layered(layered) => layered.read.items_per_cycle(),
        }
    }

    /// Resolve the horizon, build both masks and derive the total bounds.
    pub fn resolve(&self, wr_latency: u64) -> SizingOutcome<ResolvedTraffic> {
        self.validate()?;
        let resolved = match self {
            Traffic::Flat(flat) => {
                let horizon = flat.horizon;
                ResolvedTraffic {
                    horizon,
                    write_period: horizon,
                    read_period: horizon,
                    overall_period: horizon,
                    w_max: flat.w_max,
                    r_max: flat.r_max,
                    sum_w_min: flat.sum_w_min,
                    sum_w_max: flat.sum_w_max,
                    sum_r_min: flat.sum_r_min,
                    sum_r_max: flat.sum_r_max,
                    write_mask: ValidMask::all_valid(horizon as usize),
                    read_mask: ValidMask::all_valid(horizon as usize),
                    layered: false,
                }
            }
            Traffic::Layered(layered) => {
                let compiled =
                    compile_layered(&layered.write, &layered.read, &layered.horizon, wr_latency)?;
                let w_max = layered.write.items_per_cycle();
                let r_max = layered.read.items_per_cycle();
                let sum_w = compiled.write_mask.count_valid() * w_max;
                let sum_r = compiled.read_mask.count_valid() * r_max;
                ResolvedTraffic {
                    horizon: compiled.horizon,
                    write_period: compiled.write_period,
                    read_period: compiled.read_period,
                    overall_period: compiled.overall_period,
                    w_max,
                    r_max,
                    sum_w_min: sum_w,
                    sum_w_max: sum_w,
                    sum_r_min: sum_r,
                    sum_r_max: sum_r,
                    write_mask: compiled.write_mask,
                    read_mask: compiled.read_mask,
                    layered: true,
                }
            }
        };
        info!(
            "Traffic: horizon={}, overall_period={}, w_max={}, r_max={}, \
             sum_w=[{}, {}], sum_r=[{}, {}]",
            resolved.horizon,
            resolved.overall_period,
            resolved.w_max,
            resolved.r_max,
            resolved.sum_w_min,
            resolved.sum_w_max,
            resolved.sum_r_min,
            resolved.sum_r_max
        );
        Ok(resolved)
    }

    /// The horizon this traffic resolves to.
    pub fn resolved_horizon(&self, wr_latency: u64) -> SizingOutcome<u64> {
        Ok(self.resolve(wr_latency)?.horizon)
    }
}

/// Traffic after horizon resolution and mask compilation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedTraffic {
    pub horizon: u64,
    pub write_period: u64,
    pub read_period: u64,
    pub overall_period: u64,
    pub w_max: u64,
    pub r_max: u64,
    pub sum_w_min: u64,
    pub sum_w_max: u64,
    pub sum_r_min: u64,
    pub sum_r_max: u64,
    pub write_mask: ValidMask,
    pub read_mask: ValidMask,
    pub layered: bool,
}

impl ResolvedTraffic {
    #[must_use]
    pub fn cycles(&self) -> usize {
        self.horizon as usize
    }

    #[must_use]
    pub fn write_caps(&self) -> Vec<u64> {
        self.write_mask.capacities(self.w_max)
    }

    #[must_use]
    pub fn read_caps(&self) -> Vec<u64> {
        self.read_mask.capacities(self.r_max)
    }

    #[must_use]
    pub fn sufficiency_warning(&self) -> Option<String> {
        sufficiency_warning(
            self.horizon,
            self.sum_w_max,
            self.w_max,
            self.sum_r_max,
            self.r_max,
        )
    }
}
