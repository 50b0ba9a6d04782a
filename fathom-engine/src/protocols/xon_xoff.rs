// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Two-threshold hysteresis flow control.
//!
//! The receiver raises pause once occupancy reaches `xoff` and drops it once
//! occupancy falls to `xon` or below. The writer sees pause
//! `react_latency` cycles late and stays throttled for `resume_latency`
//! cycles after pause drops. While throttled it may issue at most
//! `w_throttle_max` items per cycle (zero is a hard stop).

use log::{debug, info, warn};
use serde::Deserialize;

use crate::finalize::{Reservations, finalize};
use crate::flow_control::{FlowProblem, FlowRun, Requirements, WriteGate, worst_case_run};
use crate::params::ProtocolKind;
use crate::protocols::SizingContext;
use crate::result::{ProtocolOutputs, SizingResult, SolverPath};
use crate::types::{CheckResult, SizingOutcome};
use crate::{infeasible_error, validation_error};

const RATIO_EPSILON: f64 = 1e-9;

/// Requested fraction of the full write bandwidth.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ThroughputTarget {
    /// Require the duty-cycle bound of each threshold pair, see
    /// [throughput_upper_bound].
    #[default]
    Auto,

    /// Clamped per threshold pair to [throughput_upper_bound].
    Fraction(f64),
}

/// One end of the hysteresis range.
///
/// An integer is an absolute band `xoff - xon`, a float is a ratio
/// `xoff / xon`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum HysteresisBound {
    Band(u64),
    Ratio(f64),
}

impl HysteresisBound {
    /// Smallest legal band for `xon`. Never below one.
    #[must_use]
    pub fn min_band(&self, xon: u64) -> u64 {
        match self {
            HysteresisBound::Band(band) => (*band).max(1),
            HysteresisBound::Ratio(ratio) => {
                let xoff = (ratio * xon as f64 - RATIO_EPSILON).ceil() as u64;
                xoff.saturating_sub(xon).max(1)
            }
        }
    }

    /// Largest legal band for `xon`. A zero `xon` is treated as one.
    #[must_use]
    pub fn max_band(&self, xon: u64) -> u64 {
        match self {
            HysteresisBound::Band(band) => *band,
            HysteresisBound::Ratio(ratio) => {
                let xoff = (ratio * xon.max(1) as f64 + RATIO_EPSILON).floor() as u64;
                xoff.saturating_sub(xon)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hysteresis {
    pub min: HysteresisBound,
    pub max: HysteresisBound,
}

impl Default for Hysteresis {
    fn default() -> Self {
        Self {
            min: HysteresisBound::Ratio(1.0),
            max: HysteresisBound::Ratio(1.5),
        }
    }
}

impl Hysteresis {
    pub fn validate(&self) -> CheckResult {
        for bound in [self.min, self.max] {
            if let HysteresisBound::Ratio(ratio) = bound {
                if !(ratio >= 1.0) {
                    return validation_error!(
                        "hysteresis ratio bounds are xoff/xon and must be >= 1.0 (got {ratio})"
                    );
                }
            }
        }
        match (self.min, self.max) {
            (HysteresisBound::Ratio(min), HysteresisBound::Ratio(max)) if min > max => {
                validation_error!("hysteresis min={min} must be <= max={max}")
            }
            (HysteresisBound::Band(min), HysteresisBound::Band(max)) if min > max => {
                validation_error!("hysteresis min={min} must be <= max={max}")
            }
            _ => Ok(()),
        }
    }

    #[must_use]
    pub fn contains(&self, xon: u64, xoff: u64) -> bool {
        let band = xoff.saturating_sub(xon);
        band >= self.min.min_band(xon) && band <= self.max.max_band(xon)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ManualThresholds {
    pub xon: u64,
    pub xoff: u64,

    /// When given, a pair that cannot sustain this fraction is infeasible.
    pub throughput_target: Option<f64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AutoThresholds {
    pub throughput_target: ThroughputTarget,

    /// Lower bound for xon. Raised to the reaction-window read volume when
    /// that is larger.
    pub xon_min: Option<u64>,
    pub xoff_range: Option<(u64, u64)>,
    pub hysteresis: Hysteresis,
    pub prefer_small_band: bool,
    pub prefer_low_xoff: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Thresholds {
    Manual(ManualThresholds),
    Auto(AutoThresholds),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct XonXoffParams {
    pub atomic_tail: u64,
    pub react_latency: u64,
    pub resume_latency: u64,
    pub w_throttle_max: u64,
    pub thresholds: Thresholds,
}

impl XonXoffParams {
    #[must_use]
    pub fn auto() -> Self {
        Self {
            atomic_tail: 0,
            react_latency: 0,
            resume_latency: 0,
            w_throttle_max: 0,
            thresholds: Thresholds::Auto(AutoThresholds::default()),
        }
    }

    #[must_use]
    pub fn manual(xon: u64, xoff: u64) -> Self {
        Self {
            thresholds: Thresholds::Manual(ManualThresholds {
                xon,
                xoff,
                throughput_target: None,
            }),
            ..Self::auto()
        }
    }

    pub fn validate(&self, w_max: u64) -> CheckResult {
        let pause_window = self.react_latency.saturating_add(self.resume_latency);
        if pause_window > 63 {
            return validation_error!(
                "react_latency + resume_latency must be <= 63 (got {pause_window})"
            );
        }
        if self.w_throttle_max > w_max {
            return validation_error!(
                "w_throttle_max={} must be <= w_max={w_max}",
                self.w_throttle_max
            );
        }
        match &self.thresholds {
            Thresholds::Manual(manual) => {
                if manual.xon >= manual.xoff {
                    return validation_error!(
                        "xon={} must be < xoff={}",
                        manual.xon,
                        manual.xoff
                    );
                }
                if let Some(target) = manual.throughput_target {
                    check_fraction(target)?;
                }
            }
            Thresholds::Auto(auto) => {
                auto.hysteresis.validate()?;
                if let Some((lo, hi)) = auto.xoff_range {
                    if lo > hi {
                        return validation_error!("xoff_range [{lo}, {hi}] must have lo <= hi");
                    }
                }
                if let ThroughputTarget::Fraction(target) = auto.throughput_target {
                    check_fraction(target)?;
                }
            }
        }
        Ok(())
    }
}

fn check_fraction(target: f64) -> CheckResult {
    if (0.0..=1.0).contains(&target) {
        Ok(())
    } else {
        validation_error!("throughput_target must be within [0, 1] (got {target})")
    }
}

/// Receiver-side pause state and the writer's delayed view of it.
///
/// Bit `k` of `history` holds the pause state of cycle `t - 1 - k`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HysteresisGate {
    xon: u64,
    xoff: u64,
    react_latency: u32,
    resume_latency: u32,
    w_throttle_max: u64,
    history: u64,
}

impl HysteresisGate {
    #[must_use]
    pub fn new(params: &XonXoffParams, xon: u64, xoff: u64) -> Self {
        Self {
            xon,
            xoff,
            react_latency: params.react_latency as u32,
            resume_latency: params.resume_latency as u32,
            w_throttle_max: params.w_throttle_max,
            history: 0,
        }
    }

    fn paused(&self, occupancy: u64) -> bool {
        occupancy >= self.xoff || (self.history & 1 == 1 && occupancy > self.xon)
    }

    /// The writer sees the pause state from `react_latency` cycles ago and
    /// keeps it for `resume_latency` more cycles.
    fn throttled(&self, t: usize, occupancy: u64) -> bool {
        (0..=self.resume_latency).any(|k| {
            let delay = self.react_latency + k;
            if delay == 0 {
                self.paused(occupancy)
            } else {
                t >= delay as usize && (self.history >> (delay - 1)) & 1 == 1
            }
        })
    }

    fn history_mask(&self) -> u64 {
        let bits = (self.react_latency + self.resume_latency).max(1);
        u64::MAX >> (u64::BITS - bits)
    }
}

impl WriteGate for HysteresisGate {
    const TRACES: &'static [&'static str] = &["in_pause", "throttle_active"];

    fn write_allowance(&self, t: usize, occupancy: u64) -> u64 {
        if self.throttled(t, occupancy) {
            self.w_throttle_max
        } else {
            u64::MAX
        }
    }

    fn step(&self, _t: usize, occupancy: u64, _written: u64, _read: u64) -> Option<Self> {
        let history = ((self.history << 1) | u64::from(self.paused(occupancy))) & self.history_mask();
        Some(Self { history, ..*self })
    }

    fn trace_values(&self, t: usize, occupancy: u64, _written: u64, _read: u64) -> Vec<u64> {
        vec![
            u64::from(self.paused(occupancy)),
            u64::from(self.throttled(t, occupancy)),
        ]
    }
}

/// Duty-cycle bound on the write rate for a band, as a fraction of the
/// cycles in the horizon.
#[must_use]
pub fn throughput_upper_bound(
    write_density: f64,
    read_density: f64,
    band: u64,
    react_latency: u64,
) -> f64 {
    let net = (write_density - read_density).max(0.0);
    if net == 0.0 || read_density == 0.0 {
        return write_density;
    }
    let active = band as f64 / net + react_latency as f64;
    let pause = band as f64 / read_density;
    write_density * active / (active + pause)
}

/// Writes needed to carry `items`, less one item of slack, and never more
/// than one below the write capacity.
fn required_writes(items: f64, write_capacity: u64) -> u64 {
    let raw = (items + RATIO_EPSILON).floor() as u64;
    raw.saturating_sub(1)
        .min(write_capacity.saturating_sub(1))
}

struct Candidate {
    xon: u64,
    xoff: u64,
    depth: u64,
    run: FlowRun,
}

impl Candidate {
    fn rank(&self, auto: &AutoThresholds) -> (u64, u64, u64, u64, usize) {
        let band = if auto.prefer_small_band {
            self.xoff - self.xon
        } else {
            0
        };
        let xoff = if auto.prefer_low_xoff { self.xoff } else { 0 };
        (self.depth, band, xoff, self.run.occ_peak, self.run.t_star)
    }
}

struct Search<'a> {
    ctx: &'a SizingContext,
    params: &'a XonXoffParams,
    problem: FlowProblem<'a>,
}

impl Search<'_> {
    fn evaluate(&self, xon: u64, xoff: u64, min_written: u64) -> SizingOutcome<Option<Candidate>> {
        let requirements = Requirements {
            min_written,
            min_read: self.ctx.traffic.sum_r_min,
        };
        let run = worst_case_run(
            &self.problem,
            HysteresisGate::new(self.params, xon, xoff),
            requirements,
            &self.ctx.deadline,
        )?;
        Ok(run.map(|run| Candidate {
            xon,
            xoff,
            depth: finalize(
                run.occ_peak,
                self.reservations(),
                &self.ctx.margin,
                self.ctx.rounding,
            ),
            run,
        }))
    }

    fn reservations(&self) -> Reservations {
        Reservations {
            atomic_tail: self.params.atomic_tail,
            base_sync_fifo_depth: self.ctx.cdc.base_sync_fifo_depth,
        }
    }

    fn write_capacity(&self) -> u64 {
        let traffic = &self.ctx.traffic;
        traffic
            .sum_w_max
            .min(traffic.w_max * traffic.write_mask.count_valid())
    }

    /// Items carried over the horizon at `fraction` of the full bandwidth.
    fn items_at(&self, fraction: f64) -> f64 {
        let traffic = &self.ctx.traffic;
        fraction * (traffic.horizon * traffic.w_max) as f64
    }

    fn manual(&self, manual: &ManualThresholds) -> SizingOutcome<Candidate> {
        let traffic = &self.ctx.traffic;
        if manual.xoff > traffic.sum_w_max {
            warn!(
                "xoff={} is above sum_w_max={} and will never trigger",
                manual.xoff, traffic.sum_w_max
            );
        }
        let min_written = manual.throughput_target.map_or(0, |target| {
            required_writes(self.items_at(target), self.write_capacity())
        });
        match self.evaluate(manual.xon, manual.xoff, min_written)? {
            Some(candidate) => Ok(candidate),
            None => infeasible_error!(
                "xon={}, xoff={} cannot write {min_written} items and read sum_r_min={} \
                 within the horizon of {} cycles",
                manual.xon,
                manual.xoff,
                traffic.sum_r_min,
                traffic.horizon
            ),
        }
    }

    /// Bounds on the threshold search: `(xon_min, xoff_lo, xoff_hi)`.
    fn bounds(&self, auto: &AutoThresholds) -> SizingOutcome<(u64, u64, u64)> {
        let traffic = &self.ctx.traffic;
        let window = self.ctx.rd_latency
            + self.ctx.wr_latency
            + self.params.resume_latency
            + traffic.write_mask.max_wait_to_next_valid();
        let xon_min_auto = traffic.r_max * traffic.read_mask.max_window_count(window);
        let xon_min = auto.xon_min.unwrap_or(0).max(xon_min_auto);
        if auto.xon_min.is_some_and(|user| user < xon_min) {
            info!("Raised xon_min to {xon_min} to cover {window} cycles of reads");
        }

        let (range_lo, range_hi) = auto.xoff_range.unwrap_or((0, u64::MAX));
        let xoff_lo = range_lo.max(xon_min + auto.hysteresis.min.min_band(xon_min));
        let xoff_hi = range_hi
            .min(xoff_lo.saturating_add(auto.hysteresis.max.max_band(xon_min.max(1))))
            .min(traffic.sum_w_max);
        if xoff_lo > xoff_hi {
            return infeasible_error!(
                "No feasible xoff after bounds tightening: xoff_lo={xoff_lo} > xoff_hi={xoff_hi}"
            );
        }
        Ok((xon_min, xoff_lo, xoff_hi))
    }

    fn auto(&self, auto: &AutoThresholds) -> SizingOutcome<Candidate> {
        let traffic = &self.ctx.traffic;
        let (xon_min, xoff_lo, xoff_hi) = self.bounds(auto)?;
        info!("Threshold search: xon >= {xon_min}, xoff in [{xoff_lo}, {xoff_hi}]");

        let write_density = traffic.write_mask.density();
        let read_density = traffic.read_mask.density();
        let write_capacity = self.write_capacity();

        let mut best: Option<Candidate> = None;
        let mut tried = 0;
        for xoff in xoff_lo..=xoff_hi {
            for xon in (xon_min..xoff).rev() {
                if !auto.hysteresis.contains(xon, xoff) {
                    continue;
                }
                tried += 1;
                let bound = throughput_upper_bound(
                    write_density,
                    read_density,
                    xoff - xon,
                    self.params.react_latency,
                );
                let items = match auto.throughput_target {
                    // The duty-cycle bound counts write cycles, not items
                    ThroughputTarget::Auto => bound * traffic.horizon as f64,
                    ThroughputTarget::Fraction(fraction) => {
                        self.items_at(fraction.clamp(0.0, bound))
                    }
                };
                let min_written = required_writes(items, write_capacity);

                let Some(candidate) = self.evaluate(xon, xoff, min_written)? else {
                    debug!("xon={xon}, xoff={xoff}: cannot write {min_written} items");
                    continue;
                };
                debug!(
                    "xon={xon}, xoff={xoff}: depth {} (peak {} at t={})",
                    candidate.depth, candidate.run.occ_peak, candidate.run.t_star
                );
                if best
                    .as_ref()
                    .is_none_or(|best| candidate.rank(auto) < best.rank(auto))
                {
                    best = Some(candidate);
                }
            }
        }

        match best {
            Some(best) => {
                info!("Threshold search tried {tried} pairs");
                Ok(best)
            }
            None => infeasible_error!(
                "No (xon, xoff) combination met the throughput and read requirements \
                 ({tried} pairs tried)"
            ),
        }
    }
}

pub(crate) fn size(ctx: &SizingContext, params: &XonXoffParams) -> SizingOutcome<SizingResult> {
    let traffic = &ctx.traffic;
    let write_caps = traffic.write_caps();
    let read_caps = traffic.read_caps();
    let search = Search {
        ctx,
        params,
        problem: FlowProblem {
            write_caps: &write_caps,
            read_caps: &read_caps,
            wr_latency: ctx.wr_latency,
            rd_latency: ctx.rd_latency,
            sum_w_max: traffic.sum_w_max,
            sum_r_max: traffic.sum_r_max,
        },
    };

    let (chosen, explicit_target) = match &params.thresholds {
        Thresholds::Manual(manual) => (search.manual(manual)?, manual.throughput_target),
        Thresholds::Auto(auto) => {
            let target = match auto.throughput_target {
                ThroughputTarget::Auto => None,
                ThroughputTarget::Fraction(fraction) => Some(fraction),
            };
            (search.auto(auto)?, target)
        }
    };

    let run = chosen.run;
    run.witness
        .check(run.occ_peak, run.t_star, traffic.sum_w_max)?;

    let base = ctx.cdc.base_sync_fifo_depth;
    let depth = chosen.depth;
    let xon = (chosen.xon + base).min(depth);
    let xoff = (chosen.xoff + base).min(depth);
    let throughput =
        (run.written as f64 / (traffic.horizon * traffic.w_max.max(1)) as f64).clamp(0.0, 1.0);

    let mut basic_checks_pass = true;
    let mut msg = String::new();
    if let Some(target) = explicit_target {
        if throughput + RATIO_EPSILON < target {
            if matches!(params.thresholds, Thresholds::Manual(_)) {
                return infeasible_error!(
                    "xon={}, xoff={} reach throughput {throughput:.4} below the target {target:.4}",
                    chosen.xon,
                    chosen.xoff
                );
            }
            basic_checks_pass = false;
            msg = format!("Throughput target not met: achieved {throughput:.4} < target {target:.4}");
            warn!("{msg}");
        }
    }

    Ok(SizingResult {
        protocol: ProtocolKind::XonXoff,
        depth,
        occ_peak: run.occ_peak,
        t_star: run.t_star,
        horizon: traffic.horizon,
        solver_path: SolverPath::FlowControlSearch,
        basic_checks_pass,
        msg,
        outputs: ProtocolOutputs::XonXoff {
            xon,
            xoff,
            throughput,
        },
        witness: run.witness,
    })
}
