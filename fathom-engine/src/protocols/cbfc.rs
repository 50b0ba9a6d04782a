// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Credit-based flow control.
//!
//! The writer spends one credit per item and may not write without credit.
//! Every item read returns `cred_gran` credits `cred_ret_latency` cycles
//! later. The pool starts at `cred_init` and never holds more than
//! `cred_max` credits. Credits still on their way back are not counted.

use log::{debug, info, warn};

use crate::finalize::{Reservations, apply_margin, finalize, round_value};
use crate::flow_control::{FlowProblem, Requirements, WriteGate, any_run_meets, worst_case_run};
use crate::params::{Margin, ProtocolKind, Rounding};
use crate::protocols::SizingContext;
use crate::result::{ProtocolOutputs, SizingResult, SolverPath};
use crate::types::{CheckResult, SizingOutcome};
use crate::{infeasible_error, validation_error};

const RATE_EPSILON: f64 = 1e-9;

/// How the credit counts are chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreditStrategy {
    /// Use the given counts as they are. Counts below the latency bounds are
    /// infeasible.
    Manual { cred_init: u64, cred_max: u64 },

    /// Derive the counts. A value given here pins that count and only the
    /// other one is derived.
    Auto {
        cred_init: Option<u64>,
        cred_max: Option<u64>,

        /// Search for the smallest counts that meet the totals. Otherwise use
        /// a closed-form estimate.
        optimize: bool,
    },
}

impl Default for CreditStrategy {
    fn default() -> Self {
        CreditStrategy::Auto {
            cred_init: None,
            cred_max: None,
            optimize: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CbfcParams {
    pub credits: CreditStrategy,
    pub cred_gran: u64,
    pub cred_ret_latency: u64,
    pub cred_margin: Margin,
    pub cred_rounding: Rounding,
}

impl Default for CbfcParams {
    fn default() -> Self {
        Self {
            credits: CreditStrategy::default(),
            cred_gran: 1,
            cred_ret_latency: 0,
            cred_margin: Margin::none(),
            cred_rounding: Rounding::None,
        }
    }
}

impl CbfcParams {
    #[must_use]
    pub fn manual(cred_init: u64, cred_max: u64) -> Self {
        Self {
            credits: CreditStrategy::Manual {
                cred_init,
                cred_max,
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> CheckResult {
        if self.cred_gran == 0 {
            return validation_error!("cred_gran must be >= 1 (got 0)");
        }
        match self.credits {
            CreditStrategy::Manual {
                cred_init,
                cred_max,
            } => {
                if cred_max < cred_init {
                    return validation_error!(
                        "cred_max={cred_max} must be >= cred_init={cred_init}"
                    );
                }
            }
            CreditStrategy::Auto {
                cred_init: Some(cred_init),
                cred_max: Some(cred_max),
                ..
            } if cred_max < cred_init => {
                return validation_error!("cred_max={cred_max} must be >= cred_init={cred_init}");
            }
            CreditStrategy::Auto { .. } => {}
        }
        Ok(())
    }
}

/// The credit pool as seen by the writer.
///
/// `pending[k]` credits return at the end of the cycle `k` cycles from now.
/// Returns that would land beyond the horizon never arrive.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CreditGate {
    credits: u64,
    cred_max: u64,
    cred_gran: u64,
    pending: Vec<u64>,
}

impl CreditGate {
    #[must_use]
    pub fn new(params: &CbfcParams, horizon: usize, cred_init: u64, cred_max: u64) -> Self {
        let ret_latency = usize::try_from(params.cred_ret_latency).unwrap_or(usize::MAX);
        Self {
            credits: cred_init,
            cred_max,
            cred_gran: params.cred_gran,
            pending: vec![0; ret_latency.min(horizon)],
        }
    }

    /// Credits returning at the end of this cycle when `read` items are
    /// popped in it.
    fn returned(&self, read: u64) -> u64 {
        self.pending
            .first()
            .copied()
            .unwrap_or(self.cred_gran * read)
    }
}

impl WriteGate for CreditGate {
    const TRACES: &'static [&'static str] = &["cred_seq", "ret_seq"];

    fn write_allowance(&self, _t: usize, _occupancy: u64) -> u64 {
        self.credits
    }

    fn step(&self, _t: usize, _occupancy: u64, written: u64, read: u64) -> Option<Self> {
        let credits = self.credits.checked_sub(written)? + self.returned(read);
        if credits > self.cred_max {
            return None;
        }
        let mut pending = self.pending.clone();
        if !pending.is_empty() {
            pending.remove(0);
            pending.push(self.cred_gran * read);
        }
        Some(Self {
            credits,
            pending,
            ..*self
        })
    }

    fn trace_values(&self, _t: usize, _occupancy: u64, _written: u64, read: u64) -> Vec<u64> {
        vec![self.credits, self.returned(read)]
    }
}

/// Lower bounds on the credit counts implied by the latencies and profiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CreditBounds {
    pub cred_init: u64,
    pub cred_max: u64,
}

/// Compare cumulative write capacity against the credits the read side can
/// return, both counted up to and including each cycle.
#[must_use]
pub fn credit_bounds(
    write_caps: &[u64],
    read_caps: &[u64],
    rd_latency: u64,
    cred_ret_latency: u64,
    cred_gran: u64,
) -> CreditBounds {
    let delay = (rd_latency + cred_ret_latency) as usize;
    let mut written: i128 = 0;
    let mut returned: i128 = 0;
    let mut max_deficit: i128 = 0;
    let mut max_surplus: i128 = 0;
    for (t, cap) in write_caps.iter().enumerate() {
        written += i128::from(*cap);
        if t >= delay {
            returned += i128::from(cred_gran) * i128::from(read_caps[t - delay]);
        }
        max_deficit = max_deficit.max(written - returned);
        max_surplus = max_surplus.max(returned - written);
    }
    let max_deficit = u64::try_from(max_deficit).unwrap_or(u64::MAX);
    let max_surplus = u64::try_from(max_surplus).unwrap_or(u64::MAX);
    CreditBounds {
        cred_init: max_deficit,
        cred_max: max_deficit.saturating_add(max_surplus),
    }
}

struct CreditSearch<'a> {
    ctx: &'a SizingContext,
    params: &'a CbfcParams,
    problem: FlowProblem<'a>,
    requirements: Requirements,
}

impl CreditSearch<'_> {
    fn gate(&self, cred_init: u64, cred_max: u64) -> CreditGate {
        CreditGate::new(self.params, self.ctx.traffic.cycles(), cred_init, cred_max)
    }

    fn feasible(&self, cred_init: u64, cred_max: u64) -> SizingOutcome<bool> {
        self.ctx.deadline.check("credit search")?;
        any_run_meets(
            &self.problem,
            self.gate(cred_init, cred_max),
            self.requirements,
            &self.ctx.deadline,
        )
    }

    /// Smallest value in `[lo, hi]` passing `test`, if any does.
    fn bisect<F>(lo: u64, hi: u64, test: F) -> SizingOutcome<Option<u64>>
    where
        F: Fn(u64) -> SizingOutcome<bool>,
    {
        if lo > hi || !test(hi)? {
            return Ok(None);
        }
        let (mut lo, mut hi) = (lo, hi);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if test(mid)? {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        Ok(Some(lo))
    }

    /// Minimize `cred_init` first, then `cred_max`.
    fn minimize(&self, bounds: &CreditBounds) -> SizingOutcome<(u64, u64)> {
        let traffic = &self.ctx.traffic;
        let upper = traffic.sum_w_max.max(bounds.cred_max);

        let Some(cred_init) = Self::bisect(bounds.cred_init, upper, |ci| {
            self.feasible(ci, bounds.cred_max.max(ci))
        })?
        else {
            let fallback = (
                self.params.cred_gran.max(bounds.cred_init),
                traffic.sum_w_max.max(bounds.cred_max),
            );
            warn!(
                "Credit search found no feasible counts, falling back to cred_init={}, cred_max={}",
                fallback.0, fallback.1
            );
            return Ok(fallback);
        };

        let cred_max = Self::bisect(bounds.cred_max.max(cred_init), upper, |cm| {
            self.feasible(cred_init, cm)
        })?
        .unwrap_or(upper);
        debug!("Credit search: cred_init={cred_init}, cred_max={cred_max}");
        Ok((cred_init, cred_max))
    }

    /// Closed-form estimate covering the credit loop and the backlog, never
    /// below the latency bounds.
    fn quick_cap(&self, bounds: &CreditBounds) -> (u64, u64) {
        let traffic = &self.ctx.traffic;
        let gran = self.params.cred_gran;
        let loop_cycles = self.ctx.rd_latency + self.params.cred_ret_latency;
        let cushion = traffic.read_mask.max_wait_to_next_valid();
        let phase = traffic.r_max * loop_cycles + cushion;
        let backlog = (traffic.sum_w_min + gran * traffic.r_max * loop_cycles)
            .saturating_sub(gran * traffic.sum_r_min);
        let base = phase
            .max(backlog)
            .clamp(gran, traffic.sum_w_max.max(gran))
            .next_multiple_of(gran);
        (base.max(bounds.cred_init), base.max(bounds.cred_max))
    }

    /// Reject counts that cannot sustain the requested read rate, either in
    /// the long run or while the pool warms up.
    fn check_rate(&self, cred_init: u64) -> CheckResult {
        let traffic = &self.ctx.traffic;
        let horizon = traffic.horizon as f64;
        let required = traffic.sum_r_min as f64 / horizon;
        let write_rate = traffic.sum_w_max as f64 / horizon;
        let asymptotic = write_rate.min(traffic.sum_r_max as f64 / horizon);

        let latency = self.ctx.rd_latency + self.params.cred_ret_latency;
        let window = traffic.horizon.min(32.max(8 * (latency + 1)));
        let startup = (1..=window)
            .map(|t| {
                let warm = t.saturating_sub(latency) as f64;
                (cred_init as f64 + self.params.cred_gran as f64 * required * warm) / t as f64
            })
            .fold(f64::INFINITY, f64::min);

        let achievable = asymptotic.min(startup).min(write_rate);
        debug!(
            "Credit rate check: required {required:.4}, asymptotic {asymptotic:.4}, \
             start-up {startup:.4}"
        );
        if achievable + RATE_EPSILON < required {
            return infeasible_error!(
                "CBFC cannot guarantee the requested read throughput of {required:.4} items/cycle \
                 (achievable {achievable:.4}). Increase credits (cred_init and/or cred_max), \
                 reduce latencies, or relax profiles."
            );
        }
        Ok(())
    }
}

/// Extra credits for auto-derived counts when read gaps make returns bursty.
fn adaptive_headroom(max_read_gap: u64, sum_w_max: u64) -> u64 {
    (2 * max_read_gap.max(1)).min((sum_w_max / 16).max(1))
}

fn adjust(value: u64, margin: &Margin, rounding: Rounding) -> u64 {
    round_value(apply_margin(value, margin), rounding)
}

pub(crate) fn size(ctx: &SizingContext, params: &CbfcParams) -> SizingOutcome<SizingResult> {
    let traffic = &ctx.traffic;
    let write_caps = traffic.write_caps();
    let read_caps = traffic.read_caps();
    let search = CreditSearch {
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
        requirements: Requirements {
            min_written: traffic.sum_w_min,
            min_read: traffic.sum_r_min,
        },
    };

    let bounds = credit_bounds(
        &write_caps,
        &read_caps,
        ctx.rd_latency,
        params.cred_ret_latency,
        params.cred_gran,
    );
    info!(
        "Credit bounds: cred_init >= {}, cred_max >= {}",
        bounds.cred_init, bounds.cred_max
    );

    let (cred_init, cred_max) = match params.credits {
        CreditStrategy::Manual {
            cred_init,
            cred_max,
        } => {
            if cred_init < bounds.cred_init || cred_max < bounds.cred_max {
                return infeasible_error!(
                    "CBFC credits too small for the latencies / layered profiles. Required: \
                     cred_init >= {}, cred_max >= {} (got cred_init={cred_init}, \
                     cred_max={cred_max})",
                    bounds.cred_init,
                    bounds.cred_max
                );
            }
            let cred_init = adjust(cred_init, &params.cred_margin, params.cred_rounding);
            let cred_max = adjust(cred_max, &params.cred_margin, params.cred_rounding);
            (cred_init, cred_max.max(cred_init))
        }
        CreditStrategy::Auto {
            cred_init: pinned_init,
            cred_max: pinned_max,
            optimize,
        } => {
            let (auto_init, auto_max) = if optimize {
                search.minimize(&bounds)?
            } else {
                search.quick_cap(&bounds)
            };
            let cred_init = pinned_init.unwrap_or(auto_init);
            let cred_max = pinned_max.map_or(auto_max, |max| max.max(cred_init));
            let mut cred_init = adjust(cred_init, &params.cred_margin, params.cred_rounding);
            let mut cred_max =
                adjust(cred_max, &params.cred_margin, params.cred_rounding).max(cred_init);

            let headroom = adaptive_headroom(
                traffic.read_mask.max_wait_to_next_valid(),
                traffic.sum_w_max,
            );
            if pinned_init.is_none() {
                cred_init += headroom;
            }
            if pinned_max.is_none() {
                cred_max += headroom;
            }
            debug!("Credit headroom {headroom}");
            (cred_init, cred_max.max(cred_init))
        }
    };
    info!("Credits: cred_init={cred_init}, cred_max={cred_max}");

    search.check_rate(cred_init)?;

    let Some(run) = worst_case_run(
        &search.problem,
        search.gate(cred_init, cred_max),
        search.requirements,
        &ctx.deadline,
    )?
    else {
        return infeasible_error!(
            "cred_init={cred_init}, cred_max={cred_max} cannot write sum_w_min={} and read \
             sum_r_min={} within the horizon of {} cycles",
            traffic.sum_w_min,
            traffic.sum_r_min,
            traffic.horizon
        );
    };
    run.witness
        .check(run.occ_peak, run.t_star, traffic.sum_w_max)?;

    let base = ctx.cdc.base_sync_fifo_depth;
    let depth = finalize(
        run.occ_peak,
        Reservations {
            atomic_tail: 0,
            base_sync_fifo_depth: base,
        },
        &ctx.margin,
        ctx.rounding,
    );
    let cred_init = (cred_init + base).min(depth);
    let cred_max = (cred_max + base).min(depth);

    let full_rate = (traffic.horizon * traffic.w_max.max(1)) as f64;
    let throughput = run.written as f64 / full_rate;
    let required = traffic.sum_r_min as f64 / full_rate;

    let mut basic_checks_pass = true;
    let mut msg = String::new();
    if throughput + RATE_EPSILON < required {
        basic_checks_pass = false;
        msg = format!(
            "CBFC achieved throughput below target: {throughput:.4} < {required:.4}. \
             Increase credits or relax profiles."
        );
        warn!("{msg}");
    } else if run.occ_peak <= 1 {
        msg = format!(
            "In hardware, implement at least a minimal skid/bypass FIFO (1-2 entries) plus a \
             {cred_max} credit counter or pool."
        );
        info!("{msg}");
    }

    Ok(SizingResult {
        protocol: ProtocolKind::Cbfc,
        depth,
        occ_peak: run.occ_peak,
        t_star: run.t_star,
        horizon: traffic.horizon,
        solver_path: SolverPath::FlowControlSearch,
        basic_checks_pass,
        msg,
        outputs: ProtocolOutputs::Cbfc {
            cred_init,
            cred_max,
            throughput,
        },
        witness: run.witness,
    })
}

