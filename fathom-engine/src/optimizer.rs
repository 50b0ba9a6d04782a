// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Exact peak-occupancy maximization over a pair of capacity profiles.
//!
//! The model: per-cycle writes `w[t] <= write_caps[t]` and reads `r[t] <=
//! read_caps[t]` take effect `wr_latency` and `rd_latency` cycles later.
//! Occupancy follows `occ[e + 1] = occ[e] + W[e] - R[e]` over the effective
//! sequences, must never go negative, and the totals are bounded by
//! `sum_w_*` and `sum_r_*`. Transfers whose effect lands beyond the horizon
//! still count towards the totals.
//!
//! For a fixed peak index `T` the best schedule writes as much as possible
//! as early as possible, and reads the least it can before `T` while still
//! meeting `sum_r_min` with reads after `T`. Reads after `T` grow by at most
//! one for each extra item left at `T`, so the least number of reads before
//! `T` can be found by bisection. Sweeping `T` over the horizon gives the
//! exact peak.

use log::{debug, trace};

use crate::budget::Deadline;
use crate::infeasible_error;
use crate::types::SizingOutcome;
use crate::witness::Witness;

/// Inputs to [maximize_peak].
#[derive(Clone, Copy, Debug)]
pub struct PeakProblem<'a> {
    pub write_caps: &'a [u64],
    pub read_caps: &'a [u64],
    pub wr_latency: u64,
    pub rd_latency: u64,
    pub sum_w_min: u64,
    pub sum_w_max: u64,
    pub sum_r_min: u64,
    pub sum_r_max: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeakSolution {
    pub occ_peak: u64,

    /// First occupancy index at which the peak is reached.
    pub t_star: usize,
    pub witness: Witness,
}

/// Capacities indexed by the cycle their effect lands in, plus the capacity
/// that lands beyond the horizon.
pub(crate) fn effective_caps(raw: &[u64], latency: u64) -> (Vec<u64>, u64) {
    let horizon = raw.len();
    let latency = latency as usize;
    let mut effective = vec![0; horizon];
    let mut beyond = 0;
    for (t, cap) in raw.iter().enumerate() {
        match t.checked_add(latency) {
            Some(e) if e < horizon => effective[e] = *cap,
            _ => beyond += cap,
        }
    }
    (effective, beyond)
}

/// Place `before` items as early as possible in `[0, split)` and `after`
/// items as early as possible in `[split, horizon)`.
fn asap_writes(caps: &[u64], split: usize, before: u64, after: u64) -> Vec<u64> {
    let mut writes = vec![0; caps.len()];
    let mut budget = before;
    for (e, cap) in caps.iter().enumerate() {
        if e == split {
            budget = after;
        }
        let take = (*cap).min(budget);
        writes[e] = take;
        budget -= take;
    }
    writes
}

/// Read as much as possible, as early as possible, over `range` starting
/// from `occ`, up to `limit` items in total.
fn greedy_reads(
    writes: &[u64],
    read_caps: &[u64],
    range: std::ops::Range<usize>,
    mut occ: u64,
    limit: u64,
) -> (Vec<u64>, u64) {
    let mut reads = Vec::with_capacity(range.len());
    let mut total = 0;
    for e in range {
        occ += writes[e];
        let take = read_caps[e].min(occ).min(limit - total);
        occ -= take;
        total += take;
        reads.push(take);
    }
    (reads, total)
}

struct PeakCandidate {
    peak: u64,
    split: usize,
    reads_before: u64,
    writes_before: u64,
}

pub fn maximize_peak(problem: &PeakProblem, deadline: &Deadline) -> SizingOutcome<PeakSolution> {
    let horizon = problem.write_caps.len();
    let (write_eff, write_beyond) = effective_caps(problem.write_caps, problem.wr_latency);
    let (read_eff, read_beyond) = effective_caps(problem.read_caps, problem.rd_latency);

    let write_capacity = write_eff.iter().sum::<u64>() + write_beyond;
    let total_writes = problem.sum_w_max.min(write_capacity);
    if total_writes < problem.sum_w_min {
        return infeasible_error!(
            "sum_w_min={} exceeds the {write_capacity} items the write profile can carry",
            problem.sum_w_min
        );
    }
    let read_capacity = read_eff.iter().sum::<u64>() + read_beyond;
    if read_capacity < problem.sum_r_min {
        return infeasible_error!(
            "sum_r_min={} exceeds the {read_capacity} items the read profile can carry",
            problem.sum_r_min
        );
    }

    let mut prefix = Vec::with_capacity(horizon + 1);
    prefix.push(0u64);
    for cap in &write_eff {
        prefix.push(prefix[prefix.len() - 1] + cap);
    }

    // Reads after `split` starting from `occ`, including those landing
    // beyond the horizon.
    let reads_after = |writes: &[u64], split: usize, occ: u64| -> u64 {
        greedy_reads(writes, &read_eff, split..horizon, occ, u64::MAX).1 + read_beyond
    };

    let mut best: Option<PeakCandidate> = None;
    for split in 1..=horizon {
        deadline.check("occupancy optimizer")?;

        let writes_before = problem.sum_w_max.min(prefix[split]);
        if let Some(best) = &best {
            if writes_before <= best.peak {
                continue;
            }
        }
        let writes = asap_writes(&write_eff, split, writes_before, total_writes - writes_before);
        let (_, max_reads_before) = greedy_reads(&writes, &read_eff, 0..split, 0, u64::MAX);

        let meets_reads = |reads_before: u64| -> bool {
            reads_before + reads_after(&writes, split, writes_before - reads_before)
                >= problem.sum_r_min
        };
        if !meets_reads(max_reads_before) {
            trace!("split {split}: read lower bound unreachable");
            continue;
        }

        let (mut lo, mut hi) = (0, max_reads_before);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if meets_reads(mid) {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }

        let peak = writes_before - lo;
        if best.as_ref().is_none_or(|best| peak > best.peak) {
            trace!("split {split}: peak {peak} (writes {writes_before}, reads {lo})");
            best = Some(PeakCandidate {
                peak,
                split,
                reads_before: lo,
                writes_before,
            });
        }
    }

    let Some(best) = best else {
        return infeasible_error!(
            "no schedule reads sum_r_min={} items within the horizon of {horizon} cycles",
            problem.sum_r_min
        );
    };

    let writes = asap_writes(
        &write_eff,
        best.split,
        best.writes_before,
        total_writes - best.writes_before,
    );
    let (mut reads, _) = greedy_reads(&writes, &read_eff, 0..best.split, 0, best.reads_before);
    let (after, _) = greedy_reads(
        &writes,
        &read_eff,
        best.split..horizon,
        best.peak,
        problem.sum_r_min.saturating_sub(best.reads_before),
    );
    reads.extend(after);

    debug!(
        "Optimizer peak {} at t={} ({} writes, {} reads before the peak)",
        best.peak, best.split, best.writes_before, best.reads_before
    );

    // An empty buffer has no peak cycle
    let t_star = if best.peak == 0 { 0 } else { best.split };
    Ok(PeakSolution {
        occ_peak: best.peak,
        t_star,
        witness: Witness::from_transfers(writes, reads)?,
    })
}
