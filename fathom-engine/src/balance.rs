// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Balanced traffic detection and the phase-sweep solver used for it.
//!
//! When the guaranteed read volume covers the largest write volume the
//! optimizer's objective is ill-posed: reads could be postponed for free.
//! The occupancy is then governed only by how the read pattern is aligned
//! against the write pattern, so every alignment is tried.

use log::debug;

use crate::budget::Deadline;
use crate::mask::ValidMask;
use crate::types::SizingOutcome;
use crate::witness::Witness;

const DENSITY_EPSILON: f64 = 1e-6;

/// True when the minimum read density is at least the maximum write density.
#[must_use]
pub fn is_balanced(sum_r_min: u64, sum_w_max: u64, horizon: u64) -> bool {
    if horizon == 0 {
        return false;
    }
    let horizon = horizon as f64;
    sum_r_min as f64 / horizon + DENSITY_EPSILON >= sum_w_max as f64 / horizon
}

#[derive(Clone, Copy, Debug)]
pub struct PhaseSweepProblem<'a> {
    pub write_mask: &'a ValidMask,
    pub read_mask: &'a ValidMask,
    pub w_max: u64,
    pub r_max: u64,
    pub wr_latency: u64,
    pub rd_latency: u64,
    pub sum_w_max: u64,
    pub sum_r_min: u64,
    pub overall_period: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhaseSweepSolution {
    pub occ_peak: u64,
    pub t_star: usize,

    /// Rotation of the read pattern that produced the peak.
    pub phase: usize,
    pub witness: Witness,
}

/// Delay a sequence by `latency` cycles, dropping what falls off the end,
/// and cap its running total at `budget`.
fn delayed_with_budget(caps: &[u64], latency: u64, mut budget: u64) -> Vec<u64> {
    let latency = latency as usize;
    (0..caps.len())
        .map(|e| {
            let cap = if e >= latency { caps[e - latency] } else { 0 };
            let take = cap.min(budget);
            budget -= take;
            take
        })
        .collect()
}

/// The trajectory for one alignment. Reads that find the buffer empty are
/// dropped, so `reads` holds what was actually read.
fn trajectory(writes: &[u64], offered_reads: &[u64]) -> (Vec<u64>, u64, usize) {
    let mut reads = Vec::with_capacity(writes.len());
    let mut occ: u64 = 0;
    let mut peak = (0, 0);
    for (t, (w, r)) in writes.iter().zip(offered_reads).enumerate() {
        let available = occ + w;
        let take = (*r).min(available);
        occ = available - take;
        reads.push(take);
        if occ > peak.0 {
            peak = (occ, t + 1);
        }
    }
    (reads, peak.0, peak.1)
}

/// Number of distinct rotations of the read mask worth trying.
fn distinct_phases(read_mask: &ValidMask, overall_period: u64) -> usize {
    let period = (overall_period as usize).min(read_mask.len()).max(1);
    let len = read_mask.len();
    (1..period)
        .find(|p| len % p == 0 && read_mask.rotated_right(*p) == *read_mask)
        .unwrap_or(period)
}

pub fn phase_sweep(
    problem: &PhaseSweepProblem,
    deadline: &Deadline,
) -> SizingOutcome<PhaseSweepSolution> {
    let writes = delayed_with_budget(
        &problem.write_mask.capacities(problem.w_max),
        problem.wr_latency,
        problem.sum_w_max,
    );

    let phases = distinct_phases(problem.read_mask, problem.overall_period);
    debug!("Phase sweep over {phases} read alignments");

    let mut best: Option<(u64, usize, usize, Vec<u64>)> = None;
    for phase in 0..phases {
        deadline.check("phase sweep")?;
        let rotated = problem.read_mask.rotated_right(phase);
        let offered = delayed_with_budget(
            &rotated.capacities(problem.r_max),
            problem.rd_latency,
            problem.sum_r_min,
        );
        let (reads, peak, t_star) = trajectory(&writes, &offered);
        let better = match &best {
            None => true,
            Some((best_peak, best_t, _, _)) => {
                peak > *best_peak || (peak == *best_peak && t_star < *best_t)
            }
        };
        if better {
            best = Some((peak, t_star, phase, reads));
        }
    }

    let (occ_peak, t_star, phase, reads) = best.unwrap_or_default();
    debug!("Phase sweep peak {occ_peak} at t={t_star} with read phase {phase}");
    Ok(PhaseSweepSolution {
        occ_peak,
        t_star,
        phase,
        witness: Witness::from_transfers(writes, reads)?,
    })
}
