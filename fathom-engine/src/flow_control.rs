// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Exact worst-case search for a FIFO behind a flow-control gate.
//!
//! Both the writer and the reader are adversarial: in every cycle the
//! writer may issue any number of items up to its cap, its budget and what
//! the gate allows, and the reader may pop any number up to its cap and what
//! is buffered. The search walks the horizon one cycle at a time keeping
//! every distinct state reached so far, where a state is the occupancy, the
//! items issued, the items still in the write pipeline and the gate. Paths
//! that reach the same state are merged, keeping the higher peak (earlier
//! peak on ties), so the result is the exact worst case over all schedules
//! that meet the required totals.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::hash::Hash;

use log::{debug, trace};

use crate::budget::Deadline;
use crate::consistency_error;
use crate::optimizer::effective_caps;
use crate::types::SizingOutcome;
use crate::witness::Witness;

/// A flow-control mechanism sitting between the writer and the FIFO.
///
/// Gates are immutable values: [WriteGate::step] returns the gate for the
/// next cycle so that the search can share and merge them.
pub trait WriteGate: Clone + Eq + Hash {
    /// Names of the per-cycle traces attached to the witness.
    const TRACES: &'static [&'static str];

    /// Most items the writer may issue in cycle `t`, given the occupancy at
    /// the start of the cycle.
    fn write_allowance(&self, t: usize, occupancy: u64) -> u64;

    /// The gate after `written` items were issued and `read` items popped in
    /// cycle `t`, or `None` if the gate forbids that transfer.
    fn step(&self, t: usize, occupancy: u64, written: u64, read: u64) -> Option<Self>;

    /// One value per entry of [WriteGate::TRACES] for cycle `t`.
    fn trace_values(&self, t: usize, occupancy: u64, written: u64, read: u64) -> Vec<u64>;
}

/// A gate that never holds the writer back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct OpenGate;

impl WriteGate for OpenGate {
    const TRACES: &'static [&'static str] = &[];

    fn write_allowance(&self, _t: usize, _occupancy: u64) -> u64 {
        u64::MAX
    }

    fn step(&self, _t: usize, _occupancy: u64, _written: u64, _read: u64) -> Option<Self> {
        Some(*self)
    }

    fn trace_values(&self, _t: usize, _occupancy: u64, _written: u64, _read: u64) -> Vec<u64> {
        Vec::new()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FlowProblem<'a> {
    pub write_caps: &'a [u64],
    pub read_caps: &'a [u64],
    pub wr_latency: u64,
    pub rd_latency: u64,
    pub sum_w_max: u64,
    pub sum_r_max: u64,
}

/// Totals a run must reach to be accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Requirements {
    pub min_written: u64,
    pub min_read: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowRun {
    /// Items issued by the writer, including those still in flight at the
    /// end of the horizon.
    pub written: u64,

    /// Items read, including reads that only land beyond the horizon.
    pub read: u64,
    pub occ_peak: u64,
    pub t_star: usize,
    pub witness: Witness,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct State<G> {
    occupancy: u64,
    written: u64,

    /// Items issued in the last `wr_latency` cycles, oldest first.
    in_flight: Vec<u64>,
    gate: G,
}

impl<G> State<G> {
    fn read_so_far(&self) -> u64 {
        self.written - self.in_flight.iter().sum::<u64>() - self.occupancy
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Score {
    peak: u64,
    t_star: usize,
}

impl Score {
    fn beats(&self, other: &Score) -> bool {
        self.peak > other.peak || (self.peak == other.peak && self.t_star < other.t_star)
    }

    fn after(self, t: usize, occupancy: u64) -> Score {
        if occupancy > self.peak {
            Score {
                peak: occupancy,
                t_star: t + 1,
            }
        } else {
            self
        }
    }
}

/// How a state was first reached with its best score.
#[derive(Clone, Copy, Debug)]
struct Step {
    parent: usize,
    write: u64,
    read: u64,
}

fn suffix_sums(caps: &[u64], tail: u64) -> Vec<u64> {
    let mut sums = vec![tail; caps.len() + 1];
    for t in (0..caps.len()).rev() {
        sums[t] = sums[t + 1].saturating_add(caps[t]);
    }
    sums
}

/// Find the accepted run with the highest peak, earliest peak first.
///
/// Returns `None` when no schedule meets the requirements.
pub fn worst_case_run<G: WriteGate>(
    problem: &FlowProblem,
    gate: G,
    requirements: Requirements,
    deadline: &Deadline,
) -> SizingOutcome<Option<FlowRun>> {
    let horizon = problem.write_caps.len();
    let wr_latency = problem.wr_latency as usize;
    let (read_eff, read_beyond) = effective_caps(problem.read_caps, problem.rd_latency);
    let write_left = suffix_sums(problem.write_caps, 0);
    let read_left = suffix_sums(&read_eff, read_beyond);

    let mut states = vec![State {
        occupancy: 0,
        written: 0,
        in_flight: vec![0; wr_latency],
        gate: gate.clone(),
    }];
    let mut scores = vec![Score::default()];
    let mut layers: Vec<Vec<Step>> = Vec::with_capacity(horizon);

    for t in 0..horizon {
        deadline.check("flow-control search")?;
        let mut index: HashMap<State<G>, usize> = HashMap::new();
        let mut next_scores = Vec::new();
        let mut steps = Vec::new();

        for (parent, state) in states.iter().enumerate() {
            let read_so_far = state.read_so_far();
            let allowance = problem.write_caps[t]
                .min(state.gate.write_allowance(t, state.occupancy))
                .min(problem.sum_w_max.saturating_sub(state.written));

            for write in (0..=allowance).rev() {
                let written = state.written + write;
                if written.saturating_add(write_left[t + 1]) < requirements.min_written {
                    break;
                }
                let (arriving, in_flight) = match state.in_flight.split_first() {
                    Some((oldest, rest)) => {
                        let mut in_flight = rest.to_vec();
                        in_flight.push(write);
                        (*oldest, in_flight)
                    }
                    None => (write, Vec::new()),
                };
                let read_cap = read_eff[t]
                    .min(state.occupancy + arriving)
                    .min(problem.sum_r_max.saturating_sub(read_so_far));
                let first_read = requirements
                    .min_read
                    .saturating_sub(read_so_far.saturating_add(read_left[t + 1]));

                for read in first_read..=read_cap {
                    let Some(gate) = state.gate.step(t, state.occupancy, write, read) else {
                        continue;
                    };
                    let occupancy = state.occupancy + arriving - read;
                    let score = scores[parent].after(t, occupancy);
                    let next = State {
                        occupancy,
                        written,
                        in_flight: in_flight.clone(),
                        gate,
                    };
                    let step = Step {
                        parent,
                        write,
                        read,
                    };
                    match index.entry(next) {
                        Entry::Occupied(entry) => {
                            let i = *entry.get();
                            if score.beats(&next_scores[i]) {
                                next_scores[i] = score;
                                steps[i] = step;
                            }
                        }
                        Entry::Vacant(entry) => {
                            entry.insert(steps.len());
                            next_scores.push(score);
                            steps.push(step);
                        }
                    }
                }
            }
        }

        let mut next: Vec<(State<G>, usize)> = index.into_iter().collect();
        next.sort_unstable_by_key(|(_, i)| *i);
        states = next.into_iter().map(|(state, _)| state).collect();
        scores = next_scores;
        layers.push(steps);
        trace!("cycle {t}: {} states", states.len());
    }

    let mut best: Option<(usize, u64)> = None;
    for (i, state) in states.iter().enumerate() {
        let read_in = state.read_so_far();
        let read = read_in + read_beyond.min(problem.sum_r_max.saturating_sub(read_in));
        if state.written < requirements.min_written || read < requirements.min_read {
            continue;
        }
        if best.is_none_or(|(b, _)| scores[i].beats(&scores[b])) {
            best = Some((i, read));
        }
    }
    let Some((best, read)) = best else {
        debug!("No schedule meets {requirements:?}");
        return Ok(None);
    };

    let mut writes = vec![0; horizon];
    let mut reads = vec![0; horizon];
    let mut i = best;
    for t in (0..horizon).rev() {
        let step = layers[t][i];
        writes[t] = step.write;
        reads[t] = step.read;
        i = step.parent;
    }

    let witness = replay(&gate, &writes, reads, wr_latency)?;
    let score = scores[best];
    let (occ_peak, t_star) = witness.peak();
    if occ_peak != score.peak || t_star != score.t_star {
        return consistency_error!(
            "flow-control witness peaks at {occ_peak} (t={t_star}), search reported {} (t={})",
            score.peak,
            score.t_star
        );
    }
    debug!("Flow-control worst case: peak {occ_peak} at t={t_star}");

    Ok(Some(FlowRun {
        written: states[best].written,
        read,
        occ_peak,
        t_star,
        witness,
    }))
}

/// Rebuild the witness of a schedule and the gate's traces along it.
fn replay<G: WriteGate>(
    gate: &G,
    writes: &[u64],
    reads: Vec<u64>,
    wr_latency: usize,
) -> SizingOutcome<Witness> {
    let arrived = (0..writes.len())
        .map(|t| t.checked_sub(wr_latency).map_or(0, |s| writes[s]))
        .collect();
    let mut witness = Witness::from_transfers(arrived, reads)?;

    let mut traces = vec![Vec::with_capacity(writes.len()); G::TRACES.len()];
    let mut gate = gate.clone();
    for (t, write) in writes.iter().enumerate() {
        let occupancy = witness.occupancy()[t];
        let read = witness.read()[t];
        for (trace, value) in traces
            .iter_mut()
            .zip(gate.trace_values(t, occupancy, *write, read))
        {
            trace.push(value);
        }
        gate = match gate.step(t, occupancy, *write, read) {
            Some(gate) => gate,
            None => {
                return consistency_error!("flow-control witness rejected by the gate at cycle {t}");
            }
        };
    }
    for (name, values) in G::TRACES.iter().zip(traces) {
        witness = witness.with_trace(*name, values);
    }
    Ok(witness)
}

/// Whether any schedule meets the requirements.
pub fn any_run_meets<G: WriteGate>(
    problem: &FlowProblem,
    gate: G,
    requirements: Requirements,
    deadline: &Deadline,
) -> SizingOutcome<bool> {
    Ok(worst_case_run(problem, gate, requirements, deadline)?.is_some())
}
