// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Compile layered traffic profiles into worst-case valid masks.
//!
//! The masks are not a representative layout of the traffic. They place the
//! legal gaps so that data clusters as tightly as possible on the write side
//! and idle cycles cluster as tightly as possible on the read side.

use log::debug;

use crate::horizon::{HorizonPolicy, overall_period, resolve_horizon};
use crate::layers::TrafficProfile;
use crate::mask::ValidMask;
use crate::types::{Side, SizingOutcome};
use crate::validation_error;

/// Ordering of the valid and gap cycles of a single transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    ValidFirst,
    GapFirst,
}

fn push_transaction(bits: &mut Vec<bool>, profile: &TrafficProfile, phase: Phase) {
    let valid = profile.transaction.valid_cycles as usize;
    let gap = profile.transaction.gap_cycles as usize;
    match phase {
        Phase::ValidFirst => {
            bits.extend(std::iter::repeat_n(true, valid));
            bits.extend(std::iter::repeat_n(false, gap));
        }
        Phase::GapFirst => {
            bits.extend(std::iter::repeat_n(false, gap));
            bits.extend(std::iter::repeat_n(true, valid));
        }
    }
}

fn push_idle(bits: &mut Vec<bool>, cycles: u64) {
    bits.extend(std::iter::repeat_n(false, cycles as usize));
}

/// Transaction phase for a write burst that is one of several.
///
/// Odd bursts must end on a valid cycle so that they abut the data at the
/// start of the following burst.
fn write_phase(burst_idx: u64, txn_idx: u64, txns_per_burst: u64) -> Phase {
    let need_last_valid = burst_idx % 2 == 1;
    let start_gap_first = txns_per_burst % 2 == 1 && need_last_valid;
    let gap_first = if txn_idx % 2 == 0 {
        start_gap_first
    } else {
        !start_gap_first
    };
    if gap_first {
        Phase::GapFirst
    } else {
        Phase::ValidFirst
    }
}

/// Whether a write burst puts its idle cycles before its data.
fn write_burst_idle_first(burst_idx: u64, bursts: u64) -> bool {
    if burst_idx == 0 {
        true
    } else if burst_idx == bursts - 1 {
        false
    } else {
        burst_idx % 2 == 0
    }
}

fn write_base(profile: &TrafficProfile) -> Vec<bool> {
    let bursts = profile.bursts_per_stream();
    let txns = profile.transactions_per_burst();
    let burst_gap = profile.burst.gap_cycles;

    let mut bits = Vec::with_capacity(profile.period() as usize);
    if bursts == 1 {
        for _ in 0..txns {
            push_transaction(&mut bits, profile, Phase::ValidFirst);
        }
        push_idle(&mut bits, burst_gap);
    } else {
        for burst_idx in 0..bursts {
            let idle_first = write_burst_idle_first(burst_idx, bursts);
            if idle_first {
                push_idle(&mut bits, burst_gap);
            }
            for txn_idx in 0..txns {
                push_transaction(&mut bits, profile, write_phase(burst_idx, txn_idx, txns));
            }
            if !idle_first {
                push_idle(&mut bits, burst_gap);
            }
        }
    }
    push_idle(&mut bits, profile.stream.unwrap_or_default().gap_cycles);
    bits
}

fn read_base(profile: &TrafficProfile) -> Vec<bool> {
    let bursts = profile.bursts_per_stream();
    let txns = profile.transactions_per_burst();

    let mut bits = Vec::with_capacity(profile.period() as usize);
    push_idle(&mut bits, profile.stream.unwrap_or_default().gap_cycles);
    for burst_idx in 0..bursts {
        push_idle(&mut bits, profile.burst.gap_cycles);
        for txn_idx in 0..txns {
            let phase = if bursts == 1 || (burst_idx + txn_idx) % 2 == 1 {
                Phase::GapFirst
            } else {
                Phase::ValidFirst
            };
            push_transaction(&mut bits, profile, phase);
        }
    }
    bits
}

/// One period of the worst-case pattern for a side.
#[must_use]
pub fn base_pattern(profile: &TrafficProfile, side: Side) -> ValidMask {
    let bits = match side {
        Side::Write => write_base(profile),
        Side::Read => read_base(profile),
    };
    ValidMask::from_bits(bits)
}

/// Compile a single profile to a mask of `horizon` cycles.
///
/// No causality correction is applied here as that depends on both sides,
/// see [compile_layered].
pub fn compile_profile(
    profile: &TrafficProfile,
    side: Side,
    horizon: u64,
) -> SizingOutcome<ValidMask> {
    profile.validate(side)?;
    if horizon == 0 {
        return validation_error!("horizon must be > 0 (got 0)");
    }
    Ok(base_pattern(profile, side).tiled(horizon as usize))
}

/// The pair of masks for a layered run together with the periods they were
/// built from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledProfiles {
    pub write_mask: ValidMask,
    pub read_mask: ValidMask,
    pub write_period: u64,
    pub read_period: u64,
    pub overall_period: u64,
    pub horizon: u64,

    /// Cycles the read pattern was rotated by to respect causality.
    pub read_rotation: u64,
}

/// Compile both sides of a layered run.
///
/// The read pattern is rotated so that it starts no earlier than the first
/// write could have arrived (`wr_latency` plus the index of the first write
/// valid cycle). The rotation is applied to a single period before tiling.
pub fn compile_layered(
    write: &TrafficProfile,
    read: &TrafficProfile,
    policy: &HorizonPolicy,
    wr_latency: u64,
) -> SizingOutcome<CompiledProfiles> {
    write.validate(Side::Write)?;
    read.validate(Side::Read)?;

    let write_base = base_pattern(write, Side::Write);
    let read_base = base_pattern(read, Side::Read);
    let write_period = write_base.len() as u64;
    let read_period = read_base.len() as u64;
    let overall = overall_period(write_period, read_period);
    let horizon = resolve_horizon(policy, overall)?;

    let (read_base, read_rotation) = match write_base.first_valid() {
        Some(first_write) => {
            let amount = (wr_latency + first_write as u64) % read_period;
            (read_base.rotated_right(amount as usize), amount)
        }
        None => (read_base, 0),
    };

    debug!(
        "Compiled layered profiles: write_period={write_period}, read_period={read_period}, \
         overall_period={overall}, horizon={horizon}, read_rotation={read_rotation}"
    );
    debug!("write base: {write_base}");
    debug!("read base:  {read_base}");

    Ok(CompiledProfiles {
        write_mask: write_base.tiled(horizon as usize),
        read_mask: read_base.tiled(horizon as usize),
        write_period,
        read_period,
        overall_period: overall,
        horizon,
        read_rotation,
    })
}
