// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Builders shared by the tests and benchmarks.

use crate::horizon::HorizonPolicy;
use crate::layers::{BurstLayer, CycleLayer, StreamLayer, TrafficProfile, TransactionLayer};
use crate::params::{Protocol, SizingParameters};
use crate::traffic::{FlatTraffic, LayeredTraffic, Traffic};

#[must_use]
pub fn flat(horizon: u64, w_max: u64, r_max: u64, sum_w: (u64, u64), sum_r: (u64, u64)) -> Traffic {
    Traffic::Flat(FlatTraffic {
        horizon,
        w_max,
        r_max,
        sum_w_min: sum_w.0,
        sum_w_max: sum_w.1,
        sum_r_min: sum_r.0,
        sum_r_max: sum_r.1,
    })
}

/// A single-stream profile.
#[must_use]
pub fn profile(
    items_per_cycle: u64,
    (valid_cycles, txn_gap): (u64, u64),
    (transactions_per_burst, burst_gap): (u64, u64),
) -> TrafficProfile {
    TrafficProfile::new(
        TransactionLayer {
            valid_cycles,
            gap_cycles: txn_gap,
        },
        BurstLayer {
            transactions_per_burst,
            gap_cycles: burst_gap,
        },
    )
    .with_cycle(CycleLayer {
        max_items_per_cycle: items_per_cycle,
    })
}

#[must_use]
pub fn with_bursts(profile: TrafficProfile, bursts_per_stream: u64, gap_cycles: u64) -> TrafficProfile {
    profile.with_stream(StreamLayer {
        bursts_per_stream,
        gap_cycles,
    })
}

#[must_use]
pub fn layered(write: TrafficProfile, read: TrafficProfile, horizon: HorizonPolicy) -> Traffic {
    Traffic::Layered(LayeredTraffic {
        write,
        read,
        horizon,
    })
}

/// Transactions of 4 valid and 2 idle cycles, 8 per burst, 16 idle cycles
/// between bursts: a 64-cycle period carrying 32 valid cycles.
#[must_use]
pub fn reference_profile(items_per_cycle: u64) -> TrafficProfile {
    profile(items_per_cycle, (4, 2), (8, 16))
}

/// The reference profile on both sides with two items per write cycle and
/// one per read cycle over a 64-cycle horizon.
#[must_use]
pub fn reference_traffic() -> Traffic {
    layered(
        reference_profile(2),
        reference_profile(1),
        HorizonPolicy::cycles(64),
    )
}

#[must_use]
pub fn reference_params(protocol: Protocol) -> SizingParameters {
    SizingParameters::new(reference_traffic(), protocol)
}
