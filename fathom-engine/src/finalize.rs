// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Turn a peak occupancy into a final depth.
//!
//! The order is fixed: add reservations, then margin, then rounding.

use crate::params::{Margin, MarginKind, Rounding};

/// Fixed additions made to the peak before margin is applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Reservations {
    /// Items that must always fit once a transfer has started.
    pub atomic_tail: u64,

    /// Depth of the rate-mismatch buffer from a CDC stage.
    pub base_sync_fifo_depth: u64,
}

#[must_use]
pub fn apply_margin(value: u64, margin: &Margin) -> u64 {
    match margin.kind {
        MarginKind::Percentage => {
            let scaled = u128::from(value) * (100 + u128::from(margin.value));
            u64::try_from(scaled.div_ceil(100)).unwrap_or(u64::MAX)
        }
        MarginKind::Absolute => value.saturating_add(margin.value),
    }
}

/// Power-of-two rounding maps zero and one to one.
#[must_use]
pub fn round_value(value: u64, rounding: Rounding) -> u64 {
    match rounding {
        Rounding::None => value,
        Rounding::Power2 => {
            if value <= 1 {
                1
            } else {
                value.checked_next_power_of_two().unwrap_or(u64::MAX)
            }
        }
    }
}

#[must_use]
pub fn finalize(
    occ_peak: u64,
    reservations: Reservations,
    margin: &Margin,
    rounding: Rounding,
) -> u64 {
    let depth = occ_peak
        .saturating_add(reservations.atomic_tail)
        .saturating_add(reservations.base_sync_fifo_depth);
    round_value(apply_margin(depth, margin), rounding)
}
