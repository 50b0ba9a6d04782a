// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Replay buffer sizing.
//!
//! Every item written must be held until it is acknowledged one round trip
//! later. Writes stop a round trip before the end of the horizon so that
//! the buffer drains to zero, which bounds the in-flight peak by
//! `min(rtt, horizon - rtt) * w_max`.

use log::{info, warn};

use crate::finalize::{Reservations, finalize};
use crate::params::ProtocolKind;
use crate::protocols::SizingContext;
use crate::result::{ProtocolOutputs, SizingResult, SolverPath};
use crate::traffic::Traffic;
use crate::types::{CheckResult, SizingOutcome};
use crate::witness::Witness;
use crate::{consistency_error, validation_error};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayParams {
    /// Cycles from a write to its acknowledgement.
    pub rtt: u64,

    pub atomic_tail: u64,
}

impl ReplayParams {
    #[must_use]
    pub fn new(rtt: u64) -> Self {
        Self {
            rtt,
            atomic_tail: 0,
        }
    }

    pub fn validate(&self, traffic: &Traffic) -> CheckResult {
        let Traffic::Flat(flat) = traffic else {
            return validation_error!("replay sizing only accepts flat traffic");
        };
        if self.rtt == 0 {
            return validation_error!("rtt must be > 0 (got 0)");
        }
        if self.rtt > flat.horizon {
            return validation_error!(
                "rtt={} must be <= horizon={}",
                self.rtt,
                flat.horizon
            );
        }
        Ok(())
    }
}

/// Peak in-flight volume for a constant write rate.
#[must_use]
pub fn closed_form_peak(rtt: u64, horizon: u64, w_max: u64) -> u64 {
    rtt.min(horizon.saturating_sub(rtt)) * w_max
}

/// Write at full rate until a round trip before the end, acknowledging each
/// write one round trip after it was made.
fn in_flight_witness(horizon: usize, rtt: usize, w_max: u64) -> SizingOutcome<Witness> {
    let last_write = horizon.saturating_sub(rtt);
    let writes: Vec<u64> = (0..horizon)
        .map(|t| if t < last_write { w_max } else { 0 })
        .collect();
    let acks = (0..horizon)
        .map(|t| if t >= rtt { writes[t - rtt] } else { 0 })
        .collect();
    Witness::from_transfers(writes, acks)
}

pub(crate) fn size(ctx: &SizingContext, params: &ReplayParams) -> SizingOutcome<SizingResult> {
    let traffic = &ctx.traffic;
    let horizon = traffic.horizon;
    let rtt_eff = params.rtt + ctx.cdc.rd_sync_cycles_in_wr;
    if rtt_eff > horizon {
        return validation_error!(
            "rtt={} plus {} synchronizer cycles exceeds horizon={horizon}",
            params.rtt,
            ctx.cdc.rd_sync_cycles_in_wr
        );
    }
    if horizon < 2 * rtt_eff {
        warn!(
            "horizon={horizon} is shorter than two round trips ({rtt_eff} cycles each); \
             the peak is limited by the drain instead of the round trip"
        );
    }

    let witness = in_flight_witness(traffic.cycles(), rtt_eff as usize, traffic.w_max)?;
    let (occ_peak, t_star) = witness.peak();
    let expected = closed_form_peak(rtt_eff, horizon, traffic.w_max);
    if occ_peak != expected {
        return consistency_error!(
            "in-flight peak {occ_peak} does not match min(rtt, horizon - rtt) * w_max = {expected}"
        );
    }
    witness.check(occ_peak, t_star, horizon * traffic.w_max)?;

    let depth = finalize(
        occ_peak,
        Reservations {
            atomic_tail: params.atomic_tail,
            base_sync_fifo_depth: ctx.cdc.base_sync_fifo_depth,
        },
        &ctx.margin,
        ctx.rounding,
    );
    info!("Replay peak {occ_peak} at t={t_star} for rtt_eff={rtt_eff}");

    Ok(SizingResult {
        protocol: ProtocolKind::Replay,
        depth,
        occ_peak,
        t_star,
        horizon,
        solver_path: SolverPath::ClosedForm,
        basic_checks_pass: true,
        msg: String::new(),
        outputs: ProtocolOutputs::Replay { rtt_eff },
        witness,
    })
}
