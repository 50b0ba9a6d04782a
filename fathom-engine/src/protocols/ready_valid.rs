// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Plain ready/valid handshake: the FIFO must absorb whatever the writer
//! sends while the reader falls behind.
//!
//! Balanced layered traffic is solved by the phase sweep. Everything else
//! goes to the optimizer. For flat traffic the read bounds are dropped, so
//! the depth is the write bound whenever the horizon can carry it.

use log::info;

use crate::balance::{PhaseSweepProblem, is_balanced, phase_sweep};
use crate::finalize::{Reservations, finalize};
use crate::optimizer::{PeakProblem, maximize_peak};
use crate::params::ProtocolKind;
use crate::protocols::SizingContext;
use crate::result::{ProtocolOutputs, SizingResult, SolverPath};
use crate::types::SizingOutcome;

pub(crate) fn size(ctx: &SizingContext) -> SizingOutcome<SizingResult> {
    let traffic = &ctx.traffic;

    let balanced =
        traffic.layered && is_balanced(traffic.sum_r_min, traffic.sum_w_max, traffic.horizon);
    let (occ_peak, t_star, witness, solver_path) = if balanced {
        info!("Traffic is balanced, sweeping read phases");
        let solution = phase_sweep(
            &PhaseSweepProblem {
                write_mask: &traffic.write_mask,
                read_mask: &traffic.read_mask,
                w_max: traffic.w_max,
                r_max: traffic.r_max,
                wr_latency: ctx.wr_latency,
                rd_latency: ctx.rd_latency,
                sum_w_max: traffic.sum_w_max,
                sum_r_min: traffic.sum_r_min,
                overall_period: traffic.overall_period,
            },
            &ctx.deadline,
        )?;
        (
            solution.occ_peak,
            solution.t_star,
            solution.witness,
            SolverPath::Analytic,
        )
    } else {
        // With every cycle valid all writes can land before any read
        let sum_r_min = if traffic.layered {
            traffic.sum_r_min
        } else {
            info!("Flat traffic, reads are not needed to bound the peak");
            0
        };
        let write_caps = traffic.write_caps();
        let read_caps = traffic.read_caps();
        let solution = maximize_peak(
            &PeakProblem {
                write_caps: &write_caps,
                read_caps: &read_caps,
                wr_latency: ctx.wr_latency,
                rd_latency: ctx.rd_latency,
                sum_w_min: traffic.sum_w_min,
                sum_w_max: traffic.sum_w_max,
                sum_r_min,
                sum_r_max: traffic.sum_r_max,
            },
            &ctx.deadline,
        )?;
        (
            solution.occ_peak,
            solution.t_star,
            solution.witness,
            SolverPath::Optimizer,
        )
    };

    witness.check(occ_peak, t_star, traffic.sum_w_max)?;

    let depth = finalize(
        occ_peak,
        Reservations {
            atomic_tail: 0,
            base_sync_fifo_depth: ctx.cdc.base_sync_fifo_depth,
        },
        &ctx.margin,
        ctx.rounding,
    );

    Ok(SizingResult {
        protocol: ProtocolKind::ReadyValid,
        depth,
        occ_peak,
        t_star,
        horizon: traffic.horizon,
        solver_path,
        basic_checks_pass: true,
        msg: String::new(),
        outputs: ProtocolOutputs::ReadyValid,
        witness,
    })
}
