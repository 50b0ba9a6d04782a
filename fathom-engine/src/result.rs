// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Result records returned to the caller.

use std::fmt;

use serde::Serialize;

use crate::cdc::CdcDepthModel;
use crate::params::ProtocolKind;
use crate::witness::Witness;

/// How the peak occupancy was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverPath {
    /// Phase sweep for balanced traffic.
    Analytic,
    /// Exact peak maximization over the masks.
    Optimizer,
    /// Gated simulation under a threshold or credit search.
    FlowControlSearch,
    ClosedForm,
}

impl fmt::Display for SolverPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SolverPath::Analytic => write!(f, "analytic"),
            SolverPath::Optimizer => write!(f, "optimizer"),
            SolverPath::FlowControlSearch => write!(f, "flow_control_search"),
            SolverPath::ClosedForm => write!(f, "closed_form"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ProtocolOutputs {
    ReadyValid,
    XonXoff {
        xon: u64,
        xoff: u64,
        throughput: f64,
    },
    Cbfc {
        cred_init: u64,
        cred_max: u64,
        throughput: f64,
    },
    Replay {
        rtt_eff: u64,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct SizingResult {
    pub protocol: ProtocolKind,

    /// Final depth after reservations, margin and rounding.
    pub depth: u64,

    /// Peak occupancy of the witness, before any post-processing.
    pub occ_peak: u64,

    /// First occupancy index at which `occ_peak` is reached.
    pub t_star: usize,

    pub horizon: u64,
    pub solver_path: SolverPath,
    pub basic_checks_pass: bool,

    /// Empty on success.
    pub msg: String,

    pub outputs: ProtocolOutputs,
    pub witness: Witness,
}

impl SizingResult {
    #[must_use]
    pub fn xon_xoff(&self) -> Option<(u64, u64)> {
        match self.outputs {
            ProtocolOutputs::XonXoff { xon, xoff, .. } => Some((xon, xoff)),
            _ => None,
        }
    }

    #[must_use]
    pub fn credits(&self) -> Option<(u64, u64)> {
        match self.outputs {
            ProtocolOutputs::Cbfc {
                cred_init,
                cred_max,
                ..
            } => Some((cred_init, cred_max)),
            _ => None,
        }
    }

    #[must_use]
    pub fn throughput(&self) -> Option<f64> {
        match self.outputs {
            ProtocolOutputs::XonXoff { throughput, .. }
            | ProtocolOutputs::Cbfc { throughput, .. } => Some(throughput),
            _ => None,
        }
    }
}

impl fmt::Display for SizingResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}: depth={}, occ_peak={} at t={}, horizon={}, via {}",
            self.protocol, self.depth, self.occ_peak, self.t_star, self.horizon, self.solver_path
        )?;
        match self.outputs {
            ProtocolOutputs::ReadyValid => {}
            ProtocolOutputs::XonXoff {
                xon,
                xoff,
                throughput,
            } => write!(f, ", xon={xon}, xoff={xoff}, throughput={throughput:.4}")?,
            ProtocolOutputs::Cbfc {
                cred_init,
                cred_max,
                throughput,
            } => write!(
                f,
                ", cred_init={cred_init}, cred_max={cred_max}, throughput={throughput:.4}"
            )?,
            ProtocolOutputs::Replay { rtt_eff } => write!(f, ", rtt_eff={rtt_eff}")?,
        }
        Ok(())
    }
}

/// Decomposition of a clock-domain-crossing depth.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CdcResult {
    pub depth: u64,
    pub synchronizer_depth: u64,
    pub phase_margin_depth: u64,
    pub ppm_drift_depth: u64,
    pub credit_loop_depth: u64,
    pub depth_model: CdcDepthModel,
    pub base_sync_fifo_depth: u64,
    pub rd_sync_cycles_in_wr: u64,

    /// Analysis window in write-clock cycles.
    pub window_cycles: u64,
    pub items_per_cycle: u64,
    pub basic_checks_pass: bool,
    pub msg: String,
}

impl fmt::Display for CdcResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "cdc: depth={} ({} model: synchronizer={}, credit_loop={}, phase={}, ppm={}), \
             base_sync_fifo_depth={}, rd_sync_cycles_in_wr={}",
            self.depth,
            self.depth_model,
            self.synchronizer_depth,
            self.credit_loop_depth,
            self.phase_margin_depth,
            self.ppm_drift_depth,
            self.base_sync_fifo_depth,
            self.rd_sync_cycles_in_wr
        )
    }
}
