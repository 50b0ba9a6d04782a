// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Closed-form depth of a clock-domain-crossing FIFO.
//!
//! All terms are computed with integer arithmetic on frequencies in Hz so
//! that ratios such as 2 GHz / 1 GHz land exactly on whole cycles.

use std::fmt;

use log::info;
use serde::{Deserialize, Serialize};

use crate::finalize::{apply_margin, round_value};
use crate::params::{CdcCarry, Margin, Rounding};
use crate::result::CdcResult;
use crate::traffic::Traffic;
use crate::types::{CheckResult, SizingOutcome};
use crate::validation_error;

const PPM_SCALE: u128 = 1_000_000;

/// Clock domain holding the large same-clock FIFO.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FifoDomain {
    #[default]
    Write,
    Read,
}

/// Which latency term dominates the asynchronous FIFO depth.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CdcDepthModel {
    /// Write-pointer synchronizer latency seen from the write clock.
    #[default]
    Synchronizer,
    /// Full pointer round trip, write to read and back.
    CreditLoop,
}

impl fmt::Display for CdcDepthModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CdcDepthModel::Synchronizer => write!(f, "synchronizer"),
            CdcDepthModel::CreditLoop => write!(f, "credit_loop"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CdcWindow {
    /// Use the horizon of the same-clock run behind the crossing.
    #[default]
    Auto,
    Cycles(u64),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CdcParameters {
    pub wr_clk_hz: u64,
    pub rd_clk_hz: u64,
    pub big_fifo_domain: FifoDomain,
    pub wr_clk_ppm: u64,
    pub rd_clk_ppm: u64,

    // Write-to-read pointer path, in the clock of the named side
    pub wptr_inc_cycles: u64,
    pub wptr_sync_slip_cycles: u64,
    pub wptr_sync_stages: u64,
    pub rd_react_cycles: u64,

    // Read-to-write pointer path
    pub rptr_inc_cycles: u64,
    pub rptr_sync_slip_cycles: u64,
    pub rptr_sync_stages: u64,
    pub wr_full_update_cycles: u64,

    /// Window in cycles of the big FIFO's domain.
    pub window: CdcWindow,
    pub items_per_cycle: u64,
    pub depth_model: CdcDepthModel,
    pub margin: Margin,
    pub rounding: Rounding,
}

impl CdcParameters {
    #[must_use]
    pub fn new(wr_clk_hz: u64, rd_clk_hz: u64) -> Self {
        Self {
            wr_clk_hz,
            rd_clk_hz,
            big_fifo_domain: FifoDomain::Write,
            wr_clk_ppm: 0,
            rd_clk_ppm: 0,
            wptr_inc_cycles: 0,
            wptr_sync_slip_cycles: 1,
            wptr_sync_stages: 2,
            rd_react_cycles: 1,
            rptr_inc_cycles: 1,
            rptr_sync_slip_cycles: 1,
            rptr_sync_stages: 2,
            wr_full_update_cycles: 1,
            window: CdcWindow::Auto,
            items_per_cycle: 1,
            depth_model: CdcDepthModel::Synchronizer,
            margin: Margin::none(),
            rounding: Rounding::None,
        }
    }

    /// Fill in an automatic window and the per-cycle item count from the
    /// traffic of the same-clock run.
    pub fn for_traffic(mut self, traffic: &Traffic, wr_latency: u64) -> SizingOutcome<Self> {
        if self.window == CdcWindow::Auto {
            self.window = CdcWindow::Cycles(traffic.resolved_horizon(wr_latency)?);
        }
        self.items_per_cycle = traffic.w_max().max(1);
        Ok(self)
    }

    pub fn validate(&self) -> CheckResult {
        if self.wr_clk_hz == 0 {
            return validation_error!("cdc.wr_clk_freq must be > 0 Hz");
        }
        if self.rd_clk_hz == 0 {
            return validation_error!("cdc.rd_clk_freq must be > 0 Hz");
        }
        if self.wptr_sync_stages == 0 {
            return validation_error!("cdc.wptr_sync_stages must be >= 1 (got 0)");
        }
        if self.rptr_sync_stages == 0 {
            return validation_error!("cdc.rptr_sync_stages must be >= 1 (got 0)");
        }
        if self.items_per_cycle == 0 {
            return validation_error!("cdc items per cycle must be >= 1 (got 0)");
        }
        match self.window {
            CdcWindow::Auto => validation_error!(
                "cdc.window_cycles is auto; resolve it against the sizing traffic first"
            ),
            CdcWindow::Cycles(0) => validation_error!("cdc.window_cycles must be > 0 (got 0)"),
            CdcWindow::Cycles(_) => Ok(()),
        }
    }
}

/// `ceil(cycles * num / den)`
fn scale_cycles(cycles: u64, num: u64, den: u64) -> u64 {
    let scaled = (u128::from(cycles) * u128::from(num)).div_ceil(u128::from(den));
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

fn ppm_cycles(ppm: u64, window: u64) -> u64 {
    let drift = (u128::from(ppm) * u128::from(window)).div_ceil(PPM_SCALE);
    u64::try_from(drift).unwrap_or(u64::MAX)
}

/// Compute the CDC depth and the values handed on to the same-clock stage.
pub fn cdc_depth(params: &CdcParameters) -> SizingOutcome<CdcResult> {
    params.validate()?;
    let fw = params.wr_clk_hz;
    let fr = params.rd_clk_hz;
    let items = params.items_per_cycle;

    let window = match (params.window, params.big_fifo_domain) {
        (CdcWindow::Cycles(window), FifoDomain::Write) => window,
        (CdcWindow::Cycles(window), FifoDomain::Read) => scale_cycles(window, fw, fr),
        (CdcWindow::Auto, _) => 0,
    };

    let base_sync_fifo_depth = if fr < fw {
        let items_in_window = u128::from(window) * u128::from(items);
        let shortfall = (items_in_window * u128::from(fw - fr)).div_ceil(u128::from(fw));
        u64::try_from(shortfall).unwrap_or(u64::MAX)
    } else {
        0
    };

    let rd_sync_cycles_in_wr = scale_cycles(
        params.wptr_sync_stages + params.wptr_sync_slip_cycles,
        fw,
        fr,
    );
    let synchronizer_depth = rd_sync_cycles_in_wr * items;
    let phase_margin_depth = scale_cycles(1, fw, fr) * items;
    let ppm_drift_depth =
        (ppm_cycles(params.wr_clk_ppm, window) + ppm_cycles(params.rd_clk_ppm, window)) * items;

    // Write-side cycles plus read-side cycles converted to the write clock
    let wr_side = params.wptr_inc_cycles
        + params.rptr_sync_slip_cycles
        + params.rptr_sync_stages
        + params.wr_full_update_cycles;
    let rd_side = params.wptr_sync_slip_cycles
        + params.wptr_sync_stages
        + params.rd_react_cycles
        + params.rptr_inc_cycles;
    let loop_items =
        (u128::from(wr_side) * u128::from(fr) + u128::from(rd_side) * u128::from(fw))
            * u128::from(items);
    let credit_loop_depth =
        u64::try_from(loop_items.div_ceil(u128::from(fr))).unwrap_or(u64::MAX);

    let raw_depth = match params.depth_model {
        CdcDepthModel::Synchronizer => synchronizer_depth,
        CdcDepthModel::CreditLoop => credit_loop_depth,
    } + phase_margin_depth
        + ppm_drift_depth;
    let depth = round_value(apply_margin(raw_depth, &params.margin), params.rounding);

    let result = CdcResult {
        depth,
        synchronizer_depth,
        phase_margin_depth,
        ppm_drift_depth,
        credit_loop_depth,
        depth_model: params.depth_model,
        base_sync_fifo_depth,
        rd_sync_cycles_in_wr,
        window_cycles: window,
        items_per_cycle: items,
        basic_checks_pass: true,
        msg: "Analytic results.".to_string(),
    };
    info!("{result}");
    Ok(result)
}

impl CdcResult {
    /// The values the same-clock stage behind the crossing needs.
    #[must_use]
    pub fn carry(&self) -> CdcCarry {
        CdcCarry {
            base_sync_fifo_depth: self.base_sync_fifo_depth,
            rd_sync_cycles_in_wr: self.rd_sync_cycles_in_wr,
        }
    }
}
