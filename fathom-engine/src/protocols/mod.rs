// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Protocol variants built on the shared solvers.

use log::warn;

use crate::budget::Deadline;
use crate::params::{CdcCarry, Margin, Protocol, Rounding, SizingParameters};
use crate::result::SizingResult;
use crate::traffic::ResolvedTraffic;
use crate::types::SizingOutcome;

pub mod cbfc;
pub mod ready_valid;
pub mod replay;
pub mod xon_xoff;

/// Everything a protocol variant needs once the traffic has been resolved.
pub(crate) struct SizingContext {
    pub traffic: ResolvedTraffic,
    pub wr_latency: u64,

    /// Read latency including any synchronizer cycles from a CDC stage.
    pub rd_latency: u64,
    pub margin: Margin,
    pub rounding: Rounding,
    pub cdc: CdcCarry,
    pub deadline: Deadline,
}

impl SizingContext {
    pub fn new(params: &SizingParameters, deadline: Deadline) -> SizingOutcome<Self> {
        let traffic = params.traffic.resolve(params.wr_latency)?;
        Ok(Self {
            traffic,
            wr_latency: params.wr_latency,
            rd_latency: params.rd_latency + params.cdc.rd_sync_cycles_in_wr,
            margin: params.margin,
            rounding: params.rounding,
            cdc: params.cdc,
            deadline,
        })
    }
}

pub(crate) fn dispatch(ctx: &SizingContext, protocol: &Protocol) -> SizingOutcome<SizingResult> {
    if !matches!(protocol, Protocol::Replay(_)) {
        if let Some(warning) = ctx.traffic.sufficiency_warning() {
            warn!("{warning}");
        }
    }
    match protocol {
        Protocol::ReadyValid => ready_valid::size(ctx),
        Protocol::XonXoff(params) => xon_xoff::size(ctx, params),
        Protocol::Cbfc(params) => cbfc::size(ctx, params),
        Protocol::Replay(params) => replay::size(ctx, params),
    }
}
