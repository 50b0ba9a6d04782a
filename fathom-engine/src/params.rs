// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The immutable parameter bundle for one sizing run.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocols::cbfc::CbfcParams;
use crate::protocols::replay::ReplayParams;
use crate::protocols::xon_xoff::XonXoffParams;
use crate::traffic::Traffic;
use crate::types::CheckResult;
use crate::validation_error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginKind {
    Percentage,
    #[default]
    Absolute,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Margin {
    pub kind: MarginKind,
    pub value: u64,
}

impl Margin {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn percentage(value: u64) -> Self {
        Self {
            kind: MarginKind::Percentage,
            value,
        }
    }

    #[must_use]
    pub fn absolute(value: u64) -> Self {
        Self {
            kind: MarginKind::Absolute,
            value,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rounding {
    #[default]
    None,
    Power2,
}

/// Values carried from a clock-domain-crossing stage into the same-clock
/// sizing run behind it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CdcCarry {
    /// Added to the final depth and to any thresholds or credits.
    pub base_sync_fifo_depth: u64,

    /// Added to the read latency (or round-trip time for replay).
    pub rd_sync_cycles_in_wr: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    ReadyValid,
    XonXoff,
    Cbfc,
    Replay,
    Cdc,
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProtocolKind::ReadyValid => write!(f, "ready_valid"),
            ProtocolKind::XonXoff => write!(f, "xon_xoff"),
            ProtocolKind::Cbfc => write!(f, "cbfc"),
            ProtocolKind::Replay => write!(f, "replay"),
            ProtocolKind::Cdc => write!(f, "cdc"),
        }
    }
}

/// The same-clock protocol being sized and its own parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum Protocol {
    ReadyValid,
    XonXoff(XonXoffParams),
    Cbfc(CbfcParams),
    Replay(ReplayParams),
}

impl Protocol {
    #[must_use]
    pub fn kind(&self) -> ProtocolKind {
        match self {
            Protocol::ReadyValid => ProtocolKind::ReadyValid,
            Protocol::XonXoff(_) => ProtocolKind::XonXoff,
            Protocol::Cbfc(_) => ProtocolKind::Cbfc,
            Protocol::Replay(_) => ProtocolKind::Replay,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SizingParameters {
    pub traffic: Traffic,
    pub wr_latency: u64,
    pub rd_latency: u64,
    pub protocol: Protocol,
    pub margin: Margin,
    pub rounding: Rounding,
    pub cdc: CdcCarry,

    /// Wall-clock budget for the search. `None` means unbounded.
    pub time_budget: Option<Duration>,
}

impl SizingParameters {
    #[must_use]
    pub fn new(traffic: Traffic, protocol: Protocol) -> Self {
        Self {
            traffic,
            wr_latency: 0,
            rd_latency: 0,
            protocol,
            margin: Margin::none(),
            rounding: Rounding::None,
            cdc: CdcCarry::default(),
            time_budget: None,
        }
    }

    #[must_use]
    pub fn with_latencies(mut self, wr_latency: u64, rd_latency: u64) -> Self {
        self.wr_latency = wr_latency;
        self.rd_latency = rd_latency;
        self
    }

    #[must_use]
    pub fn with_margin(mut self, margin: Margin) -> Self {
        self.margin = margin;
        self
    }

    #[must_use]
    pub fn with_rounding(mut self, rounding: Rounding) -> Self {
        self.rounding = rounding;
        self
    }

    #[must_use]
    pub fn with_cdc(mut self, cdc: CdcCarry) -> Self {
        self.cdc = cdc;
        self
    }

    #[must_use]
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Check every rule that can be checked before compiling any masks.
    pub fn validate(&self) -> CheckResult {
        self.traffic.validate()?;
        if let Some(budget) = self.time_budget {
            if budget.is_zero() {
                return validation_error!("time budget must be > 0");
            }
        }
        match &self.protocol {
            Protocol::ReadyValid => Ok(()),
            Protocol::XonXoff(params) => params.validate(self.traffic.w_max()),
            Protocol::Cbfc(params) => params.validate(),
            Protocol::Replay(params) => params.validate(&self.traffic),
        }
    }
}
