// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Read a FIFO sizing spec from YAML and turn it into engine parameters.
//!
//! A spec names the protocol with `fifo_type` and describes the traffic
//! either flat (`horizon`, per-cycle caps and total bounds) or layered
//! (`write_profile` and `read_profile`). An optional `cdc` block adds a
//! clock-domain crossing in front of the same-clock FIFO.
//!
//! ```rust
//! use fathom_spec::SizingSpec;
//!
//! let spec = SizingSpec::from_string(
//!     "
//! fifo_type: ready_valid
//! horizon: 32
//! sum_w_max: 16
//! sum_r_min: 8
//! sum_r_max: 32
//! ",
//! )
//! .unwrap();
//! let result = fathom_engine::size(spec.parameters()).unwrap();
//! assert_eq!(result.depth, 16);
//! ```
//!
//! Problems are collected over the whole spec and reported together.

use std::path::Path;

use fathom_engine::cdc::{CdcParameters, CdcWindow};
use fathom_engine::horizon::{HorizonPolicy, HorizonRequest};
use fathom_engine::params::{Margin, Protocol, ProtocolKind, SizingParameters};
use fathom_engine::protocols::cbfc::{CbfcParams, CreditStrategy};
use fathom_engine::protocols::replay::ReplayParams;
use fathom_engine::protocols::xon_xoff::{
    AutoThresholds, Hysteresis, ManualThresholds, ThroughputTarget, Thresholds, XonXoffParams,
};
use fathom_engine::traffic::{FlatTraffic, LayeredTraffic, Traffic};
use fathom_engine::types::{CheckResult, SizingError, SizingOutcome};
use log::{debug, warn};

use crate::types::{CdcConfig, SpecConfig, ThresholdMode};

pub mod types;

/// Rule violations found while reading a spec.
#[derive(Default)]
struct Problems(Vec<String>);

impl Problems {
    fn push(&mut self, problem: impl Into<String>) {
        self.0.push(problem.into());
    }

    fn check(&mut self, result: CheckResult) {
        if let Err(e) = result {
            self.push(e.message());
        }
    }

    /// Take a required value, noting its absence.
    fn require<T: Default>(&mut self, value: Option<T>, name: &str, context: &str) -> T {
        value.unwrap_or_else(|| {
            self.push(format!("{name} is required {context}"));
            T::default()
        })
    }

    fn into_error(self) -> SizingError {
        match self.0.len() {
            1 => SizingError::Validation(self.0.join("")),
            n => SizingError::Validation(format!("{n} problems found: {}", self.0.join("; "))),
        }
    }

    fn into_result<T>(self, value: T) -> SizingOutcome<T> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(self.into_error())
        }
    }
}

/// A validated spec ready to be sized.
#[derive(Clone, Debug, PartialEq)]
pub struct SizingSpec {
    parameters: SizingParameters,
    cdc: Option<CdcParameters>,
}

impl SizingSpec {
    pub fn from_file(spec_path: &Path) -> SizingOutcome<Self> {
        let s = std::fs::read_to_string(spec_path).map_err(|e| {
            SizingError::Validation(format!("Unable to read {}: {e}", spec_path.display()))
        })?;
        SizingSpec::from_string(&s)
    }

    pub fn from_string(spec: &str) -> SizingOutcome<Self> {
        debug!("Input spec:\n{spec}");
        let config: SpecConfig = serde_yaml::from_str(spec)
            .map_err(|e| SizingError::Validation(format!("serde_yaml::from_str failed: {e}")))?;
        SizingSpec::from_config(&config)
    }

    pub fn from_config(config: &SpecConfig) -> SizingOutcome<Self> {
        let mut problems = Problems::default();

        let kind = match config.fifo_type {
            None => {
                problems.push("fifo_type is required (ready_valid, xon_xoff, cbfc or replay)");
                ProtocolKind::ReadyValid
            }
            Some(ProtocolKind::Cdc) => {
                problems.push(
                    "fifo_type=cdc is not a same-clock protocol; add a cdc block to a \
                     ready_valid, xon_xoff, cbfc or replay spec instead",
                );
                ProtocolKind::ReadyValid
            }
            Some(kind) => kind,
        };

        let traffic = build_traffic(config, &mut problems);
        let protocol = build_protocol(config, kind, &mut problems);
        let cdc = config
            .cdc
            .as_ref()
            .map(|cdc| build_cdc(cdc, &mut problems));

        let Some(traffic) = traffic else {
            return Err(problems.into_error());
        };
        let parameters = SizingParameters::new(traffic, protocol)
            .with_latencies(config.wr_latency, config.rd_latency)
            .with_margin(Margin {
                kind: config.margin_type,
                value: config.margin_val,
            })
            .with_rounding(config.rounding);

        // Rules that depend on several keys at once are left to the engine
        if problems.0.is_empty() {
            problems.check(parameters.validate());
        }
        if problems.0.is_empty() {
            if let Some(cdc) = &cdc {
                problems.check(
                    cdc.clone()
                        .for_traffic(&parameters.traffic, parameters.wr_latency)
                        .and_then(|cdc| cdc.validate()),
                );
            }
        }

        problems.into_result(Self { parameters, cdc })
    }

    #[must_use]
    pub fn protocol(&self) -> ProtocolKind {
        self.parameters.protocol.kind()
    }

    #[must_use]
    pub fn parameters(&self) -> &SizingParameters {
        &self.parameters
    }

    /// Parameters of the clock-domain crossing, when the spec has one.
    #[must_use]
    pub fn cdc_parameters(&self) -> Option<&CdcParameters> {
        self.cdc.as_ref()
    }
}

fn build_traffic(config: &SpecConfig, problems: &mut Problems) -> Option<Traffic> {
    match (config.write_profile, config.read_profile) {
        (None, None) => {
            const FLAT: &str = "for flat traffic";
            for key in [
                ("kmin_blocks", config.kmin_blocks),
                ("blind_window_cycles", config.blind_window_cycles),
            ]
            .into_iter()
            .filter_map(|(name, value)| value.map(|_| name))
            {
                problems.push(format!("{key} only applies to layered traffic"));
            }
            Some(Traffic::Flat(FlatTraffic {
                horizon: problems.require(config.horizon, "horizon (an integer)", FLAT),
                w_max: config.w_max.unwrap_or(1),
                r_max: config.r_max.unwrap_or(1),
                sum_w_min: config.sum_w_min.unwrap_or(0),
                sum_w_max: problems.require(config.sum_w_max, "sum_w_max", FLAT),
                sum_r_min: config.sum_r_min.unwrap_or(0),
                sum_r_max: problems.require(config.sum_r_max, "sum_r_max", FLAT),
            }))
        }
        (Some(write), Some(read)) => {
            for key in config.flat_keys() {
                problems.push(format!(
                    "{key} is derived from the profiles and cannot be set for layered traffic"
                ));
            }
            Some(Traffic::Layered(LayeredTraffic {
                write,
                read,
                horizon: HorizonPolicy {
                    request: config
                        .horizon
                        .map_or(HorizonRequest::Auto, HorizonRequest::Cycles),
                    kmin_blocks: config.kmin_blocks,
                    blind_window_cycles: config.blind_window_cycles.unwrap_or(0),
                },
            }))
        }
        (Some(_), None) => {
            problems.push("read_profile is required when write_profile is given");
            None
        }
        (None, Some(_)) => {
            problems.push("write_profile is required when read_profile is given");
            None
        }
    }
}

fn build_protocol(config: &SpecConfig, kind: ProtocolKind, problems: &mut Problems) -> Protocol {
    match kind {
        ProtocolKind::XonXoff => Protocol::XonXoff(build_xon_xoff(config, problems)),
        ProtocolKind::Cbfc => Protocol::Cbfc(build_cbfc(config)),
        ProtocolKind::Replay => Protocol::Replay(ReplayParams {
            rtt: problems.require(config.rtt, "rtt", "for replay"),
            atomic_tail: config.atomic_tail,
        }),
        ProtocolKind::ReadyValid | ProtocolKind::Cdc => Protocol::ReadyValid,
    }
}

fn build_xon_xoff(config: &SpecConfig, problems: &mut Problems) -> XonXoffParams {
    let thresholds = match config.thresholds {
        ThresholdMode::Manual => {
            const MANUAL: &str = "with thresholds: manual";
            if config.xon_min.is_some() || config.xoff_range.is_some() {
                warn!("xon_min and xoff_range are ignored {MANUAL}");
            }
            Thresholds::Manual(ManualThresholds {
                xon: problems.require(config.xon, "xon", MANUAL),
                xoff: problems.require(config.xoff, "xoff", MANUAL),
                throughput_target: config.throughput_target,
            })
        }
        ThresholdMode::Auto => {
            if config.xon.is_some() || config.xoff.is_some() {
                warn!("xon and xoff are ignored with thresholds: auto");
            }
            Thresholds::Auto(AutoThresholds {
                throughput_target: config
                    .throughput_target
                    .map_or(ThroughputTarget::Auto, ThroughputTarget::Fraction),
                xon_min: config.xon_min,
                xoff_range: config.xoff_range,
                hysteresis: config
                    .hysteresis
                    .map_or_else(Hysteresis::default, |[min, max]| Hysteresis { min, max }),
                prefer_small_band: config.prefer_small_band,
                prefer_low_xoff: config.prefer_low_xoff,
            })
        }
    };
    XonXoffParams {
        atomic_tail: config.atomic_tail,
        react_latency: config.react_latency,
        resume_latency: config.resume_latency,
        w_throttle_max: config.w_throttle_max,
        thresholds,
    }
}

fn build_cbfc(config: &SpecConfig) -> CbfcParams {
    let optimize = config.cred_auto_optimize.unwrap_or(true);
    let credits = match (config.cred_init, config.cred_max) {
        (Some(cred_init), Some(cred_max)) => {
            if config.cred_auto_optimize.is_some() {
                warn!("cred_auto_optimize is ignored when both credit counts are given");
            }
            CreditStrategy::Manual {
                cred_init,
                cred_max,
            }
        }
        (cred_init, cred_max) => CreditStrategy::Auto {
            cred_init,
            cred_max,
            optimize,
        },
    };
    CbfcParams {
        credits,
        cred_gran: config.cred_gran.unwrap_or(1),
        cred_ret_latency: config.cred_ret_latency,
        cred_margin: Margin {
            kind: config.cred_margin_type,
            value: config.cred_margin_val,
        },
        cred_rounding: config.cred_rounding,
    }
}

fn build_cdc(config: &CdcConfig, problems: &mut Problems) -> CdcParameters {
    let defaults = CdcParameters::new(config.wr_clk_freq, config.rd_clk_freq);
    let params = CdcParameters {
        big_fifo_domain: config.big_fifo_domain,
        wr_clk_ppm: config.wr_clk_ppm,
        rd_clk_ppm: config.rd_clk_ppm,
        wptr_inc_cycles: config.wptr_inc_cycles.unwrap_or(defaults.wptr_inc_cycles),
        wptr_sync_slip_cycles: config
            .wptr_sync_slip_cycles
            .unwrap_or(defaults.wptr_sync_slip_cycles),
        wptr_sync_stages: config.wptr_sync_stages.unwrap_or(defaults.wptr_sync_stages),
        rd_react_cycles: config.rd_react_cycles.unwrap_or(defaults.rd_react_cycles),
        rptr_inc_cycles: config.rptr_inc_cycles.unwrap_or(defaults.rptr_inc_cycles),
        rptr_sync_slip_cycles: config
            .rptr_sync_slip_cycles
            .unwrap_or(defaults.rptr_sync_slip_cycles),
        rptr_sync_stages: config.rptr_sync_stages.unwrap_or(defaults.rptr_sync_stages),
        wr_full_update_cycles: config
            .wr_full_update_cycles
            .unwrap_or(defaults.wr_full_update_cycles),
        window: config
            .window_cycles
            .map_or(CdcWindow::Auto, CdcWindow::Cycles),
        depth_model: config.depth_model,
        margin: Margin {
            kind: config.margin_type,
            value: config.margin_val,
        },
        rounding: config.rounding,
        ..defaults
    };

    // Clock and synchronizer rules do not depend on the traffic
    problems.check(
        CdcParameters {
            window: CdcWindow::Cycles(1),
            ..params.clone()
        }
        .validate(),
    );
    params
}
