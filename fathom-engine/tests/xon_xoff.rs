// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use approx::assert_relative_eq;
use fathom_engine::params::{CdcCarry, Protocol, SizingParameters};
use fathom_engine::protocols::xon_xoff::{
    AutoThresholds, Hysteresis, HysteresisBound, ManualThresholds, ThroughputTarget, Thresholds,
    XonXoffParams, throughput_upper_bound,
};
use fathom_engine::result::SolverPath;
use fathom_engine::size;
use fathom_engine::test_helpers::{flat, reference_params};
use fathom_engine::traffic::Traffic;

fn auto_with(target: ThroughputTarget) -> XonXoffParams {
    XonXoffParams {
        thresholds: Thresholds::Auto(AutoThresholds {
            throughput_target: target,
            ..AutoThresholds::default()
        }),
        ..XonXoffParams::auto()
    }
}

fn flat_traffic() -> Traffic {
    flat(32, 1, 1, (0, 24), (8, 32))
}

#[test]
fn reference_auto() {
    let result = size(&reference_params(Protocol::XonXoff(XonXoffParams::auto()))).unwrap();
    assert_eq!(result.solver_path, SolverPath::FlowControlSearch);
    assert_eq!(result.xon_xoff(), Some((12, 13)));
    assert_eq!(result.occ_peak, 14);
    assert_eq!(result.t_star, 9);
    assert_eq!(result.depth, 14);
    assert_relative_eq!(result.throughput().unwrap(), 0.25);
    assert!(result.basic_checks_pass);
}

#[test]
fn reference_auto_with_reachable_target() {
    let params = reference_params(Protocol::XonXoff(auto_with(ThroughputTarget::Fraction(
        0.25,
    ))));
    let result = size(&params).unwrap();
    assert_eq!(result.xon_xoff(), Some((12, 13)));
    assert_eq!(result.depth, 14);
    assert!(result.basic_checks_pass);
}

#[test]
#[should_panic(expected = "No (xon, xoff) combination met")]
fn reference_auto_with_unreachable_target() {
    let params = reference_params(Protocol::XonXoff(auto_with(ThroughputTarget::Fraction(0.5))));
    size(&params).unwrap();
}

#[test]
fn reference_auto_with_atomic_tail() {
    let xon_xoff = XonXoffParams {
        atomic_tail: 2,
        ..XonXoffParams::auto()
    };
    let result = size(&reference_params(Protocol::XonXoff(xon_xoff))).unwrap();
    assert_eq!(result.occ_peak, 14);
    assert_eq!(result.depth, 16);
    assert_eq!(result.xon_xoff(), Some((12, 13)));
}

#[test]
fn reference_manual() {
    let result = size(&reference_params(Protocol::XonXoff(XonXoffParams::manual(
        14, 17,
    ))))
    .unwrap();
    assert_eq!(result.xon_xoff(), Some((14, 17)));
    assert_eq!(result.occ_peak, 18);
    assert_eq!(result.t_star, 13);
    assert_eq!(result.depth, 18);
}

#[test]
fn reference_manual_low_thresholds() {
    let result = size(&reference_params(Protocol::XonXoff(XonXoffParams::manual(8, 12)))).unwrap();
    assert_eq!(result.occ_peak, 13);
    assert_eq!(result.t_star, 9);
    assert_eq!(result.depth, 13);
}

#[test]
#[should_panic(expected = "xon=8, xoff=11 cannot write 0 items and read sum_r_min=32")]
fn reference_manual_starves_reader() {
    size(&reference_params(Protocol::XonXoff(XonXoffParams::manual(8, 11)))).unwrap();
}

#[test]
#[should_panic(expected = "xon=14, xoff=17 cannot write 50 items")]
fn reference_manual_misses_target() {
    let xon_xoff = XonXoffParams {
        thresholds: Thresholds::Manual(ManualThresholds {
            xon: 14,
            xoff: 17,
            throughput_target: Some(0.4),
        }),
        ..XonXoffParams::auto()
    };
    size(&reference_params(Protocol::XonXoff(xon_xoff))).unwrap();
}

#[test]
fn flat_manual() {
    let params = SizingParameters::new(flat_traffic(), Protocol::XonXoff(XonXoffParams::manual(4, 8)));
    let result = size(&params).unwrap();
    assert_eq!(result.occ_peak, 8);
    assert_eq!(result.t_star, 8);
    assert_eq!(result.depth, 8);
}

#[test]
fn reaction_latency_adds_overshoot() {
    let xon_xoff = XonXoffParams {
        react_latency: 2,
        ..XonXoffParams::manual(4, 8)
    };
    let result = size(&SizingParameters::new(flat_traffic(), Protocol::XonXoff(xon_xoff))).unwrap();
    assert_eq!(result.occ_peak, 10);
    assert_eq!(result.t_star, 10);
}

#[test]
fn paced_writer_overshoots_further() {
    // Filling to just below xoff and then writing a full burst as pause is
    // raised beats writing at full rate from the start.
    let xon_xoff = XonXoffParams {
        react_latency: 2,
        ..XonXoffParams::manual(4, 8)
    };
    let traffic = flat(16, 4, 1, (0, 64), (0, 16));
    let result = size(&SizingParameters::new(traffic, Protocol::XonXoff(xon_xoff))).unwrap();
    assert_eq!(result.occ_peak, 19);
    assert_eq!(result.t_star, 5);
    assert_eq!(result.depth, 19);
    result.witness.check(19, 5, 64).unwrap();
}

#[test]
fn soft_throttle_keeps_filling() {
    let xon_xoff = XonXoffParams {
        w_throttle_max: 1,
        ..XonXoffParams::manual(4, 8)
    };
    let traffic = flat(32, 2, 1, (0, 48), (8, 32));
    let result = size(&SizingParameters::new(traffic, Protocol::XonXoff(xon_xoff))).unwrap();
    assert_eq!(result.occ_peak, 32);
    assert_eq!(result.t_star, 31);
}

#[test]
fn flat_auto_with_latencies() {
    let xon_xoff = XonXoffParams {
        react_latency: 2,
        resume_latency: 1,
        ..XonXoffParams::auto()
    };
    let params = SizingParameters::new(flat_traffic(), Protocol::XonXoff(xon_xoff))
        .with_latencies(2, 2);
    let result = size(&params).unwrap();
    assert_eq!(result.xon_xoff(), Some((5, 6)));
    assert_eq!(result.occ_peak, 10);
    assert_eq!(result.t_star, 25);
    assert_eq!(result.depth, 10);
    // The chosen pair still carries its duty-cycle share of the writes
    assert_relative_eq!(result.throughput().unwrap(), 23.0 / 32.0);
}

#[test]
#[should_panic(expected = "met the throughput and read requirements (1 pairs tried)")]
fn auto_target_rejects_throttling_pair() {
    // Only four items can ever be read, so a pair that pauses at one item
    // throttles the writer far below the duty-cycle bound.
    let traffic = flat(16, 1, 1, (0, 16), (4, 4));
    size(&SizingParameters::new(traffic, Protocol::XonXoff(XonXoffParams::auto()))).unwrap();
}

#[test]
fn zero_target_accepts_throttling_pair() {
    let traffic = flat(16, 1, 1, (0, 16), (4, 4));
    let params = SizingParameters::new(
        traffic,
        Protocol::XonXoff(auto_with(ThroughputTarget::Fraction(0.0))),
    );
    let result = size(&params).unwrap();
    assert_eq!(result.xon_xoff(), Some((0, 1)));
    assert_eq!(result.depth, 1);
}

#[test]
fn cdc_base_is_added_to_thresholds() {
    let params = SizingParameters::new(flat_traffic(), Protocol::XonXoff(XonXoffParams::manual(4, 8)))
        .with_cdc(CdcCarry {
            base_sync_fifo_depth: 5,
            rd_sync_cycles_in_wr: 0,
        });
    let result = size(&params).unwrap();
    assert_eq!(result.occ_peak, 8);
    assert_eq!(result.depth, 13);
    assert_eq!(result.xon_xoff(), Some((9, 13)));
}

#[test]
fn witness_carries_pause_traces() {
    let params = SizingParameters::new(flat_traffic(), Protocol::XonXoff(XonXoffParams::manual(4, 8)));
    let result = size(&params).unwrap();
    let names: Vec<&str> = result.witness.traces().iter().map(|(name, _)| *name).collect();
    assert_eq!(names, ["in_pause", "throttle_active"]);
    for (_, values) in result.witness.traces() {
        assert_eq!(values.len(), 32);
        assert!(values.iter().all(|v| *v <= 1));
    }
}

#[test]
fn hysteresis_bands() {
    assert_eq!(HysteresisBound::Ratio(1.0).min_band(12), 1);
    assert_eq!(HysteresisBound::Ratio(1.5).min_band(4), 2);
    assert_eq!(HysteresisBound::Ratio(1.5).max_band(4), 2);
    assert_eq!(HysteresisBound::Ratio(1.5).max_band(0), 1);
    assert_eq!(HysteresisBound::Ratio(1.2).min_band(5), 1);
    assert_eq!(HysteresisBound::Band(3).min_band(100), 3);
    assert_eq!(HysteresisBound::Band(0).min_band(100), 1);
    assert_eq!(HysteresisBound::Band(3).max_band(100), 3);

    let hysteresis = Hysteresis::default();
    assert!(hysteresis.contains(12, 13));
    assert!(hysteresis.contains(12, 18));
    assert!(!hysteresis.contains(12, 19));
}

#[test]
fn duty_cycle_bound() {
    assert_relative_eq!(throughput_upper_bound(0.5, 0.25, 4, 0), 0.25);
    assert_relative_eq!(throughput_upper_bound(0.5, 0.5, 4, 0), 0.5);
    assert_relative_eq!(throughput_upper_bound(0.5, 0.0, 4, 0), 0.5);
    assert!(throughput_upper_bound(0.5, 0.25, 4, 4) > 0.25);
}

#[test]
#[should_panic(expected = "xon=8 must be < xoff=8")]
fn xon_must_be_below_xoff() {
    let params = SizingParameters::new(flat_traffic(), Protocol::XonXoff(XonXoffParams::manual(8, 8)));
    size(&params).unwrap();
}

#[test]
#[should_panic(expected = "w_throttle_max=2 must be <= w_max=1")]
fn throttle_above_write_cap() {
    let xon_xoff = XonXoffParams {
        w_throttle_max: 2,
        ..XonXoffParams::auto()
    };
    size(&SizingParameters::new(flat_traffic(), Protocol::XonXoff(xon_xoff))).unwrap();
}

#[test]
#[should_panic(expected = "hysteresis ratio bounds are xoff/xon and must be >= 1.0")]
fn ratio_below_one() {
    let xon_xoff = XonXoffParams {
        thresholds: Thresholds::Auto(AutoThresholds {
            hysteresis: Hysteresis {
                min: HysteresisBound::Ratio(0.5),
                max: HysteresisBound::Ratio(1.5),
            },
            ..AutoThresholds::default()
        }),
        ..XonXoffParams::auto()
    };
    size(&SizingParameters::new(flat_traffic(), Protocol::XonXoff(xon_xoff))).unwrap();
}

#[test]
#[should_panic(expected = "No feasible xoff after bounds tightening")]
fn empty_xoff_range() {
    let xon_xoff = XonXoffParams {
        thresholds: Thresholds::Auto(AutoThresholds {
            xon_min: Some(10),
            xoff_range: Some((2, 6)),
            ..AutoThresholds::default()
        }),
        ..XonXoffParams::auto()
    };
    size(&SizingParameters::new(flat_traffic(), Protocol::XonXoff(xon_xoff))).unwrap();
}
