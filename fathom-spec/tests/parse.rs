// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use fathom_engine::cdc::{CdcDepthModel, CdcParameters, CdcWindow, FifoDomain};
use fathom_engine::horizon::{HorizonPolicy, HorizonRequest};
use fathom_engine::params::{Margin, Protocol, ProtocolKind, Rounding, SizingParameters};
use fathom_engine::protocols::cbfc::{CbfcParams, CreditStrategy};
use fathom_engine::protocols::replay::ReplayParams;
use fathom_engine::protocols::xon_xoff::{
    AutoThresholds, Hysteresis, HysteresisBound, ManualThresholds, ThroughputTarget, Thresholds,
    XonXoffParams,
};
use fathom_engine::size;
use fathom_engine::test_helpers::{flat, layered, reference_params, reference_profile};
use fathom_engine::traffic::Traffic;
use fathom_spec::SizingSpec;
use fathom_spec::types::parse_frequency_str;

const REFERENCE_PROFILES: &str = "
horizon: 64
write_profile:
  cycle:
    max_items_per_cycle: 2
  transaction:
    valid_cycles: 4
    gap_cycles: 2
  burst:
    transactions_per_burst: 8
    gap_cycles: 16
read_profile:
  cycle:
    max_items_per_cycle: 1
  transaction:
    valid_cycles: 4
    gap_cycles: 2
  burst:
    transactions_per_burst: 8
    gap_cycles: 16
";

fn reference_spec(protocol_keys: &str) -> SizingSpec {
    SizingSpec::from_string(&format!("{protocol_keys}\n{REFERENCE_PROFILES}")).unwrap()
}

#[test]
fn flat_ready_valid() {
    let spec = SizingSpec::from_string(
        "
fifo_type: ready_valid
horizon: 128
w_max: 2
sum_w_min: 4
sum_w_max: 40
sum_r_min: 10
sum_r_max: 64
wr_latency: 3
rd_latency: 2
margin_type: percentage
margin_val: 10
rounding: power2
",
    )
    .unwrap();
    assert_eq!(spec.protocol(), ProtocolKind::ReadyValid);
    assert!(spec.cdc_parameters().is_none());
    assert_eq!(
        *spec.parameters(),
        SizingParameters::new(flat(128, 2, 1, (4, 40), (10, 64)), Protocol::ReadyValid)
            .with_latencies(3, 2)
            .with_margin(Margin::percentage(10))
            .with_rounding(Rounding::Power2)
    );
}

#[test]
fn layered_reference() {
    let spec = reference_spec("fifo_type: ready_valid");
    assert_eq!(*spec.parameters(), reference_params(Protocol::ReadyValid));
    let result = size(spec.parameters()).unwrap();
    assert_eq!(result.depth, 44);
}

#[test]
fn layered_defaults() {
    let spec = SizingSpec::from_string(
        "
fifo_type: ready_valid
kmin_blocks: 2
blind_window_cycles: 10
write_profile:
  transaction: {valid_cycles: 4, gap_cycles: 2}
  burst: {transactions_per_burst: 8, gap_cycles: 16}
  stream: {bursts_per_stream: 2}
read_profile:
  transaction: {valid_cycles: 4}
  burst: {transactions_per_burst: 8}
",
    )
    .unwrap();
    let Traffic::Layered(traffic) = spec.parameters().traffic else {
        panic!("expected layered traffic");
    };
    assert_eq!(traffic.write.cycle, None);
    assert_eq!(traffic.write.items_per_cycle(), 1);
    assert_eq!(traffic.write.bursts_per_stream(), 2);
    assert_eq!(traffic.read.transaction.gap_cycles, 0);
    assert_eq!(
        traffic.horizon,
        HorizonPolicy {
            request: HorizonRequest::Auto,
            kmin_blocks: Some(2),
            blind_window_cycles: 10,
        }
    );
}

#[test]
fn xon_xoff_auto() {
    let spec = reference_spec(
        "
fifo_type: xon_xoff
react_latency: 1
throughput_target: auto
xon_min: auto
xoff_range: [4, 40]
hysteresis: [2, 1.5]
prefer_small_band: true
",
    );
    let Protocol::XonXoff(params) = spec.parameters().protocol else {
        panic!("expected xon_xoff");
    };
    assert_eq!(params.react_latency, 1);
    assert_eq!(
        params.thresholds,
        Thresholds::Auto(AutoThresholds {
            throughput_target: ThroughputTarget::Auto,
            xon_min: None,
            xoff_range: Some((4, 40)),
            hysteresis: Hysteresis {
                min: HysteresisBound::Band(2),
                max: HysteresisBound::Ratio(1.5),
            },
            prefer_small_band: true,
            prefer_low_xoff: false,
        })
    );
}

#[test]
fn xon_xoff_default_is_auto() {
    let spec = reference_spec("fifo_type: xon_xoff");
    assert_eq!(
        spec.parameters().protocol,
        Protocol::XonXoff(XonXoffParams::auto())
    );
    let result = size(spec.parameters()).unwrap();
    assert_eq!(result.xon_xoff(), Some((12, 13)));
}

#[test]
fn xon_xoff_manual() {
    let spec = reference_spec(
        "
fifo_type: xon_xoff
thresholds: manual
xon: 14
xoff: 17
throughput_target: 0.2
",
    );
    let Protocol::XonXoff(params) = spec.parameters().protocol else {
        panic!("expected xon_xoff");
    };
    assert_eq!(
        params.thresholds,
        Thresholds::Manual(ManualThresholds {
            xon: 14,
            xoff: 17,
            throughput_target: Some(0.2),
        })
    );
}

#[test]
fn cbfc_credit_strategies() {
    let spec = reference_spec("fifo_type: cbfc");
    assert_eq!(
        spec.parameters().protocol,
        Protocol::Cbfc(CbfcParams::default())
    );

    let spec = reference_spec(
        "
fifo_type: cbfc
cred_init: 48
cred_max: 64
cred_gran: 2
cred_ret_latency: 3
cred_margin_type: percentage
cred_margin_val: 25
cred_rounding: power2
",
    );
    assert_eq!(
        spec.parameters().protocol,
        Protocol::Cbfc(CbfcParams {
            credits: CreditStrategy::Manual {
                cred_init: 48,
                cred_max: 64,
            },
            cred_gran: 2,
            cred_ret_latency: 3,
            cred_margin: Margin::percentage(25),
            cred_rounding: Rounding::Power2,
        })
    );

    let spec = reference_spec(
        "
fifo_type: cbfc
cred_init: auto
cred_max: 64
cred_auto_optimize: false
",
    );
    let Protocol::Cbfc(params) = spec.parameters().protocol else {
        panic!("expected cbfc");
    };
    assert_eq!(
        params.credits,
        CreditStrategy::Auto {
            cred_init: None,
            cred_max: Some(64),
            optimize: false,
        }
    );
}

#[test]
fn replay() {
    let spec = SizingSpec::from_string(
        "
fifo_type: replay
horizon: 32
w_max: 2
r_max: 2
sum_w_max: 64
sum_r_max: 64
rtt: 8
atomic_tail: 1
",
    )
    .unwrap();
    assert_eq!(
        spec.parameters().protocol,
        Protocol::Replay(ReplayParams {
            rtt: 8,
            atomic_tail: 1,
        })
    );
    assert_eq!(size(spec.parameters()).unwrap().depth, 17);
}

#[test]
fn cdc_block() {
    let spec = SizingSpec::from_string(
        "
fifo_type: ready_valid
horizon: 32
sum_w_max: 16
sum_r_max: 32
cdc:
  wr_clk_freq: 2 GHz
  rd_clk_freq: 1000000000
  big_fifo_domain: read
  wr_clk_ppm: 50
  wptr_sync_stages: 3
  window_cycles: 100
  depth_model: credit_loop
  margin_type: absolute
  margin_val: 2
",
    )
    .unwrap();
    let expected = CdcParameters {
        big_fifo_domain: FifoDomain::Read,
        wr_clk_ppm: 50,
        wptr_sync_stages: 3,
        window: CdcWindow::Cycles(100),
        depth_model: CdcDepthModel::CreditLoop,
        margin: Margin::absolute(2),
        ..CdcParameters::new(2_000_000_000, 1_000_000_000)
    };
    assert_eq!(spec.cdc_parameters(), Some(&expected));
}

#[test]
fn cdc_window_defaults_to_auto() {
    let spec = SizingSpec::from_string(
        "
fifo_type: ready_valid
horizon: 32
sum_w_max: 16
sum_r_max: 32
cdc:
  wr_clk_freq: 1.1 GHz
  rd_clk_freq: 800 MHz
",
    )
    .unwrap();
    let cdc = spec.cdc_parameters().unwrap();
    assert_eq!(cdc.window, CdcWindow::Auto);
    assert_eq!(cdc.wr_clk_hz, 1_100_000_000);
    assert_eq!(cdc.rd_clk_hz, 800_000_000);
}

#[test]
fn frequencies() {
    assert_eq!(parse_frequency_str("1 GHz"), Ok(1_000_000_000));
    assert_eq!(parse_frequency_str("1.1GHz"), Ok(1_100_000_000));
    assert_eq!(parse_frequency_str("800 MHz"), Ok(800_000_000));
    assert_eq!(parse_frequency_str("32.768 kHz"), Ok(32_768));
    assert_eq!(parse_frequency_str("0.5 Hz"), Ok(0));
    assert_eq!(parse_frequency_str("1250"), Ok(1250));
    assert!(parse_frequency_str("1 THz").is_err());
    assert!(parse_frequency_str("GHz").is_err());
    assert!(parse_frequency_str("1.2.3 MHz").is_err());
}

#[test]
fn from_file() {
    let path = std::env::temp_dir().join("fathom_spec_from_file.yaml");
    std::fs::write(
        &path,
        "fifo_type: ready_valid\nhorizon: 16\nsum_w_max: 8\nsum_r_max: 16\n",
    )
    .unwrap();
    let spec = SizingSpec::from_file(&path).unwrap();
    assert_eq!(
        spec.parameters().traffic,
        flat(16, 1, 1, (0, 8), (0, 16))
    );
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn layered_reference_matches_helpers() {
    let spec = reference_spec("fifo_type: ready_valid");
    assert_eq!(
        spec.parameters().traffic,
        layered(
            reference_profile(2),
            reference_profile(1),
            HorizonPolicy::cycles(64)
        )
    );
}
