// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use fathom_engine::cdc::{CdcDepthModel, CdcParameters, CdcWindow, FifoDomain};
use fathom_engine::params::{CdcCarry, Margin, Protocol, Rounding, SizingParameters};
use fathom_engine::test_helpers::flat;
use fathom_engine::{cdc_depth, size_with_cdc};

const GHZ: u64 = 1_000_000_000;

fn fast_to_slow() -> CdcParameters {
    CdcParameters {
        window: CdcWindow::Cycles(100),
        ..CdcParameters::new(2 * GHZ, GHZ)
    }
}

#[test]
fn fast_writer_decomposition() {
    let result = cdc_depth(&fast_to_slow()).unwrap();
    assert_eq!(result.base_sync_fifo_depth, 50);
    assert_eq!(result.rd_sync_cycles_in_wr, 6);
    assert_eq!(result.synchronizer_depth, 6);
    assert_eq!(result.phase_margin_depth, 2);
    assert_eq!(result.ppm_drift_depth, 0);
    assert_eq!(result.credit_loop_depth, 14);
    assert_eq!(result.depth, 8);
    assert_eq!(result.window_cycles, 100);
    assert!(result.basic_checks_pass);
    assert_eq!(
        result.carry(),
        CdcCarry {
            base_sync_fifo_depth: 50,
            rd_sync_cycles_in_wr: 6,
        }
    );
}

#[test]
fn credit_loop_model() {
    let params = CdcParameters {
        depth_model: CdcDepthModel::CreditLoop,
        ..fast_to_slow()
    };
    let result = cdc_depth(&params).unwrap();
    assert_eq!(result.depth_model, CdcDepthModel::CreditLoop);
    assert_eq!(result.depth, 16);
}

#[test]
fn slow_writer_needs_no_base_fifo() {
    let params = CdcParameters {
        window: CdcWindow::Cycles(100),
        ..CdcParameters::new(GHZ, 2 * GHZ)
    };
    let result = cdc_depth(&params).unwrap();
    assert_eq!(result.base_sync_fifo_depth, 0);
    assert_eq!(result.rd_sync_cycles_in_wr, 2);
    assert_eq!(result.phase_margin_depth, 1);
    assert_eq!(result.credit_loop_depth, 7);
    assert_eq!(result.depth, 3);
}

#[test]
fn read_domain_window_with_drift() {
    let params = CdcParameters {
        big_fifo_domain: FifoDomain::Read,
        window: CdcWindow::Cycles(50),
        items_per_cycle: 4,
        wr_clk_ppm: 100,
        rd_clk_ppm: 100,
        ..CdcParameters::new(GHZ, GHZ / 2)
    };
    let result = cdc_depth(&params).unwrap();
    assert_eq!(result.window_cycles, 100);
    assert_eq!(result.base_sync_fifo_depth, 200);
    assert_eq!(result.synchronizer_depth, 24);
    assert_eq!(result.phase_margin_depth, 8);
    assert_eq!(result.ppm_drift_depth, 8);
    assert_eq!(result.depth, 40);

    let margined = CdcParameters {
        margin: Margin::percentage(10),
        ..params.clone()
    };
    assert_eq!(cdc_depth(&margined).unwrap().depth, 44);

    let rounded = CdcParameters {
        rounding: Rounding::Power2,
        ..params
    };
    assert_eq!(cdc_depth(&rounded).unwrap().depth, 64);
}

#[test]
fn composed_with_same_clock_run() {
    let traffic = flat(32, 1, 1, (0, 16), (8, 32));
    let params = SizingParameters::new(traffic, Protocol::ReadyValid);
    let (cdc, result) = size_with_cdc(&params, CdcParameters::new(2 * GHZ, GHZ)).unwrap();
    assert_eq!(cdc.window_cycles, 32);
    assert_eq!(cdc.base_sync_fifo_depth, 16);
    assert_eq!(result.occ_peak, 16);
    assert_eq!(result.depth, 32);
}

#[test]
#[should_panic(expected = "cdc.window_cycles is auto")]
fn unresolved_window() {
    cdc_depth(&CdcParameters::new(2 * GHZ, GHZ)).unwrap();
}

#[test]
#[should_panic(expected = "cdc.wr_clk_freq must be > 0 Hz")]
fn zero_write_clock() {
    cdc_depth(&CdcParameters {
        window: CdcWindow::Cycles(10),
        ..CdcParameters::new(0, GHZ)
    })
    .unwrap();
}

#[test]
#[should_panic(expected = "cdc.wptr_sync_stages must be >= 1")]
fn zero_sync_stages() {
    cdc_depth(&CdcParameters {
        wptr_sync_stages: 0,
        ..fast_to_slow()
    })
    .unwrap();
}
