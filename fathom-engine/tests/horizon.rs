// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use fathom_engine::horizon::{
    HorizonPolicy, HorizonRequest, ceil_to_multiple, overall_period, resolve_horizon,
    sufficiency_warning,
};

#[test]
fn overall_period_is_lcm() {
    assert_eq!(overall_period(64, 64), 64);
    assert_eq!(overall_period(6, 4), 12);
    assert_eq!(overall_period(7, 5), 35);
}

#[test]
fn ceil_to_multiple_rounds_up() {
    assert_eq!(ceil_to_multiple(0, 8), 0);
    assert_eq!(ceil_to_multiple(1, 8), 8);
    assert_eq!(ceil_to_multiple(16, 8), 16);
    assert_eq!(ceil_to_multiple(17, 8), 24);
}

#[test]
fn auto_horizon_uses_kmin_blocks() {
    assert_eq!(resolve_horizon(&HorizonPolicy::auto(), 12).unwrap(), 48);

    let policy = HorizonPolicy {
        kmin_blocks: Some(2),
        ..HorizonPolicy::auto()
    };
    assert_eq!(resolve_horizon(&policy, 12).unwrap(), 24);
}

#[test]
fn explicit_horizon_is_kept() {
    assert_eq!(resolve_horizon(&HorizonPolicy::cycles(64), 64).unwrap(), 64);
    assert_eq!(resolve_horizon(&HorizonPolicy::cycles(100), 12).unwrap(), 108);
}

#[test]
fn explicit_horizon_honours_given_kmin() {
    let policy = HorizonPolicy {
        request: HorizonRequest::Cycles(10),
        kmin_blocks: Some(4),
        blind_window_cycles: 0,
    };
    assert_eq!(resolve_horizon(&policy, 12).unwrap(), 48);
}

#[test]
fn blind_window_extends_horizon() {
    let policy = HorizonPolicy {
        blind_window_cycles: 50,
        ..HorizonPolicy::auto()
    };
    // 4 * 50 = 200 rounded up to a multiple of 12
    assert_eq!(resolve_horizon(&policy, 12).unwrap(), 204);
}

#[test]
fn sufficiency() {
    assert!(sufficiency_warning(64, 32, 1, 32, 1).is_none());
    let warning = sufficiency_warning(63, 32, 1, 32, 1).unwrap();
    assert!(warning.contains("horizon=63"));
    assert!(sufficiency_warning(64, 64, 2, 32, 1).is_none());
}

#[test]
#[should_panic(expected = "kmin_blocks must be >= 1")]
fn zero_kmin_rejected() {
    let policy = HorizonPolicy {
        kmin_blocks: Some(0),
        ..HorizonPolicy::auto()
    };
    resolve_horizon(&policy, 12).unwrap();
}

#[test]
#[should_panic(expected = "horizon must be > 0")]
fn zero_horizon_rejected() {
    resolve_horizon(&HorizonPolicy::cycles(0), 12).unwrap();
}
