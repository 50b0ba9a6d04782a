// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use fathom_engine::budget::Deadline;
use fathom_engine::flow_control::{
    FlowProblem, OpenGate, Requirements, WriteGate, any_run_meets, worst_case_run,
};
use fathom_engine::protocols::cbfc::{CbfcParams, CreditGate};
use fathom_engine::protocols::xon_xoff::{HysteresisGate, XonXoffParams};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CAPS: [u64; 8] = [1; 8];

fn problem() -> FlowProblem<'static> {
    FlowProblem {
        write_caps: &CAPS,
        read_caps: &CAPS,
        wr_latency: 0,
        rd_latency: 0,
        sum_w_max: 8,
        sum_r_max: 8,
    }
}

fn requirements(min_written: u64, min_read: u64) -> Requirements {
    Requirements {
        min_written,
        min_read,
    }
}

#[test]
fn worst_case_without_read_requirement() {
    let run = worst_case_run(
        &problem(),
        OpenGate,
        requirements(8, 0),
        &Deadline::unlimited(),
    )
    .unwrap()
    .unwrap();
    assert_eq!(run.occ_peak, 8);
    assert_eq!(run.t_star, 8);
    assert_eq!(run.written, 8);
    assert!(run.witness.traces().is_empty());
}

#[test]
fn worst_case_honours_read_requirement() {
    let run = worst_case_run(
        &problem(),
        OpenGate,
        requirements(8, 4),
        &Deadline::unlimited(),
    )
    .unwrap()
    .unwrap();
    assert_eq!(run.occ_peak, 4);
    assert_eq!(run.t_star, 4);
    assert!(run.read >= 4);
    run.witness.check(run.occ_peak, run.t_star, 8).unwrap();
}

#[test]
fn unmet_requirements() {
    let deadline = Deadline::unlimited();
    let run = worst_case_run(&problem(), OpenGate, requirements(8, 9), &deadline).unwrap();
    assert!(run.is_none());
    assert!(!any_run_meets(&problem(), OpenGate, requirements(8, 9), &deadline).unwrap());
    assert!(any_run_meets(&problem(), OpenGate, requirements(8, 8), &deadline).unwrap());
}

#[test]
fn empty_buffer_has_no_peak_cycle() {
    let problem = FlowProblem {
        sum_w_max: 0,
        ..problem()
    };
    let run = worst_case_run(&problem, OpenGate, requirements(0, 0), &Deadline::unlimited())
        .unwrap()
        .unwrap();
    assert_eq!((run.occ_peak, run.t_star), (0, 0));
}

#[test]
fn writer_paces_itself_under_hysteresis() {
    // Writing 4 items per cycle right up to xoff and holding back just
    // below it lets a late pause overshoot further than a greedy writer.
    let write_caps = [4; 16];
    let read_caps = [1; 16];
    let problem = FlowProblem {
        write_caps: &write_caps,
        read_caps: &read_caps,
        wr_latency: 0,
        rd_latency: 0,
        sum_w_max: 64,
        sum_r_max: 16,
    };
    let params = XonXoffParams {
        react_latency: 2,
        ..XonXoffParams::manual(4, 8)
    };
    let run = worst_case_run(
        &problem,
        HysteresisGate::new(&params, 4, 8),
        requirements(0, 0),
        &Deadline::unlimited(),
    )
    .unwrap()
    .unwrap();
    assert_eq!(run.occ_peak, 19);
    assert_eq!(run.t_star, 5);

    let traces = run.witness.traces();
    assert_eq!(traces[0].0, "in_pause");
    assert_eq!(traces[1].0, "throttle_active");
}

#[test]
fn credits_in_flight_do_not_count_against_pool() {
    // Each read returns two credits a cycle later. Reading every cycle keeps
    // more than cred_max credits in the pool and the return path combined,
    // which is legal as long as the pool itself stays within cred_max.
    let caps = [1; 6];
    let problem = FlowProblem {
        write_caps: &caps,
        read_caps: &caps,
        wr_latency: 0,
        rd_latency: 0,
        sum_w_max: 6,
        sum_r_max: 6,
    };
    let params = CbfcParams {
        cred_gran: 2,
        cred_ret_latency: 1,
        ..CbfcParams::default()
    };
    let run = worst_case_run(
        &problem,
        CreditGate::new(&params, 6, 2, 2),
        requirements(0, 4),
        &Deadline::unlimited(),
    )
    .unwrap()
    .unwrap();
    assert_eq!(run.occ_peak, 2);
    assert_eq!(run.t_star, 4);

    let traces = run.witness.traces();
    assert_eq!(traces[0].0, "cred_seq");
    assert_eq!(traces[1].0, "ret_seq");
    assert_eq!(traces[0].1[0], 2);
    assert!(traces[0].1.iter().all(|c| *c <= 2));
}

/// Flow-control rules modelled directly on per-cycle histories.
#[derive(Clone, Copy, Debug)]
enum GateModel {
    Pause {
        xon: u64,
        xoff: u64,
        react: usize,
        resume: usize,
        w_throttle_max: u64,
    },
    Credit {
        cred_init: u64,
        cred_max: u64,
        cred_gran: u64,
        ret_latency: usize,
    },
}

struct BruteForce<'a> {
    problem: &'a FlowProblem<'a>,
    requirements: Requirements,
    model: GateModel,
    read_beyond: u64,
}

#[derive(Clone, Default)]
struct Path {
    writes: Vec<u64>,
    reads: Vec<u64>,
    paused: Vec<bool>,
    credits: u64,
    returns: Vec<u64>,
    occupancy: u64,
    peak: u64,
}

impl<'a> BruteForce<'a> {
    fn new(problem: &'a FlowProblem<'a>, requirements: Requirements, model: GateModel) -> Self {
        let horizon = problem.read_caps.len();
        let rd_latency = problem.rd_latency as usize;
        Self {
            problem,
            requirements,
            model,
            read_beyond: problem.read_caps[horizon.saturating_sub(rd_latency)..]
                .iter()
                .sum(),
        }
    }

    fn max_peak(&self) -> Option<u64> {
        let horizon = self.problem.write_caps.len();
        let credits = match self.model {
            GateModel::Credit { cred_init, .. } => cred_init,
            GateModel::Pause { .. } => 0,
        };
        let path = Path {
            credits,
            returns: vec![0; horizon],
            ..Path::default()
        };
        let mut best = None;
        self.explore(path, &mut best);
        best
    }

    fn explore(&self, path: Path, best: &mut Option<u64>) {
        let problem = self.problem;
        let horizon = problem.write_caps.len();
        let t = path.writes.len();
        let written: u64 = path.writes.iter().sum();
        let read: u64 = path.reads.iter().sum();

        if t == horizon {
            let total_read = read + self.read_beyond.min(problem.sum_r_max - read);
            if written >= self.requirements.min_written && total_read >= self.requirements.min_read
            {
                *best = Some(best.unwrap_or(0).max(path.peak));
            }
            return;
        }

        let mut paused = path.paused.clone();
        let mut allowance = u64::MAX;
        match self.model {
            GateModel::Pause {
                xon,
                xoff,
                react,
                resume,
                w_throttle_max,
            } => {
                let was_paused = paused.last().copied().unwrap_or(false);
                paused.push(path.occupancy >= xoff || (was_paused && path.occupancy > xon));
                let throttled = (0..=resume).any(|k| {
                    let delay = react + k;
                    t >= delay && paused[t - delay]
                });
                if throttled {
                    allowance = w_throttle_max;
                }
            }
            GateModel::Credit { .. } => allowance = path.credits,
        }

        let wr_latency = problem.wr_latency as usize;
        let rd_latency = problem.rd_latency as usize;
        let write_cap = problem.write_caps[t]
            .min(allowance)
            .min(problem.sum_w_max - written);
        for write in 0..=write_cap {
            let arriving = if wr_latency == 0 {
                write
            } else {
                t.checked_sub(wr_latency).map_or(0, |s| path.writes[s])
            };
            let offered = t
                .checked_sub(rd_latency)
                .map_or(0, |s| problem.read_caps[s]);
            let read_cap = offered
                .min(path.occupancy + arriving)
                .min(problem.sum_r_max - read);
            for r in 0..=read_cap {
                let mut next = path.clone();
                next.paused = paused.clone();
                if let GateModel::Credit {
                    cred_max,
                    cred_gran,
                    ret_latency,
                    ..
                } = self.model
                {
                    if ret_latency == 0 {
                        next.returns[t] += cred_gran * r;
                    } else if t + ret_latency < horizon {
                        next.returns[t + ret_latency] += cred_gran * r;
                    }
                    next.credits = path.credits - write + next.returns[t];
                    if next.credits > cred_max {
                        continue;
                    }
                }
                next.writes.push(write);
                next.reads.push(r);
                next.occupancy = path.occupancy + arriving - r;
                next.peak = next.peak.max(next.occupancy);
                self.explore(next, best);
            }
        }
    }
}

struct Case {
    write_caps: Vec<u64>,
    read_caps: Vec<u64>,
    wr_latency: u64,
    rd_latency: u64,
    sum_w_max: u64,
    sum_r_max: u64,
    requirements: Requirements,
}

impl Case {
    fn random(rng: &mut StdRng) -> Self {
        let horizon = rng.gen_range(2..=5);
        let w_max = rng.gen_range(1..=2);
        let r_max = rng.gen_range(1..=2);
        let write_caps: Vec<u64> = (0..horizon).map(|_| w_max * rng.gen_range(0..=1)).collect();
        let read_caps: Vec<u64> = (0..horizon).map(|_| r_max * rng.gen_range(0..=1)).collect();
        let sum_w_max = rng.gen_range(0..=write_caps.iter().sum::<u64>());
        let sum_r_max = rng.gen_range(0..=read_caps.iter().sum::<u64>());
        Self {
            write_caps,
            read_caps,
            wr_latency: rng.gen_range(0..=1),
            rd_latency: rng.gen_range(0..=1),
            sum_w_max,
            sum_r_max,
            requirements: Requirements {
                min_written: rng.gen_range(0..=sum_w_max),
                min_read: rng.gen_range(0..=sum_r_max),
            },
        }
    }

    fn problem(&self) -> FlowProblem<'_> {
        FlowProblem {
            write_caps: &self.write_caps,
            read_caps: &self.read_caps,
            wr_latency: self.wr_latency,
            rd_latency: self.rd_latency,
            sum_w_max: self.sum_w_max,
            sum_r_max: self.sum_r_max,
        }
    }
}

fn assert_matches_brute_force<G: WriteGate>(
    problem: &FlowProblem,
    gate: G,
    requirements: Requirements,
    model: GateModel,
) {
    let expected = BruteForce::new(problem, requirements, model).max_peak();
    let run = worst_case_run(problem, gate, requirements, &Deadline::unlimited()).unwrap();
    assert_eq!(
        run.as_ref().map(|run| run.occ_peak),
        expected,
        "{problem:?} {requirements:?} {model:?}"
    );
    if let Some(run) = run {
        run.witness
            .check(run.occ_peak, run.t_star, problem.sum_w_max)
            .unwrap();
        assert!(run.written >= requirements.min_written);
        assert!(run.read >= requirements.min_read);
    }
}

#[test]
fn hysteresis_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(0xf1f0);
    for _ in 0..150 {
        let case = Case::random(&mut rng);
        let xoff = rng.gen_range(1..=4);
        let xon = rng.gen_range(0..xoff);
        let react = rng.gen_range(0..=2);
        let resume = rng.gen_range(0..=1);
        let w_throttle_max = rng.gen_range(0..=1);
        let params = XonXoffParams {
            react_latency: react as u64,
            resume_latency: resume as u64,
            w_throttle_max,
            ..XonXoffParams::manual(xon, xoff)
        };
        assert_matches_brute_force(
            &case.problem(),
            HysteresisGate::new(&params, xon, xoff),
            case.requirements,
            GateModel::Pause {
                xon,
                xoff,
                react,
                resume,
                w_throttle_max,
            },
        );
    }
}

#[test]
fn credits_match_brute_force() {
    let mut rng = StdRng::seed_from_u64(0xc4ed);
    for _ in 0..150 {
        let case = Case::random(&mut rng);
        let cred_init = rng.gen_range(0..=3);
        let cred_max = cred_init + rng.gen_range(0..=2);
        let cred_gran = rng.gen_range(1..=2);
        let ret_latency = rng.gen_range(0..=2);
        let params = CbfcParams {
            cred_gran,
            cred_ret_latency: ret_latency as u64,
            ..CbfcParams::default()
        };
        assert_matches_brute_force(
            &case.problem(),
            CreditGate::new(&params, case.write_caps.len(), cred_init, cred_max),
            case.requirements,
            GateModel::Credit {
                cred_init,
                cred_max,
                cred_gran,
                ret_latency,
            },
        );
    }
}
