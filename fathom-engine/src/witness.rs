// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Witness traces that reproduce a reported peak.

use itertools::izip;

use crate::consistency_error;
use crate::types::{CheckResult, SizingOutcome};

/// A concrete schedule over the horizon.
///
/// `occupancy` has one more entry than `write` and `read`: `occupancy[0]` is
/// the empty buffer and `occupancy[t + 1] = occupancy[t] + write[t] -
/// read[t]`. For the replay protocol `read` holds acknowledgements and
/// `occupancy` the in-flight count.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Witness {
    write: Vec<u64>,
    read: Vec<u64>,
    occupancy: Vec<u64>,
    traces: Vec<(&'static str, Vec<u64>)>,
}

impl Witness {
    /// Build the occupancy from per-cycle transfers.
    ///
    /// Fails if a read would take the occupancy below zero.
    pub fn from_transfers(write: Vec<u64>, read: Vec<u64>) -> SizingOutcome<Self> {
        if write.len() != read.len() {
            return consistency_error!(
                "witness write ({}) and read ({}) lengths differ",
                write.len(),
                read.len()
            );
        }
        let mut occupancy = Vec::with_capacity(write.len() + 1);
        let mut occ: u64 = 0;
        occupancy.push(occ);
        for (t, (w, r)) in write.iter().zip(read.iter()).enumerate() {
            occ = match (occ + w).checked_sub(*r) {
                Some(occ) => occ,
                None => {
                    return consistency_error!(
                        "negative occupancy at cycle {t}: occ={occ}, write={w}, read={r}"
                    );
                }
            };
            occupancy.push(occ);
        }
        Ok(Self {
            write,
            read,
            occupancy,
            traces: Vec::new(),
        })
    }

    /// Attach an extra per-cycle trace (e.g. credit count) for rendering.
    #[must_use]
    pub fn with_trace(mut self, name: &'static str, values: Vec<u64>) -> Self {
        self.traces.push((name, values));
        self
    }

    #[must_use]
    pub fn horizon(&self) -> usize {
        self.write.len()
    }

    #[must_use]
    pub fn write(&self) -> &[u64] {
        &self.write
    }

    #[must_use]
    pub fn read(&self) -> &[u64] {
        &self.read
    }

    #[must_use]
    pub fn occupancy(&self) -> &[u64] {
        &self.occupancy
    }

    #[must_use]
    pub fn traces(&self) -> &[(&'static str, Vec<u64>)] {
        &self.traces
    }

    #[must_use]
    pub fn total_written(&self) -> u64 {
        self.write.iter().sum()
    }

    #[must_use]
    pub fn total_read(&self) -> u64 {
        self.read.iter().sum()
    }

    /// The peak occupancy and the first index reaching it.
    ///
    /// Returns `(0, 0)` when the buffer never holds an item.
    #[must_use]
    pub fn peak(&self) -> (u64, usize) {
        let mut best = (0, 0);
        for (idx, occ) in self.occupancy.iter().enumerate().skip(1) {
            if *occ > best.0 {
                best = (*occ, idx);
            }
        }
        best
    }

    /// Check the witness against the peak it was reported with.
    pub fn check(&self, occ_peak: u64, t_star: usize, occ_max: u64) -> CheckResult {
        for (t, (w, r, before, after)) in izip!(
            &self.write,
            &self.read,
            &self.occupancy,
            self.occupancy.iter().skip(1)
        )
        .enumerate()
        {
            if before + w != after + r {
                return consistency_error!(
                    "occupancy recurrence broken at cycle {t}: {before} + {w} - {r} != {after}"
                );
            }
        }

        let (peak, first) = self.peak();
        if peak != occ_peak {
            return consistency_error!("witness peak {peak} != reported occ_peak {occ_peak}");
        }
        if first != t_star {
            return consistency_error!("witness peak reached at {first} != reported t_star {t_star}");
        }
        if peak > occ_max {
            return consistency_error!("witness peak {peak} exceeds the occupancy bound {occ_max}");
        }
        Ok(())
    }
}
