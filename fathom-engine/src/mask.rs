// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Per-cycle valid masks.

use std::fmt;
use std::str::FromStr;

use crate::types::SizingError;

/// A per-cycle flag marking the cycles in which a transfer may happen.
///
/// Masks are built once per sizing run and never modified afterwards; the
/// transforming methods all return a new mask.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ValidMask(Vec<bool>);

impl ValidMask {
    #[must_use]
    pub fn from_bits(bits: Vec<bool>) -> Self {
        Self(bits)
    }

    #[must_use]
    pub fn all_valid(len: usize) -> Self {
        Self(vec![true; len])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn is_valid(&self, cycle: usize) -> bool {
        self.0.get(cycle).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.0.iter().copied()
    }

    #[must_use]
    pub fn count_valid(&self) -> u64 {
        self.0.iter().filter(|v| **v).count() as u64
    }

    #[must_use]
    pub fn first_valid(&self) -> Option<usize> {
        self.0.iter().position(|v| *v)
    }

    /// Fraction of valid cycles, zero for an empty mask.
    #[must_use]
    pub fn density(&self) -> f64 {
        if self.0.is_empty() {
            0.0
        } else {
            self.count_valid() as f64 / self.0.len() as f64
        }
    }

    /// Rotate the mask so that bit `i` moves to `(i + amount) % len`.
    #[must_use]
    pub fn rotated_right(&self, amount: usize) -> Self {
        let len = self.0.len();
        if len == 0 {
            return self.clone();
        }
        let shift = amount % len;
        let mut bits = self.0.clone();
        bits.rotate_right(shift);
        Self(bits)
    }

    /// Repeat the mask until it is exactly `len` cycles long.
    #[must_use]
    pub fn tiled(&self, len: usize) -> Self {
        if self.0.is_empty() {
            return Self(vec![false; len]);
        }
        Self(self.0.iter().copied().cycle().take(len).collect())
    }

    /// Per-cycle capacities: `cap` items where valid, zero elsewhere.
    #[must_use]
    pub fn capacities(&self, cap: u64) -> Vec<u64> {
        self.0.iter().map(|v| if *v { cap } else { 0 }).collect()
    }

    /// The longest wait, over all start cycles, until the next valid cycle.
    ///
    /// A start cycle with no later valid cycle waits until the end of the
    /// mask.
    #[must_use]
    pub fn max_wait_to_next_valid(&self) -> u64 {
        let len = self.0.len();
        let mut next_valid = len;
        let mut max_wait = 0;
        for t in (0..len).rev() {
            if self.0[t] {
                next_valid = t;
            }
            max_wait = max_wait.max(next_valid - t);
        }
        max_wait as u64
    }

    /// The largest number of valid cycles in any window of `window` cycles.
    ///
    /// Windows longer than the mask are clamped to the mask length.
    #[must_use]
    pub fn max_window_count(&self, window: u64) -> u64 {
        let len = self.0.len();
        if window == 0 || len == 0 {
            return 0;
        }
        let window = (window as usize).min(len);
        let mut count = self.0[..window].iter().filter(|v| **v).count();
        let mut best = count;
        for t in window..len {
            count += usize::from(self.0[t]);
            count -= usize::from(self.0[t - window]);
            best = best.max(count);
        }
        best as u64
    }
}

impl FromStr for ValidMask {
    type Err = SizingError;

    /// Parse a string of `1` and `0` characters. Underscores and whitespace
    /// are ignored so that long masks can be grouped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bits = Vec::with_capacity(s.len());
        for c in s.chars() {
            match c {
                '1' => bits.push(true),
                '0' => bits.push(false),
                '_' => {}
                c if c.is_whitespace() => {}
                c => {
                    return Err(SizingError::Validation(format!(
                        "Unable to parse '{c}' in mask '{s}' (expected 0 or 1)"
                    )));
                }
            }
        }
        Ok(Self(bits))
    }
}

impl fmt::Display for ValidMask {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for v in &self.0 {
            write!(f, "{}", if *v { '1' } else { '0' })?;
        }
        Ok(())
    }
}
