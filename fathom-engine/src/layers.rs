// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The four traffic layers and their composition.
//!
//! A [TrafficProfile] is a fixed stack of layers, innermost first:
//!
//! ```text
//!   cycle -> transaction -> burst -> stream
//! ```
//!
//! Each layer repeats its child a number of times and then idles for its own
//! gap, so the period of a layer is `repeats * child_period + gap`. The cycle
//! layer only carries the per-cycle item cap and has a period of one.

use serde::{Deserialize, Serialize};

use crate::types::{CheckResult, Side};
use crate::validation_error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleLayer {
    pub max_items_per_cycle: u64,
}

impl Default for CycleLayer {
    fn default() -> Self {
        Self {
            max_items_per_cycle: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLayer {
    pub valid_cycles: u64,
    #[serde(default)]
    pub gap_cycles: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurstLayer {
    pub transactions_per_burst: u64,
    #[serde(default)]
    pub gap_cycles: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamLayer {
    pub bursts_per_stream: u64,
    #[serde(default)]
    pub gap_cycles: u64,
}

impl Default for StreamLayer {
    fn default() -> Self {
        Self {
            bursts_per_stream: 1,
            gap_cycles: 0,
        }
    }
}

/// One entry of the layer stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layer {
    Cycle(CycleLayer),
    Transaction(TransactionLayer),
    Burst(BurstLayer),
    Stream(StreamLayer),
}

impl Layer {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Layer::Cycle(_) => "cycle",
            Layer::Transaction(_) => "transaction",
            Layer::Burst(_) => "burst",
            Layer::Stream(_) => "stream",
        }
    }

    /// Number of times the child pattern is repeated.
    #[must_use]
    pub fn repeats(&self) -> u64 {
        match self {
            Layer::Cycle(_) => 1,
            Layer::Transaction(t) => t.valid_cycles,
            Layer::Burst(b) => b.transactions_per_burst,
            Layer::Stream(s) => s.bursts_per_stream,
        }
    }

    /// Idle cycles appended after the repeated children.
    #[must_use]
    pub fn gap(&self) -> u64 {
        match self {
            Layer::Cycle(_) => 0,
            Layer::Transaction(t) => t.gap_cycles,
            Layer::Burst(b) => b.gap_cycles,
            Layer::Stream(s) => s.gap_cycles,
        }
    }

    /// Period of this layer given the period of its child.
    #[must_use]
    pub fn period(&self, child_period: u64) -> u64 {
        self.repeats() * child_period + self.gap()
    }
}

/// A hierarchical description of one side's traffic.
///
/// The transaction and burst layers are required, the cycle and stream layers
/// default to identity values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficProfile {
    #[serde(default)]
    pub cycle: Option<CycleLayer>,
    pub transaction: TransactionLayer,
    pub burst: BurstLayer,
    #[serde(default)]
    pub stream: Option<StreamLayer>,
}

impl TrafficProfile {
    #[must_use]
    pub fn new(transaction: TransactionLayer, burst: BurstLayer) -> Self {
        Self {
            cycle: None,
            transaction,
            burst,
            stream: None,
        }
    }

    #[must_use]
    pub fn with_cycle(mut self, cycle: CycleLayer) -> Self {
        self.cycle = Some(cycle);
        self
    }

    #[must_use]
    pub fn with_stream(mut self, stream: StreamLayer) -> Self {
        self.stream = Some(stream);
        self
    }

    /// The layer stack, innermost first, with the optional layers filled in.
    #[must_use]
    pub fn layers(&self) -> [Layer; 4] {
        [
            Layer::Cycle(self.cycle.unwrap_or_default()),
            Layer::Transaction(self.transaction),
            Layer::Burst(self.burst),
            Layer::Stream(self.stream.unwrap_or_default()),
        ]
    }

    /// Length of one full repetition of the profile in cycles.
    #[must_use]
    pub fn period(&self) -> u64 {
        self.layers()
            .iter()
            .fold(1, |child_period, layer| layer.period(child_period))
    }

    #[must_use]
    pub fn items_per_cycle(&self) -> u64 {
        self.cycle.unwrap_or_default().max_items_per_cycle
    }

    #[must_use]
    pub fn transactions_per_burst(&self) -> u64 {
        self.burst.transactions_per_burst
    }

    #[must_use]
    pub fn bursts_per_stream(&self) -> u64 {
        self.stream.unwrap_or_default().bursts_per_stream
    }

    /// Valid cycles in one period.
    #[must_use]
    pub fn valid_cycles_per_period(&self) -> u64 {
        self.transaction.valid_cycles * self.transactions_per_burst() * self.bursts_per_stream()
    }

    pub fn validate(&self, side: Side) -> CheckResult {
        if self.items_per_cycle() < 1 {
            return validation_error!(
                "{side}_profile.cycle.max_items_per_cycle must be >= 1 (got 0)"
            );
        }
        if self.transaction.valid_cycles + self.transaction.gap_cycles == 0 {
            return validation_error!(
                "{side}_profile.transaction: valid_cycles + gap_cycles must be > 0"
            );
        }
        if self.transactions_per_burst() < 1 {
            return validation_error!(
                "{side}_profile.burst.transactions_per_burst must be >= 1 (got 0)"
            );
        }
        if self.bursts_per_stream() < 1 {
            return validation_error!(
                "{side}_profile.stream.bursts_per_stream must be >= 1 (got 0)"
            );
        }
        Ok(())
    }
}
