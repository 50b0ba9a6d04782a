// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Shared types.

use std::error::Error;
use std::fmt;

// Sizing errors

#[macro_export]
/// Build an `Err` holding a [SizingError::Validation] from a format string
macro_rules! validation_error {
    ($($arg:tt)+) => {
        Err($crate::types::SizingError::Validation(format!($($arg)+)))
    };
}

#[macro_export]
/// Build an `Err` holding a [SizingError::Infeasible] from a format string
macro_rules! infeasible_error {
    ($($arg:tt)+) => {
        Err($crate::types::SizingError::Infeasible(format!($($arg)+)))
    };
}

#[macro_export]
/// Build an `Err` holding a [SizingError::InternalConsistency] from a format
/// string
macro_rules! consistency_error {
    ($($arg:tt)+) => {
        Err($crate::types::SizingError::InternalConsistency(format!($($arg)+)))
    };
}

/// The `SizingError` is what should be returned in the case of an error.
///
/// None of the variants are recovered from inside the engine; they are all
/// passed back to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SizingError {
    /// Malformed or out-of-range input. Raised before any solving starts.
    Validation(String),

    /// A fixed configuration cannot meet the required traffic constraints.
    Infeasible(String),

    /// A solved trace broke its own invariants.
    InternalConsistency(String),

    /// The search ran past its time budget.
    SolverTimeout(String),
}

impl SizingError {
    /// Only a timeout is worth retrying (with a smaller horizon or a larger
    /// budget).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, SizingError::SolverTimeout(_))
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            SizingError::Validation(msg)
            | SizingError::Infeasible(msg)
            | SizingError::InternalConsistency(msg)
            | SizingError::SolverTimeout(msg) => msg,
        }
    }
}

impl fmt::Display for SizingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SizingError::Validation(msg) => write!(f, "Error: invalid parameters: {msg}"),
            SizingError::Infeasible(msg) => write!(f, "Error: infeasible: {msg}"),
            SizingError::InternalConsistency(msg) => {
                write!(f, "Error: internal consistency check failed: {msg}")
            }
            SizingError::SolverTimeout(msg) => write!(f, "Error: solver timeout: {msg}"),
        }
    }
}

impl Error for SizingError {}

/// The return type for checks that produce no value
pub type CheckResult = Result<(), SizingError>;

/// The return type for most engine functions
pub type SizingOutcome<T> = Result<T, SizingError>;

/// Which end of the FIFO a traffic profile describes
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Write,
    Read,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Side::Write => write!(f, "write"),
            Side::Read => write!(f, "read"),
        }
    }
}
