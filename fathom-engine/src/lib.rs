// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

#![doc(test(attr(warn(unused))))]

//! `Fathom` - worst-case FIFO depth sizing
//!
//! This library computes the smallest depth a FIFO needs so that it never
//! overflows or underflows under a worst-case traffic pattern, together with
//! the flow-control thresholds or credit counts where the protocol has them.
//!
//! A run goes through a fixed pipeline:
//!  - the [horizon](crate::horizon) and the
//!    [valid masks](crate::compiler) are resolved from the
//!    [traffic](crate::traffic) description,
//!  - [balanced](crate::balance) traffic is solved by a phase sweep, anything
//!    else by the [occupancy optimizer](crate::optimizer) or a
//!    [flow-control search](crate::flow_control) around it,
//!  - the peak is turned into a depth by the [post-processor](crate::finalize).
//!
//! A [clock-domain crossing](crate::cdc) can be sized on its own or in front
//! of a same-clock run with [size_with_cdc].
//!
//! # Simple Application
//!
//! ```rust
//! use fathom_engine::params::{Protocol, SizingParameters};
//! use fathom_engine::size;
//! use fathom_engine::traffic::{FlatTraffic, Traffic};
//!
//! let traffic = Traffic::Flat(FlatTraffic {
//!     horizon: 32,
//!     w_max: 1,
//!     r_max: 1,
//!     sum_w_min: 0,
//!     sum_w_max: 16,
//!     sum_r_min: 8,
//!     sum_r_max: 32,
//! });
//! let result = size(&SizingParameters::new(traffic, Protocol::ReadyValid)).unwrap();
//! assert_eq!(result.depth, 16);
//! ```

use log::info;

pub mod balance;
pub mod budget;
pub mod cdc;
pub mod compiler;
pub mod finalize;
pub mod flow_control;
pub mod horizon;
pub mod layers;
pub mod mask;
pub mod optimizer;
pub mod params;
pub mod protocols;
pub mod result;
pub mod test_helpers;
pub mod traffic;
pub mod types;
pub mod witness;

pub use crate::cdc::cdc_depth;
pub use crate::compiler::compile_profile;

use crate::budget::Deadline;
use crate::cdc::CdcParameters;
use crate::params::SizingParameters;
use crate::protocols::{SizingContext, dispatch};
use crate::result::{CdcResult, SizingResult};
use crate::types::SizingOutcome;

/// Size a FIFO for the given parameters.
///
/// All parameters are validated before any mask is compiled.
pub fn size(params: &SizingParameters) -> SizingOutcome<SizingResult> {
    params.validate()?;
    let deadline = Deadline::new(params.time_budget);
    let ctx = SizingContext::new(params, deadline)?;
    info!(
        "Sizing {} over a horizon of {} cycles",
        params.protocol.kind(),
        ctx.traffic.horizon
    );
    let result = dispatch(&ctx, &params.protocol)?;
    info!("{result}");
    info!("Solved in {:.3}s", ctx.deadline.elapsed().as_secs_f64());
    Ok(result)
}

/// Size a clock-domain crossing and then the same-clock FIFO behind it.
///
/// An automatic CDC window takes the horizon of the same-clock run. The CDC
/// result is carried into the same-clock run in place of any carry already
/// set in `params`.
pub fn size_with_cdc(
    params: &SizingParameters,
    cdc: CdcParameters,
) -> SizingOutcome<(CdcResult, SizingResult)> {
    params.validate()?;
    let cdc = cdc.for_traffic(&params.traffic, params.wr_latency)?;
    let cdc_result = cdc_depth(&cdc)?;
    let params = params.clone().with_cdc(cdc_result.carry());
    let result = size(&params)?;
    Ok((cdc_result, result))
}
