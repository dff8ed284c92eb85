//! High-level operations.
//!
//! This module contains the implementation of Slipway commands.

pub mod slipway_init;
pub mod slipway_plan;
pub mod slipway_run;
pub mod validate;

pub use slipway_init::init_pipeline;
pub use slipway_plan::{format_plan, plan, OutputFormat};
pub use slipway_run::{run, RunOptions, RunSummary};
pub use validate::{validate, ValidationReport};
