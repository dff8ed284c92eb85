//! Slipway - a matrix-driven build and test orchestrator
//!
//! This crate provides the core library functionality for Slipway,
//! including matrix expansion, gated job execution, and output
//! verification.

pub mod core;
pub mod ops;
pub mod runner;
pub mod util;

pub use crate::core::{
    expectation::Expectation, job::JobDescriptor, job::JobOutcome, job::JobReport, matrix::Axis,
    matrix::Exclusion, pipeline::Pipeline, pipeline::TriggerEvent,
};

pub use crate::runner::gate::ConcurrencyGate;
pub use crate::util::process::CancelToken;
