//! Core data model: pipelines, axes, jobs, and expectations.

pub mod expectation;
pub mod job;
pub mod matrix;
pub mod pipeline;

pub use expectation::{CheckReport, Expectation};
pub use job::{AxisSelection, JobDescriptor, JobOutcome, JobReport, StepReport};
pub use matrix::{expand, Axis, AxisValue, Exclusion, MatrixError};
pub use pipeline::{Pipeline, PipelineError, StepConfig, TriggerConfig, TriggerEvent};
