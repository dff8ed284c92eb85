//! Matrix expansion.
//!
//! Expansion is a pure function from (axes, exclusion rules) to an ordered
//! set of immutable job descriptors. No execution state is involved, so the
//! same definitions always yield the same job set.

use std::collections::{BTreeMap, HashSet};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::job::{AxisSelection, JobDescriptor};

/// A configuration dimension with mutually exclusive options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    /// Axis name (e.g. `platform`, `threading`, `linkage`)
    pub name: String,

    /// Options in declaration order
    #[serde(rename = "value")]
    pub values: Vec<AxisValue>,
}

/// One option of an axis, with the flags it contributes to a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisValue {
    /// Value name
    pub name: String,

    /// Flags appended to the job's composed flag list. Opaque to slipway;
    /// they are threaded through to the steps that opt in.
    #[serde(default)]
    pub flags: Vec<String>,
}

/// A predicate removing one axis-value combination from expansion.
///
/// Keys name axes, values name options; all entries must match for a
/// combination to be excluded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Exclusion {
    pub matches: BTreeMap<String, String>,
}

impl Exclusion {
    fn excludes(&self, selections: &[AxisSelection]) -> bool {
        self.matches.iter().all(|(axis, value)| {
            selections
                .iter()
                .any(|s| &s.axis == axis && &s.value == value)
        })
    }
}

/// Configuration errors detected at expansion time.
///
/// These are fatal before any job runs.
#[derive(Debug, Error, Diagnostic)]
pub enum MatrixError {
    #[error("axis `{axis}` has no values")]
    #[diagnostic(
        code(slipway::matrix::empty_axis),
        help("every axis needs at least one [[axis.value]] entry, or remove the axis")
    )]
    EmptyAxis { axis: String },

    #[error("axis `{axis}` is declared more than once")]
    #[diagnostic(code(slipway::matrix::duplicate_axis))]
    DuplicateAxis { axis: String },

    #[error("value `{value}` appears more than once on axis `{axis}`")]
    #[diagnostic(code(slipway::matrix::duplicate_value))]
    DuplicateValue { axis: String, value: String },

    #[error("exclusion references unknown axis `{axis}`")]
    #[diagnostic(
        code(slipway::matrix::unknown_axis),
        help("exclusion keys must name a declared axis")
    )]
    UnknownAxis { axis: String },

    #[error("exclusion references unknown value `{value}` for axis `{axis}`")]
    #[diagnostic(
        code(slipway::matrix::unknown_value),
        help("exclusion values must name a declared option of that axis")
    )]
    UnknownValue { axis: String, value: String },
}

fn validate(axes: &[Axis], exclusions: &[Exclusion]) -> Result<(), MatrixError> {
    let mut seen_axes = HashSet::new();
    for axis in axes {
        if !seen_axes.insert(axis.name.as_str()) {
            return Err(MatrixError::DuplicateAxis {
                axis: axis.name.clone(),
            });
        }
        if axis.values.is_empty() {
            return Err(MatrixError::EmptyAxis {
                axis: axis.name.clone(),
            });
        }

        let mut seen_values = HashSet::new();
        for value in &axis.values {
            if !seen_values.insert(value.name.as_str()) {
                return Err(MatrixError::DuplicateValue {
                    axis: axis.name.clone(),
                    value: value.name.clone(),
                });
            }
        }
    }

    for exclusion in exclusions {
        for (axis_name, value_name) in &exclusion.matches {
            let axis = axes
                .iter()
                .find(|a| &a.name == axis_name)
                .ok_or_else(|| MatrixError::UnknownAxis {
                    axis: axis_name.clone(),
                })?;
            if !axis.values.iter().any(|v| &v.name == value_name) {
                return Err(MatrixError::UnknownValue {
                    axis: axis_name.clone(),
                    value: value_name.clone(),
                });
            }
        }
    }

    Ok(())
}

/// Expand axes into one job descriptor per retained combination.
///
/// Order is deterministic: the last axis varies fastest, values in
/// declaration order. Every combination not matching an exclusion appears
/// exactly once. Zero axes expand to a single degenerate job.
pub fn expand(axes: &[Axis], exclusions: &[Exclusion]) -> Result<Vec<JobDescriptor>, MatrixError> {
    validate(axes, exclusions)?;

    let mut jobs = Vec::new();
    let mut indices = vec![0usize; axes.len()];

    loop {
        let selections: Vec<AxisSelection> = axes
            .iter()
            .zip(&indices)
            .map(|(axis, &i)| AxisSelection {
                axis: axis.name.clone(),
                value: axis.values[i].name.clone(),
            })
            .collect();

        if !exclusions.iter().any(|e| e.excludes(&selections)) {
            let flags: Vec<String> = axes
                .iter()
                .zip(&indices)
                .flat_map(|(axis, &i)| axis.values[i].flags.iter().cloned())
                .collect();
            jobs.push(JobDescriptor::new(selections, flags));
        }

        // Advance the odometer; done once every position has wrapped.
        let mut pos = axes.len();
        loop {
            if pos == 0 {
                return Ok(jobs);
            }
            pos -= 1;
            indices[pos] += 1;
            if indices[pos] < axes[pos].values.len() {
                break;
            }
            indices[pos] = 0;
        }
    }
}
