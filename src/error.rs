//! Error types for simulation setup and stepping.

use thiserror::Error;

use crate::cloth::DivergenceReport;

/// Errors that can occur while building or advancing a simulation.
///
/// Construction errors are raised once, at load time. A step rejects an
/// invalid time step or configuration with [`SimError::InvalidParameter`]
/// before touching any state, and otherwise can only fail with
/// [`SimError::Diverged`] or [`SimError::Halted`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// A joint references a parent that is not strictly before it.
    #[error("joint {joint} has parent {parent}, parents must have a smaller index")]
    InvalidParent { joint: usize, parent: usize },
    /// Joint 0 must be the root.
    #[error("joint 0 must be the root of the skeleton")]
    RootHasParent,
    /// A non-root joint has no parent.
    #[error("joint {joint} has no parent, only joint 0 may be a root")]
    MissingParent { joint: usize },
    /// A skeleton needs at least one joint.
    #[error("skeleton has no joints")]
    EmptySkeleton,
    /// An animation track needs at least two keys.
    #[error("animation track for joint {joint} has {count} keys, at least 2 are required")]
    TrackTooShort { joint: usize, count: usize },
    /// Key times must be strictly increasing.
    #[error("animation track for joint {joint} has non-increasing time at key {index}")]
    NonIncreasingTimes { joint: usize, index: usize },
    /// A track targets a joint that does not exist.
    #[error("animation track targets joint {joint}, skeleton has {count} joints")]
    UnknownJoint { joint: usize, count: usize },
    /// A skinning weight references a joint that does not exist.
    #[error("vertex {vertex} references joint {joint}, skeleton has {count} joints")]
    WeightJointOutOfBounds { vertex: usize, joint: usize, count: usize },
    /// Skinning weights must be finite and non-negative.
    #[error("vertex {vertex} has invalid weight {weight}")]
    InvalidWeight { vertex: usize, weight: f32 },
    /// Two buffers that must be parallel have different lengths.
    #[error("{name}: expected length {expected}, got {actual}")]
    LengthMismatch { name: &'static str, expected: usize, actual: usize },
    /// Grid dimensions are too small for the requested operation.
    #[error("grid must be at least {min}x{min}, got {nx}x{ny}")]
    InvalidGridDimensions { nx: usize, ny: usize, min: usize },
    /// An index is out of bounds.
    #[error("index {index} out of bounds (count: {count})")]
    IndexOutOfBounds { index: usize, count: usize },
    /// A parameter has a value outside its valid range.
    #[error("invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f32 },
    /// The divergence guard tripped during this step.
    #[error("simulation diverged: {0}")]
    Diverged(DivergenceReport),
    /// The simulation diverged earlier and must be reset before stepping.
    #[error("simulation is halted after divergence, reset it before stepping")]
    Halted,
}

/// Convenience alias used across the crate.
pub type SimResult<T> = Result<T, SimError>;
