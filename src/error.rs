use thiserror::Error;

use crate::physics::handles::BodyHandle;

/// Errors surfaced by the public mutation API of the simulation.
///
/// The per-tick pipeline itself never fails; it only operates on state that
/// was validated when bodies, shapes and configuration were registered.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PhysicsError {
    /// A configuration value was out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A shape could not be built from the supplied parameters.
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    /// The handle does not refer to a live body.
    #[error("unknown body {0}")]
    UnknownBody(BodyHandle),

    /// The operation is not valid for the body's current kind.
    #[error("{handle} is {actual}, expected {expected}")]
    InvalidBodyKind {
        handle: BodyHandle,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Result alias used throughout the crate.
pub type PhysicsResult<T> = Result<T, PhysicsError>;
