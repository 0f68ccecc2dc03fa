//! Position based collision pipeline: broad phase, per-pair mid-phase with manifold restore, convex and
//! level set narrow phase, continuous collision detection and a sub-stepped contact solver.

pub mod error;
pub mod physics;
pub mod utilities;

pub use error::{PhysicsError, PhysicsResult};
