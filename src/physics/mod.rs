pub mod bodies;
pub mod body_description;
pub mod body_properties;
pub mod ccd;
pub mod collidables;
pub mod collision_detection;
pub mod contact_solver;
pub mod handles;
pub mod min_evolution;
pub mod pose_integration;
pub mod simulation_config;

pub use bodies::{Bodies, Body, BodyKind, KinematicTarget, KinematicTargetMode};
pub use body_description::BodyDescription;
pub use body_properties::{BodyInertia, BodyVelocity, CollisionFilter, PhysicsMaterial, RigidPose};
pub use handles::{BodyHandle, BodyPairKey};
pub use min_evolution::MinEvolution;
pub use simulation_config::{CcdConfig, CollisionConfig, RestoreTolerance, RestoreTolerances, SimulationConfig, SolverConfig};
