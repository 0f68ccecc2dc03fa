//! Tunables of the collision pipeline, CCD and solver.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, PhysicsResult};

/// Position and rotation tolerance for reusing a pair's previous collision state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RestoreTolerance {
    /// Allowed translation of each body, as a fraction of the smaller body's smallest extent.
    pub distance_fraction: f32,
    /// Allowed rotation of each body, in radians.
    pub rotation: f32,
}

/// Restore tolerances, split by whether the pair had contacts when it was last generated.
/// Separated pairs use tighter tolerances since a small motion can bring them into contact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RestoreTolerances {
    pub without_contacts: RestoreTolerance,
    pub with_contacts: RestoreTolerance,
}

impl Default for RestoreTolerances {
    fn default() -> Self {
        Self {
            without_contacts: RestoreTolerance {
                distance_fraction: 0.01,
                rotation: 0.01,
            },
            with_contacts: RestoreTolerance {
                distance_fraction: 0.05,
                rotation: 0.05,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Contacts farther apart than this are not kept.
    pub cull_distance: f32,
    /// Scale applied to the per-step displacement when inflating body bounds.
    pub bounds_inflation_scale: f32,
    /// Extra margin added to inflated bounds on top of the cull distance.
    pub bounds_slack: f32,
    pub restore: RestoreTolerances,
    /// Relative translation, as a fraction of the smaller body's extent, below which a manifold is only
    /// re-evaluated from its anchors instead of regenerated.
    pub manifold_update_distance_fraction: f32,
    /// Relative rotation in radians below which a manifold is only re-evaluated.
    pub manifold_update_rotation: f32,
    /// Fraction of a shape's smallest extent that it may travel per step before CCD is used.
    pub ccd_threshold_fraction: f32,
    pub max_manifold_points: usize,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            cull_distance: 0.02,
            bounds_inflation_scale: 1.0,
            bounds_slack: 0.01,
            restore: RestoreTolerances::default(),
            manifold_update_distance_fraction: 0.005,
            manifold_update_rotation: 0.005,
            ccd_threshold_fraction: 0.5,
            max_manifold_points: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CcdConfig {
    pub enabled: bool,
    /// How many times a single swept contact may be resolved in one tick before its bodies are clipped.
    pub max_process_count: u32,
    /// Recompute times of impact for neighbouring contacts after resolving one.
    pub resweep_enabled: bool,
    /// Freeze bodies at their impact position once a contact runs out of budget.
    pub clipping_enabled: bool,
    /// Distance at which a sweep reports contact.
    pub toi_tolerance: f32,
    pub max_toi_iterations: u32,
}

impl Default for CcdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_process_count: 1,
            resweep_enabled: false,
            clipping_enabled: true,
            toi_tolerance: 1e-3,
            max_toi_iterations: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Maximum position iterations per sub-step.
    pub apply_iterations: u32,
    /// Maximum velocity and push-out iterations per sub-step.
    pub push_out_iterations: u32,
    /// Iterations stop early once no correction exceeds this distance.
    pub convergence_tolerance: f32,
    /// Approach speeds below this do not bounce.
    pub restitution_velocity_threshold: f32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            apply_iterations: 8,
            push_out_iterations: 2,
            convergence_tolerance: 1e-4,
            restitution_velocity_threshold: 0.5,
        }
    }
}

/// Configuration of a [`MinEvolution`](crate::physics::min_evolution::MinEvolution).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub gravity: Vec3,
    pub collision: CollisionConfig,
    pub ccd: CcdConfig,
    pub solver: SolverConfig,
    /// Worker threads used for pair detection and CCD islands. One runs everything inline.
    pub worker_count: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            collision: CollisionConfig::default(),
            ccd: CcdConfig::default(),
            solver: SolverConfig::default(),
            worker_count: 1,
        }
    }
}

fn non_negative(name: &str, value: f32) -> PhysicsResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(PhysicsError::InvalidConfig(format!("{name} must be finite and non-negative, got {value}")))
    }
}

impl SimulationConfig {
    /// Checks every value for range errors.
    pub fn validate(&self) -> PhysicsResult<()> {
        if !self.gravity.is_finite() {
            return Err(PhysicsError::InvalidConfig("gravity must be finite".into()));
        }
        let collision = &self.collision;
        non_negative("collision.cull_distance", collision.cull_distance)?;
        non_negative("collision.bounds_inflation_scale", collision.bounds_inflation_scale)?;
        non_negative("collision.bounds_slack", collision.bounds_slack)?;
        for (name, tolerance) in [
            ("without_contacts", collision.restore.without_contacts),
            ("with_contacts", collision.restore.with_contacts),
        ] {
            non_negative(&format!("collision.restore.{name}.distance_fraction"), tolerance.distance_fraction)?;
            non_negative(&format!("collision.restore.{name}.rotation"), tolerance.rotation)?;
        }
        non_negative("collision.manifold_update_distance_fraction", collision.manifold_update_distance_fraction)?;
        non_negative("collision.manifold_update_rotation", collision.manifold_update_rotation)?;
        non_negative("collision.ccd_threshold_fraction", collision.ccd_threshold_fraction)?;
        if collision.max_manifold_points == 0 {
            return Err(PhysicsError::InvalidConfig("collision.max_manifold_points must be at least 1".into()));
        }

        if self.ccd.max_process_count == 0 {
            return Err(PhysicsError::InvalidConfig("ccd.max_process_count must be at least 1".into()));
        }
        if self.ccd.max_toi_iterations == 0 {
            return Err(PhysicsError::InvalidConfig("ccd.max_toi_iterations must be at least 1".into()));
        }
        non_negative("ccd.toi_tolerance", self.ccd.toi_tolerance)?;

        if self.solver.apply_iterations == 0 {
            return Err(PhysicsError::InvalidConfig("solver.apply_iterations must be at least 1".into()));
        }
        non_negative("solver.convergence_tolerance", self.solver.convergence_tolerance)?;
        non_negative("solver.restitution_velocity_threshold", self.solver.restitution_velocity_threshold)?;
        if self.worker_count == 0 {
            return Err(PhysicsError::InvalidConfig("worker_count must be at least 1".into()));
        }
        Ok(())
    }
}
