//! Time of impact queries between moving shapes.

pub mod conservative_advancement;
pub mod sphere_pair_sweep;

use glam::Vec3;

use super::collision_tasks::convex_pair_distance;
use super::collision_tasks::level_set_tester::LevelSetTester;
use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::shape::{ConvexShape, ShapeGeometry};

/// First contact found along a sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepHit {
    /// Fraction of the swept interval, in [0, 1], at which the shapes first come within tolerance.
    pub time_of_impact: f32,
    /// Contact normal at the time of impact, pointing from B to A.
    pub normal: Vec3,
}

/// Termination settings of iterative sweeps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepSettings {
    /// Distance at which the shapes are considered touching.
    pub tolerance: f32,
    pub max_iterations: u32,
}

/// Lower bound on the distance between two shapes at fixed poses, with the normal pointing from B to A.
/// Returns None for pairs with no distance query, which sweeps treat as never impacting.
pub fn shape_distance(
    a: &ShapeGeometry,
    pose_a: &RigidPose,
    b: &ShapeGeometry,
    pose_b: &RigidPose,
) -> Option<(f32, Vec3)> {
    match (a, b) {
        (ShapeGeometry::Convex(ca), ShapeGeometry::Convex(cb)) => Some(convex_pair_distance(ca, pose_a, cb, pose_b)),
        (ShapeGeometry::Convex(ca), ShapeGeometry::LevelSet(level_set)) => {
            LevelSetTester::distance(ca, pose_a, level_set, pose_b)
        }
        (ShapeGeometry::LevelSet(level_set), ShapeGeometry::Convex(cb)) => {
            LevelSetTester::distance(cb, pose_b, level_set, pose_a).map(|(distance, normal)| (distance, -normal))
        }
        (ShapeGeometry::Compound(compound), _) => compound
            .children()
            .iter()
            .filter_map(|child| {
                let child_pose = RigidPose::multiply(&child.local_pose, pose_a);
                shape_distance(&ShapeGeometry::Convex(child.shape), &child_pose, b, pose_b)
            })
            .min_by(|x, y| x.0.total_cmp(&y.0)),
        (_, ShapeGeometry::Compound(_)) => {
            shape_distance(b, pose_b, a, pose_a).map(|(distance, normal)| (distance, -normal))
        }
        (ShapeGeometry::LevelSet(_), ShapeGeometry::LevelSet(_)) => None,
    }
}

/// Sweeps two shapes linearly from their start poses by the given displacements, holding orientation fixed.
///
/// Sphere pairs are solved analytically; everything else uses conservative advancement. A degenerate query
/// yields None, which callers treat as an infinite time of impact.
pub fn sweep_shapes(
    a: &ShapeGeometry,
    start_a: &RigidPose,
    displacement_a: Vec3,
    b: &ShapeGeometry,
    start_b: &RigidPose,
    displacement_b: Vec3,
    settings: &SweepSettings,
) -> Option<SweepHit> {
    if let (
        ShapeGeometry::Convex(ConvexShape::Sphere(sphere_a)),
        ShapeGeometry::Convex(ConvexShape::Sphere(sphere_b)),
    ) = (a, b)
    {
        return sphere_pair_sweep::sweep(
            sphere_a,
            start_a.position,
            displacement_a,
            sphere_b,
            start_b.position,
            displacement_b,
            settings.tolerance,
        );
    }
    conservative_advancement::sweep(a, start_a, displacement_a, b, start_b, displacement_b, settings)
}
