use glam::Vec3;

use super::{shape_distance, SweepHit, SweepSettings};
use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::shape::ShapeGeometry;

/// Conservative advancement along the relative motion.
///
/// Each step advances by the current distance divided by the closing speed along the current normal,
/// which never steps past the first contact for convex distance bounds.
pub fn sweep(
    a: &ShapeGeometry,
    start_a: &RigidPose,
    displacement_a: Vec3,
    b: &ShapeGeometry,
    start_b: &RigidPose,
    displacement_b: Vec3,
    settings: &SweepSettings,
) -> Option<SweepHit> {
    let relative_motion = displacement_a - displacement_b;
    let mut t = 0.0f32;
    for _ in 0..settings.max_iterations.max(1) {
        let pose_a = start_a.translated(displacement_a * t);
        let pose_b = start_b.translated(displacement_b * t);
        let (distance, normal) = shape_distance(a, &pose_a, b, &pose_b)?;
        if !distance.is_finite() || !normal.is_finite() {
            return None;
        }
        if distance <= settings.tolerance {
            return Some(SweepHit {
                time_of_impact: t,
                normal,
            });
        }
        let closing_speed = -relative_motion.dot(normal);
        if closing_speed <= f32::EPSILON {
            return None;
        }
        t += (distance - 0.5 * settings.tolerance) / closing_speed;
        if t > 1.0 {
            return None;
        }
    }
    // Out of iterations while still closing in: report the conservative estimate.
    let pose_a = start_a.translated(displacement_a * t);
    let pose_b = start_b.translated(displacement_b * t);
    shape_distance(a, &pose_a, b, &pose_b).map(|(_, normal)| SweepHit {
        time_of_impact: t,
        normal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn settings() -> SweepSettings {
        SweepSettings {
            tolerance: 1e-3,
            max_iterations: 32,
        }
    }

    #[test]
    fn sphere_hits_thin_wall() {
        let sphere = ShapeGeometry::sphere(0.1).unwrap();
        let wall = ShapeGeometry::cuboid(Vec3::new(0.01, 2.0, 2.0)).unwrap();
        let hit = sweep(
            &sphere,
            &RigidPose::from_position(Vec3::new(-1.0, 0.0, 0.0)),
            Vec3::new(2.0, 0.0, 0.0),
            &wall,
            &RigidPose::IDENTITY,
            Vec3::ZERO,
            &settings(),
        )
        .expect("sphere crosses the wall");
        // Surface contact when the center reaches x = -0.11.
        assert_abs_diff_eq!(hit.time_of_impact, 0.445, epsilon = 1e-3);
        assert_abs_diff_eq!(hit.normal.x, -1.0, epsilon = 1e-4);
    }

    #[test]
    fn receding_motion_never_hits() {
        let sphere = ShapeGeometry::sphere(0.1).unwrap();
        let wall = ShapeGeometry::cuboid(Vec3::new(0.01, 2.0, 2.0)).unwrap();
        let hit = sweep(
            &sphere,
            &RigidPose::from_position(Vec3::new(-1.0, 0.0, 0.0)),
            Vec3::new(-2.0, 0.0, 0.0),
            &wall,
            &RigidPose::IDENTITY,
            Vec3::ZERO,
            &settings(),
        );
        assert!(hit.is_none());
    }

    #[test]
    fn level_set_pairs_without_distance_are_infinite() {
        use crate::physics::collidables::level_set::LevelSet;
        use glam::UVec3;
        let field = ShapeGeometry::level_set(
            LevelSet::from_fn(Vec3::splat(-1.0), 0.5, UVec3::splat(5), |p| p.length() - 0.5).unwrap(),
        );
        let hit = sweep(
            &field,
            &RigidPose::IDENTITY,
            Vec3::X,
            &field,
            &RigidPose::from_position(Vec3::new(3.0, 0.0, 0.0)),
            Vec3::ZERO,
            &settings(),
        );
        assert!(hit.is_none());
    }
}
