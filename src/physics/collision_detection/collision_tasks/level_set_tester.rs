use glam::Vec3;

use super::ContactPoint;
use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::level_set::LevelSet;
use crate::physics::collidables::shape::ConvexShape;

/// One sampled contact between a convex shape and a level set.
#[derive(Debug, Clone, Copy)]
pub struct LevelSetSample {
    /// Contact with the convex shape as A and the level set as B.
    pub contact: ContactPoint,
    /// Which sample point of the convex shape produced the contact.
    pub sample_index: u32,
    /// Grid cell of the level set containing the sample.
    pub cell_index: u64,
}

/// Samples convex shapes against a level set. Every sample that lands within the cull distance yields its own contact.
pub struct LevelSetTester;

impl LevelSetTester {
    /// Sample points of a convex shape in world space, paired with the radius to subtract from the field.
    fn samples(convex: &ConvexShape, pose: &RigidPose, out: &mut Vec<(Vec3, f32)>) {
        match convex {
            ConvexShape::Sphere(sphere) => out.push((pose.position, sphere.radius)),
            ConvexShape::Box(shape) => {
                out.extend(shape.vertices(pose).iter().map(|v| (*v, 0.0)));
                let half = shape.half_extents();
                for axis in 0..3 {
                    for sign in [-1.0, 1.0] {
                        let mut face = Vec3::ZERO;
                        face[axis] = sign * half[axis];
                        out.push((pose.transform(face), 0.0));
                    }
                }
            }
        }
    }

    pub fn test(
        convex: &ConvexShape,
        pose_convex: &RigidPose,
        level_set: &LevelSet,
        pose_level_set: &RigidPose,
        cull_distance: f32,
        out: &mut Vec<LevelSetSample>,
    ) {
        let mut samples = Vec::with_capacity(14);
        Self::samples(convex, pose_convex, &mut samples);
        for (sample_index, (point, radius)) in samples.into_iter().enumerate() {
            let local = pose_level_set.transform_by_inverse(point);
            let phi = level_set.signed_distance(local) - radius;
            if phi > cull_distance {
                continue;
            }
            // The field gradient points out of the level set, which is from B to A.
            let normal = pose_level_set.orientation * level_set.normal(local);
            let point_a = point - normal * radius;
            out.push(LevelSetSample {
                contact: ContactPoint::from_point_on_a(point_a, normal, phi, sample_index as u32),
                sample_index: sample_index as u32,
                cell_index: level_set.cell_index(local),
            });
        }
    }

    /// Smallest sampled separation and its normal, ignoring the cull distance.
    pub fn distance(
        convex: &ConvexShape,
        pose_convex: &RigidPose,
        level_set: &LevelSet,
        pose_level_set: &RigidPose,
    ) -> Option<(f32, Vec3)> {
        let mut samples = Vec::new();
        Self::test(convex, pose_convex, level_set, pose_level_set, f32::MAX, &mut samples);
        samples
            .iter()
            .min_by(|a, b| a.contact.phi.total_cmp(&b.contact.phi))
            .map(|sample| (sample.contact.phi, sample.contact.normal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collidables::box_shape::BoxShape;
    use crate::physics::collidables::sphere::Sphere;
    use approx::assert_abs_diff_eq;
    use glam::UVec3;

    fn slab() -> LevelSet {
        // Half space y <= 0 sampled on a small grid.
        LevelSet::from_fn(Vec3::new(-2.0, -1.0, -2.0), 0.25, UVec3::new(17, 9, 17), |p| p.y).unwrap()
    }

    #[test]
    fn sphere_sample_uses_radius() {
        let field = slab();
        let mut out = Vec::new();
        let sphere = ConvexShape::Sphere(Sphere::new(0.5).unwrap());
        LevelSetTester::test(&sphere, &RigidPose::from_position(Vec3::new(0.1, 0.45, 0.0)), &field, &RigidPose::IDENTITY, 0.01, &mut out);
        assert_eq!(out.len(), 1);
        assert_abs_diff_eq!(out[0].contact.phi, -0.05, epsilon = 1e-4);
        assert_abs_diff_eq!(out[0].contact.normal.y, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn box_bottom_vertices_touch() {
        let field = slab();
        let mut out = Vec::new();
        let cube = ConvexShape::Box(BoxShape::new(1.0, 1.0, 1.0).unwrap());
        LevelSetTester::test(&cube, &RigidPose::from_position(Vec3::new(0.0, 0.49, 0.0)), &field, &RigidPose::IDENTITY, 0.02, &mut out);
        // Four bottom corners plus the bottom face center.
        assert_eq!(out.len(), 5);
        let mut cells: Vec<u64> = out.iter().map(|s| s.cell_index).collect();
        cells.sort_unstable();
        cells.dedup();
        assert!(cells.len() > 1);
    }
}
