use glam::Vec3;

use super::ContactPoint;
use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::sphere::Sphere;

/// Pair tester for sphere vs sphere collisions.
pub struct SpherePairTester;

impl SpherePairTester {
    /// Computes the single contact between two spheres, however far apart they are.
    #[inline(always)]
    pub fn test(a: &Sphere, pose_a: &RigidPose, b: &Sphere, pose_b: &RigidPose) -> ContactPoint {
        let offset = pose_a.position - pose_b.position;
        let center_distance = offset.length();
        // By convention, the normal points from B to A.
        // Arbitrarily choose (0,1,0) if the two spheres are in the same position.
        let normal = if center_distance > 0.0 {
            offset / center_distance
        } else {
            Vec3::Y
        };
        ContactPoint {
            point_a: pose_a.position - normal * a.radius,
            point_b: pose_b.position + normal * b.radius,
            normal,
            phi: center_distance - a.radius - b.radius,
            feature_id: 0,
        }
    }
}
