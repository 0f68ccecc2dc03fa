use glam::Vec3;

use super::ContactPoint;
use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::box_shape::BoxShape;
use crate::physics::collidables::sphere::Sphere;
use crate::utilities::math_helper::binary_sign;

/// Pair tester for sphere (A) vs box (B) collisions.
pub struct SphereBoxTester;

impl SphereBoxTester {
    pub fn test(a: &Sphere, pose_a: &RigidPose, b: &BoxShape, pose_b: &RigidPose) -> ContactPoint {
        let local_center = pose_b.transform_by_inverse(pose_a.position);
        let clamped = b.clamp_local(local_center);
        let offset = local_center - clamped;
        let distance = offset.length();
        let (local_normal, local_point_b, center_separation) = if distance > 1e-7 {
            (offset / distance, clamped, distance)
        } else {
            // Center is inside the box; leave through the closest face.
            let half = b.half_extents();
            let gaps = half - local_center.abs();
            let axis = if gaps.x <= gaps.y && gaps.x <= gaps.z {
                0
            } else if gaps.y <= gaps.z {
                1
            } else {
                2
            };
            let sign = binary_sign(local_center[axis]);
            let mut normal = Vec3::ZERO;
            normal[axis] = sign;
            let mut face_point = local_center;
            face_point[axis] = sign * half[axis];
            (normal, face_point, -gaps[axis])
        };
        let normal = pose_b.orientation * local_normal;
        ContactPoint {
            point_a: pose_a.position - normal * a.radius,
            point_b: pose_b.transform(local_point_b),
            normal,
            phi: center_separation - a.radius,
            feature_id: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use glam::Quat;

    #[test]
    fn sphere_above_face() {
        let sphere = Sphere::new(0.5).unwrap();
        let ground = BoxShape::new(10.0, 1.0, 10.0).unwrap();
        let contact = SphereBoxTester::test(
            &sphere,
            &RigidPose::from_position(Vec3::new(1.0, 0.9, 0.0)),
            &ground,
            &RigidPose::IDENTITY,
        );
        assert_abs_diff_eq!(contact.phi, -0.1, epsilon = 1e-5);
        assert_abs_diff_eq!(contact.normal.y, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(contact.point_b.y, 0.5, epsilon = 1e-5);
    }

    #[test]
    fn deep_center_exits_through_nearest_face() {
        let sphere = Sphere::new(0.1).unwrap();
        let wall = BoxShape::new(0.2, 4.0, 4.0).unwrap();
        let pose_b = RigidPose::new(Vec3::ZERO, Quat::IDENTITY);
        let contact = SphereBoxTester::test(&sphere, &RigidPose::from_position(Vec3::new(-0.05, 0.0, 0.0)), &wall, &pose_b);
        assert_abs_diff_eq!(contact.normal.x, -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(contact.phi, -0.15, epsilon = 1e-5);
    }
}
