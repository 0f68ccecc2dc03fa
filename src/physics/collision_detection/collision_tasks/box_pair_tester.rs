use glam::{Mat3, Vec3};

use super::ContactPoint;
use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::box_shape::BoxShape;

/// Separating axis result for a box pair.
#[derive(Debug, Clone, Copy)]
pub struct BoxSeparation {
    /// Largest separation found over all candidate axes. Negative when overlapping.
    pub separation: f32,
    /// Axis achieving that separation, pointing from B to A.
    pub normal: Vec3,
}

/// Pair tester for box vs box collisions.
pub struct BoxPairTester;

impl BoxPairTester {
    /// Face axes win over edge axes unless the edge axis separates by more than this.
    const EDGE_AXIS_BIAS: f32 = 1e-3;

    /// Tests the 15 separating axis candidates and returns the least penetrating one.
    pub fn separating_axis(a: &BoxShape, pose_a: &RigidPose, b: &BoxShape, pose_b: &RigidPose) -> BoxSeparation {
        let basis_a = Mat3::from_quat(pose_a.orientation);
        let basis_b = Mat3::from_quat(pose_b.orientation);
        let axes_a = [basis_a.x_axis, basis_a.y_axis, basis_a.z_axis];
        let axes_b = [basis_b.x_axis, basis_b.y_axis, basis_b.z_axis];
        let half_a = a.half_extents();
        let half_b = b.half_extents();
        let offset = pose_a.position - pose_b.position;

        let project = |axis: Vec3| -> (f32, Vec3) {
            let radius_a = half_a.x * axes_a[0].dot(axis).abs()
                + half_a.y * axes_a[1].dot(axis).abs()
                + half_a.z * axes_a[2].dot(axis).abs();
            let radius_b = half_b.x * axes_b[0].dot(axis).abs()
                + half_b.y * axes_b[1].dot(axis).abs()
                + half_b.z * axes_b[2].dot(axis).abs();
            let distance = offset.dot(axis);
            let normal = if distance >= 0.0 { axis } else { -axis };
            (distance.abs() - radius_a - radius_b, normal)
        };

        let mut best = BoxSeparation {
            separation: f32::MIN,
            normal: Vec3::Y,
        };
        for axis in axes_a.iter().chain(axes_b.iter()) {
            let (separation, normal) = project(*axis);
            if separation > best.separation {
                best = BoxSeparation { separation, normal };
            }
        }
        for edge_a in &axes_a {
            for edge_b in &axes_b {
                let Some(axis) = edge_a.cross(*edge_b).try_normalize() else {
                    continue;
                };
                let (separation, normal) = project(axis);
                if separation > best.separation + Self::EDGE_AXIS_BIAS {
                    best = BoxSeparation { separation, normal };
                }
            }
        }
        best
    }

    /// Generates up to one contact per box vertex that lies within `cull_distance` of the other box's
    /// support plane and within its lateral extent.
    pub fn test(
        a: &BoxShape,
        pose_a: &RigidPose,
        b: &BoxShape,
        pose_b: &RigidPose,
        cull_distance: f32,
        contacts: &mut Vec<ContactPoint>,
    ) {
        let axis = Self::separating_axis(a, pose_a, b, pose_b);
        if axis.separation > cull_distance {
            return;
        }
        let normal = axis.normal;
        let vertices_a = a.vertices(pose_a);
        let vertices_b = b.vertices(pose_b);
        let support_b = vertices_b.iter().map(|v| v.dot(normal)).fold(f32::MIN, f32::max);
        let support_a = vertices_a.iter().map(|v| v.dot(normal)).fold(f32::MAX, f32::min);

        let start = contacts.len();
        for (index, vertex) in vertices_a.iter().enumerate() {
            let phi = vertex.dot(normal) - support_b;
            if phi <= cull_distance && b.contains_local(pose_b.transform_by_inverse(*vertex), cull_distance) {
                contacts.push(ContactPoint::from_point_on_a(*vertex, normal, phi, index as u32));
            }
        }
        for (index, vertex) in vertices_b.iter().enumerate() {
            let phi = support_a - vertex.dot(normal);
            if phi <= cull_distance && a.contains_local(pose_a.transform_by_inverse(*vertex), cull_distance) {
                contacts.push(ContactPoint::from_point_on_b(*vertex, normal, phi, 8 + index as u32));
            }
        }
        if contacts.len() == start {
            // Edge-edge configurations have no vertex inside the other box; fall back to A's deepest vertex.
            let deepest = vertices_a
                .iter()
                .copied()
                .fold(vertices_a[0], |deepest, v| if v.dot(normal) < deepest.dot(normal) { v } else { deepest });
            contacts.push(ContactPoint::from_point_on_a(deepest, normal, axis.separation, 16));
        }
    }
}
