//! Contact generation for individual shape pairs.

pub mod box_pair_tester;
pub mod level_set_tester;
pub mod sphere_box_tester;
pub mod sphere_pair_tester;

use glam::Vec3;

use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::shape::ConvexShape;
use box_pair_tester::BoxPairTester;
use sphere_box_tester::SphereBoxTester;
use sphere_pair_tester::SpherePairTester;

/// Contact between two shapes, in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    /// Contact location on the surface of A.
    pub point_a: Vec3,
    /// Contact location on the surface of B.
    pub point_b: Vec3,
    /// Unit normal pointing from B to A.
    pub normal: Vec3,
    /// Signed separation along the normal. Negative values are penetration.
    pub phi: f32,
    /// Identifies the geometric feature that produced the contact, stable across frames.
    pub feature_id: u32,
}

impl ContactPoint {
    #[inline(always)]
    pub fn from_point_on_a(point_a: Vec3, normal: Vec3, phi: f32, feature_id: u32) -> Self {
        Self {
            point_a,
            point_b: point_a - normal * phi,
            normal,
            phi,
            feature_id,
        }
    }

    #[inline(always)]
    pub fn from_point_on_b(point_b: Vec3, normal: Vec3, phi: f32, feature_id: u32) -> Self {
        Self {
            point_a: point_b + normal * phi,
            point_b,
            normal,
            phi,
            feature_id,
        }
    }

    /// Same contact seen with the roles of A and B swapped.
    #[inline(always)]
    pub fn flipped(&self) -> Self {
        Self {
            point_a: self.point_b,
            point_b: self.point_a,
            normal: -self.normal,
            phi: self.phi,
            feature_id: self.feature_id,
        }
    }
}

/// Single closest-feature contact between two convex shapes, ignoring any cull distance.
/// Box pairs report their separating axis result.
pub fn convex_pair_distance(a: &ConvexShape, pose_a: &RigidPose, b: &ConvexShape, pose_b: &RigidPose) -> (f32, Vec3) {
    match (a, b) {
        (ConvexShape::Sphere(sa), ConvexShape::Sphere(sb)) => {
            let contact = SpherePairTester::test(sa, pose_a, sb, pose_b);
            (contact.phi, contact.normal)
        }
        (ConvexShape::Sphere(sa), ConvexShape::Box(bb)) => {
            let contact = SphereBoxTester::test(sa, pose_a, bb, pose_b);
            (contact.phi, contact.normal)
        }
        (ConvexShape::Box(ba), ConvexShape::Sphere(sb)) => {
            let contact = SphereBoxTester::test(sb, pose_b, ba, pose_a);
            (contact.phi, -contact.normal)
        }
        (ConvexShape::Box(ba), ConvexShape::Box(bb)) => {
            let separation = BoxPairTester::separating_axis(ba, pose_a, bb, pose_b);
            (separation.separation, separation.normal)
        }
    }
}

/// Appends the contacts between two convex shapes that lie within `cull_distance`.
pub fn convex_pair_contacts(
    a: &ConvexShape,
    pose_a: &RigidPose,
    b: &ConvexShape,
    pose_b: &RigidPose,
    cull_distance: f32,
    contacts: &mut Vec<ContactPoint>,
) {
    let single = match (a, b) {
        (ConvexShape::Sphere(sa), ConvexShape::Sphere(sb)) => SpherePairTester::test(sa, pose_a, sb, pose_b),
        (ConvexShape::Sphere(sa), ConvexShape::Box(bb)) => SphereBoxTester::test(sa, pose_a, bb, pose_b),
        (ConvexShape::Box(ba), ConvexShape::Sphere(sb)) => SphereBoxTester::test(sb, pose_b, ba, pose_a).flipped(),
        (ConvexShape::Box(ba), ConvexShape::Box(bb)) => {
            BoxPairTester::test(ba, pose_a, bb, pose_b, cull_distance, contacts);
            return;
        }
    };
    if single.phi <= cull_distance {
        contacts.push(single);
    }
}

/// Reduces a manifold to at most `max_points` contacts: the deepest contact first, then repeatedly the
/// candidate farthest from everything already kept.
pub fn reduce_manifold(contacts: &mut Vec<ContactPoint>, max_points: usize) {
    if contacts.len() <= max_points {
        return;
    }
    let max_points = max_points.max(1);
    let deepest = contacts
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.phi.total_cmp(&b.phi))
        .map(|(index, _)| index)
        .unwrap_or(0);
    let mut kept = vec![contacts.swap_remove(deepest)];
    while kept.len() < max_points && !contacts.is_empty() {
        let farthest = contacts
            .iter()
            .enumerate()
            .map(|(index, candidate)| {
                let nearest = kept
                    .iter()
                    .map(|k| k.point_a.distance_squared(candidate.point_a))
                    .fold(f32::MAX, f32::min);
                (index, nearest)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
            .unwrap_or(0);
        kept.push(contacts.swap_remove(farthest));
    }
    *contacts = kept;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduction_keeps_deepest_and_spread() {
        let mut contacts: Vec<ContactPoint> = (0..9)
            .map(|i| {
                let x = (i % 3) as f32 - 1.0;
                let z = (i / 3) as f32 - 1.0;
                let phi = if i == 4 { -0.2 } else { -0.1 };
                ContactPoint::from_point_on_a(Vec3::new(x, 0.0, z), Vec3::Y, phi, i)
            })
            .collect();
        reduce_manifold(&mut contacts, 4);
        assert_eq!(contacts.len(), 4);
        assert_eq!(contacts[0].feature_id, 4);
        // Spread picks corners, not edge midpoints.
        for contact in &contacts[1..] {
            assert!(contact.point_a.x.abs() > 0.5 || contact.point_a.z.abs() > 0.5);
        }
    }

    #[test]
    fn box_sphere_contact_is_flipped_consistently() {
        use crate::physics::collidables::{box_shape::BoxShape, sphere::Sphere};
        let cube = ConvexShape::Box(BoxShape::new(1.0, 1.0, 1.0).unwrap());
        let ball = ConvexShape::Sphere(Sphere::new(0.5).unwrap());
        let mut contacts = Vec::new();
        convex_pair_contacts(
            &cube,
            &RigidPose::IDENTITY,
            &ball,
            &RigidPose::from_position(Vec3::new(0.0, 0.95, 0.0)),
            0.0,
            &mut contacts,
        );
        assert_eq!(contacts.len(), 1);
        // A is the box below, so the normal points down from the ball to the box.
        assert!(contacts[0].normal.y < -0.99);
        assert!(contacts[0].phi < 0.0);
    }
}
