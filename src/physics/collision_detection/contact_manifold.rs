use glam::Vec3;
use std::fmt;

use super::collision_tasks::ContactPoint;
use crate::physics::body_properties::{PhysicsMaterial, RigidPose};
use crate::physics::handles::BodyHandle;

/// Pair of body-local anchors that a sticking contact is pulled back to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrictionAnchor {
    pub local_anchor_a: Vec3,
    pub local_anchor_b: Vec3,
}

/// Information about a single contact of a manifold, stored relative to the bodies so that it can be
/// re-evaluated at new poses without rerunning the narrow phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManifoldPoint {
    /// Contact location on A, in A's body frame.
    pub local_anchor_a: Vec3,
    /// Contact location on B, in B's body frame.
    pub local_anchor_b: Vec3,
    /// Contact normal in B's body frame. Points from B to A.
    pub local_normal: Vec3,
    /// Signed separation at the last evaluation. Negative values represent penetration.
    pub phi: f32,
    /// Id of the features involved in the collision that generated this contact.
    pub feature_id: u32,
    pub friction_anchor: Option<FrictionAnchor>,
    pub(crate) normal_lambda: f32,
    pub(crate) initial_normal_velocity: f32,
}

/// Separation state of a manifold point at specific poses, in world space.
#[derive(Debug, Clone, Copy)]
pub struct PointFrame {
    pub world_a: Vec3,
    pub world_b: Vec3,
    pub normal: Vec3,
    pub phi: f32,
}

impl ManifoldPoint {
    pub fn from_contact(contact: &ContactPoint, pose_a: &RigidPose, pose_b: &RigidPose) -> Self {
        Self {
            local_anchor_a: pose_a.transform_by_inverse(contact.point_a),
            local_anchor_b: pose_b.transform_by_inverse(contact.point_b),
            local_normal: pose_b.orientation.conjugate() * contact.normal,
            phi: contact.phi,
            feature_id: contact.feature_id,
            friction_anchor: None,
            normal_lambda: 0.0,
            initial_normal_velocity: 0.0,
        }
    }

    /// Evaluates the point at the given body poses.
    #[inline(always)]
    pub fn frame(&self, pose_a: &RigidPose, pose_b: &RigidPose, normal_override: Option<Vec3>) -> PointFrame {
        let world_a = pose_a.transform(self.local_anchor_a);
        let world_b = pose_b.transform(self.local_anchor_b);
        let normal = normal_override.unwrap_or(pose_b.orientation * self.local_normal);
        PointFrame {
            world_a,
            world_b,
            normal,
            phi: (world_a - world_b).dot(normal),
        }
    }
}

/// Epoch bookkeeping shared by every constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintBookkeeping {
    pub creation_epoch: u64,
    /// Detection pass in which the constraint was last generated, restored or woken.
    pub last_used_epoch: u64,
}

/// Contact constraint between two shapes of two bodies.
///
/// Constraints are owned by the pair detector that produced them and persist across ticks so that
/// manifolds can be restored and friction anchors carried over.
#[derive(Debug, Clone)]
pub struct ContactConstraint {
    body_a: BodyHandle,
    body_b: BodyHandle,
    shape_a: usize,
    shape_b: usize,
    pub(crate) points: Vec<ManifoldPoint>,
    base_material: PhysicsMaterial,
    pub friction: f32,
    pub restitution: f32,
    cull_distance: f32,
    ccd_enabled: bool,
    time_of_impact: f32,
    disabled: bool,
    normal_override: Option<Vec3>,
    pub(crate) bookkeeping: ConstraintBookkeeping,
    /// Pose of B relative to A when the narrow phase last ran for this constraint.
    pub(crate) generated_relative_pose: Option<RigidPose>,
}

impl ContactConstraint {
    pub fn new(
        body_a: BodyHandle,
        body_b: BodyHandle,
        shape_a: usize,
        shape_b: usize,
        material: PhysicsMaterial,
        cull_distance: f32,
        epoch: u64,
    ) -> Self {
        Self {
            body_a,
            body_b,
            shape_a,
            shape_b,
            points: Vec::new(),
            base_material: material,
            friction: material.friction,
            restitution: material.restitution,
            cull_distance,
            ccd_enabled: false,
            time_of_impact: f32::INFINITY,
            disabled: false,
            normal_override: None,
            bookkeeping: ConstraintBookkeeping {
                creation_epoch: epoch,
                last_used_epoch: 0,
            },
            generated_relative_pose: None,
        }
    }

    #[inline(always)]
    pub fn body_a(&self) -> BodyHandle {
        self.body_a
    }

    #[inline(always)]
    pub fn body_b(&self) -> BodyHandle {
        self.body_b
    }

    /// Indices of the two collidables within their bodies.
    #[inline(always)]
    pub fn shape_indices(&self) -> (usize, usize) {
        (self.shape_a, self.shape_b)
    }

    #[inline(always)]
    pub fn manifold_points(&self) -> &[ManifoldPoint] {
        &self.points
    }

    #[inline(always)]
    pub fn cull_distance(&self) -> f32 {
        self.cull_distance
    }

    /// Smallest separation over the manifold, infinite when empty.
    pub fn min_phi(&self) -> f32 {
        self.points.iter().map(|p| p.phi).fold(f32::INFINITY, f32::min)
    }

    #[inline(always)]
    pub fn ccd_enabled(&self) -> bool {
        self.ccd_enabled
    }

    #[inline(always)]
    pub fn time_of_impact(&self) -> f32 {
        self.time_of_impact
    }

    /// Swept contacts whose impact happens inside the tick are resolved by the CCD pass, not the solver.
    #[inline(always)]
    pub fn is_swept(&self) -> bool {
        self.ccd_enabled && self.time_of_impact < 1.0
    }

    pub(crate) fn set_swept(&mut self, time_of_impact: f32) {
        self.ccd_enabled = true;
        self.time_of_impact = time_of_impact;
    }

    pub(crate) fn clear_swept(&mut self) {
        self.ccd_enabled = false;
        self.time_of_impact = f32::INFINITY;
    }

    #[inline(always)]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Excludes the constraint from solving for the current tick.
    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    /// Replaces the contact normal of every point for the current tick.
    pub fn override_normal(&mut self, world_normal: Vec3) {
        self.normal_override = world_normal.try_normalize();
    }

    #[inline(always)]
    pub fn normal_override(&self) -> Option<Vec3> {
        self.normal_override
    }

    /// Undoes per-tick changes made by contact modifiers.
    pub(crate) fn reset_modifications(&mut self) {
        self.disabled = false;
        self.normal_override = None;
        self.friction = self.base_material.friction;
        self.restitution = self.base_material.restitution;
    }

    #[inline(always)]
    pub fn last_used_epoch(&self) -> u64 {
        self.bookkeeping.last_used_epoch
    }

    #[inline(always)]
    pub fn creation_epoch(&self) -> u64 {
        self.bookkeeping.creation_epoch
    }

    /// Replaces the manifold with freshly generated contacts.
    ///
    /// With `keep_friction_anchors`, points matching a previous point's feature id inherit its anchor so
    /// that static friction holds across ticks.
    pub(crate) fn set_manifold(
        &mut self,
        contacts: &[ContactPoint],
        pose_a: &RigidPose,
        pose_b: &RigidPose,
        keep_friction_anchors: bool,
    ) {
        let previous = std::mem::take(&mut self.points);
        self.points.extend(contacts.iter().map(|contact| {
            let mut point = ManifoldPoint::from_contact(contact, pose_a, pose_b);
            if keep_friction_anchors {
                point.friction_anchor = previous
                    .iter()
                    .find(|p| p.feature_id == contact.feature_id)
                    .and_then(|p| p.friction_anchor);
            }
            point
        }));
        self.generated_relative_pose = Some(RigidPose::multiply(pose_b, &pose_a.invert()));
    }

    /// Re-evaluates every point's separation from its stored anchors at the given poses.
    pub(crate) fn refresh_from_anchors(&mut self, pose_a: &RigidPose, pose_b: &RigidPose) {
        let normal_override = self.normal_override;
        for point in &mut self.points {
            point.phi = point.frame(pose_a, pose_b, normal_override).phi;
        }
    }

    /// World space contact locations on A at the given poses.
    pub fn world_contact_points(&self, pose_a: &RigidPose, pose_b: &RigidPose) -> Vec<Vec3> {
        self.points
            .iter()
            .map(|p| p.frame(pose_a, pose_b, self.normal_override).world_a)
            .collect()
    }
}

impl fmt::Display for ContactConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Contact<{}:{}, {}:{}> points {} min phi {:.4}",
            self.body_a.0,
            self.shape_a,
            self.body_b.0,
            self.shape_b,
            self.points.len(),
            self.min_phi()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use glam::Quat;

    fn constraint() -> ContactConstraint {
        ContactConstraint::new(BodyHandle(0), BodyHandle(1), 0, 0, PhysicsMaterial::default(), 0.02, 1)
    }

    #[test]
    fn anchors_follow_bodies() {
        let pose_a = RigidPose::from_position(Vec3::new(0.0, 1.0, 0.0));
        let pose_b = RigidPose::IDENTITY;
        let contact = ContactPoint::from_point_on_a(Vec3::new(0.0, 0.5, 0.0), Vec3::Y, -0.01, 3);
        let mut c = constraint();
        c.set_manifold(&[contact], &pose_a, &pose_b, false);
        assert_abs_diff_eq!(c.min_phi(), -0.01, epsilon = 1e-6);

        c.refresh_from_anchors(&pose_a.translated(Vec3::new(0.0, 0.05, 0.0)), &pose_b);
        assert_abs_diff_eq!(c.min_phi(), 0.04, epsilon = 1e-5);

        let rotated_b = RigidPose::new(Vec3::ZERO, Quat::from_rotation_z(std::f32::consts::PI));
        let frame = c.manifold_points()[0].frame(&pose_a, &rotated_b, None);
        assert_abs_diff_eq!(frame.normal.y, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn friction_anchors_carry_by_feature() {
        let pose = RigidPose::IDENTITY;
        let mut c = constraint();
        c.set_manifold(&[ContactPoint::from_point_on_a(Vec3::X, Vec3::Y, 0.0, 7)], &pose, &pose, false);
        let anchor = FrictionAnchor {
            local_anchor_a: Vec3::X,
            local_anchor_b: Vec3::X,
        };
        c.points[0].friction_anchor = Some(anchor);
        let moved = ContactPoint::from_point_on_a(Vec3::new(1.01, 0.0, 0.0), Vec3::Y, 0.0, 7);
        c.set_manifold(&[moved], &pose, &pose, true);
        assert_eq!(c.manifold_points()[0].friction_anchor, Some(anchor));
        c.set_manifold(&[moved], &pose, &pose, false);
        assert_eq!(c.manifold_points()[0].friction_anchor, None);
    }

    #[test]
    fn modifications_reset_each_tick() {
        let mut c = constraint();
        c.set_disabled(true);
        c.friction = 0.0;
        c.override_normal(Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(c.normal_override(), Some(Vec3::Y));
        c.reset_modifications();
        assert!(!c.is_disabled());
        assert_eq!(c.friction, PhysicsMaterial::default().friction);
        assert!(c.normal_override().is_none());
    }
}
