use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, PhysicsResult};
use crate::physics::body_description::BodyDescription;
use crate::physics::body_properties::{BodyInertia, BodyVelocity, PhysicsMaterial, RigidPose};
use crate::physics::collidables::collidable::Collidable;
use crate::physics::handles::BodyHandle;
use crate::utilities::bounding_box::BoundingBox;
use crate::utilities::math_helper::apply_rotation_delta;
use crate::utilities::symmetric3x3::Symmetric3x3;

/// How a body participates in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyKind {
    /// Never moves.
    Static,
    /// Moves along a prescribed path; infinite mass.
    Kinematic,
    /// Fully simulated.
    Dynamic,
    /// Dynamic body that is temporarily excluded from simulation.
    Sleeping,
}

impl BodyKind {
    pub fn name(self) -> &'static str {
        match self {
            BodyKind::Static => "static",
            BodyKind::Kinematic => "kinematic",
            BodyKind::Dynamic => "dynamic",
            BodyKind::Sleeping => "sleeping",
        }
    }

    #[inline(always)]
    pub fn is_dynamic(self) -> bool {
        self == BodyKind::Dynamic
    }

    /// Whether the body can change pose during a tick.
    #[inline(always)]
    pub fn is_movable(self) -> bool {
        matches!(self, BodyKind::Kinematic | BodyKind::Dynamic)
    }
}

/// How a kinematic body is driven during the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KinematicTargetMode {
    /// Body stays where it is.
    None,
    /// Velocity is zeroed at the start of the next tick, then the mode becomes `None`.
    Reset,
    /// Body is moved to the target pose over the sub-steps of the next tick.
    Position,
    /// Body moves with its current velocity.
    Velocity,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KinematicTarget {
    pub mode: KinematicTargetMode,
    pub target: RigidPose,
}

impl Default for KinematicTarget {
    fn default() -> Self {
        Self {
            mode: KinematicTargetMode::Velocity,
            target: RigidPose::IDENTITY,
        }
    }
}

impl KinematicTarget {
    pub fn position(target: RigidPose) -> Self {
        Self {
            mode: KinematicTargetMode::Position,
            target,
        }
    }

    pub fn velocity() -> Self {
        Self::default()
    }
}

/// A simulated rigid body.
///
/// `pose` is the committed pose at the start of the current sub-step, `predicted_pose` the pose being
/// integrated and corrected during it. `previous_pose` is the committed pose of the sub-step before.
#[derive(Debug, Clone)]
pub struct Body {
    handle: BodyHandle,
    kind: BodyKind,
    pub pose: RigidPose,
    pub predicted_pose: RigidPose,
    pub previous_pose: RigidPose,
    pub(crate) tick_start_position: Vec3,
    pub velocity: BodyVelocity,
    pub external_force: Vec3,
    pub external_torque: Vec3,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_enabled: bool,
    pub material: PhysicsMaterial,
    local_inertia: BodyInertia,
    ccd_enabled: bool,
    kinematic_target: KinematicTarget,
    collidables: Vec<Collidable>,
    shapes_revision: u32,
    local_bounds: BoundingBox,
    world_bounds: BoundingBox,
    inflated_bounds: BoundingBox,
}

impl Body {
    fn from_description(handle: BodyHandle, description: BodyDescription) -> Self {
        let pose = RigidPose::new(description.pose.position, description.pose.orientation.normalize());
        let mut body = Self {
            handle,
            kind: description.kind,
            pose,
            predicted_pose: pose,
            previous_pose: pose,
            tick_start_position: pose.position,
            velocity: description.velocity,
            external_force: Vec3::ZERO,
            external_torque: Vec3::ZERO,
            linear_damping: description.linear_damping,
            angular_damping: description.angular_damping,
            gravity_enabled: description.gravity_enabled,
            material: description.material,
            local_inertia: description.local_inertia,
            ccd_enabled: description.ccd_enabled,
            kinematic_target: KinematicTarget::default(),
            collidables: Vec::new(),
            shapes_revision: 0,
            local_bounds: BoundingBox::EMPTY,
            world_bounds: BoundingBox::EMPTY,
            inflated_bounds: BoundingBox::EMPTY,
        };
        if body.kind == BodyKind::Static {
            body.velocity = BodyVelocity::default();
        }
        body.set_collidables(description.collidables);
        body
    }

    #[inline(always)]
    pub fn handle(&self) -> BodyHandle {
        self.handle
    }

    #[inline(always)]
    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    pub(crate) fn set_kind(&mut self, kind: BodyKind) {
        self.kind = kind;
    }

    /// True for awake dynamic bodies; only these respond to constraints.
    #[inline(always)]
    pub fn is_dynamic(&self) -> bool {
        self.kind == BodyKind::Dynamic
    }

    #[inline(always)]
    pub fn is_kinematic(&self) -> bool {
        self.kind == BodyKind::Kinematic
    }

    #[inline(always)]
    pub fn is_sleeping(&self) -> bool {
        self.kind == BodyKind::Sleeping
    }

    /// Inverse mass as seen by constraints. Zero for anything that is not an awake dynamic body.
    #[inline(always)]
    pub fn inverse_mass(&self) -> f32 {
        if self.is_dynamic() {
            self.local_inertia.inverse_mass
        } else {
            0.0
        }
    }

    #[inline(always)]
    pub fn local_inertia(&self) -> &BodyInertia {
        &self.local_inertia
    }

    /// World space inverse inertia at the predicted orientation.
    #[inline(always)]
    pub fn world_inverse_inertia(&self) -> Symmetric3x3 {
        if self.is_dynamic() {
            self.local_inertia.world_inverse_inertia(self.predicted_pose.orientation)
        } else {
            Symmetric3x3::ZERO
        }
    }

    /// Inverse mass felt along `direction` at offset `arm` from the center of mass.
    #[inline(always)]
    pub fn generalized_inverse_mass(&self, arm: Vec3, direction: Vec3) -> f32 {
        if !self.is_dynamic() {
            return 0.0;
        }
        let angular = arm.cross(direction);
        self.local_inertia.inverse_mass + angular.dot(self.world_inverse_inertia().transform(angular))
    }

    /// Moves the predicted pose by a positional impulse applied at `arm`.
    pub fn apply_position_correction(&mut self, correction: Vec3, arm: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        let rotation = self.world_inverse_inertia().transform(arm.cross(correction));
        self.predicted_pose.position += correction * self.local_inertia.inverse_mass;
        self.predicted_pose.orientation = apply_rotation_delta(self.predicted_pose.orientation, rotation);
    }

    /// Changes the velocity by an impulse applied at `arm`.
    pub fn apply_velocity_impulse(&mut self, impulse: Vec3, arm: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        let angular = self.world_inverse_inertia().transform(arm.cross(impulse));
        self.velocity.linear += impulse * self.local_inertia.inverse_mass;
        self.velocity.angular += angular;
    }

    #[inline(always)]
    pub fn ccd_enabled(&self) -> bool {
        self.ccd_enabled
    }

    pub fn set_ccd_enabled(&mut self, ccd_enabled: bool) {
        self.ccd_enabled = ccd_enabled;
    }

    #[inline(always)]
    pub fn kinematic_target(&self) -> &KinematicTarget {
        &self.kinematic_target
    }

    pub(crate) fn kinematic_target_mut(&mut self) -> &mut KinematicTarget {
        &mut self.kinematic_target
    }

    #[inline(always)]
    pub fn collidables(&self) -> &[Collidable] {
        &self.collidables
    }

    /// Replaces the body's shapes. Existing pair state for the body is rebuilt on the next detection pass.
    pub fn set_collidables(&mut self, collidables: Vec<Collidable>) {
        self.collidables = collidables;
        self.shapes_revision = self.shapes_revision.wrapping_add(1);
        self.local_bounds = self
            .collidables
            .iter()
            .fold(BoundingBox::EMPTY, |bounds, collidable| {
                BoundingBox::create_merged(&bounds, &collidable.body_bounds())
            });
        let pose = self.predicted_pose;
        for collidable in &mut self.collidables {
            collidable.update_world_bounds(&pose);
        }
        self.world_bounds = self.local_bounds.transformed(pose.position, pose.orientation);
        self.inflated_bounds = self.world_bounds;
    }

    #[inline(always)]
    pub fn shapes_revision(&self) -> u32 {
        self.shapes_revision
    }

    /// Union of the collidables' bounds in body space.
    #[inline(always)]
    pub fn local_bounds(&self) -> BoundingBox {
        self.local_bounds
    }

    #[inline(always)]
    pub fn world_bounds(&self) -> BoundingBox {
        self.world_bounds
    }

    /// World bounds covering this sub-step's motion plus slack. Used by the broad phase.
    #[inline(always)]
    pub fn inflated_bounds(&self) -> BoundingBox {
        self.inflated_bounds
    }

    /// Refreshes shape and body bounds at the predicted pose.
    pub fn update_bounds(&mut self, slack: f32, inflation_scale: f32) {
        let pose = self.predicted_pose;
        let mut world_bounds = BoundingBox::EMPTY;
        for collidable in &mut self.collidables {
            collidable.update_world_bounds(&pose);
            world_bounds = BoundingBox::create_merged(&world_bounds, &collidable.world_bounds());
        }
        self.world_bounds = world_bounds;
        let displacement = self.predicted_pose.position - self.pose.position;
        let mut inflated = world_bounds.swept(-displacement * inflation_scale);
        // The CCD sweep covers the whole tick, so the broad phase has to see every substep's pair too.
        if self.ccd_enabled && self.kind.is_movable() {
            let tick_displacement = self.predicted_pose.position - self.tick_start_position;
            inflated = BoundingBox::create_merged(&inflated, &world_bounds.swept(-tick_displacement * inflation_scale));
        }
        self.inflated_bounds = inflated.expanded(slack);
    }

    /// Velocity of a world space point rigidly attached to the body.
    #[inline(always)]
    pub fn point_velocity(&self, world_point: Vec3) -> Vec3 {
        self.velocity.point_velocity(world_point - self.predicted_pose.position)
    }
}

/// Arena of bodies. Handles index the arena and are never reused.
#[derive(Debug, Default, Clone)]
pub struct Bodies {
    slots: Vec<Option<Body>>,
    count: usize,
}

impl Bodies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a body and returns its handle.
    pub fn add(&mut self, description: BodyDescription) -> PhysicsResult<BodyHandle> {
        if !(description.pose.position.is_finite() && description.pose.orientation.is_finite()) {
            return Err(PhysicsError::InvalidConfig("body pose must be finite".into()));
        }
        if description.kind == BodyKind::Sleeping {
            return Err(PhysicsError::InvalidConfig("bodies cannot be added asleep".into()));
        }
        let handle = BodyHandle(self.slots.len() as u32);
        self.slots.push(Some(Body::from_description(handle, description)));
        self.count += 1;
        Ok(handle)
    }

    pub fn remove(&mut self, handle: BodyHandle) -> PhysicsResult<Body> {
        let body = self
            .slots
            .get_mut(handle.index())
            .and_then(Option::take)
            .ok_or(PhysicsError::UnknownBody(handle))?;
        self.count -= 1;
        Ok(body)
    }

    #[inline(always)]
    pub fn get(&self, handle: BodyHandle) -> Option<&Body> {
        self.slots.get(handle.index()).and_then(Option::as_ref)
    }

    #[inline(always)]
    pub fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.slots.get_mut(handle.index()).and_then(Option::as_mut)
    }

    pub fn try_get(&self, handle: BodyHandle) -> PhysicsResult<&Body> {
        self.get(handle).ok_or(PhysicsError::UnknownBody(handle))
    }

    pub fn try_get_mut(&mut self, handle: BodyHandle) -> PhysicsResult<&mut Body> {
        self.get_mut(handle).ok_or(PhysicsError::UnknownBody(handle))
    }

    #[inline(always)]
    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Mutable access to two distinct bodies at once.
    pub fn pair_mut(&mut self, a: BodyHandle, b: BodyHandle) -> Option<(&mut Body, &mut Body)> {
        let (ia, ib) = (a.index(), b.index());
        if ia == ib || ia >= self.slots.len() || ib >= self.slots.len() {
            return None;
        }
        if ia < ib {
            let (low, high) = self.slots.split_at_mut(ib);
            Some((low[ia].as_mut()?, high[0].as_mut()?))
        } else {
            let (low, high) = self.slots.split_at_mut(ia);
            let body_b = low[ib].as_mut()?;
            let body_a = high[0].as_mut()?;
            Some((body_a, body_b))
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Body> {
        self.slots.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Body> {
        self.slots.iter_mut().flatten()
    }
}
