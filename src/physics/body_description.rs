use crate::error::{PhysicsError, PhysicsResult};
use crate::physics::bodies::BodyKind;
use crate::physics::body_properties::{BodyInertia, BodyVelocity, PhysicsMaterial, RigidPose};
use crate::physics::collidables::collidable::Collidable;

/// Describes a body's initial state.
#[derive(Debug, Clone)]
pub struct BodyDescription {
    /// Position and orientation of the body.
    pub pose: RigidPose,
    /// Linear and angular velocity of the body.
    pub velocity: BodyVelocity,
    pub kind: BodyKind,
    /// Mass and inertia tensor of the body. Ignored for static and kinematic bodies.
    pub local_inertia: BodyInertia,
    /// Shapes attached to the body.
    pub collidables: Vec<Collidable>,
    pub material: PhysicsMaterial,
    /// Whether the body takes part in continuous collision detection.
    pub ccd_enabled: bool,
    pub gravity_enabled: bool,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl BodyDescription {
    fn with_kind(kind: BodyKind, pose: RigidPose, local_inertia: BodyInertia, collidables: Vec<Collidable>) -> Self {
        Self {
            pose,
            velocity: BodyVelocity::default(),
            kind,
            local_inertia,
            collidables,
            material: PhysicsMaterial::default(),
            ccd_enabled: false,
            gravity_enabled: true,
            linear_damping: 0.0,
            angular_damping: 0.0,
        }
    }

    /// Creates a dynamic body description. Inertia is derived from the first collidable's geometry.
    pub fn create_dynamic(pose: RigidPose, mass: f32, collidables: Vec<Collidable>) -> PhysicsResult<Self> {
        if !(mass.is_finite() && mass > 0.0) {
            return Err(PhysicsError::InvalidConfig(format!(
                "dynamic bodies need a positive mass, got {mass}"
            )));
        }
        let first = collidables
            .first()
            .ok_or_else(|| PhysicsError::InvalidShape("dynamic bodies need at least one collidable".into()))?;
        let inertia = first.geometry().compute_inertia(mass);
        Ok(Self::with_kind(BodyKind::Dynamic, pose, inertia, collidables))
    }

    /// Creates a kinematic body description. Kinematic bodies have infinite mass and follow targets or velocity.
    pub fn create_kinematic(pose: RigidPose, collidables: Vec<Collidable>) -> Self {
        Self::with_kind(BodyKind::Kinematic, pose, BodyInertia::INFINITE, collidables)
    }

    pub fn create_static(pose: RigidPose, collidables: Vec<Collidable>) -> Self {
        Self::with_kind(BodyKind::Static, pose, BodyInertia::INFINITE, collidables)
    }

    pub fn with_velocity(mut self, velocity: BodyVelocity) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_material(mut self, material: PhysicsMaterial) -> Self {
        self.material = material;
        self
    }

    pub fn with_ccd(mut self, ccd_enabled: bool) -> Self {
        self.ccd_enabled = ccd_enabled;
        self
    }

    pub fn with_gravity(mut self, gravity_enabled: bool) -> Self {
        self.gravity_enabled = gravity_enabled;
        self
    }

    pub fn with_damping(mut self, linear_damping: f32, angular_damping: f32) -> Self {
        self.linear_damping = linear_damping;
        self.angular_damping = angular_damping;
        self
    }
}
