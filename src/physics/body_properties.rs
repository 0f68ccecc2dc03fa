use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utilities::symmetric3x3::Symmetric3x3;

/// Represents a rigid transformation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidPose {
    /// Orientation of the pose.
    pub orientation: Quat,
    /// Position of the pose.
    pub position: Vec3,
}

impl Default for RigidPose {
    #[inline(always)]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RigidPose {
    /// Returns a pose with a position at (0,0,0) and identity orientation.
    pub const IDENTITY: Self = Self {
        orientation: Quat::IDENTITY,
        position: Vec3::ZERO,
    };

    /// Creates a rigid pose with the given position and orientation.
    #[inline(always)]
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Creates a rigid pose with the given position and identity orientation.
    #[inline(always)]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            orientation: Quat::IDENTITY,
        }
    }

    /// Transforms a point from the pose's local space into world space.
    #[inline(always)]
    pub fn transform(&self, v: Vec3) -> Vec3 {
        self.orientation * v + self.position
    }

    /// Transforms a world space point into the pose's local space.
    #[inline(always)]
    pub fn transform_by_inverse(&self, v: Vec3) -> Vec3 {
        self.orientation.conjugate() * (v - self.position)
    }

    /// Inverts the rigid transformation of the pose.
    #[inline(always)]
    pub fn invert(&self) -> RigidPose {
        let orientation = self.orientation.conjugate();
        RigidPose {
            orientation,
            position: -(orientation * self.position),
        }
    }

    /// Concatenates two poses: the result applies `a` first, then `b`.
    #[inline(always)]
    pub fn multiply(a: &RigidPose, b: &RigidPose) -> RigidPose {
        RigidPose {
            orientation: (b.orientation * a.orientation).normalize(),
            position: b.orientation * a.position + b.position,
        }
    }

    /// Returns the pose translated by `offset` with the same orientation.
    #[inline(always)]
    pub fn translated(&self, offset: Vec3) -> RigidPose {
        RigidPose {
            orientation: self.orientation,
            position: self.position + offset,
        }
    }
}

impl fmt::Display for RigidPose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.position, self.orientation)
    }
}

/// Linear and angular velocity of a body, both in world space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyVelocity {
    pub linear: Vec3,
    pub angular: Vec3,
}

impl BodyVelocity {
    #[inline(always)]
    pub fn new(linear: Vec3, angular: Vec3) -> Self {
        Self { linear, angular }
    }

    /// Velocity of the body point at offset `arm` from its center of mass.
    #[inline(always)]
    pub fn point_velocity(&self, arm: Vec3) -> Vec3 {
        self.linear + self.angular.cross(arm)
    }
}

/// Stores the inertia for a body in its local space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BodyInertia {
    /// Inverse of the body's inertia tensor.
    pub inverse_inertia_tensor: Symmetric3x3,
    /// Inverse of the body's mass.
    pub inverse_mass: f32,
}

impl BodyInertia {
    /// Inertia of a body that cannot be moved by constraints.
    pub const INFINITE: Self = Self {
        inverse_inertia_tensor: Symmetric3x3::ZERO,
        inverse_mass: 0.0,
    };

    /// Rotates the local inverse inertia into world space for the given orientation.
    #[inline(always)]
    pub fn world_inverse_inertia(&self, orientation: Quat) -> Symmetric3x3 {
        Symmetric3x3::rotation_sandwich(&Mat3::from_quat(orientation), &self.inverse_inertia_tensor)
    }
}

/// Surface response of a body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsMaterial {
    pub friction: f32,
    pub restitution: f32,
}

impl Default for PhysicsMaterial {
    fn default() -> Self {
        Self {
            friction: 0.5,
            restitution: 0.0,
        }
    }
}

impl PhysicsMaterial {
    #[inline(always)]
    pub fn new(friction: f32, restitution: f32) -> Self {
        Self {
            friction,
            restitution,
        }
    }

    /// Combines two materials for a contact: the grippier friction and the less bouncy restitution win.
    #[inline(always)]
    pub fn combine(a: &PhysicsMaterial, b: &PhysicsMaterial) -> PhysicsMaterial {
        PhysicsMaterial {
            friction: a.friction.max(b.friction),
            restitution: a.restitution.min(b.restitution),
        }
    }
}

/// Group/mask collision filtering. Two shapes may collide when each one's group intersects the other's mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionFilter {
    pub group: u32,
    pub mask: u32,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self {
            group: 1,
            mask: u32::MAX,
        }
    }
}

impl CollisionFilter {
    #[inline(always)]
    pub fn new(group: u32, mask: u32) -> Self {
        Self { group, mask }
    }

    #[inline(always)]
    pub fn allows(&self, other: &CollisionFilter) -> bool {
        (self.group & other.mask) != 0 && (other.group & self.mask) != 0
    }
}
