use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, PhysicsResult};
use crate::physics::body_properties::BodyInertia;
use crate::utilities::bounding_box::BoundingBox;

/// Collision shape representing a sphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    /// Radius of the sphere.
    pub radius: f32,
}

impl Sphere {
    /// Creates a sphere shape.
    pub fn new(radius: f32) -> PhysicsResult<Self> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(PhysicsError::InvalidShape(format!(
                "sphere radius must be positive and finite, got {radius}"
            )));
        }
        Ok(Self { radius })
    }

    /// Bounds in the sphere's own frame. Orientation never matters for a sphere.
    #[inline(always)]
    pub fn compute_bounds(&self) -> BoundingBox {
        BoundingBox::from_center_half_extents(Vec3::ZERO, Vec3::splat(self.radius))
    }

    pub fn compute_inertia(&self, mass: f32) -> BodyInertia {
        let mut inertia = BodyInertia::default();
        inertia.inverse_mass = 1.0 / mass;
        inertia.inverse_inertia_tensor.xx = inertia.inverse_mass / ((2.0 / 5.0) * self.radius * self.radius);
        inertia.inverse_inertia_tensor.yy = inertia.inverse_inertia_tensor.xx;
        inertia.inverse_inertia_tensor.zz = inertia.inverse_inertia_tensor.xx;
        inertia
    }

    /// Farthest point of the sphere along `direction`, in the sphere's frame.
    #[inline(always)]
    pub fn support(&self, direction: Vec3) -> Vec3 {
        direction.normalize_or_zero() * self.radius
    }
}
