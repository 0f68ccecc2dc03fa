use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, PhysicsResult};
use crate::physics::body_properties::{BodyInertia, RigidPose};
use crate::utilities::bounding_box::BoundingBox;

/// Collision shape representing a solid cuboid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxShape {
    /// Half of the box's width along its local X axis.
    pub half_width: f32,
    /// Half of the box's height along its local Y axis.
    pub half_height: f32,
    /// Half of the box's length along its local Z axis.
    pub half_length: f32,
}

impl BoxShape {
    /// Creates a box shape from its full dimensions.
    pub fn new(width: f32, height: f32, length: f32) -> PhysicsResult<Self> {
        Self::from_half_extents(Vec3::new(width, height, length) * 0.5)
    }

    pub fn from_half_extents(half_extents: Vec3) -> PhysicsResult<Self> {
        if !(half_extents.is_finite() && half_extents.min_element() > 0.0) {
            return Err(PhysicsError::InvalidShape(format!(
                "box half extents must be positive and finite, got {half_extents}"
            )));
        }
        Ok(Self {
            half_width: half_extents.x,
            half_height: half_extents.y,
            half_length: half_extents.z,
        })
    }

    #[inline(always)]
    pub fn half_extents(&self) -> Vec3 {
        Vec3::new(self.half_width, self.half_height, self.half_length)
    }

    pub fn width(&self) -> f32 {
        self.half_width * 2.0
    }
    pub fn height(&self) -> f32 {
        self.half_height * 2.0
    }
    pub fn length(&self) -> f32 {
        self.half_length * 2.0
    }

    /// Bounds of the box rotated by `orientation`, relative to its center.
    #[inline(always)]
    pub fn compute_bounds(&self, orientation: Quat) -> BoundingBox {
        let x = orientation * Vec3::new(self.half_width, 0.0, 0.0);
        let y = orientation * Vec3::new(0.0, self.half_height, 0.0);
        let z = orientation * Vec3::new(0.0, 0.0, self.half_length);
        let max = x.abs() + y.abs() + z.abs();
        BoundingBox::new(-max, max)
    }

    pub fn compute_inertia(&self, mass: f32) -> BodyInertia {
        let mut inertia = BodyInertia::default();
        inertia.inverse_mass = 1.0 / mass;
        let x2 = self.half_width * self.half_width;
        let y2 = self.half_height * self.half_height;
        let z2 = self.half_length * self.half_length;
        inertia.inverse_inertia_tensor.xx = inertia.inverse_mass * 3.0 / (y2 + z2);
        inertia.inverse_inertia_tensor.yy = inertia.inverse_mass * 3.0 / (x2 + z2);
        inertia.inverse_inertia_tensor.zz = inertia.inverse_mass * 3.0 / (x2 + y2);
        inertia
    }

    /// World space corners of the box placed at `pose`. Corner `i` uses the sign of bit 0/1/2 for x/y/z.
    pub fn vertices(&self, pose: &RigidPose) -> [Vec3; 8] {
        let half = self.half_extents();
        std::array::from_fn(|i| {
            let local = Vec3::new(
                if i & 1 == 0 { -half.x } else { half.x },
                if i & 2 == 0 { -half.y } else { half.y },
                if i & 4 == 0 { -half.z } else { half.z },
            );
            pose.transform(local)
        })
    }

    /// Closest point on or in the box to a point given in the box's frame.
    #[inline(always)]
    pub fn clamp_local(&self, local: Vec3) -> Vec3 {
        let half = self.half_extents();
        local.clamp(-half, half)
    }

    /// True when a box-local point lies within the box grown by `margin`.
    #[inline(always)]
    pub fn contains_local(&self, local: Vec3, margin: f32) -> bool {
        let limit = self.half_extents() + Vec3::splat(margin);
        local.abs().cmple(limit).all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_extents() {
        assert!(BoxShape::new(1.0, 0.0, 1.0).is_err());
        assert!(BoxShape::new(1.0, f32::NAN, 1.0).is_err());
        assert!(BoxShape::new(1.0, 2.0, 3.0).is_ok());
    }

    #[test]
    fn vertices_span_the_box() {
        let shape = BoxShape::new(2.0, 4.0, 6.0).unwrap();
        let vertices = shape.vertices(&RigidPose::from_position(Vec3::new(10.0, 0.0, 0.0)));
        assert_eq!(vertices[0], Vec3::new(9.0, -2.0, -3.0));
        assert_eq!(vertices[7], Vec3::new(11.0, 2.0, 3.0));
    }
}
