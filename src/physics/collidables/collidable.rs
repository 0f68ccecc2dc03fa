use crate::physics::body_properties::{CollisionFilter, RigidPose};
use crate::utilities::bounding_box::BoundingBox;

use super::shape::{ShapeGeometry, ShapeType};

/// A shape attached to a body at a fixed offset.
#[derive(Debug, Clone)]
pub struct Collidable {
    geometry: ShapeGeometry,
    /// Pose of the shape relative to the body's center of mass.
    pub local_pose: RigidPose,
    pub filter: CollisionFilter,
    shape_bounds: BoundingBox,
    world_bounds: BoundingBox,
}

impl Collidable {
    pub fn new(geometry: ShapeGeometry, local_pose: RigidPose) -> Self {
        let shape_bounds = geometry.local_bounds();
        Self {
            geometry,
            local_pose,
            filter: CollisionFilter::default(),
            shape_bounds,
            world_bounds: BoundingBox::EMPTY,
        }
    }

    /// Collidable centered on the body.
    pub fn centered(geometry: ShapeGeometry) -> Self {
        Self::new(geometry, RigidPose::IDENTITY)
    }

    pub fn with_filter(mut self, filter: CollisionFilter) -> Self {
        self.filter = filter;
        self
    }

    #[inline(always)]
    pub fn geometry(&self) -> &ShapeGeometry {
        &self.geometry
    }

    #[inline(always)]
    pub fn shape_type(&self) -> ShapeType {
        self.geometry.shape_type()
    }

    /// Bounds in the shape's own frame.
    #[inline(always)]
    pub fn shape_bounds(&self) -> BoundingBox {
        self.shape_bounds
    }

    /// Bounds in the body's frame.
    pub fn body_bounds(&self) -> BoundingBox {
        self.shape_bounds
            .transformed(self.local_pose.position, self.local_pose.orientation)
    }

    /// World bounds as of the last [`Collidable::update_world_bounds`].
    #[inline(always)]
    pub fn world_bounds(&self) -> BoundingBox {
        self.world_bounds
    }

    /// World pose of the shape for a given body pose.
    #[inline(always)]
    pub fn world_pose(&self, body_pose: &RigidPose) -> RigidPose {
        RigidPose::multiply(&self.local_pose, body_pose)
    }

    pub fn update_world_bounds(&mut self, body_pose: &RigidPose) {
        let pose = self.world_pose(body_pose);
        self.world_bounds = self.shape_bounds.transformed(pose.position, pose.orientation);
    }

    /// Relative motion above which this shape is considered at risk of tunneling.
    #[inline(always)]
    pub fn ccd_threshold(&self, fraction: f32) -> f32 {
        self.shape_bounds.min_extent() * fraction
    }
}
