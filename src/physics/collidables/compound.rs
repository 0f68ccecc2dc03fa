use crate::error::{PhysicsError, PhysicsResult};
use crate::physics::body_properties::RigidPose;
use crate::utilities::bounding_box::BoundingBox;

use super::shape::ConvexShape;

/// Shape and pose of a child within a compound shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompoundChild {
    /// Pose of the child relative to the compound's frame.
    pub local_pose: RigidPose,
    pub shape: ConvexShape,
}

/// Union of convex children sharing one body.
#[derive(Debug, Clone, PartialEq)]
pub struct Compound {
    children: Vec<CompoundChild>,
    bounds: BoundingBox,
}

impl Compound {
    pub fn new(children: Vec<CompoundChild>) -> PhysicsResult<Self> {
        if children.is_empty() {
            return Err(PhysicsError::InvalidShape("compound needs at least one child".into()));
        }
        let bounds = children.iter().fold(BoundingBox::EMPTY, |bounds, child| {
            let child_bounds = child
                .shape
                .compute_bounds(child.local_pose.orientation)
                .translated(child.local_pose.position);
            BoundingBox::create_merged(&bounds, &child_bounds)
        });
        Ok(Self { children, bounds })
    }

    #[inline(always)]
    pub fn children(&self) -> &[CompoundChild] {
        &self.children
    }

    #[inline(always)]
    pub fn local_bounds(&self) -> BoundingBox {
        self.bounds
    }
}
