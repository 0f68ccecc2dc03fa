use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::box_shape::BoxShape;
use super::compound::Compound;
use super::level_set::LevelSet;
use super::sphere::Sphere;
use crate::error::PhysicsResult;
use crate::physics::body_properties::BodyInertia;
use crate::utilities::bounding_box::BoundingBox;

/// Kind of geometry behind a collidable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeType {
    Sphere,
    Box,
    LevelSet,
    Compound,
}

impl ShapeType {
    /// Convex shapes produce a single manifold per pair and support manifold restoration.
    #[inline(always)]
    pub fn is_convex(self) -> bool {
        matches!(self, ShapeType::Sphere | ShapeType::Box)
    }
}

/// Convex primitive. Also the building block of compounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConvexShape {
    Sphere(Sphere),
    Box(BoxShape),
}

impl ConvexShape {
    #[inline(always)]
    pub fn shape_type(&self) -> ShapeType {
        match self {
            ConvexShape::Sphere(_) => ShapeType::Sphere,
            ConvexShape::Box(_) => ShapeType::Box,
        }
    }

    /// Bounds of the shape rotated by `orientation`, relative to its center.
    pub fn compute_bounds(&self, orientation: Quat) -> BoundingBox {
        match self {
            ConvexShape::Sphere(sphere) => sphere.compute_bounds(),
            ConvexShape::Box(shape) => shape.compute_bounds(orientation),
        }
    }

    pub fn compute_inertia(&self, mass: f32) -> BodyInertia {
        match self {
            ConvexShape::Sphere(sphere) => sphere.compute_inertia(mass),
            ConvexShape::Box(shape) => shape.compute_inertia(mass),
        }
    }
}

/// Geometry attached to a body through a [`Collidable`](super::collidable::Collidable).
#[derive(Debug, Clone)]
pub enum ShapeGeometry {
    Convex(ConvexShape),
    LevelSet(Arc<LevelSet>),
    Compound(Arc<Compound>),
}

impl ShapeGeometry {
    pub fn sphere(radius: f32) -> PhysicsResult<Self> {
        Ok(ShapeGeometry::Convex(ConvexShape::Sphere(Sphere::new(radius)?)))
    }

    /// Box geometry from half extents.
    pub fn cuboid(half_extents: Vec3) -> PhysicsResult<Self> {
        Ok(ShapeGeometry::Convex(ConvexShape::Box(BoxShape::from_half_extents(half_extents)?)))
    }

    pub fn level_set(level_set: LevelSet) -> Self {
        ShapeGeometry::LevelSet(Arc::new(level_set))
    }

    pub fn compound(compound: Compound) -> Self {
        ShapeGeometry::Compound(Arc::new(compound))
    }

    pub fn shape_type(&self) -> ShapeType {
        match self {
            ShapeGeometry::Convex(convex) => convex.shape_type(),
            ShapeGeometry::LevelSet(_) => ShapeType::LevelSet,
            ShapeGeometry::Compound(_) => ShapeType::Compound,
        }
    }

    /// Bounds of the geometry in its own frame.
    pub fn local_bounds(&self) -> BoundingBox {
        match self {
            ShapeGeometry::Convex(convex) => convex.compute_bounds(Quat::IDENTITY),
            ShapeGeometry::LevelSet(level_set) => level_set.local_bounds(),
            ShapeGeometry::Compound(compound) => compound.local_bounds(),
        }
    }

    /// Inertia of the geometry. Non-convex geometry is approximated by its bounding box.
    pub fn compute_inertia(&self, mass: f32) -> BodyInertia {
        match self {
            ShapeGeometry::Convex(convex) => convex.compute_inertia(mass),
            ShapeGeometry::LevelSet(_) | ShapeGeometry::Compound(_) => {
                let half = self.local_bounds().half_extents().max(Vec3::splat(1e-4));
                BoxShape {
                    half_width: half.x,
                    half_height: half.y,
                    half_length: half.z,
                }
                .compute_inertia(mass)
            }
        }
    }
}

impl From<ConvexShape> for ShapeGeometry {
    fn from(convex: ConvexShape) -> Self {
        ShapeGeometry::Convex(convex)
    }
}
