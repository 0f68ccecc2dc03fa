use glam::{Mat3, Quat, Vec3};
use std::fmt;

/// Provides simple axis-aligned bounding box functionality.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Location with the lowest X, Y, and Z coordinates in the axis-aligned bounding box.
    pub min: Vec3,
    /// Location with the highest X, Y, and Z coordinates in the axis-aligned bounding box.
    pub max: Vec3,
}

impl Default for BoundingBox {
    #[inline(always)]
    fn default() -> Self {
        Self::EMPTY
    }
}

impl BoundingBox {
    /// Inverted box that merges into anything without contributing volume.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    /// Constructs a bounding box from the specified minimum and maximum.
    #[inline(always)]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Constructs a bounding box centered on `center` spanning `half_extents` along each axis.
    #[inline(always)]
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Determines if a bounding box intersects another bounding box.
    #[inline(always)]
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        Self::intersects_bounds(self.min, self.max, other.min, other.max)
    }

    /// Determines if a bounding box intersects another bounding box.
    #[inline(always)]
    pub fn intersects_bounds(min_a: Vec3, max_a: Vec3, min_b: Vec3, max_b: Vec3) -> bool {
        let no_intersection_on_axes = max_a.cmplt(min_b) | max_b.cmplt(min_a);
        !no_intersection_on_axes.any()
    }

    #[inline(always)]
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Computes a bounding box which contains two other bounding boxes.
    #[inline(always)]
    pub fn create_merged(a: &BoundingBox, b: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: a.min.min(b.min),
            max: a.max.max(b.max),
        }
    }

    /// Returns the box grown by `margin` on every side.
    #[inline(always)]
    pub fn expanded(&self, margin: f32) -> BoundingBox {
        BoundingBox {
            min: self.min - Vec3::splat(margin),
            max: self.max + Vec3::splat(margin),
        }
    }

    /// Returns the box stretched so that it also covers itself translated by `displacement`.
    #[inline(always)]
    pub fn swept(&self, displacement: Vec3) -> BoundingBox {
        BoundingBox {
            min: self.min + displacement.min(Vec3::ZERO),
            max: self.max + displacement.max(Vec3::ZERO),
        }
    }

    #[inline(always)]
    pub fn translated(&self, offset: Vec3) -> BoundingBox {
        BoundingBox {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    #[inline(always)]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline(always)]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Full size of the box along each axis.
    #[inline(always)]
    pub fn extents(&self) -> Vec3 {
        self.max - self.min
    }

    /// Smallest full extent of the box. Used to scale per-body tolerances.
    #[inline(always)]
    pub fn min_extent(&self) -> f32 {
        self.extents().min_element()
    }

    #[inline(always)]
    pub fn max_extent(&self) -> f32 {
        self.extents().max_element()
    }

    /// Computes the volume of the bounding box.
    #[inline(always)]
    pub fn compute_volume(&self) -> f32 {
        let diagonal = self.max - self.min;
        diagonal.x * diagonal.y * diagonal.z
    }

    /// True when min does not exceed max on any axis.
    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    /// Computes the axis-aligned box enclosing this box after it has been rotated by
    /// `orientation` and then moved by `position`.
    pub fn transformed(&self, position: Vec3, orientation: Quat) -> BoundingBox {
        let basis = Mat3::from_quat(orientation);
        let center = basis * self.center() + position;
        let half = absolute(&basis) * self.half_extents();
        BoundingBox::from_center_half_extents(center, half)
    }

    /// Computes the axis-aligned box, in the local space of the frame `(position, orientation)`,
    /// that encloses this world space box.
    pub fn transformed_by_inverse(&self, position: Vec3, orientation: Quat) -> BoundingBox {
        let inverse = orientation.inverse();
        let basis = Mat3::from_quat(inverse);
        let center = inverse * (self.center() - position);
        let half = absolute(&basis) * self.half_extents();
        BoundingBox::from_center_half_extents(center, half)
    }
}

#[inline(always)]
fn absolute(basis: &Mat3) -> Mat3 {
    Mat3::from_cols(basis.x_axis.abs(), basis.y_axis.abs(), basis.z_axis.abs())
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.min, self.max)
    }
}
