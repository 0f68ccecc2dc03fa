use glam::{UVec3, Vec3};

use crate::error::{PhysicsError, PhysicsResult};
use crate::utilities::bounding_box::BoundingBox;

/// Signed distance field sampled on a regular grid, queried with trilinear interpolation.
///
/// Negative values are inside the surface. Queries outside the grid are clamped to the grid boundary and
/// the remaining distance to the query point is added, so the field stays a usable upper bound far away.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelSet {
    origin: Vec3,
    cell_size: f32,
    /// Number of samples along each axis.
    dimensions: UVec3,
    values: Vec<f32>,
}

impl LevelSet {
    pub fn new(origin: Vec3, cell_size: f32, dimensions: UVec3, values: Vec<f32>) -> PhysicsResult<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(PhysicsError::InvalidShape(format!(
                "level set cell size must be positive, got {cell_size}"
            )));
        }
        if dimensions.min_element() < 2 {
            return Err(PhysicsError::InvalidShape(format!(
                "level set needs at least two samples per axis, got {dimensions}"
            )));
        }
        let expected = (dimensions.x * dimensions.y * dimensions.z) as usize;
        if values.len() != expected {
            return Err(PhysicsError::InvalidShape(format!(
                "level set expects {expected} samples, got {}",
                values.len()
            )));
        }
        if values.iter().any(|value| !value.is_finite()) {
            return Err(PhysicsError::InvalidShape("level set contains non-finite samples".into()));
        }
        Ok(Self {
            origin,
            cell_size,
            dimensions,
            values,
        })
    }

    /// Samples `distance` at every grid node.
    pub fn from_fn(
        origin: Vec3,
        cell_size: f32,
        dimensions: UVec3,
        distance: impl Fn(Vec3) -> f32,
    ) -> PhysicsResult<Self> {
        let mut values = Vec::with_capacity((dimensions.x * dimensions.y * dimensions.z) as usize);
        for z in 0..dimensions.z {
            for y in 0..dimensions.y {
                for x in 0..dimensions.x {
                    let node = origin + Vec3::new(x as f32, y as f32, z as f32) * cell_size;
                    values.push(distance(node));
                }
            }
        }
        Self::new(origin, cell_size, dimensions, values)
    }

    #[inline(always)]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn local_bounds(&self) -> BoundingBox {
        let span = (self.dimensions - UVec3::ONE).as_vec3() * self.cell_size;
        BoundingBox::new(self.origin, self.origin + span)
    }

    #[inline(always)]
    fn sample(&self, x: u32, y: u32, z: u32) -> f32 {
        let index = x + self.dimensions.x * (y + self.dimensions.y * z);
        self.values[index as usize]
    }

    /// Signed distance at a point in the level set's frame.
    pub fn signed_distance(&self, local: Vec3) -> f32 {
        let bounds = self.local_bounds();
        let clamped = local.clamp(bounds.min, bounds.max);
        let outside = (local - clamped).length();

        let grid = (clamped - self.origin) / self.cell_size;
        let upper = (self.dimensions - UVec3::splat(2)).as_vec3();
        let cell = grid.floor().clamp(Vec3::ZERO, upper);
        let t = (grid - cell).clamp(Vec3::ZERO, Vec3::ONE);
        let (x, y, z) = (cell.x as u32, cell.y as u32, cell.z as u32);

        let c00 = lerp(self.sample(x, y, z), self.sample(x + 1, y, z), t.x);
        let c10 = lerp(self.sample(x, y + 1, z), self.sample(x + 1, y + 1, z), t.x);
        let c01 = lerp(self.sample(x, y, z + 1), self.sample(x + 1, y, z + 1), t.x);
        let c11 = lerp(self.sample(x, y + 1, z + 1), self.sample(x + 1, y + 1, z + 1), t.x);
        let c0 = lerp(c00, c10, t.y);
        let c1 = lerp(c01, c11, t.y);
        lerp(c0, c1, t.z) + outside
    }

    /// Outward surface direction at a local point, from central differences of the field.
    pub fn normal(&self, local: Vec3) -> Vec3 {
        let h = self.cell_size * 0.5;
        let gradient = Vec3::new(
            self.signed_distance(local + Vec3::X * h) - self.signed_distance(local - Vec3::X * h),
            self.signed_distance(local + Vec3::Y * h) - self.signed_distance(local - Vec3::Y * h),
            self.signed_distance(local + Vec3::Z * h) - self.signed_distance(local - Vec3::Z * h),
        );
        gradient.try_normalize().unwrap_or(Vec3::Y)
    }

    /// Flattened index of the grid cell containing a local point. Used to key per-cell contacts.
    pub fn cell_index(&self, local: Vec3) -> u64 {
        let upper = (self.dimensions - UVec3::splat(2)).as_vec3();
        let cell = ((local - self.origin) / self.cell_size).floor().clamp(Vec3::ZERO, upper);
        let x = cell.x as u64;
        let y = cell.y as u64;
        let z = cell.z as u64;
        x + self.dimensions.x as u64 * (y + self.dimensions.y as u64 * z)
    }
}

#[inline(always)]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sphere_field() -> LevelSet {
        LevelSet::from_fn(Vec3::splat(-2.0), 0.25, UVec3::splat(17), |p| p.length() - 1.0).unwrap()
    }

    #[test]
    fn interpolates_sphere_distance() {
        let field = sphere_field();
        assert_abs_diff_eq!(field.signed_distance(Vec3::new(1.5, 0.0, 0.0)), 0.5, epsilon = 0.02);
        assert!(field.signed_distance(Vec3::ZERO) < -0.9);
        let normal = field.normal(Vec3::new(0.0, 1.2, 0.0));
        assert_abs_diff_eq!(normal.y, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn extends_beyond_the_grid() {
        let field = sphere_field();
        let inside_edge = field.signed_distance(Vec3::new(2.0, 0.0, 0.0));
        let beyond = field.signed_distance(Vec3::new(5.0, 0.0, 0.0));
        assert_abs_diff_eq!(beyond - inside_edge, 3.0, epsilon = 1e-4);
    }

    #[test]
    fn rejects_mismatched_sample_count() {
        let result = LevelSet::new(Vec3::ZERO, 1.0, UVec3::splat(2), vec![0.0; 7]);
        assert!(matches!(result, Err(PhysicsError::InvalidShape(_))));
    }
}
