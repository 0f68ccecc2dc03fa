use core::ops::{Add, Mul};
use glam::{Mat3, Vec3};

/// Lower left triangle (including diagonal) of a symmetric 3x3 matrix.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Symmetric3x3 {
    /// First row, first column of the matrix.
    pub xx: f32,
    /// Second row, first column of the matrix.
    pub yx: f32,
    /// Second row, second column of the matrix.
    pub yy: f32,
    /// Third row, first column of the matrix.
    pub zx: f32,
    /// Third row, second column of the matrix.
    pub zy: f32,
    /// Third row, third column of the matrix.
    pub zz: f32,
}

impl Symmetric3x3 {
    pub const ZERO: Self = Self {
        xx: 0.0,
        yx: 0.0,
        yy: 0.0,
        zx: 0.0,
        zy: 0.0,
        zz: 0.0,
    };

    #[inline(always)]
    pub fn from_diagonal(diagonal: Vec3) -> Self {
        Self {
            xx: diagonal.x,
            yy: diagonal.y,
            zz: diagonal.z,
            ..Self::ZERO
        }
    }

    /// Builds the symmetric matrix from the lower triangle of `m`.
    #[inline(always)]
    pub fn from_mat3(m: &Mat3) -> Self {
        Self {
            xx: m.x_axis.x,
            yx: m.x_axis.y,
            yy: m.y_axis.y,
            zx: m.x_axis.z,
            zy: m.y_axis.z,
            zz: m.z_axis.z,
        }
    }

    #[inline(always)]
    pub fn to_mat3(&self) -> Mat3 {
        Mat3::from_cols(
            Vec3::new(self.xx, self.yx, self.zx),
            Vec3::new(self.yx, self.yy, self.zy),
            Vec3::new(self.zx, self.zy, self.zz),
        )
    }

    /// Computes r * m * rT for a symmetric matrix m and a rotation matrix r.
    /// Moves a body-local inertia tensor into world space.
    #[inline(always)]
    pub fn rotation_sandwich(r: &Mat3, m: &Self) -> Self {
        let i11 = r.x_axis.x * m.xx + r.y_axis.x * m.yx + r.z_axis.x * m.zx;
        let i12 = r.x_axis.x * m.yx + r.y_axis.x * m.yy + r.z_axis.x * m.zy;
        let i13 = r.x_axis.x * m.zx + r.y_axis.x * m.zy + r.z_axis.x * m.zz;

        let i21 = r.x_axis.y * m.xx + r.y_axis.y * m.yx + r.z_axis.y * m.zx;
        let i22 = r.x_axis.y * m.yx + r.y_axis.y * m.yy + r.z_axis.y * m.zy;
        let i23 = r.x_axis.y * m.zx + r.y_axis.y * m.zy + r.z_axis.y * m.zz;

        let i31 = r.x_axis.z * m.xx + r.y_axis.z * m.yx + r.z_axis.z * m.zx;
        let i32 = r.x_axis.z * m.yx + r.y_axis.z * m.yy + r.z_axis.z * m.zy;
        let i33 = r.x_axis.z * m.zx + r.y_axis.z * m.zy + r.z_axis.z * m.zz;

        Self {
            xx: i11 * r.x_axis.x + i12 * r.y_axis.x + i13 * r.z_axis.x,
            yx: i21 * r.x_axis.x + i22 * r.y_axis.x + i23 * r.z_axis.x,
            yy: i21 * r.x_axis.y + i22 * r.y_axis.y + i23 * r.z_axis.y,
            zx: i31 * r.x_axis.x + i32 * r.y_axis.x + i33 * r.z_axis.x,
            zy: i31 * r.x_axis.y + i32 * r.y_axis.y + i33 * r.z_axis.y,
            zz: i31 * r.x_axis.z + i32 * r.y_axis.z + i33 * r.z_axis.z,
        }
    }

    /// Computes the determinant of a symmetric matrix.
    #[inline(always)]
    pub fn determinant(&self) -> f32 {
        let m11 = self.yy * self.zz - self.zy * self.zy;
        let m21 = self.zy * self.zx - self.zz * self.yx;
        let m31 = self.yx * self.zy - self.zx * self.yy;
        m11 * self.xx + m21 * self.yx + m31 * self.zx
    }

    /// Inverts the matrix. Returns None for singular input.
    #[inline(always)]
    pub fn invert(&self) -> Option<Self> {
        let m11 = self.yy * self.zz - self.zy * self.zy;
        let m21 = self.zy * self.zx - self.zz * self.yx;
        let m31 = self.yx * self.zy - self.zx * self.yy;
        let determinant = m11 * self.xx + m21 * self.yx + m31 * self.zx;
        if determinant.abs() <= f32::MIN_POSITIVE {
            return None;
        }
        let determinant_inverse = 1.0 / determinant;

        let m22 = self.zz * self.xx - self.zx * self.zx;
        let m32 = self.zx * self.yx - self.xx * self.zy;
        let m33 = self.xx * self.yy - self.yx * self.yx;

        Some(Self {
            xx: m11 * determinant_inverse,
            yx: m21 * determinant_inverse,
            zx: m31 * determinant_inverse,
            yy: m22 * determinant_inverse,
            zy: m32 * determinant_inverse,
            zz: m33 * determinant_inverse,
        })
    }

    /// Computes m * v.
    #[inline(always)]
    pub fn transform(&self, v: Vec3) -> Vec3 {
        Vec3::new(
            self.xx * v.x + self.yx * v.y + self.zx * v.z,
            self.yx * v.x + self.yy * v.y + self.zy * v.z,
            self.zx * v.x + self.zy * v.y + self.zz * v.z,
        )
    }
}

impl Add for Symmetric3x3 {
    type Output = Self;

    #[inline(always)]
    fn add(self, b: Self) -> Self {
        Self {
            xx: self.xx + b.xx,
            yx: self.yx + b.yx,
            yy: self.yy + b.yy,
            zx: self.zx + b.zx,
            zy: self.zy + b.zy,
            zz: self.zz + b.zz,
        }
    }
}

impl Mul<f32> for Symmetric3x3 {
    type Output = Self;

    #[inline(always)]
    fn mul(self, scale: f32) -> Self {
        Self {
            xx: self.xx * scale,
            yx: self.yx * scale,
            yy: self.yy * scale,
            zx: self.zx * scale,
            zy: self.zy * scale,
            zz: self.zz * scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use glam::Quat;

    #[test]
    fn sandwich_matches_matrix_product() {
        let m = Symmetric3x3 {
            xx: 2.0,
            yx: 0.1,
            yy: 3.0,
            zx: -0.2,
            zy: 0.3,
            zz: 4.0,
        };
        let r = Mat3::from_quat(Quat::from_euler(glam::EulerRot::XYZ, 0.3, -0.7, 1.1));
        let expected = r * m.to_mat3() * r.transpose();
        let sandwich = Symmetric3x3::rotation_sandwich(&r, &m).to_mat3();
        for (a, b) in expected.to_cols_array().iter().zip(sandwich.to_cols_array().iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-5);
        }
    }

    #[test]
    fn invert_round_trips_through_transform() {
        let m = Symmetric3x3 {
            xx: 2.0,
            yx: 0.5,
            yy: 3.0,
            zx: 0.0,
            zy: 0.25,
            zz: 1.5,
        };
        let inverse = m.invert().expect("matrix is regular");
        let v = Vec3::new(1.0, -2.0, 0.5);
        let back = inverse.transform(m.transform(v));
        assert_abs_diff_eq!(back.x, v.x, epsilon = 1e-5);
        assert_abs_diff_eq!(back.y, v.y, epsilon = 1e-5);
        assert_abs_diff_eq!(back.z, v.z, epsilon = 1e-5);
        assert!(Symmetric3x3::ZERO.invert().is_none());
    }
}
