use glam::{Quat, Vec3};

/// Lengths below this are treated as zero when normalizing directions.
pub const DIRECTION_EPSILON: f32 = 1e-6;

/// Returns -1 if the value is negative and 1 otherwise.
#[inline(always)]
pub fn binary_sign(x: f32) -> f32 {
    if x < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Integrates an orientation by a world space angular velocity over dt.
///
/// Orientation integration is a piecewise linear approximation; no gyroscopic terms are included.
#[inline(always)]
pub fn integrate_orientation(orientation: Quat, angular_velocity: Vec3, dt: f32) -> Quat {
    let speed = angular_velocity.length();
    if speed > 1e-15 {
        let half_angle = speed * dt * 0.5;
        let scale = half_angle.sin() / speed;
        let q = Quat::from_xyzw(
            angular_velocity.x * scale,
            angular_velocity.y * scale,
            angular_velocity.z * scale,
            half_angle.cos(),
        );
        (q * orientation).normalize()
    } else {
        orientation
    }
}

/// Recovers the world space angular velocity that takes `from` to `to` over dt.
#[inline(always)]
pub fn angular_velocity_between(from: Quat, to: Quat, dt: f32) -> Vec3 {
    let mut delta = to * from.conjugate();
    if delta.w < 0.0 {
        delta = -delta;
    }
    Vec3::new(delta.x, delta.y, delta.z) * (2.0 / dt)
}

/// Angle in radians of the shortest rotation between two orientations.
#[inline(always)]
pub fn rotation_angle_between(a: Quat, b: Quat) -> f32 {
    let dot = a.dot(b).abs().min(1.0);
    2.0 * dot.acos()
}

/// Applies a small rotation vector to an orientation, as used by position-level corrections.
#[inline(always)]
pub fn apply_rotation_delta(orientation: Quat, rotation: Vec3) -> Quat {
    let spin = Quat::from_xyzw(rotation.x, rotation.y, rotation.z, 0.0) * orientation;
    Quat::from_xyzw(
        orientation.x + 0.5 * spin.x,
        orientation.y + 0.5 * spin.y,
        orientation.z + 0.5 * spin.z,
        orientation.w + 0.5 * spin.w,
    )
    .normalize()
}

/// Removes the component of `v` along the unit vector `normal`.
#[inline(always)]
pub fn tangential_component(v: Vec3, normal: Vec3) -> Vec3 {
    v - normal * v.dot(normal)
}
