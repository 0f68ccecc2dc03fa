use glam::Vec3;

use super::SweepHit;
use crate::physics::collidables::sphere::Sphere;

/// Solves |s + d t| = ra + rb + tolerance for the earliest t in [0, 1].
pub fn sweep(
    a: &Sphere,
    start_a: Vec3,
    displacement_a: Vec3,
    b: &Sphere,
    start_b: Vec3,
    displacement_b: Vec3,
    tolerance: f32,
) -> Option<SweepHit> {
    let offset = start_a - start_b;
    let motion = displacement_a - displacement_b;
    let radius = a.radius + b.radius + tolerance;
    let c = offset.length_squared() - radius * radius;
    if c <= 0.0 {
        let normal = offset.try_normalize().unwrap_or(Vec3::Y);
        return Some(SweepHit {
            time_of_impact: 0.0,
            normal,
        });
    }
    let a_coefficient = motion.length_squared();
    if a_coefficient <= f32::EPSILON {
        return None;
    }
    let b_coefficient = 2.0 * offset.dot(motion);
    if b_coefficient >= 0.0 {
        // Moving apart.
        return None;
    }
    let discriminant = b_coefficient * b_coefficient - 4.0 * a_coefficient * c;
    if discriminant < 0.0 {
        return None;
    }
    let t = (-b_coefficient - discriminant.sqrt()) / (2.0 * a_coefficient);
    if !(0.0..=1.0).contains(&t) {
        return None;
    }
    let normal = (offset + motion * t).try_normalize()?;
    Some(SweepHit {
        time_of_impact: t,
        normal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn head_on_impact_time() {
        let s = Sphere::new(0.5).unwrap();
        let hit = sweep(&s, Vec3::new(-5.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0), &s, Vec3::ZERO, Vec3::ZERO, 0.0)
            .expect("spheres collide");
        assert_abs_diff_eq!(hit.time_of_impact, 0.4, epsilon = 1e-5);
        assert_abs_diff_eq!(hit.normal.x, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn glancing_miss_and_short_motion() {
        let s = Sphere::new(0.5).unwrap();
        assert!(sweep(&s, Vec3::new(-5.0, 2.0, 0.0), Vec3::new(10.0, 0.0, 0.0), &s, Vec3::ZERO, Vec3::ZERO, 0.0).is_none());
        assert!(sweep(&s, Vec3::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), &s, Vec3::ZERO, Vec3::ZERO, 0.0).is_none());
        assert!(sweep(&s, Vec3::new(-5.0, 0.0, 0.0), Vec3::ZERO, &s, Vec3::ZERO, Vec3::ZERO, 0.0).is_none());
    }
}
