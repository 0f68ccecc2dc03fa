//! Position based contact rules.
//!
//! `apply_contact` projects penetrating points apart and enforces static friction against the anchors
//! carried by each point. `apply_push_out` runs after velocities are derived from positions: it fixes the
//! normal velocity (restitution), applies dynamic friction and pushes out remaining penetration without
//! adding velocity.

use glam::Vec3;

use crate::physics::bodies::Body;
use crate::physics::collision_detection::contact_manifold::{ContactConstraint, FrictionAnchor};
use crate::physics::simulation_config::SolverConfig;
use crate::utilities::math_helper::{tangential_component, DIRECTION_EPSILON};

/// Whether the solver should touch the constraint in this sub-step.
#[inline(always)]
pub fn is_solvable(constraint: &ContactConstraint, body_a: &Body, body_b: &Body) -> bool {
    !constraint.is_disabled()
        && !constraint.is_swept()
        && !constraint.manifold_points().is_empty()
        && (body_a.is_dynamic() || body_b.is_dynamic())
}

/// Clears accumulated impulses and records each point's approach speed before any correction is made.
pub fn prepare(constraint: &mut ContactConstraint, body_a: &Body, body_b: &Body) {
    let normal_override = constraint.normal_override();
    for point in &mut constraint.points {
        let frame = point.frame(&body_a.predicted_pose, &body_b.predicted_pose, normal_override);
        point.normal_lambda = 0.0;
        point.initial_normal_velocity =
            (body_a.point_velocity(frame.world_a) - body_b.point_velocity(frame.world_b)).dot(frame.normal);
    }
}

/// Combined inverse mass of both bodies along `direction` at the given contact points.
#[inline(always)]
fn effective_inverse_mass(body_a: &Body, world_a: Vec3, body_b: &Body, world_b: Vec3, direction: Vec3) -> f32 {
    body_a.generalized_inverse_mass(world_a - body_a.predicted_pose.position, direction)
        + body_b.generalized_inverse_mass(world_b - body_b.predicted_pose.position, direction)
}

#[inline(always)]
fn apply_correction(body_a: &mut Body, world_a: Vec3, body_b: &mut Body, world_b: Vec3, correction: Vec3) {
    let arm_a = world_a - body_a.predicted_pose.position;
    let arm_b = world_b - body_b.predicted_pose.position;
    body_a.apply_position_correction(correction, arm_a);
    body_b.apply_position_correction(-correction, arm_b);
}

/// One position iteration over the manifold. Returns true when a correction larger than the convergence
/// tolerance was made.
pub fn apply_contact(
    constraint: &mut ContactConstraint,
    body_a: &mut Body,
    body_b: &mut Body,
    config: &SolverConfig,
) -> bool {
    let normal_override = constraint.normal_override();
    let friction = constraint.friction;
    let mut needs_another = false;
    for point in &mut constraint.points {
        let frame = point.frame(&body_a.predicted_pose, &body_b.predicted_pose, normal_override);
        if frame.phi >= 0.0 {
            continue;
        }
        let w = effective_inverse_mass(body_a, frame.world_a, body_b, frame.world_b, frame.normal);
        if w <= 0.0 {
            continue;
        }
        let delta_lambda = -frame.phi / w;
        point.normal_lambda += delta_lambda;
        apply_correction(body_a, frame.world_a, body_b, frame.world_b, frame.normal * delta_lambda);
        needs_another |= frame.phi.abs() > config.convergence_tolerance;

        if friction <= 0.0 {
            continue;
        }
        let anchor = *point.friction_anchor.get_or_insert_with(|| FrictionAnchor {
            local_anchor_a: body_a.predicted_pose.transform_by_inverse(frame.world_a),
            local_anchor_b: body_b.predicted_pose.transform_by_inverse(frame.world_a),
        });
        let anchor_a = body_a.predicted_pose.transform(anchor.local_anchor_a);
        let anchor_b = body_b.predicted_pose.transform(anchor.local_anchor_b);
        let drift = tangential_component(anchor_a - anchor_b, frame.normal);
        let drift_length = drift.length();
        if drift_length < DIRECTION_EPSILON {
            continue;
        }
        let tangent = drift / drift_length;
        let w_tangent = effective_inverse_mass(body_a, anchor_a, body_b, anchor_b, tangent);
        if w_tangent <= 0.0 {
            continue;
        }
        let static_lambda = drift_length / w_tangent;
        let max_lambda = friction * point.normal_lambda;
        if static_lambda <= max_lambda {
            apply_correction(body_a, anchor_a, body_b, anchor_b, -tangent * static_lambda);
            needs_another |= drift_length > config.convergence_tolerance;
        } else {
            // Sliding: move as far as friction allows, then stick at the new location.
            apply_correction(body_a, anchor_a, body_b, anchor_b, -tangent * max_lambda);
            let sticking = body_a.predicted_pose.transform(anchor.local_anchor_a);
            point.friction_anchor = Some(FrictionAnchor {
                local_anchor_a: anchor.local_anchor_a,
                local_anchor_b: body_b.predicted_pose.transform_by_inverse(sticking),
            });
        }
    }
    needs_another
}

/// One push-out iteration. `iteration` counts from zero; positional push-out ramps up over the iterations.
/// Returns true when a velocity or position change larger than the tolerance was made.
pub fn apply_push_out(
    constraint: &mut ContactConstraint,
    body_a: &mut Body,
    body_b: &mut Body,
    dt: f32,
    iteration: u32,
    num_iterations: u32,
    config: &SolverConfig,
) -> bool {
    let normal_override = constraint.normal_override();
    let friction = constraint.friction;
    let restitution = constraint.restitution;
    let num_iterations = num_iterations.max(1);
    let push_out_scale = (iteration + 2).min(num_iterations) as f32 / num_iterations as f32;
    let mut needs_another = false;
    for point in &mut constraint.points {
        let frame = point.frame(&body_a.predicted_pose, &body_b.predicted_pose, normal_override);
        if point.normal_lambda <= 0.0 && frame.phi >= 0.0 {
            continue;
        }
        let normal = frame.normal;
        let relative_velocity = body_a.point_velocity(frame.world_a) - body_b.point_velocity(frame.world_b);
        let normal_velocity = relative_velocity.dot(normal);
        let target_velocity = if -point.initial_normal_velocity > config.restitution_velocity_threshold {
            -restitution * point.initial_normal_velocity
        } else {
            0.0
        };
        if normal_velocity < target_velocity {
            let w = effective_inverse_mass(body_a, frame.world_a, body_b, frame.world_b, normal);
            if w > 0.0 {
                let delta = target_velocity - normal_velocity;
                let impulse = normal * (delta / w);
                body_a.apply_velocity_impulse(impulse, frame.world_a - body_a.predicted_pose.position);
                body_b.apply_velocity_impulse(-impulse, frame.world_b - body_b.predicted_pose.position);
                needs_another |= delta * dt > config.convergence_tolerance;
            }
        }

        if iteration == 0 && friction > 0.0 && point.normal_lambda > 0.0 {
            let relative_velocity = body_a.point_velocity(frame.world_a) - body_b.point_velocity(frame.world_b);
            let tangential = tangential_component(relative_velocity, normal);
            let speed = tangential.length();
            if speed > DIRECTION_EPSILON {
                let tangent = tangential / speed;
                let w = effective_inverse_mass(body_a, frame.world_a, body_b, frame.world_b, tangent);
                if w > 0.0 {
                    let magnitude = (friction * point.normal_lambda / dt).min(speed / w);
                    let impulse = -tangent * magnitude;
                    body_a.apply_velocity_impulse(impulse, frame.world_a - body_a.predicted_pose.position);
                    body_b.apply_velocity_impulse(-impulse, frame.world_b - body_b.predicted_pose.position);
                }
            }
        }

        if frame.phi < 0.0 {
            let w = effective_inverse_mass(body_a, frame.world_a, body_b, frame.world_b, normal);
            if w > 0.0 {
                let delta_lambda = -frame.phi * push_out_scale / w;
                apply_correction(body_a, frame.world_a, body_b, frame.world_b, normal * delta_lambda);
                needs_another |= frame.phi.abs() > config.convergence_tolerance;
            }
        }
    }
    needs_another
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::bodies::Bodies;
    use crate::physics::body_description::BodyDescription;
    use crate::physics::body_properties::{BodyVelocity, PhysicsMaterial, RigidPose};
    use crate::physics::collidables::collidable::Collidable;
    use crate::physics::collidables::shape::ShapeGeometry;
    use crate::physics::collision_detection::collision_tasks::ContactPoint;
    use crate::physics::handles::BodyHandle;
    use approx::assert_abs_diff_eq;

    const CORNERS: [(f32, f32); 4] = [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)];

    fn scene(depth: f32) -> (Bodies, ContactConstraint) {
        scene_with_points(depth, &CORNERS)
    }

    /// Unit cube resting on a static slab, penetrating it by `depth` at the given (x, z) bottom points.
    fn scene_with_points(depth: f32, points: &[(f32, f32)]) -> (Bodies, ContactConstraint) {
        let mut bodies = Bodies::new();
        let cube = Collidable::centered(ShapeGeometry::cuboid(Vec3::splat(0.5)).unwrap());
        let slab = Collidable::centered(ShapeGeometry::cuboid(Vec3::new(5.0, 0.5, 5.0)).unwrap());
        let a = bodies
            .add(
                BodyDescription::create_dynamic(RigidPose::from_position(Vec3::new(0.0, 1.0 - depth, 0.0)), 1.0, vec![cube])
                    .unwrap(),
            )
            .unwrap();
        let b = bodies.add(BodyDescription::create_static(RigidPose::IDENTITY, vec![slab])).unwrap();
        let mut constraint = ContactConstraint::new(a, b, 0, 0, PhysicsMaterial::new(0.5, 0.0), 0.02, 1);
        let pose_a = bodies.get(a).unwrap().predicted_pose;
        let contacts: Vec<ContactPoint> = points
            .iter()
            .enumerate()
            .map(|(i, &(x, z))| {
                ContactPoint::from_point_on_a(Vec3::new(x, 0.5 - depth, z), Vec3::Y, -depth, i as u32)
            })
            .collect();
        constraint.set_manifold(&contacts, &pose_a, &RigidPose::IDENTITY, false);
        (bodies, constraint)
    }

    fn solve_positions(bodies: &mut Bodies, constraint: &mut ContactConstraint, iterations: u32) -> u32 {
        let config = SolverConfig::default();
        let (a, b) = bodies.pair_mut(BodyHandle(0), BodyHandle(1)).unwrap();
        prepare(constraint, a, b);
        for iteration in 0..iterations {
            if !apply_contact(constraint, a, b, &config) {
                return iteration + 1;
            }
        }
        iterations
    }

    #[test]
    fn penetration_is_projected_out() {
        let (mut bodies, mut constraint) = scene(0.01);
        solve_positions(&mut bodies, &mut constraint, 8);
        let body = bodies.get(BodyHandle(0)).unwrap();
        assert_abs_diff_eq!(body.predicted_pose.position.y, 1.0, epsilon = 1e-3);
        assert!(constraint.manifold_points().iter().all(|p| p.normal_lambda > 0.0));
    }

    #[test]
    fn converged_manifold_stops_iterating() {
        let (mut bodies, mut constraint) = scene(0.0);
        assert_eq!(solve_positions(&mut bodies, &mut constraint, 8), 1);
    }

    #[test]
    fn static_friction_holds_small_drift() {
        let (mut bodies, mut constraint) = scene(0.01);
        solve_positions(&mut bodies, &mut constraint, 8);
        bodies.get_mut(BodyHandle(0)).unwrap().predicted_pose.position += Vec3::new(0.001, -0.01, 0.0);
        solve_positions(&mut bodies, &mut constraint, 8);
        let body = bodies.get(BodyHandle(0)).unwrap();
        assert!(body.predicted_pose.position.x.abs() < 0.001);
    }

    #[test]
    fn restitution_applies_above_threshold() {
        let (mut bodies, mut constraint) = scene_with_points(0.01, &[(0.0, 0.0)]);
        constraint.restitution = 0.5;
        let config = SolverConfig::default();
        let dt = 1.0 / 60.0;
        let (a, b) = bodies.pair_mut(BodyHandle(0), BodyHandle(1)).unwrap();
        a.velocity = BodyVelocity::new(Vec3::new(0.0, -4.0, 0.0), Vec3::ZERO);
        prepare(&mut constraint, a, b);
        while apply_contact(&mut constraint, a, b, &config) {}
        a.velocity = BodyVelocity::default();
        for iteration in 0..config.push_out_iterations {
            apply_push_out(&mut constraint, a, b, dt, iteration, config.push_out_iterations, &config);
        }
        assert_abs_diff_eq!(a.velocity.linear.y, 2.0, epsilon = 1e-3);
        assert_abs_diff_eq!(a.velocity.angular.length(), 0.0, epsilon = 1e-3);
    }

    #[test]
    fn slow_contacts_do_not_bounce() {
        let (mut bodies, mut constraint) = scene_with_points(0.01, &[(0.0, 0.0)]);
        constraint.restitution = 1.0;
        let config = SolverConfig::default();
        let (a, b) = bodies.pair_mut(BodyHandle(0), BodyHandle(1)).unwrap();
        a.velocity = BodyVelocity::new(Vec3::new(0.0, -0.2, 0.0), Vec3::ZERO);
        prepare(&mut constraint, a, b);
        a.velocity = BodyVelocity::new(Vec3::new(0.0, -0.2, 0.0), Vec3::ZERO);
        apply_push_out(&mut constraint, a, b, 1.0 / 60.0, 0, 2, &config);
        assert!(a.velocity.linear.y.abs() < 1e-3);
    }
}
