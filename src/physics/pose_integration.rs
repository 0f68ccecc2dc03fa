//! Per-body stages of a sub-step: integration, kinematic targets and the implicit velocity update.

use glam::Vec3;

use crate::physics::bodies::{Body, BodyKind, KinematicTargetMode};
use crate::physics::body_properties::{BodyVelocity, RigidPose};
use crate::utilities::math_helper::{angular_velocity_between, integrate_orientation};

/// Applies gravity, external forces and damping to a dynamic body's velocity, then predicts its pose.
/// Kinematic bodies move with their velocity; other bodies stay where they are.
pub fn integrate(body: &mut Body, gravity: Vec3, dt: f32) {
    match body.kind() {
        BodyKind::Dynamic => {
            let inverse_mass = body.inverse_mass();
            let mut linear_acceleration = body.external_force * inverse_mass;
            if body.gravity_enabled {
                linear_acceleration += gravity;
            }
            let angular_acceleration = body.world_inverse_inertia().transform(body.external_torque);
            let velocity = &mut body.velocity;
            velocity.linear += linear_acceleration * dt;
            velocity.angular += angular_acceleration * dt;
            velocity.linear *= 1.0 / (1.0 + dt * body.linear_damping.max(0.0));
            velocity.angular *= 1.0 / (1.0 + dt * body.angular_damping.max(0.0));
            predict(body, dt);
        }
        BodyKind::Kinematic => predict(body, dt),
        BodyKind::Static | BodyKind::Sleeping => {
            body.velocity = BodyVelocity::default();
            body.predicted_pose = body.pose;
        }
    }
}

fn predict(body: &mut Body, dt: f32) {
    body.predicted_pose = RigidPose::new(
        body.pose.position + body.velocity.linear * dt,
        integrate_orientation(body.pose.orientation, body.velocity.angular, dt),
    );
}

/// Moves a kinematic body toward its target for sub-step `substep` of `num_substeps`.
///
/// Each sub-step covers `1 / (remaining sub-steps)` of the remaining distance, so the last one lands
/// exactly on the target. The mode then switches to `Reset`, which zeroes the velocity on the next tick.
pub fn apply_kinematic_target(body: &mut Body, substep: u32, num_substeps: u32, dt: f32) {
    if !body.is_kinematic() {
        return;
    }
    let target = *body.kinematic_target();
    match target.mode {
        KinematicTargetMode::Velocity => {}
        KinematicTargetMode::None => {
            body.velocity = BodyVelocity::default();
            body.predicted_pose = body.pose;
        }
        KinematicTargetMode::Reset => {
            body.velocity = BodyVelocity::default();
            body.predicted_pose = body.pose;
            body.kinematic_target_mut().mode = KinematicTargetMode::None;
        }
        KinematicTargetMode::Position => {
            let remaining = num_substeps.saturating_sub(substep).max(1);
            let predicted = if remaining == 1 {
                target.target
            } else {
                let alpha = 1.0 / remaining as f32;
                RigidPose::new(
                    body.pose.position.lerp(target.target.position, alpha),
                    body.pose.orientation.slerp(target.target.orientation, alpha),
                )
            };
            body.velocity = BodyVelocity::new(
                (predicted.position - body.pose.position) / dt,
                angular_velocity_between(body.pose.orientation, predicted.orientation, dt),
            );
            body.predicted_pose = predicted;
            if remaining == 1 {
                body.kinematic_target_mut().mode = KinematicTargetMode::Reset;
            }
        }
    }
}

/// Derives a dynamic body's velocity from the distance its pose was moved during the sub-step.
pub fn update_velocity(body: &mut Body, dt: f32) {
    if !body.is_dynamic() {
        return;
    }
    body.velocity = BodyVelocity::new(
        (body.predicted_pose.position - body.pose.position) / dt,
        angular_velocity_between(body.pose.orientation, body.predicted_pose.orientation, dt),
    );
}

/// Commits the predicted pose. The committed pose becomes the previous pose.
pub fn update_position(body: &mut Body) {
    body.previous_pose = body.pose;
    body.pose = body.predicted_pose;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::bodies::{Bodies, KinematicTarget};
    use crate::physics::body_description::BodyDescription;
    use crate::physics::collidables::collidable::Collidable;
    use crate::physics::collidables::shape::ShapeGeometry;
    use approx::assert_abs_diff_eq;

    fn sphere() -> Vec<Collidable> {
        vec![Collidable::centered(ShapeGeometry::sphere(0.5).unwrap())]
    }

    #[test]
    fn gravity_moves_dynamic_bodies_only() {
        let mut bodies = Bodies::new();
        let dynamic = bodies
            .add(BodyDescription::create_dynamic(RigidPose::IDENTITY, 2.0, sphere()).unwrap())
            .unwrap();
        let fixed = bodies.add(BodyDescription::create_static(RigidPose::IDENTITY, sphere())).unwrap();
        let gravity = Vec3::new(0.0, -10.0, 0.0);
        for body in bodies.iter_mut() {
            integrate(body, gravity, 0.1);
        }
        let body = bodies.get(dynamic).unwrap();
        assert_abs_diff_eq!(body.velocity.linear.y, -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(body.predicted_pose.position.y, -0.1, epsilon = 1e-6);
        assert_eq!(bodies.get(fixed).unwrap().predicted_pose, RigidPose::IDENTITY);
    }

    #[test]
    fn velocity_follows_position_change() {
        let mut bodies = Bodies::new();
        let handle = bodies
            .add(BodyDescription::create_dynamic(RigidPose::IDENTITY, 1.0, sphere()).unwrap())
            .unwrap();
        let body = bodies.get_mut(handle).unwrap();
        body.predicted_pose.position = Vec3::new(0.0, 0.5, 0.0);
        update_velocity(body, 0.5);
        assert_abs_diff_eq!(body.velocity.linear.y, 1.0, epsilon = 1e-6);
        update_position(body);
        assert_eq!(body.previous_pose, RigidPose::IDENTITY);
        assert_eq!(body.pose.position, Vec3::new(0.0, 0.5, 0.0));
    }

    #[test]
    fn kinematic_target_is_reached_on_last_substep() {
        let mut bodies = Bodies::new();
        let handle = bodies
            .add(BodyDescription::create_kinematic(RigidPose::IDENTITY, sphere()))
            .unwrap();
        let body = bodies.get_mut(handle).unwrap();
        *body.kinematic_target_mut() = KinematicTarget::position(RigidPose::from_position(Vec3::new(4.0, 0.0, 0.0)));
        let dt = 0.25;
        for substep in 0..4 {
            integrate(body, Vec3::ZERO, dt);
            apply_kinematic_target(body, substep, 4, dt);
            assert_abs_diff_eq!(body.predicted_pose.position.x, substep as f32 + 1.0, epsilon = 1e-5);
            assert_abs_diff_eq!(body.velocity.linear.x, 4.0, epsilon = 1e-4);
            update_position(body);
        }
        assert_eq!(body.kinematic_target().mode, KinematicTargetMode::Reset);

        integrate(body, Vec3::ZERO, dt);
        apply_kinematic_target(body, 0, 4, dt);
        assert_eq!(body.velocity.linear, Vec3::ZERO);
        assert_eq!(body.predicted_pose.position.x, 4.0);
        assert_eq!(body.kinematic_target().mode, KinematicTargetMode::None);
    }
}
