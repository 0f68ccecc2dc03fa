use approx::assert_abs_diff_eq;
use glam::{Quat, Vec3};
use rust_pbd_collision::physics::collidables::{Collidable, ShapeGeometry};
use rust_pbd_collision::physics::{BodyDescription, BodyHandle, MinEvolution, RigidPose, SimulationConfig};
use rust_pbd_collision::PhysicsError;

const DT: f32 = 1.0 / 60.0;

fn sphere(radius: f32) -> Vec<Collidable> {
    vec![Collidable::centered(ShapeGeometry::sphere(radius).unwrap())]
}

/// A dynamic unit sphere resting on top of a static one.
fn stacked_spheres() -> (MinEvolution, BodyHandle, BodyHandle) {
    let mut evolution = MinEvolution::new(SimulationConfig::default()).unwrap();
    let base = evolution
        .add_body(BodyDescription::create_static(RigidPose::default(), sphere(0.5)))
        .unwrap();
    let top = evolution
        .add_body(
            BodyDescription::create_dynamic(RigidPose::new(Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY), 1.0, sphere(0.5))
                .unwrap(),
        )
        .unwrap();
    (evolution, base, top)
}

fn manifold_point_count(evolution: &mut MinEvolution) -> usize {
    let mut count = 0;
    evolution.visit_active_constraints(|constraint| {
        count += constraint.manifold_points().len();
        rust_pbd_collision::physics::collision_detection::VisitorResult::Continue
    });
    count
}

#[test]
fn resting_pair_is_restored_every_tick() {
    let (mut evolution, base, top) = stacked_spheres();
    evolution.advance(DT, 1);
    let calls_after_first_tick = evolution.stats().narrow_phase_calls;
    assert!(calls_after_first_tick >= 1);
    assert!(evolution.is_pair_active(base, top));
    let points = manifold_point_count(&mut evolution);
    assert_eq!(points, 1);

    for _ in 1..100 {
        evolution.advance(DT, 1);
        assert_eq!(manifold_point_count(&mut evolution), points);
    }
    let stats = evolution.stats();
    assert_eq!(stats.narrow_phase_calls, calls_after_first_tick);
    assert!(stats.restored_pairs >= 99);

    let body = evolution.bodies().get(top).unwrap();
    assert_abs_diff_eq!(body.pose.position.y, 1.0, epsilon = 0.01);
    assert_abs_diff_eq!(body.pose.position.x, 0.0, epsilon = 1e-4);
}

#[test]
fn moved_pair_is_regenerated() {
    let (mut evolution, _, top) = stacked_spheres();
    for _ in 0..5 {
        evolution.advance(DT, 1);
    }
    let calls = evolution.stats().narrow_phase_calls;
    evolution.advance(DT, 1);
    assert_eq!(evolution.stats().narrow_phase_calls, calls);

    // Nudge the top sphere sideways by more than the restore tolerance.
    evolution.bodies_mut().get_mut(top).unwrap().pose.position.x += 0.1;
    evolution.advance(DT, 1);
    assert!(evolution.stats().narrow_phase_calls > calls);
}

#[test]
fn woken_pair_restores_on_first_tick() {
    let (mut evolution, base, top) = stacked_spheres();
    for _ in 0..10 {
        evolution.advance(DT, 1);
    }
    let resting = evolution.bodies().get(top).unwrap().pose;

    evolution.set_body_sleeping(top, true).unwrap();
    for _ in 0..5 {
        evolution.advance(DT, 1);
    }
    // Sleeping pairs are kept but not re-detected.
    assert_eq!(evolution.collisions().num_mid_phases(), 1);
    assert_eq!(evolution.bodies().get(top).unwrap().pose, resting);

    evolution.set_body_sleeping(top, false).unwrap();
    assert!(evolution.is_pair_active(base, top));
    evolution.reset_stats();
    evolution.advance(DT, 1);
    let stats = evolution.stats();
    assert_eq!(stats.narrow_phase_calls, 0);
    assert_eq!(stats.restored_pairs, 1);
    let body = evolution.bodies().get(top).unwrap();
    assert_abs_diff_eq!(body.pose.position.y, resting.position.y, epsilon = 1e-3);
}

#[test]
fn sleep_requires_matching_kind() {
    let (mut evolution, base, top) = stacked_spheres();
    assert!(matches!(
        evolution.set_body_sleeping(base, true),
        Err(PhysicsError::InvalidBodyKind { .. })
    ));
    assert!(matches!(
        evolution.set_body_sleeping(top, false),
        Err(PhysicsError::InvalidBodyKind { .. })
    ));
    assert!(matches!(
        evolution.set_body_sleeping(BodyHandle(42), true),
        Err(PhysicsError::UnknownBody(_))
    ));
}

#[test]
fn explicit_pairs_limit_detection() {
    let (mut evolution, _, top) = stacked_spheres();
    let other = evolution
        .add_body(BodyDescription::create_static(RigidPose::new(Vec3::new(0.0, 1.0, 0.9), Quat::IDENTITY), sphere(0.5)))
        .unwrap();
    evolution.set_candidate_pairs([(top, other)]);
    evolution.advance(DT, 1);
    assert_eq!(evolution.collisions().num_mid_phases(), 1);
    assert!(evolution.collisions().mid_phase(top, other).is_some());
}
