use glam::{Quat, Vec3};
use rust_pbd_collision::physics::collidables::{Collidable, ShapeGeometry};
use rust_pbd_collision::physics::{
    BodyDescription, BodyHandle, BodyVelocity, CcdConfig, MinEvolution, PhysicsMaterial, RigidPose, SimulationConfig,
};

const RADIUS: f32 = 0.1;
const WALL_HALF_THICKNESS: f32 = 0.01;

fn config(ccd: CcdConfig) -> SimulationConfig {
    SimulationConfig {
        gravity: Vec3::ZERO,
        ccd,
        ..SimulationConfig::default()
    }
}

fn add_wall(evolution: &mut MinEvolution, x: f32, z: f32, material: PhysicsMaterial) -> BodyHandle {
    let wall = Collidable::centered(ShapeGeometry::cuboid(Vec3::new(WALL_HALF_THICKNESS, 1.0, 1.0)).unwrap());
    evolution
        .add_body(BodyDescription::create_static(RigidPose::new(Vec3::new(x, 0.0, z), Quat::IDENTITY), vec![wall]).with_material(material))
        .unwrap()
}

fn add_bullet(evolution: &mut MinEvolution, z: f32, material: PhysicsMaterial) -> BodyHandle {
    let shape = vec![Collidable::centered(ShapeGeometry::sphere(RADIUS).unwrap())];
    evolution
        .add_body(
            BodyDescription::create_dynamic(RigidPose::new(Vec3::new(-1.0, 0.0, z), Quat::IDENTITY), 1.0, shape)
                .unwrap()
                .with_velocity(BodyVelocity::new(Vec3::new(50.0, 0.0, 0.0), Vec3::ZERO))
                .with_material(material)
                .with_ccd(true),
        )
        .unwrap()
}

fn inelastic() -> PhysicsMaterial {
    PhysicsMaterial::new(0.0, 0.0)
}

#[test]
fn ccd_stops_bullet_in_front_of_thin_wall() {
    let mut evolution = MinEvolution::new(config(CcdConfig::default())).unwrap();
    add_wall(&mut evolution, 0.0, 0.0, inelastic());
    let bullet = add_bullet(&mut evolution, 0.0, inelastic());
    evolution.advance(1.0, 1);

    let body = evolution.bodies().get(bullet).unwrap();
    let separation = -WALL_HALF_THICKNESS - (body.pose.position.x + RADIUS);
    assert!(separation >= -1e-3, "bullet penetrated the wall: {separation}");
    assert!(body.pose.position.x > -1.0);
    assert!(body.velocity.linear.x.abs() < 1e-3);

    let report = evolution.last_ccd_report();
    assert_eq!(report.constraints, 1);
    assert_eq!(report.islands, 1);
    assert_eq!(report.passes, 1);
    assert_eq!(report.clipped_bodies, 1);
}

#[test]
fn bullet_tunnels_without_ccd() {
    let ccd = CcdConfig {
        enabled: false,
        ..CcdConfig::default()
    };
    let mut evolution = MinEvolution::new(config(ccd)).unwrap();
    add_wall(&mut evolution, 0.0, 0.0, inelastic());
    let bullet = add_bullet(&mut evolution, 0.0, inelastic());
    evolution.advance(1.0, 1);

    let body = evolution.bodies().get(bullet).unwrap();
    assert!(body.pose.position.x - RADIUS > WALL_HALF_THICKNESS);
    assert_eq!(evolution.last_ccd_report().constraints, 0);
}

#[test]
fn ccd_impulse_honours_restitution() {
    let bouncy = PhysicsMaterial::new(0.0, 0.5);
    let mut evolution = MinEvolution::new(config(CcdConfig::default())).unwrap();
    add_wall(&mut evolution, 0.0, 0.0, bouncy);
    let bullet = add_bullet(&mut evolution, 0.0, bouncy);
    evolution.advance(1.0, 1);

    let body = evolution.bodies().get(bullet).unwrap();
    assert!((body.velocity.linear.x - -25.0).abs() < 1e-2);
    assert!(body.pose.position.x + RADIUS <= -WALL_HALF_THICKNESS + 1e-3);
}

#[test]
fn independent_bullets_form_separate_islands() {
    let mut evolution = MinEvolution::new(config(CcdConfig::default())).unwrap();
    add_wall(&mut evolution, 0.0, 0.0, inelastic());
    add_wall(&mut evolution, 0.0, 5.0, inelastic());
    let first = add_bullet(&mut evolution, 0.0, inelastic());
    let second = add_bullet(&mut evolution, 5.0, inelastic());
    evolution.advance(1.0, 1);

    let report = evolution.last_ccd_report();
    assert_eq!(report.constraints, 2);
    assert_eq!(report.islands, 2);
    for bullet in [first, second] {
        assert!(evolution.bodies().get(bullet).unwrap().pose.position.x < 0.0);
    }
}

#[test]
fn resweep_keeps_bullet_in_front_of_first_wall() {
    let ccd = CcdConfig {
        max_process_count: 2,
        resweep_enabled: true,
        ..CcdConfig::default()
    };
    let mut evolution = MinEvolution::new(config(ccd)).unwrap();
    add_wall(&mut evolution, 0.0, 0.0, inelastic());
    add_wall(&mut evolution, 1.0, 0.0, inelastic());
    let bullet = add_bullet(&mut evolution, 0.0, inelastic());
    evolution.advance(1.0, 1);

    let body = evolution.bodies().get(bullet).unwrap();
    assert!(body.pose.position.x + RADIUS <= -WALL_HALF_THICKNESS + 1e-3);
    let report = evolution.last_ccd_report();
    assert_eq!(report.constraints, 2);
    assert!(report.passes <= report.constraints * 2);
}

#[test]
fn passes_stay_within_budget() {
    for max_process_count in 1..4 {
        let ccd = CcdConfig {
            max_process_count,
            resweep_enabled: true,
            clipping_enabled: max_process_count % 2 == 1,
            ..CcdConfig::default()
        };
        let mut evolution = MinEvolution::new(config(ccd)).unwrap();
        for wall in 0..3 {
            add_wall(&mut evolution, wall as f32 * 0.5, 0.0, inelastic());
        }
        add_bullet(&mut evolution, 0.0, PhysicsMaterial::new(0.0, 1.0));
        evolution.advance(1.0, 1);
        let report = evolution.last_ccd_report();
        assert!(report.passes <= report.constraints * max_process_count as usize);
    }
}

#[test]
fn ccd_stops_bullet_with_several_substeps() {
    for substeps in [2, 4] {
        let mut evolution = MinEvolution::new(config(CcdConfig::default())).unwrap();
        add_wall(&mut evolution, 0.0, 0.0, inelastic());
        let bullet = add_bullet(&mut evolution, 0.0, inelastic());
        evolution.advance(1.0, substeps);

        let body = evolution.bodies().get(bullet).unwrap();
        let separation = -WALL_HALF_THICKNESS - (body.pose.position.x + RADIUS);
        assert!(separation >= -1e-3, "bullet penetrated the wall with {substeps} substeps: {separation}");
        assert!(body.pose.position.x > -1.0);
        assert_eq!(evolution.last_ccd_report().constraints, 1);
    }
}

fn add_ball(evolution: &mut MinEvolution, x: f32, speed: f32, material: PhysicsMaterial) -> BodyHandle {
    let shape = vec![Collidable::centered(ShapeGeometry::sphere(RADIUS).unwrap())];
    evolution
        .add_body(
            BodyDescription::create_dynamic(RigidPose::new(Vec3::new(x, 0.0, 0.0), Quat::IDENTITY), 1.0, shape)
                .unwrap()
                .with_velocity(BodyVelocity::new(Vec3::new(speed, 0.0, 0.0), Vec3::ZERO))
                .with_material(material)
                .with_ccd(true),
        )
        .unwrap()
}

#[test]
fn colliding_dynamic_balls_split_impulse_by_mass() {
    let restitution = 0.5;
    let material = PhysicsMaterial::new(0.0, restitution);
    let mut evolution = MinEvolution::new(config(CcdConfig::default())).unwrap();
    let left = add_ball(&mut evolution, -1.0, 50.0, material);
    let right = add_ball(&mut evolution, 1.0, -50.0, material);
    evolution.advance(1.0, 1);

    let report = evolution.last_ccd_report();
    assert_eq!(report.constraints, 1);
    assert_eq!(report.islands, 1);

    let left = evolution.bodies().get(left).unwrap();
    let right = evolution.bodies().get(right).unwrap();
    let gap = right.pose.position.x - left.pose.position.x - 2.0 * RADIUS;
    assert!(gap >= -1e-3, "balls passed into each other: {gap}");

    let (v_left, v_right) = (left.velocity.linear.x, right.velocity.linear.x);
    assert!((v_left + v_right).abs() < 1e-3, "momentum changed: {v_left} + {v_right}");
    let approach = 50.0 - -50.0;
    assert!(((v_right - v_left) - restitution * approach).abs() < 1e-2);
}
