//! Minimal position based evolution: integrates bodies, detects and solves contacts over a number of
//! sub-steps, then runs the CCD pass once per tick.

use tracing::{trace_span, warn};

use crate::error::{PhysicsError, PhysicsResult};
use crate::physics::bodies::{Bodies, Body, BodyKind, KinematicTarget};
use crate::physics::body_description::BodyDescription;
use crate::physics::body_properties::{BodyVelocity, RigidPose};
use crate::physics::ccd::{CcdManager, CcdReport};
use crate::physics::collision_detection::broad_phase::{BroadPhase, CandidatePairSource, ExplicitPairs};
use crate::physics::collision_detection::constraint_allocator::{CollisionConstraintAllocator, ConstraintRef, DetectorRef};
use crate::physics::collision_detection::contact_manifold::ContactConstraint;
use crate::physics::collision_detection::mid_phase::DetectionContext;
use crate::physics::collision_detection::narrow_phase::{CollisionStatsSnapshot, NarrowPhase};
use crate::physics::collision_detection::narrow_phase_callbacks::{ContactModifier, VisitorResult};
use crate::physics::contact_solver;
use crate::physics::handles::{BodyHandle, BodyPairKey};
use crate::physics::pose_integration;
use crate::physics::simulation_config::SimulationConfig;
use crate::utilities::thread_dispatcher::ThreadDispatcher;

/// Owns the bodies and every collision structure, and advances them one tick at a time.
pub struct MinEvolution {
    config: SimulationConfig,
    bodies: Bodies,
    broad_phase: BroadPhase,
    allocator: CollisionConstraintAllocator,
    narrow_phase: NarrowPhase,
    ccd: CcdManager,
    dispatcher: ThreadDispatcher,
    modifiers: Vec<Box<dyn ContactModifier>>,
    candidate_pairs: Vec<BodyPairKey>,
    solvable: Vec<ConstraintRef>,
    last_ccd_report: CcdReport,
}

impl std::fmt::Debug for MinEvolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinEvolution")
            .field("bodies", &self.bodies.len())
            .field("mid_phases", &self.allocator.num_mid_phases())
            .field("active_constraints", &self.allocator.num_active_constraints())
            .field("epoch", &self.allocator.epoch())
            .field("modifiers", &self.modifiers.len())
            .finish()
    }
}

impl MinEvolution {
    pub fn new(config: SimulationConfig) -> PhysicsResult<Self> {
        config.validate()?;
        let dispatcher = ThreadDispatcher::new(config.worker_count);
        Ok(Self {
            config,
            bodies: Bodies::new(),
            broad_phase: BroadPhase::default(),
            allocator: CollisionConstraintAllocator::new(),
            narrow_phase: NarrowPhase::new(),
            ccd: CcdManager::new(),
            dispatcher,
            modifiers: Vec::new(),
            candidate_pairs: Vec::new(),
            solvable: Vec::new(),
            last_ccd_report: CcdReport::default(),
        })
    }

    #[inline(always)]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    #[inline(always)]
    pub fn bodies(&self) -> &Bodies {
        &self.bodies
    }

    #[inline(always)]
    pub fn bodies_mut(&mut self) -> &mut Bodies {
        &mut self.bodies
    }

    pub fn add_body(&mut self, description: BodyDescription) -> PhysicsResult<BodyHandle> {
        self.bodies.add(description)
    }

    /// Removes a body along with every pair that references it.
    pub fn remove_body(&mut self, handle: BodyHandle) -> PhysicsResult<Body> {
        let body = self.bodies.remove(handle)?;
        self.allocator.detach_body(handle);
        Ok(body)
    }

    /// Replaces the source of candidate pairs. Every body pair is considered by default.
    pub fn set_candidate_source(&mut self, source: Box<dyn CandidatePairSource>) {
        self.broad_phase.set_source(source);
    }

    /// Restricts detection to the given pairs.
    pub fn set_candidate_pairs(&mut self, pairs: impl IntoIterator<Item = (BodyHandle, BodyHandle)>) {
        let pairs = pairs.into_iter().map(|(a, b)| BodyPairKey::new(a, b));
        self.broad_phase.set_source(Box::new(ExplicitPairs::new(pairs)));
    }

    /// Puts a dynamic body to sleep or wakes a sleeping one. Sleeping bodies act as infinite mass and keep
    /// their pairs alive, so waking resumes from the constraints they had.
    pub fn set_body_sleeping(&mut self, handle: BodyHandle, sleeping: bool) -> PhysicsResult<()> {
        let body = self.bodies.try_get_mut(handle)?;
        let expected = if sleeping { BodyKind::Dynamic } else { BodyKind::Sleeping };
        if body.kind() != expected {
            return Err(PhysicsError::InvalidBodyKind {
                handle,
                expected: expected.name(),
                actual: body.kind().name(),
            });
        }
        if sleeping {
            body.set_kind(BodyKind::Sleeping);
            body.velocity = BodyVelocity::default();
            body.predicted_pose = body.pose;
        } else {
            body.set_kind(BodyKind::Dynamic);
        }
        self.allocator.set_body_sleeping(handle, sleeping);
        Ok(())
    }

    /// Drives a kinematic body to `target`.
    pub fn set_kinematic_target(&mut self, handle: BodyHandle, target: KinematicTarget) -> PhysicsResult<()> {
        let body = self.bodies.try_get_mut(handle)?;
        if !body.is_kinematic() {
            return Err(PhysicsError::InvalidBodyKind {
                handle,
                expected: BodyKind::Kinematic.name(),
                actual: body.kind().name(),
            });
        }
        *body.kinematic_target_mut() = target;
        Ok(())
    }

    /// Registers a hook that sees every active constraint before it is solved.
    pub fn add_contact_modifier(&mut self, modifier: impl ContactModifier + 'static) {
        self.modifiers.push(Box::new(modifier));
    }

    /// Calls `visitor` for every constraint activated by the last detection pass.
    pub fn visit_active_constraints(&mut self, visitor: impl FnMut(&mut ContactConstraint) -> VisitorResult) {
        self.allocator.visit_active_constraints(visitor);
    }

    /// Whether the pair has at least one active constraint.
    pub fn is_pair_active(&self, a: BodyHandle, b: BodyHandle) -> bool {
        let Some(mid_phase) = self.allocator.mid_phase(a, b) else {
            return false;
        };
        let slot = mid_phase.slot;
        self.allocator
            .active_constraints()
            .iter()
            .any(|constraint| constraint.mid_phase == slot)
    }

    #[inline(always)]
    pub fn num_active_contacts(&self) -> usize {
        self.allocator.num_active_constraints()
    }

    #[inline(always)]
    pub fn current_epoch(&self) -> u64 {
        self.allocator.epoch()
    }

    pub fn stats(&self) -> CollisionStatsSnapshot {
        self.narrow_phase.stats().snapshot()
    }

    pub fn reset_stats(&self) {
        self.narrow_phase.stats().reset();
    }

    #[inline(always)]
    pub fn last_ccd_report(&self) -> CcdReport {
        self.last_ccd_report
    }

    #[inline(always)]
    pub fn collisions(&self) -> &CollisionConstraintAllocator {
        &self.allocator
    }

    /// Advances the simulation by `dt` in `num_substeps` equal sub-steps.
    pub fn advance(&mut self, dt: f32, num_substeps: u32) {
        debug_assert!(dt.is_finite() && dt > 0.0, "tick length must be positive, got {dt}");
        if !(dt.is_finite() && dt > 0.0) {
            return;
        }
        let num_substeps = num_substeps.max(1);
        let _tick = trace_span!("tick", dt, num_substeps).entered();
        self.prepare_tick();
        let substep_dt = dt / num_substeps as f32;
        for substep in 0..num_substeps {
            let _span = trace_span!("substep", substep).entered();
            self.integrate(substep, num_substeps, substep_dt);
            self.detect_collisions(dt);
            self.solve(substep_dt);
            self.update_positions();
        }
        self.apply_ccd(dt);
        self.unprepare_tick();
    }

    /// Rewinds every body toward its previous pose by `rewind_fraction`, then advances. Used by fixed step
    /// resimulation to start a shorter corrective step from an intermediate state.
    pub fn advance_resimulated(&mut self, dt: f32, num_substeps: u32, rewind_fraction: f32) {
        self.rewind(rewind_fraction);
        self.advance(dt, num_substeps);
    }

    fn prepare_tick(&mut self) {
        let _span = trace_span!("prepare_tick").entered();
        for body in self.bodies.iter_mut() {
            body.tick_start_position = body.pose.position;
        }
    }

    fn rewind(&mut self, fraction: f32) {
        let fraction = fraction.clamp(0.0, 1.0);
        if fraction == 0.0 {
            return;
        }
        let _span = trace_span!("rewind", fraction).entered();
        for body in self.bodies.iter_mut().filter(|body| body.kind().is_movable()) {
            let pose = RigidPose::new(
                body.pose.position.lerp(body.previous_pose.position, fraction),
                body.pose.orientation.slerp(body.previous_pose.orientation, fraction),
            );
            body.pose = pose;
            body.predicted_pose = pose;
        }
    }

    fn integrate(&mut self, substep: u32, num_substeps: u32, dt: f32) {
        let _span = trace_span!("integrate").entered();
        let gravity = self.config.gravity;
        let slack = self.config.collision.bounds_slack + self.config.collision.cull_distance;
        let inflation_scale = self.config.collision.bounds_inflation_scale;
        for body in self.bodies.iter_mut() {
            pose_integration::integrate(body, gravity, dt);
            pose_integration::apply_kinematic_target(body, substep, num_substeps, dt);
            body.update_bounds(slack, inflation_scale);
        }
    }

    /// Broad phase, then restore or generate for every candidate pair. Pairs are fanned out over the
    /// workers and their activations merged in slot order.
    fn detect_collisions(&mut self, tick_dt: f32) {
        let _span = trace_span!("detect_collisions").entered();
        let epoch = self.allocator.begin_detection();
        self.broad_phase.find_candidate_pairs(&self.bodies, &mut self.candidate_pairs);
        for &key in &self.candidate_pairs {
            let (Some(body_a), Some(body_b)) = (self.bodies.get(key.a), self.bodies.get(key.b)) else {
                debug_assert!(false, "broad phase proposed a removed body");
                continue;
            };
            let slot = self
                .allocator
                .get_or_create_mid_phase(key, body_a, body_b, &self.config.collision);
            if let Some(mid_phase) = self.allocator.mid_phase_slot_mut(slot) {
                mid_phase.mark_candidate(epoch);
            }
        }

        let ctx = DetectionContext {
            config: &self.config.collision,
            ccd: &self.config.ccd,
            narrow_phase: &self.narrow_phase,
            epoch,
            dt: tick_dt,
        };
        let bodies = &self.bodies;
        let activated = self
            .dispatcher
            .dispatch_chunks(self.allocator.mid_phases_mut(), |_, chunk| {
                let mut constraints = Vec::new();
                let mut detectors: Vec<DetectorRef> = Vec::new();
                for mid_phase in chunk.iter_mut().flatten() {
                    if !mid_phase.is_candidate(epoch) {
                        continue;
                    }
                    let key = mid_phase.key();
                    let (Some(body_a), Some(body_b)) = (bodies.get(key.a), bodies.get(key.b)) else {
                        continue;
                    };
                    detectors.clear();
                    mid_phase.generate_collisions(body_a, body_b, &ctx, &mut detectors);
                    let slot = mid_phase.slot;
                    constraints.extend(detectors.iter().map(|&detector| ConstraintRef {
                        mid_phase: slot,
                        detector,
                    }));
                }
                constraints
            });
        self.allocator.activate(activated.into_iter().flatten());
        self.allocator.cull_stale_mid_phases(&self.bodies);
    }

    /// Runs the modifiers and picks the constraints the solver will touch this sub-step.
    fn prepare_iteration(&mut self) {
        let _span = trace_span!("prepare_iteration").entered();
        let Self {
            bodies,
            allocator,
            modifiers,
            solvable,
            ..
        } = self;
        solvable.clear();
        let active: Vec<ConstraintRef> = allocator.active_constraints().to_vec();
        for constraint_ref in active {
            let Some(constraint) = allocator.constraint_mut(constraint_ref) else {
                continue;
            };
            constraint.reset_modifications();
            for modifier in modifiers.iter_mut() {
                modifier.modify_contact(constraint);
            }
            let Some((body_a, body_b)) = bodies.pair_mut(constraint.body_a(), constraint.body_b()) else {
                continue;
            };
            if contact_solver::is_solvable(constraint, body_a, body_b) {
                contact_solver::prepare(constraint, body_a, body_b);
                solvable.push(constraint_ref);
            }
        }
    }

    fn solve(&mut self, dt: f32) {
        self.prepare_iteration();
        let solver = self.config.solver.clone();
        {
            let _span = trace_span!("apply_constraints").entered();
            let converged = (0..solver.apply_iterations).any(|_| {
                !self.for_each_solvable(|constraint, body_a, body_b| {
                    contact_solver::apply_contact(constraint, body_a, body_b, &solver)
                })
            });
            if !converged && !self.solvable.is_empty() {
                warn!(
                    iterations = solver.apply_iterations,
                    constraints = self.solvable.len(),
                    "contact projection hit its iteration cap"
                );
            }
        }
        {
            let _span = trace_span!("update_velocities").entered();
            for body in self.bodies.iter_mut() {
                pose_integration::update_velocity(body, dt);
            }
        }
        {
            let _span = trace_span!("apply_push_out").entered();
            let iterations = solver.push_out_iterations;
            let converged = (0..iterations).any(|iteration| {
                !self.for_each_solvable(|constraint, body_a, body_b| {
                    contact_solver::apply_push_out(constraint, body_a, body_b, dt, iteration, iterations, &solver)
                })
            });
            if !converged && iterations > 0 && !self.solvable.is_empty() {
                warn!(iterations, constraints = self.solvable.len(), "push-out hit its iteration cap");
            }
        }
        self.solvable.clear();
    }

    /// Runs one solver rule over every solvable constraint. Returns whether any of them needs another pass.
    fn for_each_solvable(&mut self, mut rule: impl FnMut(&mut ContactConstraint, &mut Body, &mut Body) -> bool) -> bool {
        let Self {
            bodies,
            allocator,
            solvable,
            ..
        } = self;
        let mut needs_another = false;
        for &constraint_ref in solvable.iter() {
            let Some(constraint) = allocator.constraint_mut(constraint_ref) else {
                continue;
            };
            let Some((body_a, body_b)) = bodies.pair_mut(constraint.body_a(), constraint.body_b()) else {
                continue;
            };
            needs_another |= rule(constraint, body_a, body_b);
        }
        needs_another
    }

    fn update_positions(&mut self) {
        let _span = trace_span!("update_positions").entered();
        for body in self.bodies.iter_mut() {
            pose_integration::update_position(body);
        }
    }

    fn apply_ccd(&mut self, dt: f32) {
        let _span = trace_span!("ccd").entered();
        self.last_ccd_report = self.ccd.apply_constraints_phase_ccd(
            &mut self.bodies,
            &mut self.allocator,
            &self.narrow_phase,
            &self.config.ccd,
            dt,
            &self.dispatcher,
        );
    }

    fn unprepare_tick(&mut self) {
        let _span = trace_span!("unprepare_tick").entered();
        for body in self.bodies.iter_mut() {
            body.tick_start_position = body.pose.position;
            body.predicted_pose = body.pose;
        }
        self.candidate_pairs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body_properties::PhysicsMaterial;
    use crate::physics::collidables::collidable::Collidable;
    use crate::physics::collidables::shape::ShapeGeometry;
    use approx::assert_abs_diff_eq;
    use glam::{Quat, Vec3};

    fn sphere(radius: f32) -> Vec<Collidable> {
        vec![Collidable::centered(ShapeGeometry::sphere(radius).unwrap())]
    }

    fn ground(evolution: &mut MinEvolution) -> BodyHandle {
        let slab = Collidable::centered(ShapeGeometry::cuboid(Vec3::new(5.0, 0.5, 5.0)).unwrap());
        evolution
            .add_body(BodyDescription::create_static(
                RigidPose::new(Vec3::new(0.0, -0.5, 0.0), Quat::IDENTITY),
                vec![slab],
            ))
            .unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = SimulationConfig {
            worker_count: 0,
            ..SimulationConfig::default()
        };
        assert!(matches!(MinEvolution::new(config), Err(PhysicsError::InvalidConfig(_))));
    }

    #[test]
    fn sphere_falls_onto_ground() {
        let mut evolution = MinEvolution::new(SimulationConfig::default()).unwrap();
        ground(&mut evolution);
        let ball = evolution
            .add_body(
                BodyDescription::create_dynamic(RigidPose::new(Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY), 1.0, sphere(0.5))
                    .unwrap(),
            )
            .unwrap();
        for _ in 0..120 {
            evolution.advance(1.0 / 60.0, 2);
        }
        let body = evolution.bodies().get(ball).unwrap();
        assert_abs_diff_eq!(body.pose.position.y, 0.5, epsilon = 0.02);
        assert!(body.velocity.linear.length() < 0.1);
    }

    #[test]
    fn modifier_can_disable_contacts() {
        let mut evolution = MinEvolution::new(SimulationConfig::default()).unwrap();
        ground(&mut evolution);
        let ball = evolution
            .add_body(
                BodyDescription::create_dynamic(RigidPose::new(Vec3::new(0.0, 0.5, 0.0), Quat::IDENTITY), 1.0, sphere(0.5))
                    .unwrap(),
            )
            .unwrap();
        evolution.add_contact_modifier(|constraint: &mut ContactConstraint| constraint.set_disabled(true));
        for _ in 0..10 {
            evolution.advance(1.0 / 60.0, 1);
        }
        assert!(evolution.bodies().get(ball).unwrap().pose.position.y < 0.4);
    }

    #[test]
    fn visitor_sees_active_pair() {
        let mut evolution = MinEvolution::new(SimulationConfig::default()).unwrap();
        let floor = ground(&mut evolution);
        let ball = evolution
            .add_body(
                BodyDescription::create_dynamic(RigidPose::new(Vec3::new(0.0, 0.5, 0.0), Quat::IDENTITY), 1.0, sphere(0.5))
                    .unwrap()
                    .with_material(PhysicsMaterial::new(0.5, 0.0)),
            )
            .unwrap();
        evolution.advance(1.0 / 60.0, 1);
        assert!(evolution.is_pair_active(floor, ball));
        assert!(evolution.num_active_contacts() >= 1);
        let mut visited = 0;
        evolution.visit_active_constraints(|constraint| {
            assert!(constraint.manifold_points().len() >= 1);
            visited += 1;
            VisitorResult::Continue
        });
        assert_eq!(visited, evolution.num_active_contacts());
    }

    #[test]
    fn removing_body_detaches_pairs() {
        let mut evolution = MinEvolution::new(SimulationConfig::default()).unwrap();
        let floor = ground(&mut evolution);
        let ball = evolution
            .add_body(
                BodyDescription::create_dynamic(RigidPose::new(Vec3::new(0.0, 0.5, 0.0), Quat::IDENTITY), 1.0, sphere(0.5))
                    .unwrap(),
            )
            .unwrap();
        evolution.advance(1.0 / 60.0, 1);
        assert_eq!(evolution.collisions().num_mid_phases(), 1);
        evolution.remove_body(ball).unwrap();
        assert_eq!(evolution.collisions().num_mid_phases(), 0);
        assert!(!evolution.is_pair_active(floor, ball));
        assert!(matches!(evolution.remove_body(ball), Err(PhysicsError::UnknownBody(_))));
    }

    #[test]
    fn kinematic_target_requires_kinematic_body() {
        let mut evolution = MinEvolution::new(SimulationConfig::default()).unwrap();
        let floor = ground(&mut evolution);
        let target = KinematicTarget::position(RigidPose::new(Vec3::X, Quat::IDENTITY));
        assert!(matches!(
            evolution.set_kinematic_target(floor, target),
            Err(PhysicsError::InvalidBodyKind { .. })
        ));
    }

    #[test]
    fn kinematic_body_reaches_target() {
        let mut evolution = MinEvolution::new(SimulationConfig::default()).unwrap();
        let mover = evolution
            .add_body(BodyDescription::create_kinematic(RigidPose::default(), sphere(0.5)))
            .unwrap();
        let goal = RigidPose::new(Vec3::new(2.0, 0.0, 0.0), Quat::IDENTITY);
        evolution
            .set_kinematic_target(mover, KinematicTarget::position(goal))
            .unwrap();
        evolution.advance(0.1, 4);
        let body = evolution.bodies().get(mover).unwrap();
        assert_abs_diff_eq!(body.pose.position.x, 2.0, epsilon = 1e-4);
        evolution.advance(0.1, 4);
        let body = evolution.bodies().get(mover).unwrap();
        assert_abs_diff_eq!(body.pose.position.x, 2.0, epsilon = 1e-4);
        assert_eq!(body.velocity.linear, Vec3::ZERO);
    }

    #[test]
    fn rewind_moves_toward_previous_pose() {
        let config = SimulationConfig {
            gravity: Vec3::ZERO,
            ..SimulationConfig::default()
        };
        let mut evolution = MinEvolution::new(config).unwrap();
        let ball = evolution
            .add_body(
                BodyDescription::create_dynamic(RigidPose::default(), 1.0, sphere(0.5))
                    .unwrap()
                    .with_velocity(BodyVelocity::new(Vec3::new(1.0, 0.0, 0.0), Vec3::ZERO)),
            )
            .unwrap();
        evolution.advance(1.0, 1);
        assert_abs_diff_eq!(evolution.bodies().get(ball).unwrap().pose.position.x, 1.0, epsilon = 1e-5);
        // Half of the last step is undone before advancing by half a step.
        evolution.advance_resimulated(0.5, 1, 0.5);
        assert_abs_diff_eq!(evolution.bodies().get(ball).unwrap().pose.position.x, 1.0, epsilon = 1e-5);
    }
}
