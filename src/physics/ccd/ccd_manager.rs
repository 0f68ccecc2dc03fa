use std::collections::HashMap;

use glam::Vec3;
use tracing::debug;

use crate::physics::bodies::Bodies;
use crate::physics::body_properties::RigidPose;
use crate::physics::ccd::ccd_particle::{assign_islands, split_islands, CcdConstraint, CcdIsland, CcdParticle};
use crate::physics::collision_detection::constraint_allocator::CollisionConstraintAllocator;
use crate::physics::collision_detection::narrow_phase::NarrowPhase;
use crate::physics::collision_detection::sweep_tasks::SweepSettings;
use crate::physics::handles::BodyHandle;
use crate::physics::simulation_config::CcdConfig;
use crate::utilities::thread_dispatcher::ThreadDispatcher;

/// Summary of one CCD pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CcdReport {
    /// Swept constraints that needed resolution.
    pub constraints: usize,
    pub islands: usize,
    /// Constraint resolutions performed over all islands.
    pub passes: usize,
    /// Bodies frozen because a constraint ran out of budget.
    pub clipped_bodies: usize,
}

#[derive(Debug, Default)]
struct IslandOutcome {
    passes: usize,
    clipped_bodies: usize,
}

/// Resolves swept contacts in time of impact order after the regular solve, so fast bodies cannot pass
/// through thin geometry.
#[derive(Debug, Default)]
pub struct CcdManager {
    particles: Vec<CcdParticle>,
    constraints: Vec<CcdConstraint>,
    particle_lookup: HashMap<BodyHandle, usize>,
}

impl CcdManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn particle_index(&mut self, bodies: &Bodies, handle: BodyHandle) -> Option<usize> {
        if let Some(&index) = self.particle_lookup.get(&handle) {
            return Some(index);
        }
        let body = bodies.get(handle)?;
        let end = body.predicted_pose.position;
        let particle = if body.is_dynamic() {
            CcdParticle::new(
                handle,
                true,
                body.inverse_mass(),
                body.tick_start_position,
                end,
                body.velocity.linear,
            )
        } else {
            CcdParticle::new(handle, false, 0.0, body.tick_start_position, end, Vec3::ZERO)
        };
        self.particles.push(particle);
        let index = self.particles.len() - 1;
        self.particle_lookup.insert(handle, index);
        Some(index)
    }

    /// Collects the active constraints that were swept this tick and still move fast enough to need CCD.
    fn init(&mut self, bodies: &Bodies, allocator: &CollisionConstraintAllocator) {
        self.particles.clear();
        self.constraints.clear();
        self.particle_lookup.clear();
        for &constraint_ref in allocator.active_constraints() {
            let Some(constraint) = allocator.constraint(constraint_ref) else {
                continue;
            };
            if !constraint.is_swept() || constraint.manifold_points().is_empty() {
                continue;
            }
            let (Some(body_a), Some(body_b)) = (bodies.get(constraint.body_a()), bodies.get(constraint.body_b())) else {
                debug_assert!(false, "active constraint references a removed body");
                continue;
            };
            if !body_a.is_dynamic() && !body_b.is_dynamic() {
                continue;
            }
            let threshold = allocator
                .mid_phase_slot(constraint_ref.mid_phase)
                .map_or(0.0, |mid_phase| mid_phase.ccd_threshold());
            let displacement_a = body_a.predicted_pose.position - body_a.tick_start_position;
            let displacement_b = body_b.predicted_pose.position - body_b.tick_start_position;
            if (displacement_a - displacement_b).length() <= threshold {
                continue;
            }
            let frame = constraint.manifold_points()[0].frame(
                &body_a.predicted_pose,
                &body_b.predicted_pose,
                constraint.normal_override(),
            );
            let (Some(a), Some(b)) = (
                self.particle_index(bodies, constraint.body_a()),
                self.particle_index(bodies, constraint.body_b()),
            ) else {
                continue;
            };
            self.constraints.push(CcdConstraint {
                constraint: constraint_ref,
                particles: [a, b],
                shape_indices: constraint.shape_indices(),
                normal: frame.normal,
                restitution: constraint.restitution,
                time_of_impact: constraint.time_of_impact(),
                processed_count: 0,
                island: None,
            });
        }
    }

    /// Runs the CCD pass for the tick and writes corrected positions and velocities back to the bodies.
    pub fn apply_constraints_phase_ccd(
        &mut self,
        bodies: &mut Bodies,
        allocator: &mut CollisionConstraintAllocator,
        narrow_phase: &NarrowPhase,
        config: &CcdConfig,
        dt: f32,
        dispatcher: &ThreadDispatcher,
    ) -> CcdReport {
        if !config.enabled {
            return CcdReport::default();
        }
        self.init(bodies, allocator);
        if self.constraints.is_empty() {
            return CcdReport::default();
        }

        let island_count = assign_islands(&mut self.particles, &mut self.constraints);
        let mut islands = split_islands(&self.particles, &self.constraints, island_count);
        let settings = SweepSettings {
            tolerance: config.toi_tolerance,
            max_iterations: config.max_toi_iterations,
        };
        let outcomes = {
            let bodies: &Bodies = bodies;
            dispatcher.dispatch_chunks(&mut islands, |_, chunk| {
                let mut outcome = IslandOutcome::default();
                for island in chunk.iter_mut() {
                    let island_outcome = resolve_island(island, bodies, narrow_phase, config, &settings, dt);
                    outcome.passes += island_outcome.passes;
                    outcome.clipped_bodies += island_outcome.clipped_bodies;
                }
                outcome
            })
        };

        let mut report = CcdReport {
            constraints: self.constraints.len(),
            islands: island_count,
            ..CcdReport::default()
        };
        for outcome in &outcomes {
            report.passes += outcome.passes;
            report.clipped_bodies += outcome.clipped_bodies;
        }
        for island in &islands {
            commit_island(island, bodies, allocator, dt);
        }
        debug!(
            constraints = report.constraints,
            islands = report.islands,
            passes = report.passes,
            clipped = report.clipped_bodies,
            "ccd pass"
        );
        report
    }
}

/// Index of the next constraint to resolve: the earliest impact within the tick that still has budget and
/// can move at least one of its bodies.
fn select_next(island: &CcdIsland, max_process_count: u32) -> Option<usize> {
    island
        .constraints
        .iter()
        .enumerate()
        .filter(|(_, constraint)| {
            constraint.time_of_impact <= 1.0
                && constraint.processed_count < max_process_count
                && constraint
                    .particles
                    .iter()
                    .any(|&particle| island.particles[particle].is_movable())
        })
        .min_by(|(_, a), (_, b)| a.time_of_impact.total_cmp(&b.time_of_impact))
        .map(|(index, _)| index)
}

fn resolve_island(
    island: &mut CcdIsland,
    bodies: &Bodies,
    narrow_phase: &NarrowPhase,
    config: &CcdConfig,
    settings: &SweepSettings,
    dt: f32,
) -> IslandOutcome {
    let max_process_count = config.max_process_count.max(1);
    let pass_budget = island.constraints.len() * max_process_count as usize;
    let mut outcome = IslandOutcome::default();
    while outcome.passes < pass_budget {
        let Some(index) = select_next(island, max_process_count) else {
            break;
        };
        outcome.passes += 1;
        let constraint = island.constraints[index].clone();
        let t = constraint.time_of_impact.clamp(0.0, 1.0);
        let [index_a, index_b] = constraint.particles;
        let positions = [
            island.particles[index_a].position_at(t),
            island.particles[index_b].position_at(t),
        ];

        // Velocity impulse along the normal. Frozen and non-dynamic particles have infinite mass.
        let w_a = effective_inverse_mass(&island.particles[index_a]);
        let w_b = effective_inverse_mass(&island.particles[index_b]);
        let relative_velocity = island.particles[index_a].velocity - island.particles[index_b].velocity;
        let normal_velocity = relative_velocity.dot(constraint.normal);
        if normal_velocity < 0.0 && w_a + w_b > 0.0 {
            let impulse = -(1.0 + constraint.restitution) * normal_velocity / (w_a + w_b);
            island.particles[index_a].velocity += constraint.normal * (impulse * w_a);
            island.particles[index_b].velocity -= constraint.normal * (impulse * w_b);
        }
        for (side, &particle_index) in constraint.particles.iter().enumerate() {
            let particle = &mut island.particles[particle_index];
            if !particle.is_movable() {
                continue;
            }
            let position = positions[side];
            particle.end = position + particle.velocity * dt * (1.0 - t);
            particle.start = position - particle.velocity * dt * t;
            particle.touched = true;
        }

        let resolved = &mut island.constraints[index];
        resolved.time_of_impact = f32::INFINITY;
        resolved.processed_count += 1;

        if resolved.processed_count >= max_process_count && config.clipping_enabled {
            outcome.clipped_bodies += clip(island, &constraint, positions, t);
        } else if config.resweep_enabled {
            resweep(island, index, t, bodies, narrow_phase, settings);
        }
    }
    outcome
}

#[inline(always)]
fn effective_inverse_mass(particle: &CcdParticle) -> f32 {
    if particle.is_movable() {
        particle.inverse_mass
    } else {
        0.0
    }
}

/// Freezes the movable bodies of a constraint at its impact position. A body pushed by a kinematic body keeps
/// following that body's motion along the normal for the rest of the tick.
fn clip(island: &mut CcdIsland, constraint: &CcdConstraint, positions: [Vec3; 2], t: f32) -> usize {
    let mut clipped = 0;
    for side in 0..2 {
        let index = constraint.particles[side];
        let other = &island.particles[constraint.particles[1 - side]];
        if !island.particles[index].is_movable() {
            continue;
        }
        let mut position = positions[side];
        if !other.is_dynamic {
            let kinematic_displacement = other.displacement();
            position += constraint.normal * constraint.normal.dot(kinematic_displacement) * (1.0 - t);
        }
        let particle = &mut island.particles[index];
        particle.start = position;
        particle.end = position;
        particle.frozen = true;
        particle.touched = true;
        debug!(body = %particle.handle, time_of_impact = t, "clipped body at impact");
        clipped += 1;
    }
    clipped
}

/// Recomputes the time of impact of every other constraint attached to the bodies of `resolved`, from
/// time `t` to the end of the tick.
fn resweep(
    island: &mut CcdIsland,
    resolved: usize,
    t: f32,
    bodies: &Bodies,
    narrow_phase: &NarrowPhase,
    settings: &SweepSettings,
) {
    let mut affected: Vec<usize> = island.constraints[resolved]
        .particles
        .iter()
        .flat_map(|&particle| island.particles[particle].constraints.iter().copied())
        .filter(|&index| index != resolved)
        .collect();
    affected.sort_unstable();
    affected.dedup();
    for index in affected {
        let constraint = &island.constraints[index];
        let [index_a, index_b] = constraint.particles;
        let (particle_a, particle_b) = (&island.particles[index_a], &island.particles[index_b]);
        let (Some(body_a), Some(body_b)) = (bodies.get(particle_a.handle), bodies.get(particle_b.handle)) else {
            continue;
        };
        let (shape_a, shape_b) = constraint.shape_indices;
        let (Some(collidable_a), Some(collidable_b)) =
            (body_a.collidables().get(shape_a), body_b.collidables().get(shape_b))
        else {
            continue;
        };
        let start_a = RigidPose::new(particle_a.position_at(t), body_a.predicted_pose.orientation);
        let start_b = RigidPose::new(particle_b.position_at(t), body_b.predicted_pose.orientation);
        let hit = narrow_phase.sweep(
            collidable_a,
            &start_a,
            particle_a.end - start_a.position,
            collidable_b,
            &start_b,
            particle_b.end - start_b.position,
            settings,
        );
        let time_of_impact = match hit {
            Some(hit) => {
                island.constraints[index].normal = hit.normal;
                t + hit.time_of_impact * (1.0 - t)
            }
            None => f32::INFINITY,
        };
        island.constraints[index].time_of_impact = time_of_impact;
    }
}

/// Writes the resolved motion back and refreshes the island's manifolds at the new poses.
fn commit_island(island: &CcdIsland, bodies: &mut Bodies, allocator: &mut CollisionConstraintAllocator, dt: f32) {
    for particle in island.particles.iter().filter(|p| p.is_dynamic && p.touched) {
        let Some(body) = bodies.get_mut(particle.handle) else {
            continue;
        };
        body.predicted_pose.position = particle.end;
        body.pose.position = particle.end;
        body.velocity.linear = particle.velocity;
        body.previous_pose.position = particle.end - particle.velocity * dt;
    }
    for constraint in &island.constraints {
        let particle_a = &island.particles[constraint.particles[0]];
        let particle_b = &island.particles[constraint.particles[1]];
        let (Some(pose_a), Some(pose_b)) = (
            bodies.get(particle_a.handle).map(|body| body.pose),
            bodies.get(particle_b.handle).map(|body| body.pose),
        ) else {
            continue;
        };
        if let Some(contact) = allocator.constraint_mut(constraint.constraint) {
            contact.refresh_from_anchors(&pose_a, &pose_b);
            contact.set_swept(constraint.time_of_impact);
        }
    }
}
