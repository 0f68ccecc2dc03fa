use glam::Vec3;

use crate::physics::collision_detection::constraint_allocator::ConstraintRef;
use crate::physics::handles::BodyHandle;

/// Body taking part in a CCD pass. Only lives for the duration of the pass.
///
/// `start` and `end` describe the straight-line motion over the tick. After an impulse they are replaced by a
/// virtual segment that passes through the impact position and continues with the new velocity, so the
/// position at any later time of impact is still `start + (end - start) * t`.
#[derive(Debug, Clone)]
pub struct CcdParticle {
    pub handle: BodyHandle,
    pub is_dynamic: bool,
    pub inverse_mass: f32,
    pub start: Vec3,
    pub end: Vec3,
    pub velocity: Vec3,
    pub frozen: bool,
    /// Whether CCD changed the particle and it must be written back.
    pub touched: bool,
    pub island: Option<usize>,
    /// Constraints attached to the particle, as indices into the constraint arena.
    pub constraints: Vec<usize>,
    /// Dynamic particles sharing a constraint with this one.
    pub overlapping_dynamics: Vec<usize>,
}

impl CcdParticle {
    pub fn new(handle: BodyHandle, is_dynamic: bool, inverse_mass: f32, start: Vec3, end: Vec3, velocity: Vec3) -> Self {
        Self {
            handle,
            is_dynamic,
            inverse_mass,
            start,
            end,
            velocity,
            frozen: false,
            touched: false,
            island: None,
            constraints: Vec::new(),
            overlapping_dynamics: Vec::new(),
        }
    }

    #[inline(always)]
    pub fn position_at(&self, t: f32) -> Vec3 {
        self.start + (self.end - self.start) * t
    }

    #[inline(always)]
    pub fn displacement(&self) -> Vec3 {
        self.end - self.start
    }

    /// True when CCD may still move the particle.
    #[inline(always)]
    pub fn is_movable(&self) -> bool {
        self.is_dynamic && !self.frozen
    }
}

/// Swept contact resolved by the CCD pass.
#[derive(Debug, Clone)]
pub struct CcdConstraint {
    pub constraint: ConstraintRef,
    pub particles: [usize; 2],
    pub shape_indices: (usize, usize),
    /// World normal from B to A.
    pub normal: Vec3,
    pub restitution: f32,
    pub time_of_impact: f32,
    pub processed_count: u32,
    pub island: Option<usize>,
}

impl CcdConstraint {
    /// The particle on the other side of the constraint.
    #[inline(always)]
    pub fn other(&self, particle: usize) -> usize {
        if self.particles[0] == particle {
            self.particles[1]
        } else {
            self.particles[0]
        }
    }
}

/// Connected group of dynamic particles, with local copies of every particle its constraints reference.
#[derive(Debug, Clone, Default)]
pub struct CcdIsland {
    pub particles: Vec<CcdParticle>,
    pub constraints: Vec<CcdConstraint>,
}

/// Labels every dynamic particle with the id of its connected component and returns the number of islands.
///
/// Edges are constraints between two dynamic particles. Non-dynamic particles join no island; a constraint
/// takes the island of its dynamic particle.
pub fn assign_islands(particles: &mut [CcdParticle], constraints: &mut [CcdConstraint]) -> usize {
    for particle in particles.iter_mut() {
        particle.island = None;
        particle.overlapping_dynamics.clear();
    }
    for constraint in constraints.iter() {
        let [a, b] = constraint.particles;
        if a != b && particles[a].is_dynamic && particles[b].is_dynamic {
            particles[a].overlapping_dynamics.push(b);
            particles[b].overlapping_dynamics.push(a);
        }
    }

    let mut island_count = 0;
    let mut stack = Vec::new();
    for root in 0..particles.len() {
        if !particles[root].is_dynamic || particles[root].island.is_some() {
            continue;
        }
        particles[root].island = Some(island_count);
        stack.push(root);
        while let Some(index) = stack.pop() {
            for peer_slot in 0..particles[index].overlapping_dynamics.len() {
                let peer = particles[index].overlapping_dynamics[peer_slot];
                if particles[peer].island.is_none() {
                    particles[peer].island = Some(island_count);
                    stack.push(peer);
                }
            }
        }
        island_count += 1;
    }

    for constraint in constraints.iter_mut() {
        let [a, b] = constraint.particles;
        constraint.island = particles[a].island.or(particles[b].island);
    }
    island_count
}

/// Splits the pass into independent islands. Dynamic particles move into exactly one island; non-dynamic
/// particles are copied into every island that references them.
pub fn split_islands(particles: &[CcdParticle], constraints: &[CcdConstraint], island_count: usize) -> Vec<CcdIsland> {
    let mut islands = vec![CcdIsland::default(); island_count];
    // Index of each particle within the island currently being filled.
    let mut local_index: Vec<Option<(usize, usize)>> = vec![None; particles.len()];
    for constraint in constraints {
        let Some(island_id) = constraint.island else {
            continue;
        };
        let island = &mut islands[island_id];
        let mut local = [0; 2];
        for (side, &particle) in constraint.particles.iter().enumerate() {
            local[side] = match local_index[particle] {
                Some((owner, index)) if owner == island_id => index,
                _ => {
                    let mut copy = particles[particle].clone();
                    copy.constraints.clear();
                    copy.overlapping_dynamics.clear();
                    island.particles.push(copy);
                    let index = island.particles.len() - 1;
                    local_index[particle] = Some((island_id, index));
                    index
                }
            };
        }
        let constraint_index = island.constraints.len();
        let mut local_constraint = constraint.clone();
        local_constraint.particles = local;
        island.constraints.push(local_constraint);
        island.particles[local[0]].constraints.push(constraint_index);
        if local[1] != local[0] {
            island.particles[local[1]].constraints.push(constraint_index);
        }
    }
    islands
}
