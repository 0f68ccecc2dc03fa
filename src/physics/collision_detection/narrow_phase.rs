use crossbeam_utils::CachePadded;
use glam::Vec3;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::collision_tasks::level_set_tester::LevelSetTester;
use super::collision_tasks::{convex_pair_contacts, reduce_manifold, ContactPoint};
use super::sweep_tasks::{sweep_shapes, SweepHit, SweepSettings};
use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::collidable::Collidable;
use crate::physics::collidables::shape::ShapeGeometry;
use crate::utilities::bounding_box::BoundingBox;

/// Counters of the work done by collision detection. Shared between workers.
#[derive(Debug, Default)]
pub struct CollisionStats {
    narrow_phase_calls: CachePadded<AtomicUsize>,
    manifold_updates: CachePadded<AtomicUsize>,
    restored_pairs: CachePadded<AtomicUsize>,
    sweeps: CachePadded<AtomicUsize>,
    key_collisions: CachePadded<AtomicUsize>,
}

/// Point in time copy of [`CollisionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollisionStatsSnapshot {
    /// Full contact generation calls, single or multi-shape.
    pub narrow_phase_calls: usize,
    /// Manifolds refreshed from stored anchors because the relative pose barely changed.
    pub manifold_updates: usize,
    /// Pairs whose constraints were reused without any contact generation.
    pub restored_pairs: usize,
    pub sweeps: usize,
    /// Sub-shape pairs dropped because their key was already taken by a different pair.
    pub key_collisions: usize,
}

impl CollisionStats {
    #[inline(always)]
    pub(crate) fn count_narrow_phase_call(&self) {
        self.narrow_phase_calls.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub(crate) fn count_manifold_update(&self) {
        self.manifold_updates.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub(crate) fn count_restored_pair(&self) {
        self.restored_pairs.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub(crate) fn count_sweep(&self) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub(crate) fn count_key_collision(&self) {
        self.key_collisions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CollisionStatsSnapshot {
        CollisionStatsSnapshot {
            narrow_phase_calls: self.narrow_phase_calls.load(Ordering::Relaxed),
            manifold_updates: self.manifold_updates.load(Ordering::Relaxed),
            restored_pairs: self.restored_pairs.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            key_collisions: self.key_collisions.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.narrow_phase_calls,
            &self.manifold_updates,
            &self.restored_pairs,
            &self.sweeps,
            &self.key_collisions,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Identity of a sub-shape pair within a multi-shape pair, e.g. (compound child, level set cell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubShapePair {
    pub a: u64,
    pub b: u64,
}

impl SubShapePair {
    #[inline(always)]
    pub fn new(a: u64, b: u64) -> Self {
        Self { a, b }
    }

    /// 32-bit key of the pair. Distinct pairs can share a key.
    #[inline(always)]
    pub fn key(&self) -> u32 {
        const P1: u64 = 961748927;
        const P2: u64 = 899809343;
        let hash64 = self
            .a
            .wrapping_mul(P1.wrapping_mul(P2))
            .wrapping_add(self.b.wrapping_mul(P2));
        (hash64 ^ (hash64 >> 32)) as u32
    }
}

/// Contacts of one sub-shape pair.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedContacts {
    pub identity: SubShapePair,
    pub contacts: Vec<ContactPoint>,
}

/// Contact generation and sweep entry points used by the pair detectors.
#[derive(Debug, Default)]
pub struct NarrowPhase {
    stats: CollisionStats,
}

impl NarrowPhase {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn stats(&self) -> &CollisionStats {
        &self.stats
    }

    /// Generates the manifold of a convex shape pair at the given body poses.
    pub fn generate_convex_contacts(
        &self,
        a: &Collidable,
        body_pose_a: &RigidPose,
        b: &Collidable,
        body_pose_b: &RigidPose,
        cull_distance: f32,
        max_points: usize,
        contacts: &mut Vec<ContactPoint>,
    ) {
        self.stats.count_narrow_phase_call();
        let (ShapeGeometry::Convex(convex_a), ShapeGeometry::Convex(convex_b)) = (a.geometry(), b.geometry()) else {
            debug_assert!(false, "single shape pairs must be convex");
            return;
        };
        let pose_a = a.world_pose(body_pose_a);
        let pose_b = b.world_pose(body_pose_b);
        convex_pair_contacts(convex_a, &pose_a, convex_b, &pose_b, cull_distance, contacts);
        reduce_manifold(contacts, max_points);
    }

    /// Generates per sub-shape contact groups for pairs involving level sets or compounds.
    pub fn generate_keyed_contacts(
        &self,
        a: &Collidable,
        body_pose_a: &RigidPose,
        b: &Collidable,
        body_pose_b: &RigidPose,
        cull_distance: f32,
        max_points: usize,
        groups: &mut Vec<KeyedContacts>,
    ) {
        self.stats.count_narrow_phase_call();
        let pose_a = a.world_pose(body_pose_a);
        let pose_b = b.world_pose(body_pose_b);
        keyed_contacts(a.geometry(), &pose_a, b.geometry(), &pose_b, cull_distance, max_points, groups);
    }

    /// Sweeps two collidables by their bodies' displacements, starting at the given body poses.
    pub fn sweep(
        &self,
        a: &Collidable,
        start_pose_a: &RigidPose,
        displacement_a: Vec3,
        b: &Collidable,
        start_pose_b: &RigidPose,
        displacement_b: Vec3,
        settings: &SweepSettings,
    ) -> Option<SweepHit> {
        self.stats.count_sweep();
        let pose_a = a.world_pose(start_pose_a);
        let pose_b = b.world_pose(start_pose_b);
        sweep_shapes(a.geometry(), &pose_a, displacement_a, b.geometry(), &pose_b, displacement_b, settings)
    }
}

fn world_bounds(geometry: &ShapeGeometry, pose: &RigidPose) -> BoundingBox {
    geometry.local_bounds().transformed(pose.position, pose.orientation)
}

fn keyed_contacts(
    a: &ShapeGeometry,
    pose_a: &RigidPose,
    b: &ShapeGeometry,
    pose_b: &RigidPose,
    cull_distance: f32,
    max_points: usize,
    groups: &mut Vec<KeyedContacts>,
) {
    match (a, b) {
        (ShapeGeometry::Convex(convex_a), ShapeGeometry::Convex(convex_b)) => {
            let mut contacts = Vec::new();
            convex_pair_contacts(convex_a, pose_a, convex_b, pose_b, cull_distance, &mut contacts);
            if !contacts.is_empty() {
                reduce_manifold(&mut contacts, max_points);
                groups.push(KeyedContacts {
                    identity: SubShapePair::new(0, 0),
                    contacts,
                });
            }
        }
        (ShapeGeometry::Convex(convex), ShapeGeometry::LevelSet(level_set)) => {
            let mut samples = Vec::new();
            LevelSetTester::test(convex, pose_a, level_set, pose_b, cull_distance, &mut samples);
            groups.extend(samples.into_iter().map(|sample| KeyedContacts {
                identity: SubShapePair::new(sample.sample_index as u64, sample.cell_index),
                contacts: vec![sample.contact],
            }));
        }
        (ShapeGeometry::LevelSet(level_set), ShapeGeometry::Convex(convex)) => {
            let mut samples = Vec::new();
            LevelSetTester::test(convex, pose_b, level_set, pose_a, cull_distance, &mut samples);
            groups.extend(samples.into_iter().map(|sample| KeyedContacts {
                identity: SubShapePair::new(sample.cell_index, sample.sample_index as u64),
                contacts: vec![sample.contact.flipped()],
            }));
        }
        (ShapeGeometry::Compound(compound), _) => {
            let other_bounds = world_bounds(b, pose_b).expanded(cull_distance);
            for (child_index, child) in compound.children().iter().enumerate() {
                let child_pose = RigidPose::multiply(&child.local_pose, pose_a);
                let child_geometry = ShapeGeometry::Convex(child.shape);
                if !world_bounds(&child_geometry, &child_pose).intersects(&other_bounds) {
                    continue;
                }
                let start = groups.len();
                keyed_contacts(&child_geometry, &child_pose, b, pose_b, cull_distance, max_points, groups);
                for group in &mut groups[start..] {
                    group.identity.a = ((child_index as u64) << 32) | group.identity.a;
                }
            }
        }
        (_, ShapeGeometry::Compound(compound)) => {
            let other_bounds = world_bounds(a, pose_a).expanded(cull_distance);
            for (child_index, child) in compound.children().iter().enumerate() {
                let child_pose = RigidPose::multiply(&child.local_pose, pose_b);
                let child_geometry = ShapeGeometry::Convex(child.shape);
                if !world_bounds(&child_geometry, &child_pose).intersects(&other_bounds) {
                    continue;
                }
                let start = groups.len();
                keyed_contacts(a, pose_a, &child_geometry, &child_pose, cull_distance, max_points, groups);
                for group in &mut groups[start..] {
                    group.identity.b = ((child_index as u64) << 32) | group.identity.b;
                }
            }
        }
        // No contact generation between two level sets.
        (ShapeGeometry::LevelSet(_), ShapeGeometry::LevelSet(_)) => {}
    }
}
