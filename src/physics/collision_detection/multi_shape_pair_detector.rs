use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::warn;

use crate::physics::bodies::Body;
use crate::physics::body_properties::{PhysicsMaterial, RigidPose};
use crate::physics::collision_detection::collision_tasks::ContactPoint;
use crate::physics::collision_detection::contact_manifold::ContactConstraint;
use crate::physics::collision_detection::mid_phase::DetectionContext;
use crate::physics::collision_detection::narrow_phase::{KeyedContacts, SubShapePair};

/// Constraint of one sub-shape pair together with the identity it was created for.
#[derive(Debug, Clone)]
pub struct KeyedConstraint {
    pub identity: SubShapePair,
    pub constraint: ContactConstraint,
}

/// Detector for pairs involving level sets or compounds, where the set of touching sub-shapes changes
/// from pass to pass. Constraints are keyed by a 32-bit hash of the sub-shape pair identity.
#[derive(Debug, Clone)]
pub struct MultiShapePairDetector {
    shape_a: usize,
    shape_b: usize,
    constraints: HashMap<u32, KeyedConstraint>,
    groups: Vec<KeyedContacts>,
}

impl MultiShapePairDetector {
    pub fn new(shape_a: usize, shape_b: usize) -> Self {
        Self {
            shape_a,
            shape_b,
            constraints: HashMap::new(),
            groups: Vec::new(),
        }
    }

    #[inline(always)]
    pub fn shape_indices(&self) -> (usize, usize) {
        (self.shape_a, self.shape_b)
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    #[inline(always)]
    pub fn constraint(&self, key: u32) -> Option<&ContactConstraint> {
        self.constraints.get(&key).map(|keyed| &keyed.constraint)
    }

    #[inline(always)]
    pub fn constraint_mut(&mut self, key: u32) -> Option<&mut ContactConstraint> {
        self.constraints.get_mut(&key).map(|keyed| &mut keyed.constraint)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &KeyedConstraint)> {
        self.constraints.iter().map(|(key, keyed)| (*key, keyed))
    }

    /// Regenerates every sub-shape constraint and appends the keys activated in this pass to `activated`.
    /// Constraints not touched by this pass are pruned afterwards.
    pub(crate) fn generate_collisions(
        &mut self,
        body_a: &Body,
        body_b: &Body,
        ctx: &DetectionContext,
        activated: &mut Vec<u32>,
    ) -> usize {
        let start = activated.len();
        let (Some(collidable_a), Some(collidable_b)) = (
            body_a.collidables().get(self.shape_a),
            body_b.collidables().get(self.shape_b),
        ) else {
            return 0;
        };
        let cull_distance = ctx.config.cull_distance;
        if collidable_a
            .world_bounds()
            .expanded(cull_distance)
            .intersects(&collidable_b.world_bounds())
        {
            let mut groups = std::mem::take(&mut self.groups);
            groups.clear();
            ctx.narrow_phase.generate_keyed_contacts(
                collidable_a,
                &body_a.predicted_pose,
                collidable_b,
                &body_b.predicted_pose,
                cull_distance,
                ctx.config.max_manifold_points,
                &mut groups,
            );
            let material = PhysicsMaterial::combine(&body_a.material, &body_b.material);
            for group in &groups {
                let key = group.identity.key();
                if self.update_keyed(
                    key,
                    group.identity,
                    &group.contacts,
                    body_a,
                    body_b,
                    material,
                    ctx,
                ) {
                    activated.push(key);
                }
            }
            self.groups = groups;
        }
        self.prune(ctx.epoch);
        activated.len() - start
    }

    /// Writes one sub-shape manifold into the map. Returns true when the constraint was activated.
    ///
    /// If the key is already taken by a different identity that was used in this pass, the new pair is
    /// dropped for this pass. A stale entry with a different identity is replaced.
    #[allow(clippy::too_many_arguments)]
    fn update_keyed(
        &mut self,
        key: u32,
        identity: SubShapePair,
        contacts: &[ContactPoint],
        body_a: &Body,
        body_b: &Body,
        material: PhysicsMaterial,
        ctx: &DetectionContext,
    ) -> bool {
        let (shape_a, shape_b) = (self.shape_a, self.shape_b);
        let new_constraint = || {
            ContactConstraint::new(
                body_a.handle(),
                body_b.handle(),
                shape_a,
                shape_b,
                material,
                ctx.config.cull_distance,
                ctx.epoch,
            )
        };
        let keyed = match self.constraints.entry(key) {
            Entry::Occupied(entry) => {
                let keyed = entry.into_mut();
                if keyed.identity != identity {
                    if keyed.constraint.last_used_epoch() == ctx.epoch {
                        warn!(
                            key,
                            existing = ?keyed.identity,
                            skipped = ?identity,
                            "sub-shape pair key collision; skipping pair for this pass"
                        );
                        ctx.narrow_phase.stats().count_key_collision();
                        return false;
                    }
                    *keyed = KeyedConstraint {
                        identity,
                        constraint: new_constraint(),
                    };
                }
                keyed
            }
            Entry::Vacant(entry) => entry.insert(KeyedConstraint {
                identity,
                constraint: new_constraint(),
            }),
        };
        let constraint = &mut keyed.constraint;
        let used_last_pass = constraint.last_used_epoch() + 1 == ctx.epoch;
        constraint.clear_swept();
        constraint.set_manifold(contacts, &body_a.predicted_pose, &body_b.predicted_pose, used_last_pass);
        if constraint.manifold_points().is_empty()
            || constraint.min_phi() > ctx.config.cull_distance
            || constraint.last_used_epoch() == ctx.epoch
        {
            return false;
        }
        constraint.bookkeeping.last_used_epoch = ctx.epoch;
        true
    }

    /// Removes constraints that were not used in the given pass.
    pub(crate) fn prune(&mut self, epoch: u64) {
        self.constraints
            .retain(|_, keyed| keyed.constraint.last_used_epoch() == epoch);
    }

    /// Re-validates the constraints used in the previous pass without running the narrow phase.
    pub(crate) fn restore_collisions(
        &mut self,
        pose_a: &RigidPose,
        pose_b: &RigidPose,
        ctx: &DetectionContext,
        activated: &mut Vec<u32>,
    ) -> usize {
        let start = activated.len();
        for (key, keyed) in self.constraints.iter_mut() {
            let constraint = &mut keyed.constraint;
            let last_used = constraint.last_used_epoch();
            if last_used + 1 != ctx.epoch {
                continue;
            }
            constraint.clear_swept();
            constraint.refresh_from_anchors(pose_a, pose_b);
            if constraint.min_phi() <= ctx.config.cull_distance {
                constraint.bookkeeping.last_used_epoch = ctx.epoch;
                activated.push(*key);
            }
        }
        activated.len() - start
    }

    /// Re-stamps every constraint that was active when the pair went to sleep.
    pub(crate) fn wake(&mut self, sleep_epoch: u64, epoch: u64, activated: &mut Vec<u32>) {
        for (key, keyed) in self.constraints.iter_mut() {
            if keyed.constraint.last_used_epoch() == sleep_epoch {
                keyed.constraint.bookkeeping.last_used_epoch = epoch;
                activated.push(*key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::bodies::Bodies;
    use crate::physics::body_description::BodyDescription;
    use crate::physics::collidables::collidable::Collidable;
    use crate::physics::collidables::level_set::LevelSet;
    use crate::physics::collidables::shape::ShapeGeometry;
    use crate::physics::collision_detection::narrow_phase::NarrowPhase;
    use crate::physics::simulation_config::{CcdConfig, CollisionConfig};
    use glam::{UVec3, Vec3};

    fn ground() -> Collidable {
        let level_set = LevelSet::from_fn(Vec3::new(-2.0, -1.0, -2.0), 0.25, UVec3::new(17, 9, 17), |p| p.y)
            .unwrap();
        Collidable::centered(ShapeGeometry::level_set(level_set))
    }

    fn scene(box_height: f32) -> Bodies {
        let mut bodies = Bodies::new();
        let cube = Collidable::centered(ShapeGeometry::cuboid(Vec3::splat(0.5)).unwrap());
        let description =
            BodyDescription::create_dynamic(RigidPose::from_position(Vec3::new(0.0, box_height, 0.0)), 1.0, vec![cube])
                .unwrap();
        bodies.add(description).unwrap();
        bodies
            .add(BodyDescription::create_static(RigidPose::IDENTITY, vec![ground()]))
            .unwrap();
        for body in bodies.iter_mut() {
            body.update_bounds(0.01, 1.0);
        }
        bodies
    }

    fn context<'a>(
        config: &'a CollisionConfig,
        ccd: &'a CcdConfig,
        narrow_phase: &'a NarrowPhase,
        epoch: u64,
    ) -> DetectionContext<'a> {
        DetectionContext {
            config,
            ccd,
            narrow_phase,
            epoch,
            dt: 1.0 / 60.0,
        }
    }

    #[test]
    fn box_on_level_set_produces_keyed_constraints() {
        let bodies = scene(0.495);
        let body_a = bodies.iter().next().unwrap();
        let body_b = bodies.iter().nth(1).unwrap();
        let (config, ccd, narrow_phase) = (CollisionConfig::default(), CcdConfig::default(), NarrowPhase::new());
        let mut detector = MultiShapePairDetector::new(0, 0);
        let mut activated = Vec::new();

        let count = detector.generate_collisions(body_a, body_b, &context(&config, &ccd, &narrow_phase, 1), &mut activated);
        // Four bottom vertices and the bottom face center touch the plane.
        assert_eq!(count, 5);
        assert_eq!(detector.len(), 5);
        for key in &activated {
            let constraint = detector.constraint(*key).unwrap();
            assert!(constraint.min_phi() < 0.0);
        }
    }

    #[test]
    fn untouched_constraints_are_pruned() {
        let bodies = scene(0.495);
        let body_a = bodies.iter().next().unwrap();
        let body_b = bodies.iter().nth(1).unwrap();
        let (config, ccd, narrow_phase) = (CollisionConfig::default(), CcdConfig::default(), NarrowPhase::new());
        let mut detector = MultiShapePairDetector::new(0, 0);
        let mut activated = Vec::new();
        detector.generate_collisions(body_a, body_b, &context(&config, &ccd, &narrow_phase, 1), &mut activated);
        assert!(!detector.is_empty());

        let far = scene(3.0);
        let far_a = far.iter().next().unwrap();
        let far_b = far.iter().nth(1).unwrap();
        activated.clear();
        let count = detector.generate_collisions(far_a, far_b, &context(&config, &ccd, &narrow_phase, 2), &mut activated);
        assert_eq!(count, 0);
        assert!(detector.is_empty());
    }

    #[test]
    fn key_collision_skips_second_identity() {
        let bodies = scene(0.495);
        let body_a = bodies.iter().next().unwrap();
        let body_b = bodies.iter().nth(1).unwrap();
        let (config, ccd, narrow_phase) = (CollisionConfig::default(), CcdConfig::default(), NarrowPhase::new());
        let ctx = context(&config, &ccd, &narrow_phase, 1);
        let mut detector = MultiShapePairDetector::new(0, 0);
        let contact = ContactPoint::from_point_on_a(Vec3::new(0.0, -0.005, 0.0), Vec3::Y, -0.005, 0);
        let material = PhysicsMaterial::default();

        let first = SubShapePair::new(1, 2);
        let second = SubShapePair::new(3, 4);
        assert!(detector.update_keyed(7, first, &[contact], body_a, body_b, material, &ctx));
        assert!(!detector.update_keyed(7, second, &[contact], body_a, body_b, material, &ctx));
        assert_eq!(detector.iter().next().unwrap().1.identity, first);
        assert_eq!(narrow_phase.stats().snapshot().key_collisions, 1);

        // Once the first identity is stale, the key is handed over.
        let next = context(&config, &ccd, &narrow_phase, 2);
        assert!(detector.update_keyed(7, second, &[contact], body_a, body_b, material, &next));
        assert_eq!(detector.iter().next().unwrap().1.identity, second);
    }

    #[test]
    fn restore_reactivates_previous_pass() {
        let bodies = scene(0.495);
        let body_a = bodies.iter().next().unwrap();
        let body_b = bodies.iter().nth(1).unwrap();
        let (config, ccd, narrow_phase) = (CollisionConfig::default(), CcdConfig::default(), NarrowPhase::new());
        let mut detector = MultiShapePairDetector::new(0, 0);
        let mut activated = Vec::new();
        detector.generate_collisions(body_a, body_b, &context(&config, &ccd, &narrow_phase, 1), &mut activated);
        let generated = activated.len();

        activated.clear();
        let ctx = context(&config, &ccd, &narrow_phase, 2);
        let restored = detector.restore_collisions(&body_a.predicted_pose, &body_b.predicted_pose, &ctx, &mut activated);
        assert_eq!(restored, generated);
        assert_eq!(narrow_phase.stats().snapshot().narrow_phase_calls, 1);
    }
}
