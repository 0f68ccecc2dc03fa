use glam::Vec3;

use crate::physics::bodies::{Body, BodyKind};
use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::shape::ShapeType;
use crate::physics::collision_detection::constraint_allocator::DetectorRef;
use crate::physics::collision_detection::contact_manifold::ContactConstraint;
use crate::physics::collision_detection::multi_shape_pair_detector::MultiShapePairDetector;
use crate::physics::collision_detection::narrow_phase::NarrowPhase;
use crate::physics::collision_detection::shape_pair_detector::SingleShapePairDetector;
use crate::physics::handles::BodyPairKey;
use crate::physics::simulation_config::{CcdConfig, CollisionConfig, RestoreTolerance};
use crate::utilities::math_helper::rotation_angle_between;

/// Everything a detector needs from the current detection pass.
pub(crate) struct DetectionContext<'a> {
    pub config: &'a CollisionConfig,
    pub ccd: &'a CcdConfig,
    pub narrow_phase: &'a NarrowPhase,
    pub epoch: u64,
    /// Length of the whole tick. Per-tick displacements for CCD are measured over it.
    pub dt: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidPhaseState {
    Uninitialized,
    Initialized,
    Active,
    Sleeping,
    Detached,
}

/// Collision state of one body pair: its shape pair detectors and the policy deciding whether the
/// narrow phase needs to run at all.
#[derive(Debug, Clone)]
pub struct ParticlePairMidPhase {
    key: BodyPairKey,
    pub(crate) slot: u32,
    state: MidPhaseState,
    single_detectors: Vec<SingleShapePairDetector>,
    multi_detectors: Vec<MultiShapePairDetector>,
    is_restorable: bool,
    is_ccd_candidate: bool,
    ccd_threshold: f32,
    /// Smallest extent of the two bodies' local bounds. Scales restore and manifold update tolerances.
    extent: f32,
    shapes_revision: (u32, u32),
    restore_poses: Option<(RigidPose, RigidPose)>,
    num_active_constraints: usize,
    last_used_epoch: u64,
    pub(crate) last_candidate_epoch: u64,
}

impl ParticlePairMidPhase {
    pub fn new(key: BodyPairKey, slot: u32) -> Self {
        Self {
            key,
            slot,
            state: MidPhaseState::Uninitialized,
            single_detectors: Vec::new(),
            multi_detectors: Vec::new(),
            is_restorable: true,
            is_ccd_candidate: false,
            ccd_threshold: f32::INFINITY,
            extent: 0.0,
            shapes_revision: (0, 0),
            restore_poses: None,
            num_active_constraints: 0,
            last_used_epoch: 0,
            last_candidate_epoch: 0,
        }
    }

    #[inline(always)]
    pub fn key(&self) -> BodyPairKey {
        self.key
    }

    #[inline(always)]
    pub fn state(&self) -> MidPhaseState {
        self.state
    }

    #[inline(always)]
    pub fn is_restorable(&self) -> bool {
        self.is_restorable
    }

    #[inline(always)]
    pub fn is_ccd_candidate(&self) -> bool {
        self.is_ccd_candidate
    }

    #[inline(always)]
    pub fn ccd_threshold(&self) -> f32 {
        self.ccd_threshold
    }

    /// Constraints activated by the last pass that touched this pair.
    #[inline(always)]
    pub fn num_active_constraints(&self) -> usize {
        self.num_active_constraints
    }

    #[inline(always)]
    pub fn last_used_epoch(&self) -> u64 {
        self.last_used_epoch
    }

    pub fn num_detectors(&self) -> usize {
        self.single_detectors.len() + self.multi_detectors.len()
    }

    /// Builds the shape pair detectors. `body_a` and `body_b` must match the pair key's order.
    pub(crate) fn init(&mut self, body_a: &Body, body_b: &Body, config: &CollisionConfig) {
        debug_assert!(body_a.handle() == self.key.a && body_b.handle() == self.key.b);
        self.single_detectors.clear();
        self.multi_detectors.clear();
        for (index_a, collidable_a) in body_a.collidables().iter().enumerate() {
            for (index_b, collidable_b) in body_b.collidables().iter().enumerate() {
                if !collidable_a.filter.allows(&collidable_b.filter) {
                    continue;
                }
                match (collidable_a.shape_type(), collidable_b.shape_type()) {
                    (type_a, type_b) if type_a.is_convex() && type_b.is_convex() => {
                        self.single_detectors.push(SingleShapePairDetector::new(index_a, index_b));
                    }
                    // Two level sets have no contact generator.
                    (ShapeType::LevelSet, ShapeType::LevelSet) => {}
                    _ => self.multi_detectors.push(MultiShapePairDetector::new(index_a, index_b)),
                }
            }
        }
        self.is_restorable = self.multi_detectors.is_empty();
        self.is_ccd_candidate = body_a.ccd_enabled() || body_b.ccd_enabled();
        self.ccd_threshold = body_a
            .collidables()
            .iter()
            .chain(body_b.collidables())
            .map(|collidable| collidable.ccd_threshold(config.ccd_threshold_fraction))
            .fold(f32::INFINITY, f32::min);
        self.extent = body_a.local_bounds().min_extent().min(body_b.local_bounds().min_extent());
        self.shapes_revision = (body_a.shapes_revision(), body_b.shapes_revision());
        self.restore_poses = None;
        self.num_active_constraints = 0;
        self.state = MidPhaseState::Initialized;
    }

    /// True when either body's shapes changed since the detectors were built.
    pub(crate) fn needs_reinit(&self, body_a: &Body, body_b: &Body) -> bool {
        self.state == MidPhaseState::Uninitialized
            || self.shapes_revision != (body_a.shapes_revision(), body_b.shapes_revision())
    }

    #[inline(always)]
    pub(crate) fn mark_candidate(&mut self, epoch: u64) {
        self.last_candidate_epoch = epoch;
    }

    #[inline(always)]
    pub fn is_candidate(&self, epoch: u64) -> bool {
        self.last_candidate_epoch == epoch
    }

    /// Whether both bodies are close enough to the poses of the last generation pass for the previous
    /// constraints to be reused.
    pub(crate) fn should_restore(&self, body_a: &Body, body_b: &Body, ctx: &DetectionContext) -> bool {
        if !self.is_restorable || self.last_used_epoch + 1 != ctx.epoch {
            return false;
        }
        let Some((pose_a, pose_b)) = self.restore_poses else {
            return false;
        };
        let tolerance = if self.num_active_constraints > 0 {
            ctx.config.restore.with_contacts
        } else {
            ctx.config.restore.without_contacts
        };
        self.within_tolerance(&pose_a, &body_a.predicted_pose, &tolerance)
            && self.within_tolerance(&pose_b, &body_b.predicted_pose, &tolerance)
    }

    fn within_tolerance(&self, recorded: &RigidPose, current: &RigidPose, tolerance: &RestoreTolerance) -> bool {
        (current.position - recorded.position).length() <= tolerance.distance_fraction * self.extent
            && rotation_angle_between(current.orientation, recorded.orientation) <= tolerance.rotation
    }

    fn tick_displacement(body: &Body, dt: f32) -> Vec3 {
        match body.kind() {
            BodyKind::Dynamic => body.velocity.linear * dt,
            BodyKind::Kinematic => body.predicted_pose.position - body.tick_start_position,
            BodyKind::Static | BodyKind::Sleeping => Vec3::ZERO,
        }
    }

    /// CCD is only needed when the relative motion over the tick could carry a shape past the other.
    pub(crate) fn should_enable_ccd(&self, body_a: &Body, body_b: &Body, ctx: &DetectionContext) -> bool {
        if !ctx.ccd.enabled || !self.is_ccd_candidate || self.single_detectors.is_empty() {
            return false;
        }
        let relative = Self::tick_displacement(body_a, ctx.dt) - Self::tick_displacement(body_b, ctx.dt);
        relative.length() > self.ccd_threshold
    }

    /// Restores or regenerates every constraint of the pair and appends the activated ones to `activated`.
    /// Returns the number of constraints activated.
    pub(crate) fn generate_collisions(
        &mut self,
        body_a: &Body,
        body_b: &Body,
        ctx: &DetectionContext,
        activated: &mut Vec<DetectorRef>,
    ) -> usize {
        debug_assert!(self.state != MidPhaseState::Detached);
        if self.state == MidPhaseState::Detached {
            return 0;
        }
        self.state = MidPhaseState::Active;
        let use_ccd = self.should_enable_ccd(body_a, body_b, ctx);
        if !use_ccd && self.should_restore(body_a, body_b, ctx) {
            let restored = self.try_restore(body_a, body_b, ctx, activated);
            ctx.narrow_phase.stats().count_restored_pair();
            return restored;
        }

        let start = activated.len();
        for (index, detector) in self.single_detectors.iter_mut().enumerate() {
            if detector.generate_collision(body_a, body_b, ctx, use_ccd, self.extent) {
                activated.push(DetectorRef::Single(index as u32));
            }
        }
        let mut keys = Vec::new();
        for (index, detector) in self.multi_detectors.iter_mut().enumerate() {
            keys.clear();
            detector.generate_collisions(body_a, body_b, ctx, &mut keys);
            activated.extend(keys.iter().map(|&key| DetectorRef::Multi {
                detector: index as u32,
                key,
            }));
        }
        self.restore_poses = Some((body_a.predicted_pose, body_b.predicted_pose));
        self.num_active_constraints = activated.len() - start;
        self.last_used_epoch = ctx.epoch;
        self.num_active_constraints
    }

    /// Reactivates the constraints of the previous pass without running the narrow phase.
    ///
    /// Calling this again within the same pass activates nothing new.
    pub(crate) fn try_restore(
        &mut self,
        body_a: &Body,
        body_b: &Body,
        ctx: &DetectionContext,
        activated: &mut Vec<DetectorRef>,
    ) -> usize {
        let start = activated.len();
        for (index, detector) in self.single_detectors.iter_mut().enumerate() {
            if detector.restore_collision(body_a, body_b, ctx) {
                activated.push(DetectorRef::Single(index as u32));
            }
        }
        let mut keys = Vec::new();
        for (index, detector) in self.multi_detectors.iter_mut().enumerate() {
            keys.clear();
            detector.restore_collisions(&body_a.predicted_pose, &body_b.predicted_pose, ctx, &mut keys);
            activated.extend(keys.iter().map(|&key| DetectorRef::Multi {
                detector: index as u32,
                key,
            }));
        }
        let restored = activated.len() - start;
        if self.last_used_epoch != ctx.epoch {
            self.num_active_constraints = restored;
        }
        self.last_used_epoch = ctx.epoch;
        restored
    }

    /// Puts the pair to sleep or wakes it. Waking re-stamps every constraint that was active when the pair
    /// went to sleep with `epoch` and appends it to `activated`, so the next pass can restore it.
    pub(crate) fn set_is_sleeping(&mut self, sleeping: bool, epoch: u64, activated: &mut Vec<DetectorRef>) {
        match (sleeping, self.state) {
            (_, MidPhaseState::Detached) => {}
            (true, _) => self.state = MidPhaseState::Sleeping,
            (false, MidPhaseState::Sleeping) => {
                let sleep_epoch = self.last_used_epoch;
                for (index, detector) in self.single_detectors.iter_mut().enumerate() {
                    if detector.wake(sleep_epoch, epoch) {
                        activated.push(DetectorRef::Single(index as u32));
                    }
                }
                let mut keys = Vec::new();
                for (index, detector) in self.multi_detectors.iter_mut().enumerate() {
                    keys.clear();
                    detector.wake(sleep_epoch, epoch, &mut keys);
                    activated.extend(keys.iter().map(|&key| DetectorRef::Multi {
                        detector: index as u32,
                        key,
                    }));
                }
                self.last_used_epoch = epoch;
                self.state = MidPhaseState::Active;
            }
            (false, _) => {}
        }
    }

    /// Releases every detector. The mid-phase is unusable afterwards.
    pub(crate) fn detach(&mut self) {
        self.single_detectors.clear();
        self.multi_detectors.clear();
        self.restore_poses = None;
        self.num_active_constraints = 0;
        self.state = MidPhaseState::Detached;
    }

    pub fn constraint(&self, detector: DetectorRef) -> Option<&ContactConstraint> {
        match detector {
            DetectorRef::Single(index) => self.single_detectors.get(index as usize)?.constraint(),
            DetectorRef::Multi { detector, key } => self.multi_detectors.get(detector as usize)?.constraint(key),
        }
    }

    pub fn constraint_mut(&mut self, detector: DetectorRef) -> Option<&mut ContactConstraint> {
        match detector {
            DetectorRef::Single(index) => self.single_detectors.get_mut(index as usize)?.constraint_mut(),
            DetectorRef::Multi { detector, key } => {
                self.multi_detectors.get_mut(detector as usize)?.constraint_mut(key)
            }
        }
    }

    /// Every constraint owned by the pair, active or not.
    pub fn constraints(&self) -> impl Iterator<Item = &ContactConstraint> {
        self.single_detectors
            .iter()
            .filter_map(|detector| detector.constraint())
            .chain(
                self.multi_detectors
                    .iter()
                    .flat_map(|detector| detector.iter().map(|(_, keyed)| &keyed.constraint)),
            )
    }
}
