use std::collections::HashMap;

use tracing::debug;

use crate::physics::bodies::{Bodies, Body};
use crate::physics::collision_detection::contact_manifold::ContactConstraint;
use crate::physics::collision_detection::mid_phase::ParticlePairMidPhase;
use crate::physics::collision_detection::narrow_phase_callbacks::VisitorResult;
use crate::physics::handles::{BodyHandle, BodyPairKey};
use crate::physics::simulation_config::CollisionConfig;

/// Locates a constraint inside its mid-phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectorRef {
    Single(u32),
    Multi { detector: u32, key: u32 },
}

/// Locates an active constraint. Only valid for the detection pass that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintRef {
    pub(crate) mid_phase: u32,
    pub(crate) detector: DetectorRef,
}

/// Owns every mid-phase and the set of constraints active in the current detection pass.
///
/// The epoch advances once per detection pass. Constraints record the epoch in which they were last
/// used, which is how staleness is judged everywhere else.
#[derive(Debug, Default)]
pub struct CollisionConstraintAllocator {
    epoch: u64,
    mid_phases: Vec<Option<ParticlePairMidPhase>>,
    free_slots: Vec<u32>,
    pair_lookup: HashMap<BodyPairKey, u32>,
    active: Vec<ConstraintRef>,
}

impl CollisionConstraintAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Starts a detection pass and returns its epoch.
    pub(crate) fn begin_detection(&mut self) -> u64 {
        self.epoch += 1;
        self.active.clear();
        self.epoch
    }

    /// Finds the mid-phase of a pair, creating it on first overlap and rebuilding it when either body's
    /// shapes changed. The bodies must be given in key order.
    pub(crate) fn get_or_create_mid_phase(
        &mut self,
        key: BodyPairKey,
        body_a: &Body,
        body_b: &Body,
        config: &CollisionConfig,
    ) -> u32 {
        if let Some(&slot) = self.pair_lookup.get(&key) {
            if let Some(mid_phase) = self.mid_phases[slot as usize].as_mut() {
                if mid_phase.needs_reinit(body_a, body_b) {
                    debug!(pair = %key, "rebuilding mid-phase after shape change");
                    mid_phase.init(body_a, body_b, config);
                }
            }
            return slot;
        }
        let slot = match self.free_slots.pop() {
            Some(slot) => slot,
            None => {
                self.mid_phases.push(None);
                (self.mid_phases.len() - 1) as u32
            }
        };
        let mut mid_phase = ParticlePairMidPhase::new(key, slot);
        mid_phase.init(body_a, body_b, config);
        debug!(pair = %key, detectors = mid_phase.num_detectors(), "created mid-phase");
        self.mid_phases[slot as usize] = Some(mid_phase);
        self.pair_lookup.insert(key, slot);
        slot
    }

    #[inline(always)]
    pub(crate) fn mid_phase_slot(&self, slot: u32) -> Option<&ParticlePairMidPhase> {
        self.mid_phases.get(slot as usize)?.as_ref()
    }

    #[inline(always)]
    pub(crate) fn mid_phase_slot_mut(&mut self, slot: u32) -> Option<&mut ParticlePairMidPhase> {
        self.mid_phases.get_mut(slot as usize)?.as_mut()
    }

    pub(crate) fn mid_phases_mut(&mut self) -> &mut [Option<ParticlePairMidPhase>] {
        &mut self.mid_phases
    }

    pub fn mid_phases(&self) -> impl Iterator<Item = &ParticlePairMidPhase> {
        self.mid_phases.iter().flatten()
    }

    pub fn num_mid_phases(&self) -> usize {
        self.pair_lookup.len()
    }

    pub fn mid_phase(&self, a: BodyHandle, b: BodyHandle) -> Option<&ParticlePairMidPhase> {
        let slot = *self.pair_lookup.get(&BodyPairKey::new(a, b))?;
        self.mid_phases.get(slot as usize)?.as_ref()
    }

    /// Adds constraints to the current pass's active set.
    pub(crate) fn activate(&mut self, constraints: impl IntoIterator<Item = ConstraintRef>) {
        self.active.extend(constraints);
    }

    #[inline(always)]
    pub fn active_constraints(&self) -> &[ConstraintRef] {
        &self.active
    }

    #[inline(always)]
    pub fn num_active_constraints(&self) -> usize {
        self.active.len()
    }

    pub fn constraint(&self, constraint: ConstraintRef) -> Option<&ContactConstraint> {
        self.mid_phases
            .get(constraint.mid_phase as usize)?
            .as_ref()?
            .constraint(constraint.detector)
    }

    pub fn constraint_mut(&mut self, constraint: ConstraintRef) -> Option<&mut ContactConstraint> {
        self.mid_phases
            .get_mut(constraint.mid_phase as usize)?
            .as_mut()?
            .constraint_mut(constraint.detector)
    }

    /// Calls `visitor` for every active constraint until it returns [`VisitorResult::Stop`].
    pub fn visit_active_constraints(&mut self, mut visitor: impl FnMut(&mut ContactConstraint) -> VisitorResult) {
        let Self {
            mid_phases, active, ..
        } = self;
        for constraint in active.iter() {
            let Some(mid_phase) = mid_phases.get_mut(constraint.mid_phase as usize).and_then(Option::as_mut) else {
                continue;
            };
            if let Some(contact) = mid_phase.constraint_mut(constraint.detector) {
                if visitor(contact) == VisitorResult::Stop {
                    return;
                }
            }
        }
    }

    /// Removes mid-phases that the broad phase did not propose in the current pass.
    /// Pairs with a sleeping body are kept so their constraints survive until wake.
    pub(crate) fn cull_stale_mid_phases(&mut self, bodies: &Bodies) {
        let epoch = self.epoch;
        let mut culled = Vec::new();
        for mid_phase in self.mid_phases.iter().flatten() {
            if mid_phase.is_candidate(epoch) {
                continue;
            }
            let key = mid_phase.key();
            let keep = match (bodies.get(key.a), bodies.get(key.b)) {
                (Some(a), Some(b)) => a.is_sleeping() || b.is_sleeping(),
                _ => false,
            };
            if !keep {
                culled.push(key);
            }
        }
        for key in culled {
            debug!(pair = %key, "culling stale mid-phase");
            self.remove_mid_phase(key);
        }
    }

    fn remove_mid_phase(&mut self, key: BodyPairKey) {
        let Some(slot) = self.pair_lookup.remove(&key) else {
            return;
        };
        if let Some(mut mid_phase) = self.mid_phases[slot as usize].take() {
            mid_phase.detach();
        }
        self.active.retain(|constraint| constraint.mid_phase != slot);
        self.free_slots.push(slot);
    }

    /// Destroys every mid-phase referencing the body.
    pub(crate) fn detach_body(&mut self, handle: BodyHandle) {
        let keys: Vec<BodyPairKey> = self.pair_lookup.keys().filter(|key| key.contains(handle)).copied().collect();
        for key in keys {
            debug!(pair = %key, body = %handle, "detaching mid-phase");
            self.remove_mid_phase(key);
        }
    }

    /// Propagates a body's sleep state to its mid-phases. Waking re-activates the constraints that were
    /// active when the pairs went to sleep.
    pub(crate) fn set_body_sleeping(&mut self, handle: BodyHandle, sleeping: bool) {
        let epoch = self.epoch;
        let mut woken = Vec::new();
        for mid_phase in self.mid_phases.iter_mut().flatten() {
            if !mid_phase.key().contains(handle) {
                continue;
            }
            woken.clear();
            mid_phase.set_is_sleeping(sleeping, epoch, &mut woken);
            let slot = mid_phase.slot;
            self.active.extend(woken.iter().map(|&detector| ConstraintRef {
                mid_phase: slot,
                detector,
            }));
        }
    }
}
