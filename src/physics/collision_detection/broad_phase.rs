use crate::physics::bodies::{Bodies, Body};
use crate::physics::handles::BodyPairKey;

/// Proposes body pairs that may be touching. The broad phase filters the proposals further.
pub trait CandidatePairSource: Send {
    fn collect_candidates(&mut self, bodies: &Bodies, candidates: &mut Vec<BodyPairKey>);
}

/// Proposes every pair whose inflated bounds overlap, found by sorting the bounds along x.
#[derive(Debug, Default)]
pub struct AllPairs {
    intervals: Vec<(f32, f32, usize)>,
}

impl CandidatePairSource for AllPairs {
    fn collect_candidates(&mut self, bodies: &Bodies, candidates: &mut Vec<BodyPairKey>) {
        let handles: Vec<&Body> = bodies.iter().collect();
        self.intervals.clear();
        self.intervals.extend(handles.iter().enumerate().filter_map(|(index, body)| {
            let bounds = body.inflated_bounds();
            bounds.is_valid().then_some((bounds.min.x, bounds.max.x, index))
        }));
        self.intervals.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));
        for (i, &(_, max_x, index_a)) in self.intervals.iter().enumerate() {
            for &(min_x, _, index_b) in &self.intervals[i + 1..] {
                if min_x > max_x {
                    break;
                }
                candidates.push(BodyPairKey::new(handles[index_a].handle(), handles[index_b].handle()));
            }
        }
    }
}

/// Proposes a fixed list of pairs.
#[derive(Debug, Default, Clone)]
pub struct ExplicitPairs {
    pub pairs: Vec<BodyPairKey>,
}

impl ExplicitPairs {
    pub fn new(pairs: impl IntoIterator<Item = BodyPairKey>) -> Self {
        Self {
            pairs: pairs.into_iter().collect(),
        }
    }
}

impl CandidatePairSource for ExplicitPairs {
    fn collect_candidates(&mut self, _bodies: &Bodies, candidates: &mut Vec<BodyPairKey>) {
        candidates.extend_from_slice(&self.pairs);
    }
}

/// Culls candidate pairs down to those that need a mid-phase this pass.
pub struct BroadPhase {
    source: Box<dyn CandidatePairSource>,
}

impl Default for BroadPhase {
    fn default() -> Self {
        Self::new(Box::new(AllPairs::default()))
    }
}

impl std::fmt::Debug for BroadPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadPhase").finish_non_exhaustive()
    }
}

impl BroadPhase {
    pub fn new(source: Box<dyn CandidatePairSource>) -> Self {
        Self { source }
    }

    pub fn set_source(&mut self, source: Box<dyn CandidatePairSource>) {
        self.source = source;
    }

    /// Whether the pair should be handed to the mid-phase. At least one body must be awake and dynamic,
    /// the inflated bounds must overlap and at least one shape pair must pass the collision filters.
    pub fn accepts(body_a: &Body, body_b: &Body) -> bool {
        if body_a.handle() == body_b.handle() || !(body_a.is_dynamic() || body_b.is_dynamic()) {
            return false;
        }
        if !body_a.inflated_bounds().intersects(&body_b.inflated_bounds()) {
            return false;
        }
        body_a.collidables().iter().any(|collidable_a| {
            body_b
                .collidables()
                .iter()
                .any(|collidable_b| collidable_a.filter.allows(&collidable_b.filter))
        })
    }

    /// Fills `pairs` with the unique candidate pairs of this pass, sorted by key.
    pub fn find_candidate_pairs(&mut self, bodies: &Bodies, pairs: &mut Vec<BodyPairKey>) {
        pairs.clear();
        self.source.collect_candidates(bodies, pairs);
        pairs.retain(|key| match (bodies.get(key.a), bodies.get(key.b)) {
            (Some(a), Some(b)) => Self::accepts(a, b),
            _ => false,
        });
        pairs.sort_unstable();
        pairs.dedup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body_description::BodyDescription;
    use crate::physics::body_properties::{CollisionFilter, RigidPose};
    use crate::physics::collidables::collidable::Collidable;
    use crate::physics::collidables::shape::ShapeGeometry;
    use crate::physics::handles::BodyHandle;
    use glam::Vec3;

    fn sphere() -> Collidable {
        Collidable::centered(ShapeGeometry::sphere(0.5).unwrap())
    }

    fn dynamic(bodies: &mut Bodies, x: f32) -> BodyHandle {
        let pose = RigidPose::from_position(Vec3::new(x, 0.0, 0.0));
        bodies
            .add(BodyDescription::create_dynamic(pose, 1.0, vec![sphere()]).unwrap())
            .unwrap()
    }

    fn fixed(bodies: &mut Bodies, x: f32) -> BodyHandle {
        let pose = RigidPose::from_position(Vec3::new(x, 0.0, 0.0));
        bodies
            .add(BodyDescription::create_static(pose, vec![sphere()]))
            .unwrap()
    }

    fn refresh(bodies: &mut Bodies) {
        for body in bodies.iter_mut() {
            body.update_bounds(0.01, 1.0);
        }
    }

    #[test]
    fn all_pairs_finds_overlaps_only() {
        let mut bodies = Bodies::new();
        let a = dynamic(&mut bodies, 0.0);
        let b = dynamic(&mut bodies, 0.9);
        let _far = dynamic(&mut bodies, 10.0);
        refresh(&mut bodies);
        let mut broad_phase = BroadPhase::default();
        let mut pairs = Vec::new();
        broad_phase.find_candidate_pairs(&bodies, &mut pairs);
        assert_eq!(pairs, vec![BodyPairKey::new(a, b)]);
    }

    #[test]
    fn pairs_without_awake_dynamic_body_are_skipped() {
        let mut bodies = Bodies::new();
        let a = fixed(&mut bodies, 0.0);
        let b = fixed(&mut bodies, 0.5);
        let c = dynamic(&mut bodies, 0.9);
        refresh(&mut bodies);
        let mut broad_phase = BroadPhase::default();
        let mut pairs = Vec::new();
        broad_phase.find_candidate_pairs(&bodies, &mut pairs);
        assert_eq!(pairs, vec![BodyPairKey::new(a, c), BodyPairKey::new(b, c)]);

        bodies.get_mut(c).unwrap().set_kind(crate::physics::bodies::BodyKind::Sleeping);
        broad_phase.find_candidate_pairs(&bodies, &mut pairs);
        assert!(pairs.is_empty());
    }

    #[test]
    fn explicit_pairs_are_filtered_and_deduplicated() {
        let mut bodies = Bodies::new();
        let a = dynamic(&mut bodies, 0.0);
        let b = dynamic(&mut bodies, 0.9);
        let far = dynamic(&mut bodies, 10.0);
        refresh(&mut bodies);
        let source = ExplicitPairs::new([BodyPairKey::new(b, a), BodyPairKey::new(a, b), BodyPairKey::new(a, far)]);
        let mut broad_phase = BroadPhase::new(Box::new(source));
        let mut pairs = Vec::new();
        broad_phase.find_candidate_pairs(&bodies, &mut pairs);
        assert_eq!(pairs, vec![BodyPairKey::new(a, b)]);
    }

    #[test]
    fn filters_exclude_pairs() {
        let mut bodies = Bodies::new();
        let a = dynamic(&mut bodies, 0.0);
        dynamic(&mut bodies, 0.9);
        let filtered = vec![sphere().with_filter(CollisionFilter::new(0b10, 0b10))];
        bodies.get_mut(a).unwrap().set_collidables(filtered);
        refresh(&mut bodies);
        let mut broad_phase = BroadPhase::default();
        let mut pairs = Vec::new();
        broad_phase.find_candidate_pairs(&bodies, &mut pairs);
        assert!(pairs.is_empty());
    }
}
