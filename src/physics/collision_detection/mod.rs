pub mod broad_phase;
pub mod collision_tasks;
pub mod constraint_allocator;
pub mod contact_manifold;
pub mod mid_phase;
pub mod multi_shape_pair_detector;
pub mod narrow_phase;
pub mod narrow_phase_callbacks;
pub mod shape_pair_detector;
pub mod sweep_tasks;

pub use broad_phase::{AllPairs, BroadPhase, CandidatePairSource, ExplicitPairs};
pub use constraint_allocator::{CollisionConstraintAllocator, ConstraintRef, DetectorRef};
pub use contact_manifold::{ContactConstraint, FrictionAnchor, ManifoldPoint};
pub use mid_phase::{MidPhaseState, ParticlePairMidPhase};
pub use narrow_phase::{CollisionStats, CollisionStatsSnapshot, NarrowPhase, SubShapePair};
pub use narrow_phase_callbacks::{ContactModifier, VisitorResult};
