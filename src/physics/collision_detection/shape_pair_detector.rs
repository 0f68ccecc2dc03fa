use crate::physics::bodies::Body;
use crate::physics::body_properties::{PhysicsMaterial, RigidPose};
use crate::physics::collidables::collidable::Collidable;
use crate::physics::collision_detection::contact_manifold::ContactConstraint;
use crate::physics::collision_detection::mid_phase::DetectionContext;
use crate::physics::collision_detection::sweep_tasks::SweepSettings;
use crate::utilities::math_helper::rotation_angle_between;

/// Checks the oriented bounds of each shape against the other's, in each shape's own frame.
pub(crate) fn oriented_bounds_overlap(
    a: &Collidable,
    body_pose_a: &RigidPose,
    b: &Collidable,
    body_pose_b: &RigidPose,
    margin: f32,
) -> bool {
    let pose_a = a.world_pose(body_pose_a);
    let pose_b = b.world_pose(body_pose_b);
    let b_in_a = RigidPose::multiply(&pose_b, &pose_a.invert());
    let b_bounds_in_a = b.shape_bounds().transformed(b_in_a.position, b_in_a.orientation);
    if !a.shape_bounds().expanded(margin).intersects(&b_bounds_in_a) {
        return false;
    }
    let a_in_b = RigidPose::multiply(&pose_a, &pose_b.invert());
    let a_bounds_in_b = a.shape_bounds().transformed(a_in_b.position, a_in_b.orientation);
    b.shape_bounds().expanded(margin).intersects(&a_bounds_in_b)
}

/// Detector for a pair of convex shapes. Owns at most one constraint, allocated on first contact.
#[derive(Debug, Clone)]
pub struct SingleShapePairDetector {
    shape_a: usize,
    shape_b: usize,
    constraint: Option<Box<ContactConstraint>>,
}

impl SingleShapePairDetector {
    pub fn new(shape_a: usize, shape_b: usize) -> Self {
        Self {
            shape_a,
            shape_b,
            constraint: None,
        }
    }

    #[inline(always)]
    pub fn shape_indices(&self) -> (usize, usize) {
        (self.shape_a, self.shape_b)
    }

    #[inline(always)]
    pub fn constraint(&self) -> Option<&ContactConstraint> {
        self.constraint.as_deref()
    }

    #[inline(always)]
    pub fn constraint_mut(&mut self) -> Option<&mut ContactConstraint> {
        self.constraint.as_deref_mut()
    }

    fn used_last_pass(&self, epoch: u64) -> bool {
        self.constraint
            .as_ref()
            .is_some_and(|c| c.last_used_epoch() + 1 == epoch)
    }

    fn can_update_manifold(constraint: &ContactConstraint, pose_a: &RigidPose, pose_b: &RigidPose, ctx: &DetectionContext, extent: f32) -> bool {
        let Some(generated) = constraint.generated_relative_pose else {
            return false;
        };
        let current = RigidPose::multiply(pose_b, &pose_a.invert());
        (current.position - generated.position).length() <= ctx.config.manifold_update_distance_fraction * extent
            && rotation_angle_between(current.orientation, generated.orientation) <= ctx.config.manifold_update_rotation
    }

    /// Runs the full detection sequence for the pair. Returns true when the constraint becomes active this pass.
    pub(crate) fn generate_collision(
        &mut self,
        body_a: &Body,
        body_b: &Body,
        ctx: &DetectionContext,
        use_ccd: bool,
        extent: f32,
    ) -> bool {
        let (Some(collidable_a), Some(collidable_b)) = (
            body_a.collidables().get(self.shape_a),
            body_b.collidables().get(self.shape_b),
        ) else {
            return false;
        };
        let cull_distance = ctx.config.cull_distance;
        let pose_a = body_a.predicted_pose;
        let pose_b = body_b.predicted_pose;
        let used_last_pass = self.used_last_pass(ctx.epoch);

        if !use_ccd {
            if !collidable_a
                .world_bounds()
                .expanded(cull_distance)
                .intersects(&collidable_b.world_bounds())
            {
                return false;
            }
            if !used_last_pass && !oriented_bounds_overlap(collidable_a, &pose_a, collidable_b, &pose_b, cull_distance) {
                return false;
            }
        }

        let constraint = self.constraint.get_or_insert_with(|| {
            Box::new(ContactConstraint::new(
                body_a.handle(),
                body_b.handle(),
                self.shape_a,
                self.shape_b,
                PhysicsMaterial::combine(&body_a.material, &body_b.material),
                cull_distance,
                ctx.epoch,
            ))
        });
        constraint.clear_swept();
        let max_points = ctx.config.max_manifold_points;
        let mut contacts = Vec::new();

        let mut swept = false;
        if use_ccd {
            let start_a = RigidPose::new(body_a.tick_start_position, pose_a.orientation);
            let start_b = RigidPose::new(body_b.tick_start_position, pose_b.orientation);
            let displacement_a = pose_a.position - start_a.position;
            let displacement_b = pose_b.position - start_b.position;
            let settings = SweepSettings {
                tolerance: ctx.ccd.toi_tolerance,
                max_iterations: ctx.ccd.max_toi_iterations,
            };
            if let Some(hit) = ctx.narrow_phase.sweep(
                collidable_a,
                &start_a,
                displacement_a,
                collidable_b,
                &start_b,
                displacement_b,
                &settings,
            ) {
                if hit.time_of_impact < 1.0 {
                    let impact_a = start_a.translated(displacement_a * hit.time_of_impact);
                    let impact_b = start_b.translated(displacement_b * hit.time_of_impact);
                    let margin = cull_distance.max(2.0 * ctx.ccd.toi_tolerance);
                    ctx.narrow_phase.generate_convex_contacts(
                        collidable_a,
                        &impact_a,
                        collidable_b,
                        &impact_b,
                        margin,
                        max_points,
                        &mut contacts,
                    );
                    if !contacts.is_empty() {
                        constraint.set_manifold(&contacts, &impact_a, &impact_b, false);
                        constraint.set_swept(hit.time_of_impact);
                        swept = true;
                    }
                }
            }
        }

        if !swept {
            if !use_ccd && used_last_pass && Self::can_update_manifold(constraint, &pose_a, &pose_b, ctx, extent) {
                constraint.refresh_from_anchors(&pose_a, &pose_b);
                ctx.narrow_phase.stats().count_manifold_update();
            } else {
                contacts.clear();
                ctx.narrow_phase.generate_convex_contacts(
                    collidable_a,
                    &pose_a,
                    collidable_b,
                    &pose_b,
                    cull_distance,
                    max_points,
                    &mut contacts,
                );
                constraint.set_manifold(&contacts, &pose_a, &pose_b, used_last_pass && !use_ccd);
            }
        }

        if !constraint.points.is_empty() && (swept || constraint.min_phi() <= cull_distance) {
            constraint.bookkeeping.last_used_epoch = ctx.epoch;
            true
        } else {
            false
        }
    }

    /// Reuses the constraint of the previous pass after re-validating it at the current poses.
    ///
    /// Returns true only when the constraint is newly added to this pass's active set, so repeated calls
    /// within one pass do not add it twice.
    pub(crate) fn restore_collision(&mut self, body_a: &Body, body_b: &Body, ctx: &DetectionContext) -> bool {
        let Some(constraint) = self.constraint.as_deref_mut() else {
            return false;
        };
        let last_used = constraint.last_used_epoch();
        if last_used + 1 != ctx.epoch && last_used != ctx.epoch {
            return false;
        }
        constraint.clear_swept();
        constraint.refresh_from_anchors(&body_a.predicted_pose, &body_b.predicted_pose);
        if constraint.points.is_empty() || constraint.min_phi() > ctx.config.cull_distance {
            return false;
        }
        let newly_active = last_used != ctx.epoch;
        constraint.bookkeeping.last_used_epoch = ctx.epoch;
        newly_active
    }

    /// Re-stamps a constraint that was active when its pair went to sleep.
    pub(crate) fn wake(&mut self, sleep_epoch: u64, epoch: u64) -> bool {
        match self.constraint.as_deref_mut() {
            Some(constraint) if constraint.last_used_epoch() == sleep_epoch => {
                constraint.bookkeeping.last_used_epoch = epoch;
                true
            }
            _ => false,
        }
    }
}
