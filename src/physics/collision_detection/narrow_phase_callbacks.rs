use crate::physics::collision_detection::contact_manifold::ContactConstraint;

/// Whether a visitor wants to see more constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitorResult {
    Continue,
    Stop,
}

/// Hook invoked once per active contact constraint after detection and before solving.
///
/// Modifications (disabling, normal override, friction and restitution) only last for the current
/// sub-step; they are reset before the modifiers run again.
pub trait ContactModifier: Send {
    fn modify_contact(&mut self, constraint: &mut ContactConstraint);

    /// Name used in logs.
    fn name(&self) -> &str {
        "contact modifier"
    }
}

impl<F> ContactModifier for F
where
    F: FnMut(&mut ContactConstraint) + Send,
{
    fn modify_contact(&mut self, constraint: &mut ContactConstraint) {
        self(constraint)
    }
}
