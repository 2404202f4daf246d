//! State machine trait for phase enums.
//!
//! Gives phase enums a single place to declare which transitions are legal,
//! so the code driving them can check a move before publishing it.

use super::ValidationError;

/// Trait for payload-free phase enums that represent state machines.
///
/// # Example
///
/// ```ignore
/// impl StateMachine for IdentityPhase {
///     fn can_transition_to(&self, target: &Self) -> bool {
///         matches!((self, target), (Loading, Unauthenticated) | ...)
///     }
///
///     fn valid_transitions(&self) -> Vec<Self> { ... }
/// }
///
/// let next = current.transition_to(IdentityPhase::Authenticated)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}
