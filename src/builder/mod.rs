//! Builder API for machine definitions.
//!
//! This module provides fluent builders and the `state_enum!` macro for
//! declaring machines with minimal boilerplate. Definitions are checked when
//! built, so a machine that starts is known to be well formed.

pub mod error;
pub mod machine;
pub mod macros;
pub mod transition;

pub use error::{BuildError, DefinitionViolation};
pub use machine::MachineBuilder;
pub use transition::TransitionBuilder;

use crate::core::State;

/// Start a rule that moves from `from` to `to` on `event` with no effect.
///
/// # Example
///
/// ```
/// use tomekit::builder::simple_transition;
/// use tomekit::state_enum;
///
/// state_enum! {
///     enum Health {
///         Idle,
///         Monitoring,
///     }
/// }
///
/// let rule = simple_transition::<Health, ()>(Health::Idle, "START_MONITORING", Health::Monitoring)
///     .build()
///     .unwrap();
/// assert!(rule.accepts(&Health::Idle, "START_MONITORING"));
/// ```
pub fn simple_transition<S, C>(from: S, event: &str, to: S) -> TransitionBuilder<S, C>
where
    S: State,
    C: Send + Sync + 'static,
{
    TransitionBuilder::new().from(from).on(event).to(to)
}

/// Start a rule that only fires while `guard` holds for the current state.
///
/// # Example
///
/// ```
/// use tomekit::builder::guarded_transition;
/// use tomekit::core::State;
/// use tomekit::state_enum;
///
/// state_enum! {
///     enum Preview {
///         Ready,
///         Rendering,
///         Error,
///     }
///     error: [Error]
/// }
///
/// let rule = guarded_transition::<Preview, (), _>(
///     Preview::Error,
///     "RETRY",
///     Preview::Rendering,
///     |s| s.is_error(),
/// )
/// .build()
/// .unwrap();
/// assert!(rule.accepts(&Preview::Error, "RETRY"));
/// ```
pub fn guarded_transition<S, C, F>(from: S, event: &str, to: S, guard: F) -> TransitionBuilder<S, C>
where
    S: State,
    C: Send + Sync + 'static,
    F: Fn(&S) -> bool + Send + Sync + 'static,
{
    simple_transition(from, event, to).when(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_enum;

    state_enum! {
        enum Editor {
            Idle,
            Editing,
            Closed,
        }
        final: [Closed]
    }

    #[test]
    fn simple_transition_builds() {
        let rule = simple_transition::<Editor, ()>(Editor::Idle, "EDIT", Editor::Editing)
            .build()
            .unwrap();

        assert_eq!(rule.from(), &Editor::Idle);
        assert_eq!(rule.to(), &Editor::Editing);
        assert!(!rule.is_guarded());
        assert!(rule.accepts(&Editor::Idle, "EDIT"));
    }

    #[test]
    fn guarded_transition_respects_guard() {
        let rule = guarded_transition::<Editor, (), _>(Editor::Closed, "EDIT", Editor::Editing, |s| {
            !s.is_final()
        })
        .build()
        .unwrap();

        assert!(!rule.accepts(&Editor::Closed, "EDIT"));
    }
}
