//! Build errors for machine and transition builders.

use thiserror::Error;

/// Errors that can occur when building machines and transition rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("Initial state not specified. Call .initial(state) before .build()")]
    MissingInitialState,

    #[error("Context not specified. Call .context(value) before .build()")]
    MissingContext,

    #[error("No transitions defined. Add at least one transition")]
    NoTransitions,

    #[error("Transition source state not specified. Call .from(state)")]
    MissingFromState,

    #[error("Transition target state not specified. Call .to(state)")]
    MissingToState,

    #[error("Transition event not specified. Call .on(event)")]
    MissingEvent,

    #[error("Invalid machine definition: {}", list(.0))]
    Invalid(Vec<DefinitionViolation>),
}

impl BuildError {
    /// The accumulated violations, if this is an `Invalid` error.
    pub fn violations(&self) -> &[DefinitionViolation] {
        match self {
            Self::Invalid(violations) => violations,
            _ => &[],
        }
    }
}

/// A problem found while checking a complete machine definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionViolation {
    #[error("machine name is empty")]
    EmptyMachineName,

    #[error("machine name '{0}' contains '/'")]
    NameContainsSeparator(String),

    #[error("transition from '{from}' has an empty event name")]
    EmptyEventName { from: String },

    #[error("transition from '{from}' on '{event}' can never fire: an earlier unguarded rule matches first")]
    UnreachableRule { from: String, event: String },
}

fn list(violations: &[DefinitionViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
