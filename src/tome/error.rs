use crate::machine::DeliveryError;
use thiserror::Error;

/// Errors surfaced by a tome's strict API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TomeError {
    #[error("Machine {machine} not found")]
    MachineNotFound { machine: String },

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("Tome {tome} cannot start its machines outside a tokio runtime")]
    NoRuntime { tome: String },

    #[error("Invalid tome declaration: {}", list(.0))]
    InvalidDeclaration(Vec<DeclarationViolation>),
}

/// A problem with the set of children a tome declares.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationViolation {
    #[error("tome name is empty")]
    EmptyTomeName,

    #[error("child name is empty")]
    EmptyChildName,

    #[error("child name '{0}' contains '/'")]
    ContainsSeparator(String),

    #[error("child name '{0}' is reserved for relative paths")]
    ReservedName(String),

    #[error("child '{0}' is declared more than once")]
    DuplicateChild(String),

    #[error("child '{0}' has the same name as its tome")]
    ShadowsTome(String),
}

fn list(violations: &[DeclarationViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
