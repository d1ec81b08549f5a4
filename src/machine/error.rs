use thiserror::Error;

/// Failure to hand an event to a machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("Machine {machine} is stopped")]
    Stopped { machine: String },

    /// The registration is a tome, which groups machines but handles no events itself.
    #[error("{machine} is a tome and does not accept events")]
    NotAMachine { machine: String },
}
