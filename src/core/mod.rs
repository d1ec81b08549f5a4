//! Core value types shared by every layer.
//!
//! - `State`: closed, serializable state enums
//! - `StateTransition` / `StateHistory`: immutable transition records
//! - `Guard`: pure predicates gating transition rules
//! - `Observers` / `Subscription`: callback registries with idempotent unsubscribe

mod guard;
mod history;
mod state;
mod subscription;

pub use guard::Guard;
pub use history::{StateHistory, StateTransition};
pub use state::State;
pub use subscription::{Observers, Subscription};
