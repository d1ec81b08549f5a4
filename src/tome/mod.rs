//! Tomes: named groups of machines that share a router.

mod base;
mod builder;
mod error;

pub use base::{SendReceipt, TomeBase, TomeDebugInfo};
pub use builder::TomeBuilder;
pub use error::{DeclarationViolation, TomeError};
