//! The `State` trait implemented by every machine's closed state enum.
//!
//! States are plain values. A machine never stores arbitrary strings as its
//! state; it stores a variant of its own enum and exposes the variant's name
//! wherever a string is needed (logs, snapshots, tome accessors).

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for machine states.
///
/// # Required Traits
///
/// - `Clone`: recorded in transition history and view models
/// - `PartialEq`: used to match transition rules
/// - `Debug`: diagnostics
/// - `Serialize` + `Deserialize`: view models and snapshots cross serialization boundaries
/// - `Send` + `Sync` + `'static`: states move into worker tasks
///
/// # Example
///
/// ```rust
/// use tomekit::core::State;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// enum PreviewState {
///     Idle,
///     Rendering,
///     Ready,
///     Error,
/// }
///
/// impl State for PreviewState {
///     fn name(&self) -> &str {
///         match self {
///             Self::Idle => "idle",
///             Self::Rendering => "rendering",
///             Self::Ready => "ready",
///             Self::Error => "error",
///         }
///     }
///
///     fn is_error(&self) -> bool {
///         matches!(self, Self::Error)
///     }
/// }
///
/// assert_eq!(PreviewState::Ready.name(), "ready");
/// ```
pub trait State:
    Clone + PartialEq + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static
{
    /// Name used in logs, snapshots and string-typed accessors.
    fn name(&self) -> &str;

    /// Whether no further transitions are expected from this state.
    ///
    /// Defaults to `false`.
    fn is_final(&self) -> bool {
        false
    }

    /// Whether this state represents a failure surfaced to the consuming layer.
    ///
    /// Defaults to `false`.
    fn is_error(&self) -> bool {
        false
    }
}
