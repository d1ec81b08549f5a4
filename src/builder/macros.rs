//! Macros for declaring machine states.

/// Declare a state enum and its [`State`](crate::core::State) implementation.
///
/// Each variant's name is its state name. The enum derives `Clone`,
/// `PartialEq`, `Debug` and serde's `Serialize`/`Deserialize`, so the calling
/// crate needs `serde` with the `derive` feature.
///
/// # Example
///
/// ```
/// use tomekit::core::State;
/// use tomekit::state_enum;
///
/// state_enum! {
///     pub enum EditorState {
///         Idle,
///         Editing,
///         Saving,
///         Closed,
///         Error,
///     }
///     final: [Closed]
///     error: [Error]
/// }
///
/// assert_eq!(EditorState::Saving.name(), "Saving");
/// assert!(EditorState::Error.is_error());
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }

        $(final: [$($final:ident),* $(,)?])?
        $(error: [$($error:ident),* $(,)?])?
    ) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::core::State for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }

            fn is_final(&self) -> bool {
                match self {
                    $($(Self::$final => true,)*)?
                    _ => false,
                }
            }

            fn is_error(&self) -> bool {
                match self {
                    $($(Self::$error => true,)*)?
                    _ => false,
                }
            }
        }
    };
}
