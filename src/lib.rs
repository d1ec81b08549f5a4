//! Tomekit: orchestration and messaging for composable state machines
//!
//! Tomekit builds applications out of small named state machines grouped
//! into tomes. Each machine serializes its own state changes through a
//! transition queue; machines reach each other by name through a shared
//! router; and separate execution contexts talk over a messaging transport.
//!
//! # Core Concepts
//!
//! - **Transition queue**: ordered, one-at-a-time state changes with a view model and log
//! - **Machine**: an event-driven runtime mapping `(state, event)` to transitions
//! - **Router**: name-based registry resolving absolute and relative paths like `../Sibling`
//! - **Tome**: owns a set of child machines, with a strict `send`
//! - **Transport**: request/response messaging between contexts, in memory or otherwise
//!
//! # Example
//!
//! ```rust
//! use serde::Serialize;
//! use serde_json::json;
//! use std::sync::Arc;
//! use tomekit::builder::{MachineBuilder, TransitionBuilder};
//! use tomekit::machine::{Event, Machine};
//! use tomekit::state_enum;
//! use tomekit::tome::TomeBuilder;
//!
//! state_enum! {
//!     enum Editor {
//!         Idle,
//!         Editing,
//!     }
//! }
//!
//! #[derive(Clone, Default, Serialize)]
//! struct Draft {
//!     text: String,
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let tome = TomeBuilder::new("EditorTome")
//!     .child("EditorMachine", |router| {
//!         let definition = MachineBuilder::new("EditorMachine")
//!             .initial(Editor::Idle)
//!             .context(Draft::default())
//!             .transition(
//!                 TransitionBuilder::new()
//!                     .from(Editor::Idle)
//!                     .on("EDIT")
//!                     .to(Editor::Editing)
//!                     .update(|draft: &mut Draft, event: &Event| {
//!                         draft.text = event.payload["text"].as_str().unwrap_or_default().to_string();
//!                     }),
//!             )
//!             .and_then(|b| b.build())
//!             .expect("valid definition");
//!         Arc::new(Machine::new(definition, router.clone()))
//!     })
//!     .build()
//!     .unwrap();
//!
//! tome.initialize().unwrap();
//! tome.send("EditorMachine", "EDIT", json!({ "text": "hello" })).unwrap();
//! tome.settled().await;
//!
//! assert_eq!(tome.get_machine_state("EditorMachine").as_deref(), Some("Editing"));
//! assert_eq!(
//!     tome.get_machine_context("EditorMachine"),
//!     Some(json!({ "text": "hello" }))
//! );
//! # });
//! ```

pub mod builder;
pub mod config;
pub mod core;
pub mod machine;
pub mod queue;
pub mod router;
pub mod tome;
pub mod transport;

// Re-export commonly used types
pub use builder::{BuildError, MachineBuilder, TransitionBuilder};
pub use config::QueueConfig;
pub use core::{Guard, State, StateHistory, StateTransition, Subscription};
pub use machine::{Event, Machine, MachineSnapshot, RouteContext};
pub use queue::{TransitionError, TransitionHandler, TransitionQueue, ViewModel};
pub use router::{Addressable, MachineRouter, RoutedMachine};
pub use tome::{TomeBase, TomeBuilder, TomeError};
pub use transport::{wire_in_memory_transport_pair, InMemoryTransport, MessagingTransport};
