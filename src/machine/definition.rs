//! Validated machine definitions, as produced by
//! [`MachineBuilder`](crate::builder::MachineBuilder).

use super::event::Event;
use super::route::RouteContext;
use crate::config::QueueConfig;
use crate::core::{Guard, State};
use crate::queue::TransitionError;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Data carried alongside a machine's state.
///
/// Serialized into every [`MachineSnapshot`](super::MachineSnapshot).
pub trait MachineContext: Clone + Serialize + Send + Sync + 'static {}

impl<T> MachineContext for T where T: Clone + Serialize + Send + Sync + 'static {}

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

pub(crate) type ActionFn<C> =
    Arc<dyn Fn(C, Event, RouteContext) -> BoxFuture<Result<C, TransitionError>> + Send + Sync>;
pub(crate) type UpdateFn<C> = Arc<dyn Fn(&mut C, &Event) + Send + Sync>;
pub(crate) type ErrorRecorder<C> = Arc<dyn Fn(&mut C, &str) + Send + Sync>;

/// What a rule does to the context while its transition is processing.
pub(crate) enum Effect<C> {
    None,
    /// Synchronous edit; cannot fail
    Update(UpdateFn<C>),
    /// Asynchronous work producing the next context; may fail
    Action(ActionFn<C>),
}

impl<C> Clone for Effect<C> {
    fn clone(&self) -> Self {
        match self {
            Self::None => Self::None,
            Self::Update(f) => Self::Update(Arc::clone(f)),
            Self::Action(f) => Self::Action(Arc::clone(f)),
        }
    }
}

/// One `(from, event) -> to` rule.
pub struct Rule<S: State, C> {
    pub(crate) from: S,
    pub(crate) event: String,
    pub(crate) to: S,
    pub(crate) guard: Option<Guard<S>>,
    pub(crate) effect: Effect<C>,
    pub(crate) then: Option<S>,
}

impl<S: State, C> Rule<S, C> {
    pub fn from(&self) -> &S {
        &self.from
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn to(&self) -> &S {
        &self.to
    }

    /// State entered automatically once this rule's transition completes.
    pub fn then(&self) -> Option<&S> {
        self.then.as_ref()
    }

    pub fn is_guarded(&self) -> bool {
        self.guard.is_some()
    }

    /// Whether this rule fires for `event` while the machine is in `state`.
    pub fn accepts(&self, state: &S, event: &str) -> bool {
        self.from == *state
            && self.event == event
            && self.guard.as_ref().map_or(true, |guard| guard.check(state))
    }
}

impl<S: State, C> fmt::Debug for Rule<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("from", &self.from)
            .field("event", &self.event)
            .field("to", &self.to)
            .field("guarded", &self.guard.is_some())
            .field("then", &self.then)
            .finish()
    }
}

/// State entered when an action fails, and how the failure lands in the context.
pub(crate) struct ErrorRoute<S, C> {
    pub(crate) state: S,
    pub(crate) record: ErrorRecorder<C>,
}

/// Everything needed to run a machine.
pub struct MachineDefinition<S: State, C: MachineContext> {
    pub(crate) name: String,
    pub(crate) initial: S,
    pub(crate) context: C,
    pub(crate) rules: Vec<Rule<S, C>>,
    pub(crate) error_route: Option<ErrorRoute<S, C>>,
    pub(crate) config: QueueConfig,
}

impl<S: State, C: MachineContext> MachineDefinition<S, C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial(&self) -> &S {
        &self.initial
    }

    pub fn rules(&self) -> &[Rule<S, C>] {
        &self.rules
    }

    pub fn error_state(&self) -> Option<&S> {
        self.error_route.as_ref().map(|route| &route.state)
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }
}

impl<S: State, C: MachineContext> fmt::Debug for MachineDefinition<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineDefinition")
            .field("name", &self.name)
            .field("initial", &self.initial)
            .field("rules", &self.rules)
            .field("error_state", &self.error_state())
            .field("config", &self.config)
            .finish()
    }
}
