//! Builder for transition rules.

use crate::builder::error::BuildError;
use crate::core::{Guard, State};
use crate::machine::{BoxFuture, Effect, Event, RouteContext, Rule};
use crate::queue::TransitionError;
use std::future::Future;
use std::sync::Arc;

/// Builder for one `(from, event) -> to` rule with a fluent API.
///
/// A rule may carry at most one effect: the last of `.action(..)` or
/// `.update(..)` wins.
pub struct TransitionBuilder<S: State, C> {
    from: Option<S>,
    event: Option<String>,
    to: Option<S>,
    guard: Option<Guard<S>>,
    effect: Effect<C>,
    then: Option<S>,
}

impl<S: State, C: Send + Sync + 'static> TransitionBuilder<S, C> {
    pub fn new() -> Self {
        Self {
            from: None,
            event: None,
            to: None,
            guard: None,
            effect: Effect::None,
            then: None,
        }
    }

    /// Set the source state (required).
    pub fn from(mut self, state: S) -> Self {
        self.from = Some(state);
        self
    }

    /// Set the triggering event type (required).
    pub fn on(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Set the target state (required).
    pub fn to(mut self, state: S) -> Self {
        self.to = Some(state);
        self
    }

    /// Add a guard predicate (optional).
    pub fn guard(mut self, guard: Guard<S>) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Add a guard using a closure (optional).
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&S) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Guard::new(predicate));
        self
    }

    /// Run asynchronous work while the transition is processing.
    ///
    /// The action receives a copy of the context and returns the next one.
    /// An `Err` fails the transition and leaves both state and context as
    /// they were.
    pub fn action<F, Fut>(mut self, action: F) -> Self
    where
        F: Fn(C, Event, RouteContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<C, TransitionError>> + Send + 'static,
    {
        self.effect = Effect::Action(Arc::new(
            move |context: C, event: Event, route: RouteContext| -> BoxFuture<Result<C, TransitionError>> {
                Box::pin(action(context, event, route))
            },
        ));
        self
    }

    /// Edit the context synchronously while the transition is processing.
    pub fn update<F>(mut self, update: F) -> Self
    where
        F: Fn(&mut C, &Event) + Send + Sync + 'static,
    {
        self.effect = Effect::Update(Arc::new(update));
        self
    }

    /// Move on to `state` automatically once this transition completes.
    pub fn then(mut self, state: S) -> Self {
        self.then = Some(state);
        self
    }

    /// Build the rule.
    pub fn build(self) -> Result<Rule<S, C>, BuildError> {
        let from = self.from.ok_or(BuildError::MissingFromState)?;
        let event = self.event.ok_or(BuildError::MissingEvent)?;
        let to = self.to.ok_or(BuildError::MissingToState)?;

        Ok(Rule {
            from,
            event,
            to,
            guard: self.guard,
            effect: self.effect,
            then: self.then,
        })
    }
}

impl<S: State, C: Send + Sync + 'static> Default for TransitionBuilder<S, C> {
    fn default() -> Self {
        Self::new()
    }
}
