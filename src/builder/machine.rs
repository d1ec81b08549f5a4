//! Builder for machine definitions.

use crate::builder::error::{BuildError, DefinitionViolation};
use crate::builder::transition::TransitionBuilder;
use crate::config::QueueConfig;
use crate::core::State;
use crate::machine::{ErrorRoute, MachineContext, MachineDefinition, Rule};
use std::sync::Arc;
use stillwater::{NonEmptyVec, Validation};

type Check = Validation<(), NonEmptyVec<DefinitionViolation>>;

fn check(ok: bool, violation: impl FnOnce() -> DefinitionViolation) -> Check {
    if ok {
        Validation::success(())
    } else {
        Validation::fail(violation())
    }
}

/// Builder for machine definitions with a fluent API.
///
/// Missing pieces are reported one at a time, in the order they are
/// checked. Problems with the rules themselves are accumulated and
/// reported together as [`BuildError::Invalid`].
pub struct MachineBuilder<S: State, C: MachineContext> {
    name: String,
    initial: Option<S>,
    context: Option<C>,
    rules: Vec<Rule<S, C>>,
    error_route: Option<ErrorRoute<S, C>>,
    config: QueueConfig,
}

impl<S: State, C: MachineContext> MachineBuilder<S, C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initial: None,
            context: None,
            rules: Vec::new(),
            error_route: None,
            config: QueueConfig::default(),
        }
    }

    /// Set the initial state (required).
    pub fn initial(mut self, state: S) -> Self {
        self.initial = Some(state);
        self
    }

    /// Set the initial context (required).
    pub fn context(mut self, context: C) -> Self {
        self.context = Some(context);
        self
    }

    /// Add a rule using a builder.
    /// Returns an error if the builder fails validation.
    pub fn transition(mut self, builder: TransitionBuilder<S, C>) -> Result<Self, BuildError> {
        let rule = builder.build()?;
        self.rules.push(rule);
        Ok(self)
    }

    /// Add a pre-built rule.
    pub fn add_rule(mut self, rule: Rule<S, C>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Add several rules at once.
    pub fn transitions(
        mut self,
        builders: impl IntoIterator<Item = TransitionBuilder<S, C>>,
    ) -> Result<Self, BuildError> {
        for builder in builders {
            self.rules.push(builder.build()?);
        }
        Ok(self)
    }

    /// Enter `state` whenever an action fails, recording the error text with `record`.
    pub fn error_state<F>(mut self, state: S, record: F) -> Self
    where
        F: Fn(&mut C, &str) + Send + Sync + 'static,
    {
        self.error_route = Some(ErrorRoute {
            state,
            record: Arc::new(record),
        });
        self
    }

    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the definition.
    /// Returns an error if required fields are missing or the rules are inconsistent.
    pub fn build(self) -> Result<MachineDefinition<S, C>, BuildError> {
        let initial = self.initial.ok_or(BuildError::MissingInitialState)?;
        let context = self.context.ok_or(BuildError::MissingContext)?;

        if self.rules.is_empty() {
            return Err(BuildError::NoTransitions);
        }

        validate(&self.name, &self.rules)
            .into_result()
            .map_err(|violations| BuildError::Invalid(violations.into_vec()))?;

        Ok(MachineDefinition {
            name: self.name,
            initial,
            context,
            rules: self.rules,
            error_route: self.error_route,
            config: self.config,
        })
    }
}

fn validate<S: State, C>(name: &str, rules: &[Rule<S, C>]) -> Check {
    let mut checks = vec![
        check(!name.is_empty(), || DefinitionViolation::EmptyMachineName),
        check(!name.contains('/'), || {
            DefinitionViolation::NameContainsSeparator(name.to_string())
        }),
    ];

    for (index, rule) in rules.iter().enumerate() {
        checks.push(check(!rule.event.is_empty(), || {
            DefinitionViolation::EmptyEventName {
                from: rule.from.name().to_string(),
            }
        }));

        let shadowed = rules[..index]
            .iter()
            .any(|earlier| !earlier.is_guarded() && earlier.from == rule.from && earlier.event == rule.event);
        checks.push(check(!shadowed, || DefinitionViolation::UnreachableRule {
            from: rule.from.name().to_string(),
            event: rule.event.clone(),
        }));
    }

    Validation::all_vec(checks).map(|_| ())
}
