//! Declaring the children of a tome.

use super::base::TomeBase;
use super::error::{DeclarationViolation, TomeError};
use crate::machine::Event;
use crate::router::{MachineRouter, RoutedMachine};
use std::collections::HashSet;
use std::sync::Arc;
use stillwater::{NonEmptyVec, Validation};

pub(crate) type MachineFactory = Arc<dyn Fn(&MachineRouter) -> Arc<dyn RoutedMachine> + Send + Sync>;

/// A declared child: its name and how to construct it.
#[derive(Clone)]
pub(crate) struct ChildDeclaration {
    pub(crate) name: String,
    pub(crate) factory: MachineFactory,
}

type Check = Validation<(), NonEmptyVec<DeclarationViolation>>;

fn check(ok: bool, violation: impl FnOnce() -> DeclarationViolation) -> Check {
    if ok {
        Validation::success(())
    } else {
        Validation::fail(violation())
    }
}

/// Builder for a [`TomeBase`].
///
/// Children are constructed lazily, by [`TomeBase::initialize`], in the order
/// they were declared.
///
/// ```rust
/// use std::sync::Arc;
/// use tomekit::builder::{MachineBuilder, TransitionBuilder};
/// use tomekit::machine::Machine;
/// use tomekit::state_enum;
/// use tomekit::tome::TomeBuilder;
///
/// state_enum! {
///     enum Health { Idle, Monitoring }
/// }
///
/// let tome = TomeBuilder::new("EditorTome")
///     .child("HealthMachine", |router| {
///         let definition = MachineBuilder::new("HealthMachine")
///             .initial(Health::Idle)
///             .context(0u32)
///             .transition(
///                 TransitionBuilder::new()
///                     .from(Health::Idle)
///                     .on("START_MONITORING")
///                     .to(Health::Monitoring),
///             )
///             .and_then(|b| b.build())
///             .expect("valid definition");
///         Arc::new(Machine::new(definition, router.clone()))
///     })
///     .build()
///     .unwrap();
///
/// assert_eq!(tome.child_names(), vec!["HealthMachine"]);
/// assert!(!tome.is_initialized());
/// ```
pub struct TomeBuilder {
    name: String,
    router: Option<MachineRouter>,
    children: Vec<ChildDeclaration>,
    startup: Vec<(String, Event)>,
}

impl TomeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            router: None,
            children: Vec::new(),
            startup: Vec::new(),
        }
    }

    /// Share an existing router instead of creating one.
    pub fn router(mut self, router: MachineRouter) -> Self {
        self.router = Some(router);
        self
    }

    /// Declare a child machine. `factory` receives the tome's router.
    pub fn child<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&MachineRouter) -> Arc<dyn RoutedMachine> + Send + Sync + 'static,
    {
        self.children.push(ChildDeclaration {
            name: name.into(),
            factory: Arc::new(factory),
        });
        self
    }

    /// Send `event` to `machine` once every child has started.
    pub fn startup_event(mut self, machine: impl Into<String>, event: Event) -> Self {
        self.startup.push((machine.into(), event));
        self
    }

    /// Validate the declaration, reporting every violation at once.
    pub fn build(self) -> Result<TomeBase, TomeError> {
        validate(&self.name, &self.children)
            .into_result()
            .map_err(|violations| TomeError::InvalidDeclaration(violations.into_vec()))?;

        let startup_targets: Vec<&str> = self.startup.iter().map(|(name, _)| name.as_str()).collect();
        if let Some(missing) = startup_targets
            .iter()
            .find(|target| !self.children.iter().any(|child| child.name == **target))
        {
            return Err(TomeError::MachineNotFound {
                machine: missing.to_string(),
            });
        }

        Ok(TomeBase::new(
            self.name,
            self.router.unwrap_or_default(),
            self.children,
            self.startup,
        ))
    }
}

fn validate(tome: &str, children: &[ChildDeclaration]) -> Check {
    let mut checks = vec![check(!tome.is_empty(), || DeclarationViolation::EmptyTomeName)];
    let mut seen = HashSet::new();

    for child in children {
        let name = child.name.as_str();
        checks.push(check(!name.is_empty(), || DeclarationViolation::EmptyChildName));
        checks.push(check(!name.contains('/'), || {
            DeclarationViolation::ContainsSeparator(name.to_string())
        }));
        checks.push(check(name != "." && name != "..", || {
            DeclarationViolation::ReservedName(name.to_string())
        }));
        checks.push(check(name != tome, || DeclarationViolation::ShadowsTome(name.to_string())));
        checks.push(check(seen.insert(name), || {
            DeclarationViolation::DuplicateChild(name.to_string())
        }));
    }

    Validation::all_vec(checks).map(|_| ())
}
