//! The composite that owns a tome's child machines.

use super::builder::ChildDeclaration;
use super::error::TomeError;
use crate::core::{Observers, Subscription};
use crate::machine::{DeliveryError, Event, MachineSnapshot};
use crate::router::{Addressable, MachineRouter, RoutedMachine, SnapshotCallback};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

const INITIAL_VIEW_KEY: &str = "initial";
const READY_VIEW_KEY: &str = "initialized";

/// Acknowledges that an event reached a child's mailbox.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub machine: String,
    pub event: String,
}

/// Diagnostic view of a tome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TomeDebugInfo {
    pub name: String,
    pub initialized: bool,
    pub current_view_key: String,
    pub observer_count: usize,
    /// Declared children, in declaration order
    pub children: Vec<String>,
    /// Registered child tomes, in registration order
    pub child_tomes: Vec<String>,
    /// Every name currently registered on the tome's router
    pub registered: Vec<String>,
    pub machines: Vec<MachineSnapshot>,
}

/// Owns a fixed set of named child machines and the router they share.
///
/// Children are created by [`initialize`](Self::initialize) and torn down
/// by [`cleanup`](Self::cleanup). Each child is registered on the router
/// under its declared name with the tome as its parent, so siblings reach
/// each other as `../Name`.
///
/// Lookups by name ([`send`](Self::send), [`machine`](Self::machine) and
/// the state accessors) go through the router, so they follow whatever is
/// registered under that name right now. `send` is strict: an unknown name
/// is an error. Sends made by machines to each other are best-effort.
///
/// Tomes nest. A tome registered with [`register_child`](Self::register_child)
/// becomes a node on the router, so `../../Name` climbs out of it.
pub struct TomeBase {
    name: String,
    router: MachineRouter,
    declarations: Vec<ChildDeclaration>,
    startup: Vec<(String, Event)>,
    parent: RwLock<Option<String>>,
    initialized: Mutex<bool>,
    machines: RwLock<Vec<(String, Arc<dyn RoutedMachine>)>>,
    child_tomes: RwLock<Vec<Arc<TomeBase>>>,
    view_key: RwLock<String>,
    view_observers: Observers<String>,
    snapshot_observers: Observers<MachineSnapshot>,
}

impl TomeBase {
    pub(crate) fn new(
        name: String,
        router: MachineRouter,
        declarations: Vec<ChildDeclaration>,
        startup: Vec<(String, Event)>,
    ) -> Self {
        Self {
            name,
            router,
            declarations,
            startup,
            parent: RwLock::new(None),
            initialized: Mutex::new(false),
            machines: RwLock::new(Vec::new()),
            child_tomes: RwLock::new(Vec::new()),
            view_key: RwLock::new(INITIAL_VIEW_KEY.to_string()),
            view_observers: Observers::new(),
            snapshot_observers: Observers::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn router(&self) -> &MachineRouter {
        &self.router
    }

    pub fn child_names(&self) -> Vec<&str> {
        self.declarations.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn is_initialized(&self) -> bool {
        *self.initialized.lock()
    }

    /// Construct, register and start every declared child.
    ///
    /// Fails with [`TomeError::NoRuntime`] outside a tokio runtime, leaving
    /// the tome uninitialized. Calling it again on an initialized tome logs a
    /// warning and does nothing.
    pub fn initialize(&self) -> Result<(), TomeError> {
        {
            let mut initialized = self.initialized.lock();
            if *initialized {
                warn!(tome = %self.name, "tome already initialized");
                return Ok(());
            }
            if tokio::runtime::Handle::try_current().is_err() {
                return Err(TomeError::NoRuntime {
                    tome: self.name.clone(),
                });
            }

            let mut machines = Vec::with_capacity(self.declarations.len());
            for declaration in &self.declarations {
                let machine = (declaration.factory)(&self.router);
                if machine.name() != declaration.name {
                    warn!(
                        tome = %self.name,
                        declared = %declaration.name,
                        machine = machine.name(),
                        "machine name differs from its declared name"
                    );
                }
                machine.set_parent(Some(self.name.clone()));
                self.router
                    .register(declaration.name.clone(), Arc::clone(&machine));
                machines.push((declaration.name.clone(), machine));
            }

            for (_, machine) in &machines {
                machine.start();
            }
            *self.machines.write() = machines;
            *initialized = true;
        }

        info!(tome = %self.name, children = self.declarations.len(), "tome initialized");

        for (machine, event) in &self.startup {
            self.send(machine, &event.event_type, event.payload.clone())?;
        }
        self.set_view_key(READY_VIEW_KEY);
        Ok(())
    }

    /// Deliver an event to whatever the router holds under `machine_name`.
    pub fn send(
        &self,
        machine_name: &str,
        event_type: &str,
        payload: Value,
    ) -> Result<SendReceipt, TomeError> {
        let machine = self
            .machine(machine_name)
            .ok_or_else(|| TomeError::MachineNotFound {
                machine: machine_name.to_string(),
            })?;

        machine.send(Event::with_payload(event_type, payload))?;
        debug!(tome = %self.name, machine = machine_name, event = event_type, "event sent");
        Ok(SendReceipt {
            machine: machine_name.to_string(),
            event: event_type.to_string(),
        })
    }

    /// The machine currently registered under `name`.
    pub fn machine(&self, name: &str) -> Option<Arc<dyn RoutedMachine>> {
        self.router.resolve(name)
    }

    pub fn get_machine_state(&self, name: &str) -> Option<String> {
        self.machine(name).map(|machine| machine.snapshot().state)
    }

    pub fn get_machine_context(&self, name: &str) -> Option<Value> {
        self.machine(name).map(|machine| machine.snapshot().context)
    }

    /// Observe a machine's snapshots.
    ///
    /// The callback runs immediately and after every settled transition.
    /// An unknown name yields an inert subscription.
    pub fn subscribe_machine<F>(&self, name: &str, callback: F) -> Subscription
    where
        F: Fn(&MachineSnapshot) + Send + Sync + 'static,
    {
        match self.machine(name) {
            Some(machine) => machine.subscribe(Box::new(callback)),
            None => {
                warn!(tome = %self.name, machine = name, "cannot subscribe: machine not found");
                Subscription::inert()
            }
        }
    }

    /// Nest `child` under this tome.
    ///
    /// The child is registered on this tome's router under its own name,
    /// with this tome as its parent. It should be built on a clone of the
    /// same router, or relative paths cannot cross between the two. The
    /// child is not initialized here.
    pub fn register_child(&self, child: Arc<TomeBase>) {
        if !self.router.shares_registry(child.router()) {
            warn!(tome = %self.name, child = %child.name, "child tome uses a separate router");
        }
        child.set_parent(Some(self.name.clone()));
        self.router
            .register(child.name.clone(), Arc::clone(&child) as Arc<dyn RoutedMachine>);

        let mut children = self.child_tomes.write();
        children.retain(|existing| existing.name != child.name);
        children.push(child);
        debug!(tome = %self.name, children = children.len(), "child tome registered");
    }

    /// Detach the child tome named `name`, leaving it running.
    pub fn unregister_child(&self, name: &str) -> Option<Arc<TomeBase>> {
        let child = {
            let mut children = self.child_tomes.write();
            let index = children.iter().position(|child| child.name == name)?;
            children.remove(index)
        };
        if self.owns_registration(name, &child) {
            self.router.unregister(name);
        }
        child.set_parent(None);
        debug!(tome = %self.name, child = name, "child tome unregistered");
        Some(child)
    }

    pub fn child_tomes(&self) -> Vec<Arc<TomeBase>> {
        self.child_tomes.read().clone()
    }

    /// Everything this tome waits on: its own machines, then child tomes.
    fn members(&self) -> Vec<Arc<dyn RoutedMachine>> {
        let mut members: Vec<Arc<dyn RoutedMachine>> = self
            .machines
            .read()
            .iter()
            .map(|(_, machine)| Arc::clone(machine))
            .collect();
        members.extend(
            self.child_tomes
                .read()
                .iter()
                .map(|child| Arc::clone(child) as Arc<dyn RoutedMachine>),
        );
        members
    }

    /// Resolve once every child, including nested tomes, is idle.
    ///
    /// Children may keep sending to each other, so this repeats until a full
    /// pass finds nothing left to do.
    pub async fn settled(&self) {
        loop {
            let members = self.members();
            for member in &members {
                member.settled().await;
            }
            if members.iter().all(|member| member.is_settled()) {
                return;
            }
        }
    }

    fn owns_registration<T: ?Sized>(&self, name: &str, ours: &Arc<T>) -> bool {
        self.router
            .resolve(name)
            .is_some_and(|registered| std::ptr::addr_eq(Arc::as_ptr(&registered), Arc::as_ptr(ours)))
    }

    /// Stop every child, clean up child tomes, and remove this tome's
    /// registrations from the router.
    ///
    /// Registrations that were replaced by someone else since `initialize`
    /// are left alone.
    pub fn cleanup(&self) {
        let mut initialized = self.initialized.lock();
        let machines = std::mem::take(&mut *self.machines.write());
        let children = std::mem::take(&mut *self.child_tomes.write());

        for (name, machine) in &machines {
            machine.stop();
            if self.owns_registration(name, machine) {
                self.router.unregister(name);
            }
        }
        for child in &children {
            child.cleanup();
            if self.owns_registration(&child.name, child) {
                self.router.unregister(&child.name);
            }
        }

        self.view_observers.clear();
        self.snapshot_observers.clear();
        *self.view_key.write() = INITIAL_VIEW_KEY.to_string();
        *initialized = false;
        info!(
            tome = %self.name,
            stopped = machines.len(),
            child_tomes = children.len(),
            "tome cleaned up"
        );
    }

    pub fn view_key(&self) -> String {
        self.view_key.read().clone()
    }

    /// Observe the view key: once now, then on every change.
    pub fn observe_view_key<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&String) + Send + Sync + 'static,
    {
        self.view_observers.subscribe(&self.view_key(), callback)
    }

    /// Change the view key, notifying observers only if it differs.
    pub fn set_view_key(&self, key: impl Into<String>) {
        let key = key.into();
        {
            let mut current = self.view_key.write();
            if *current == key {
                return;
            }
            current.clone_from(&key);
        }
        debug!(tome = %self.name, view_key = %key, "view key changed");
        self.view_observers.notify(&key);
        self.snapshot_observers.notify(&self.tome_snapshot());
    }

    /// The tome as a router node sees it: the view key stands in for a state.
    fn tome_snapshot(&self) -> MachineSnapshot {
        let child_tomes: Vec<String> = self
            .child_tomes
            .read()
            .iter()
            .map(|child| child.name.clone())
            .collect();
        MachineSnapshot {
            machine: self.name.clone(),
            state: self.view_key(),
            context: json!({
                "initialized": self.is_initialized(),
                "children": self.child_names(),
                "childTomes": child_tomes,
            }),
            is_stable: self.members().iter().all(|member| member.is_settled()),
        }
    }

    pub fn debug_info(&self) -> TomeDebugInfo {
        let machines = self
            .machines
            .read()
            .iter()
            .map(|(_, machine)| machine.snapshot())
            .collect();

        TomeDebugInfo {
            name: self.name.clone(),
            initialized: self.is_initialized(),
            current_view_key: self.view_key(),
            observer_count: self.view_observers.len(),
            children: self.declarations.iter().map(|d| d.name.clone()).collect(),
            child_tomes: self
                .child_tomes
                .read()
                .iter()
                .map(|child| child.name.clone())
                .collect(),
            registered: self.router.names(),
            machines,
        }
    }
}

impl Addressable for TomeBase {
    fn name(&self) -> &str {
        &self.name
    }

    fn parent_name(&self) -> Option<String> {
        self.parent.read().clone()
    }
}

/// A registered tome is a path node: it can be resolved, observed, started
/// and stopped, but events go to its machines, not to it.
#[async_trait]
impl RoutedMachine for TomeBase {
    fn send(&self, _event: Event) -> Result<(), DeliveryError> {
        Err(DeliveryError::NotAMachine {
            machine: self.name.clone(),
        })
    }

    fn snapshot(&self) -> MachineSnapshot {
        self.tome_snapshot()
    }

    fn subscribe(&self, callback: SnapshotCallback) -> Subscription {
        self.snapshot_observers
            .subscribe(&self.tome_snapshot(), callback)
    }

    fn start(&self) {
        if let Err(err) = self.initialize() {
            warn!(tome = %self.name, error = %err, "tome failed to start");
        }
    }

    fn stop(&self) {
        self.cleanup();
    }

    fn set_parent(&self, parent: Option<String>) {
        *self.parent.write() = parent;
    }

    fn is_settled(&self) -> bool {
        self.members().iter().all(|member| member.is_settled())
    }

    async fn settled(&self) {
        TomeBase::settled(self).await;
    }
}
