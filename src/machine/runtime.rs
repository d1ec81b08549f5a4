//! The event-driven machine: a mailbox worker feeding a transition queue.

use super::definition::{Effect, ErrorRoute, MachineContext, MachineDefinition, Rule};
use super::error::DeliveryError;
use super::event::{Event, MachineSnapshot};
use super::route::RouteContext;
use crate::core::{Observers, State, StateTransition, Subscription};
use crate::queue::{TransitionError, TransitionHandler, TransitionQueue, ViewModel};
use crate::router::{Addressable, MachineRouter, RoutedMachine, SnapshotCallback};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// Per-entry input of the machine's queue.
pub(crate) struct RuleInput<C> {
    effect: Effect<C>,
    event: Event,
    outcome: Option<oneshot::Sender<Result<(), TransitionError>>>,
}

/// Runs rule effects against the shared context.
///
/// A successful effect only stages the next context. It is committed in
/// `on_settled`, under the queue lock, together with the new state.
pub(crate) struct RuleHandler<C> {
    machine: String,
    context: Arc<RwLock<C>>,
    staged: Mutex<Option<C>>,
    parent: Arc<RwLock<Option<String>>>,
    router: MachineRouter,
}

impl<C: MachineContext> RuleHandler<C> {
    async fn apply(&self, effect: Effect<C>, event: Event) -> Result<(), TransitionError> {
        let current = self.context.read().clone();
        let next = match effect {
            Effect::None => return Ok(()),
            Effect::Update(update) => {
                let mut next = current;
                update(&mut next, &event);
                next
            }
            Effect::Action(action) => {
                let route = RouteContext::new(
                    self.router.clone(),
                    self.machine.clone(),
                    self.parent.read().clone(),
                );
                action(current, event, route).await?
            }
        };
        *self.staged.lock() = Some(next);
        Ok(())
    }
}

#[async_trait]
impl<S: State, C: MachineContext> TransitionHandler<S> for RuleHandler<C> {
    type Input = RuleInput<C>;

    async fn process(
        &self,
        _transition: &StateTransition<S>,
        input: RuleInput<C>,
    ) -> Result<(), TransitionError> {
        let RuleInput {
            effect,
            event,
            outcome,
        } = input;
        let result = self.apply(effect, event).await;
        if let Some(outcome) = outcome {
            let _ = outcome.send(result.clone());
        }
        result
    }

    fn on_settled(&self, _transition: &StateTransition<S>, succeeded: bool) {
        let staged = self.staged.lock().take();
        if let (true, Some(next)) = (succeeded, staged) {
            *self.context.write() = next;
        }
    }
}

enum Mailbox {
    Ready {
        sender: mpsc::UnboundedSender<Event>,
        receiver: mpsc::UnboundedReceiver<Event>,
    },
    Running {
        sender: mpsc::UnboundedSender<Event>,
    },
    Stopped,
}

/// The single consumer of a machine's mailbox.
struct Worker<S: State, C: MachineContext> {
    name: String,
    queue: Arc<TransitionQueue<S, RuleHandler<C>>>,
    rules: Arc<Vec<Rule<S, C>>>,
    error_route: Option<Arc<ErrorRoute<S, C>>>,
    in_flight: Arc<watch::Sender<usize>>,
}

impl<S: State, C: MachineContext> Worker<S, C> {
    async fn run(self, mut receiver: mpsc::UnboundedReceiver<Event>) {
        info!(machine = %self.name, "machine started");
        while let Some(event) = receiver.recv().await {
            self.dispatch(event).await;
            self.in_flight.send_modify(|n| *n = n.saturating_sub(1));
        }
        info!(machine = %self.name, "machine stopped");
    }

    async fn dispatch(&self, event: Event) {
        let state = self.queue.current_state();
        let Some(rule) = self
            .rules
            .iter()
            .find(|rule| rule.accepts(&state, &event.event_type))
        else {
            debug!(machine = %self.name, state = state.name(), event = %event.event_type, "event ignored: no matching transition");
            return;
        };

        debug!(machine = %self.name, from = state.name(), to = rule.to.name(), event = %event.event_type, "event accepted");
        let event_type = event.event_type.clone();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        self.queue
            .enqueue_transition_with(
                StateTransition::new(state.clone(), rule.to.clone()),
                RuleInput {
                    effect: rule.effect.clone(),
                    event,
                    outcome: Some(outcome_tx),
                },
            )
            .await;

        let outcome = outcome_rx
            .await
            .unwrap_or_else(|_| Err(self.abandoned()));

        match outcome {
            Ok(()) => {
                if let Some(next) = &rule.then {
                    self.follow_up(rule.to.clone(), next.clone(), Effect::None, &event_type)
                        .await;
                }
            }
            Err(err) => {
                if let Some(route) = &self.error_route {
                    let text = err.to_string();
                    let record = Arc::clone(&route.record);
                    let effect = Effect::Update(Arc::new(move |context: &mut C, _: &Event| {
                        record(context, &text)
                    }));
                    self.follow_up(state, route.state.clone(), effect, &event_type)
                        .await;
                }
            }
        }
    }

    async fn follow_up(&self, from: S, to: S, effect: Effect<C>, cause: &str) {
        debug!(machine = %self.name, from = from.name(), to = to.name(), cause, "follow-up transition");
        self.queue
            .enqueue_transition_with(
                StateTransition::new(from, to),
                RuleInput {
                    effect,
                    event: Event::new(cause),
                    outcome: None,
                },
            )
            .await;
    }

    /// The handler future was dropped before reporting, which only a timeout does.
    fn abandoned(&self) -> TransitionError {
        match self.queue.config().handler_timeout {
            Some(limit) => TransitionError::TimedOut(limit),
            None => TransitionError::Abandoned,
        }
    }
}

/// A running state machine.
///
/// Events arrive through [`RoutedMachine::send`] and are handled one at a
/// time by a worker task spawned in [`RoutedMachine::start`]. Each accepted
/// event becomes a transition on the machine's [`TransitionQueue`], so state
/// changes are serialized no matter how many tasks send events.
///
/// Events sent before `start` are held in the mailbox until the worker runs.
pub struct Machine<S: State, C: MachineContext> {
    name: String,
    parent: Arc<RwLock<Option<String>>>,
    context: Arc<RwLock<C>>,
    queue: Arc<TransitionQueue<S, RuleHandler<C>>>,
    rules: Arc<Vec<Rule<S, C>>>,
    error_route: Option<Arc<ErrorRoute<S, C>>>,
    mailbox: Mutex<Mailbox>,
    in_flight: Arc<watch::Sender<usize>>,
    observers: Arc<Observers<MachineSnapshot>>,
    _queue_subscription: Subscription,
}

impl<S: State, C: MachineContext> Machine<S, C> {
    pub fn new(definition: MachineDefinition<S, C>, router: MachineRouter) -> Self {
        let MachineDefinition {
            name,
            initial,
            context,
            rules,
            error_route,
            config,
        } = definition;

        let parent = Arc::new(RwLock::new(None));
        let context = Arc::new(RwLock::new(context));
        let handler = RuleHandler {
            machine: name.clone(),
            context: Arc::clone(&context),
            staged: Mutex::new(None),
            parent: Arc::clone(&parent),
            router,
        };
        let queue = Arc::new(TransitionQueue::with_config(
            name.clone(),
            initial,
            handler,
            config,
        ));

        let observers = Arc::new(Observers::new());
        let queue_subscription = {
            let name = name.clone();
            let context = Arc::clone(&context);
            let observers = Arc::clone(&observers);
            queue.subscribe(move |view_model: &ViewModel<S>| {
                observers.notify(&snapshot_of(&name, view_model, &context));
            })
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        let (in_flight, _) = watch::channel(0);

        Self {
            name,
            parent,
            context,
            queue,
            rules: Arc::new(rules),
            error_route: error_route.map(Arc::new),
            mailbox: Mutex::new(Mailbox::Ready { sender, receiver }),
            in_flight: Arc::new(in_flight),
            observers,
            _queue_subscription: queue_subscription,
        }
    }

    pub fn current_state(&self) -> S {
        self.queue.current_state()
    }

    /// A copy of the current context.
    pub fn context(&self) -> C {
        self.context.read().clone()
    }

    pub fn view_model(&self) -> ViewModel<S> {
        self.queue.view_model()
    }

    pub fn rules(&self) -> &[Rule<S, C>] {
        &self.rules
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.mailbox.lock(), Mailbox::Running { .. })
    }

    fn worker(&self) -> Worker<S, C> {
        Worker {
            name: self.name.clone(),
            queue: Arc::clone(&self.queue),
            rules: Arc::clone(&self.rules),
            error_route: self.error_route.clone(),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

fn snapshot_of<S: State, C: MachineContext>(
    name: &str,
    view_model: &ViewModel<S>,
    context: &RwLock<C>,
) -> MachineSnapshot {
    let context = serde_json::to_value(&*context.read()).unwrap_or_else(|err| {
        warn!(machine = name, error = %err, "context is not representable as JSON");
        Value::Null
    });
    MachineSnapshot {
        machine: name.to_string(),
        state: view_model.current_state.name().to_string(),
        context,
        is_stable: view_model.is_stable,
    }
}

impl<S: State, C: MachineContext> Addressable for Machine<S, C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn parent_name(&self) -> Option<String> {
        self.parent.read().clone()
    }
}

#[async_trait]
impl<S: State, C: MachineContext> RoutedMachine for Machine<S, C> {
    fn send(&self, event: Event) -> Result<(), DeliveryError> {
        let mailbox = self.mailbox.lock();
        let sender = match &*mailbox {
            Mailbox::Ready { sender, .. } | Mailbox::Running { sender } => sender,
            Mailbox::Stopped => {
                return Err(DeliveryError::Stopped {
                    machine: self.name.clone(),
                })
            }
        };

        debug!(machine = %self.name, event = %event.event_type, "event received");
        self.in_flight.send_modify(|n| *n += 1);
        sender.send(event).map_err(|_| {
            self.in_flight.send_modify(|n| *n = n.saturating_sub(1));
            DeliveryError::Stopped {
                machine: self.name.clone(),
            }
        })
    }

    fn snapshot(&self) -> MachineSnapshot {
        self.queue
            .inspect(|view_model| snapshot_of(&self.name, view_model, &self.context))
    }

    fn subscribe(&self, callback: SnapshotCallback) -> Subscription {
        self.observers.subscribe(&self.snapshot(), callback)
    }

    fn start(&self) {
        let mut mailbox = self.mailbox.lock();
        match std::mem::replace(&mut *mailbox, Mailbox::Stopped) {
            Mailbox::Ready { sender, receiver } => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(self.worker().run(receiver));
                    *mailbox = Mailbox::Running { sender };
                }
                Err(err) => {
                    warn!(machine = %self.name, error = %err, "cannot start machine outside a tokio runtime");
                    *mailbox = Mailbox::Ready { sender, receiver };
                }
            },
            running @ Mailbox::Running { .. } => {
                debug!(machine = %self.name, "machine already running");
                *mailbox = running;
            }
            Mailbox::Stopped => {
                warn!(machine = %self.name, "stopped machines cannot be restarted");
            }
        }
    }

    fn stop(&self) {
        let previous = std::mem::replace(&mut *self.mailbox.lock(), Mailbox::Stopped);
        match previous {
            Mailbox::Ready { .. } => {
                // Never started: buffered events are discarded with the receiver.
                self.in_flight.send_replace(0);
                info!(machine = %self.name, "machine stopped before start");
            }
            Mailbox::Running { .. } => {
                debug!(machine = %self.name, "mailbox closed");
            }
            Mailbox::Stopped => {}
        }
    }

    fn set_parent(&self, parent: Option<String>) {
        *self.parent.write() = parent;
    }

    fn is_settled(&self) -> bool {
        *self.in_flight.borrow() == 0 && self.queue.is_stable()
    }

    async fn settled(&self) {
        let mut in_flight = self.in_flight.subscribe();
        // The sender is owned by `self`, so the channel outlives this wait.
        let _ = in_flight.wait_for(|n| *n == 0).await;
        self.queue.wait_until_stable().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{MachineBuilder, TransitionBuilder};
    use crate::config::QueueConfig;
    use crate::state_enum;
    use serde::Serialize;
    use serde_json::json;
    use std::time::Duration;

    state_enum! {
        enum Health {
            Idle,
            Monitoring,
            Stopped,
            Error,
        }
        final: [Stopped]
        error: [Error]
    }

    #[derive(Clone, Debug, Default, Serialize)]
    struct Counters {
        request_count: u32,
        last_operation: Option<String>,
        error: Option<String>,
    }

    fn health_machine(router: &MachineRouter) -> Machine<Health, Counters> {
        let definition = MachineBuilder::new("HealthMachine")
            .initial(Health::Idle)
            .context(Counters::default())
            .transition(
                TransitionBuilder::new()
                    .from(Health::Idle)
                    .on("START_MONITORING")
                    .to(Health::Monitoring),
            )
            .and_then(|b| {
                b.transition(
                    TransitionBuilder::new()
                        .from(Health::Monitoring)
                        .on("OPERATION_COMPLETE")
                        .to(Health::Monitoring)
                        .update(|c: &mut Counters, e: &Event| {
                            c.request_count += 1;
                            c.last_operation = e.payload["operation"].as_str().map(str::to_string);
                        }),
                )
            })
            .and_then(|b| {
                b.transition(
                    TransitionBuilder::new()
                        .from(Health::Monitoring)
                        .on("HEALTH_CHECK")
                        .to(Health::Monitoring)
                        .action(|_c: Counters, _e, _route| async {
                            Err(TransitionError::failed("health check failed"))
                        }),
                )
            })
            .and_then(|b| {
                b.transition(
                    TransitionBuilder::new()
                        .from(Health::Error)
                        .on("RESET")
                        .to(Health::Monitoring),
                )
            })
            .map(|b| b.error_state(Health::Error, |c: &mut Counters, e: &str| c.error = Some(e.into())))
            .and_then(|b| b.build())
            .unwrap();
        Machine::new(definition, router.clone())
    }

    #[tokio::test]
    async fn events_drive_transitions_and_update_context() {
        let machine = health_machine(&MachineRouter::new());
        machine.start();
        machine.send(Event::new("START_MONITORING")).unwrap();
        machine
            .send(Event::with_payload("OPERATION_COMPLETE", json!({ "operation": "save" })))
            .unwrap();
        machine.settled().await;

        assert_eq!(machine.current_state(), Health::Monitoring);
        let context = machine.context();
        assert_eq!(context.request_count, 1);
        assert_eq!(context.last_operation.as_deref(), Some("save"));
        assert_eq!(machine.view_model().transitions.len(), 2);
        assert!(machine.is_settled());
    }

    #[tokio::test]
    async fn unmatched_events_are_ignored() {
        let machine = health_machine(&MachineRouter::new());
        machine.start();
        machine.send(Event::new("OPERATION_COMPLETE")).unwrap();
        machine.settled().await;

        assert_eq!(machine.current_state(), Health::Idle);
        assert!(machine.view_model().log_entries.is_empty());
    }

    #[tokio::test]
    async fn failed_action_enters_error_state_and_recovers() {
        let machine = health_machine(&MachineRouter::new());
        machine.start();
        machine.send(Event::new("START_MONITORING")).unwrap();
        machine.send(Event::new("HEALTH_CHECK")).unwrap();
        machine.settled().await;

        assert_eq!(machine.current_state(), Health::Error);
        assert_eq!(machine.context().error.as_deref(), Some("health check failed"));
        let log = machine.view_model().log_entries;
        assert!(log
            .iter()
            .any(|e| e.message == "Transition failed: health check failed"));

        machine.send(Event::new("RESET")).unwrap();
        machine.settled().await;
        assert_eq!(machine.current_state(), Health::Monitoring);
    }

    #[tokio::test]
    async fn events_sent_before_start_wait_in_mailbox() {
        let machine = health_machine(&MachineRouter::new());
        machine.send(Event::new("START_MONITORING")).unwrap();
        assert!(!machine.is_settled());
        assert_eq!(machine.current_state(), Health::Idle);

        machine.start();
        machine.settled().await;
        assert_eq!(machine.current_state(), Health::Monitoring);
    }

    #[tokio::test]
    async fn stopped_machine_rejects_events() {
        let machine = health_machine(&MachineRouter::new());
        machine.start();
        assert!(machine.is_running());
        machine.stop();
        machine.stop();

        let err = machine.send(Event::new("START_MONITORING")).unwrap_err();
        assert_eq!(
            err,
            DeliveryError::Stopped {
                machine: "HealthMachine".into()
            }
        );
        machine.start();
        assert!(!machine.is_running());
    }

    #[tokio::test]
    async fn subscribers_receive_snapshots() {
        let machine = health_machine(&MachineRouter::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = machine.subscribe(Box::new(move |snap: &MachineSnapshot| {
            sink.lock().push(snap.state.clone())
        }));

        machine.start();
        machine.send(Event::new("START_MONITORING")).unwrap();
        machine.settled().await;
        sub.unsubscribe();

        assert_eq!(*seen.lock(), vec!["Idle", "Monitoring"]);
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.machine, "HealthMachine");
        assert_eq!(snapshot.context["request_count"], 0);
        assert!(snapshot.is_stable);
    }

    #[tokio::test]
    async fn then_follows_up_after_success() {
        state_enum! {
            enum Save { Idle, Saving, Saved }
        }

        let definition = MachineBuilder::new("Saver")
            .initial(Save::Idle)
            .context(0u32)
            .transition(
                TransitionBuilder::new()
                    .from(Save::Idle)
                    .on("SAVE")
                    .to(Save::Saving)
                    .action(|n: u32, _e, _route| async move { Ok(n + 1) })
                    .then(Save::Saved),
            )
            .and_then(|b| b.build())
            .unwrap();
        let machine = Machine::new(definition, MachineRouter::new());
        machine.start();
        machine.send(Event::new("SAVE")).unwrap();
        machine.settled().await;

        assert_eq!(machine.current_state(), Save::Saved);
        assert_eq!(machine.context(), 1);
        let path: Vec<_> = machine
            .view_model()
            .transitions
            .get_path()
            .into_iter()
            .cloned()
            .collect();
        assert_eq!(path, vec![Save::Idle, Save::Saving, Save::Saved]);
    }

    #[tokio::test]
    async fn timed_out_action_counts_as_failure() {
        state_enum! {
            enum Job { Idle, Running, Failed }
        }

        let definition = MachineBuilder::new("Job")
            .initial(Job::Idle)
            .context(String::new())
            .config(QueueConfig::default().handler_timeout(Duration::from_millis(10)))
            .transition(
                TransitionBuilder::new()
                    .from(Job::Idle)
                    .on("RUN")
                    .to(Job::Running)
                    .action(|c: String, _e, _route| async move {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        Ok(c)
                    }),
            )
            .map(|b| b.error_state(Job::Failed, |c: &mut String, e: &str| *c = e.to_string()))
            .and_then(|b| b.build())
            .unwrap();
        let machine = Machine::new(definition, MachineRouter::new());
        machine.start();
        machine.send(Event::new("RUN")).unwrap();
        machine.settled().await;

        assert_eq!(machine.current_state(), Job::Failed);
        assert!(machine.context().contains("timed out"));
    }

    fn bump() -> RuleInput<u32> {
        RuleInput {
            effect: Effect::Update(Arc::new(|n: &mut u32, _: &Event| *n += 1)),
            event: Event::new("BUMP"),
            outcome: None,
        }
    }

    #[tokio::test]
    async fn context_is_committed_when_the_entry_settles() {
        let handler = RuleHandler {
            machine: "Counter".to_string(),
            context: Arc::new(RwLock::new(0u32)),
            staged: Mutex::new(None),
            parent: Arc::new(RwLock::new(None)),
            router: MachineRouter::new(),
        };
        let transition = StateTransition::new(Health::Idle, Health::Monitoring);

        handler.process(&transition, bump()).await.unwrap();
        assert_eq!(*handler.context.read(), 0);
        handler.on_settled(&transition, true);
        assert_eq!(*handler.context.read(), 1);

        // A transition that fails after its effect ran leaves the context alone.
        handler.process(&transition, bump()).await.unwrap();
        handler.on_settled(&transition, false);
        assert_eq!(*handler.context.read(), 1);
        assert!(handler.staged.lock().is_none());
    }
}
