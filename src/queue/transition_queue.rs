//! The per-machine serialized transition queue.

use super::entry::{QueueEntry, QueueStatus};
use super::error::TransitionError;
use super::log::LogLevel;
use super::view_model::ViewModel;
use crate::config::QueueConfig;
use crate::core::{Observers, State, StateTransition, Subscription};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Work performed while an entry is `Processing`.
///
/// `Input` carries whatever the handler needs per entry beyond the transition
/// itself: `()` for plain handlers, the triggering event for machines.
#[async_trait]
pub trait TransitionHandler<S: State>: Send + Sync + 'static {
    type Input: Send + 'static;

    async fn process(
        &self,
        transition: &StateTransition<S>,
        input: Self::Input,
    ) -> Result<(), TransitionError>;

    /// Runs under the queue lock as an entry settles, before `current_state`
    /// changes become visible. Keep it short and non-blocking.
    fn on_settled(&self, _transition: &StateTransition<S>, _succeeded: bool) {}
}

/// Adapts an async closure into a [`TransitionHandler`] with `Input = ()`.
///
/// # Example
///
/// ```rust
/// use tomekit::core::StateTransition;
/// use tomekit::queue::{handler_fn, TransitionError, TransitionQueue};
/// use tomekit::state_enum;
///
/// state_enum! {
///     enum Light { Red, Green }
/// }
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let queue = TransitionQueue::new(
///     "light",
///     Light::Red,
///     handler_fn(|_t: StateTransition<Light>| async { Ok::<(), TransitionError>(()) }),
/// );
/// queue.enqueue_transition(StateTransition::new(Light::Red, Light::Green)).await;
/// assert_eq!(queue.current_state(), Light::Green);
/// # });
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F> {
    FnHandler(f)
}

pub struct FnHandler<F>(F);

#[async_trait]
impl<S, F, Fut> TransitionHandler<S> for FnHandler<F>
where
    S: State,
    F: Fn(StateTransition<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TransitionError>> + Send + 'static,
{
    type Input = ();

    async fn process(
        &self,
        transition: &StateTransition<S>,
        _input: (),
    ) -> Result<(), TransitionError> {
        (self.0)(transition.clone()).await
    }
}

struct Slot<S: State, I> {
    entry: QueueEntry<S>,
    input: Option<I>,
}

struct QueueInner<S: State, I> {
    entries: VecDeque<Slot<S, I>>,
    is_processing: bool,
    view_model: ViewModel<S>,
}

/// Serializes a machine's transitions.
///
/// At most one entry is `Processing` at a time and entries settle strictly in
/// enqueue order. `enqueue_transition` may be called concurrently from any
/// number of tasks: the first caller to find the queue idle runs the drain
/// loop, later callers only extend the queue and return.
///
/// If the caller running the drain loop is dropped mid-handler (a timeout,
/// `select!`, an aborted task or a panicking handler), the head settles as
/// [`TransitionError::Abandoned`] and draining resumes on a spawned task.
pub struct TransitionQueue<S: State, H: TransitionHandler<S>> {
    shared: Arc<Shared<S, H>>,
}

struct Shared<S: State, H: TransitionHandler<S>> {
    name: String,
    handler: H,
    config: QueueConfig,
    inner: Mutex<QueueInner<S, H::Input>>,
    observers: Observers<ViewModel<S>>,
    stable: watch::Sender<bool>,
}

impl<S: State, H: TransitionHandler<S>> TransitionQueue<S, H> {
    pub fn new(name: impl Into<String>, initial: S, handler: H) -> Self {
        Self::with_config(name, initial, handler, QueueConfig::default())
    }

    pub fn with_config(name: impl Into<String>, initial: S, handler: H, config: QueueConfig) -> Self {
        let (stable, _) = watch::channel(true);
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                handler,
                config,
                inner: Mutex::new(QueueInner {
                    entries: VecDeque::new(),
                    is_processing: false,
                    view_model: ViewModel::new(initial),
                }),
                observers: Observers::new(),
                stable,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    pub fn handler(&self) -> &H {
        &self.shared.handler
    }

    /// Enqueue a transition whose handler needs no per-entry input.
    pub async fn enqueue_transition(&self, transition: StateTransition<S>)
    where
        H::Input: Default,
    {
        self.enqueue_transition_with(transition, H::Input::default())
            .await
    }

    /// Append a `Pending` entry, log it, and drain the queue if nobody else is.
    ///
    /// Returns once the queue is empty if this call ran the drain loop, or
    /// immediately if another caller is already draining.
    pub async fn enqueue_transition_with(&self, transition: StateTransition<S>, input: H::Input) {
        let shared = &self.shared;
        {
            let mut inner = shared.inner.lock();
            let label = transition.label();
            let metadata = transition_metadata(&transition);
            let entry = QueueEntry::pending(&shared.name, transition);
            debug!(machine = %shared.name, entry = %entry.id, transition = %label, "transition queued");

            inner.entries.push_back(Slot {
                entry,
                input: Some(input),
            });
            inner.view_model.is_stable = false;
            inner.view_model.append_log(
                LogLevel::Info,
                format!("Transition queued: {label}"),
                metadata,
                shared.config.max_log_entries,
            );
            shared.stable.send_replace(false);
        }

        Arc::clone(shared).process_queue().await;
    }

    /// Append an entry to the machine log without touching the queue.
    pub fn add_log_entry(&self, level: LogLevel, message: impl Into<String>, metadata: Value) {
        let mut inner = self.shared.inner.lock();
        inner.view_model.append_log(
            level,
            message.into(),
            metadata,
            self.shared.config.max_log_entries,
        );
    }

    pub fn is_stable(&self) -> bool {
        self.shared.inner.lock().view_model.is_stable
    }

    pub fn current_state(&self) -> S {
        self.shared.inner.lock().view_model.current_state.clone()
    }

    /// A copy of the view model.
    pub fn view_model(&self) -> ViewModel<S> {
        self.shared.inner.lock().view_model.clone()
    }

    /// Read the view model under the queue lock, so nothing settles meanwhile.
    pub fn inspect<R>(&self, f: impl FnOnce(&ViewModel<S>) -> R) -> R {
        f(&self.shared.inner.lock().view_model)
    }

    /// Copies of the entries that have not settled yet, head first.
    pub fn pending(&self) -> Vec<QueueEntry<S>> {
        self.shared
            .inner
            .lock()
            .entries
            .iter()
            .map(|slot| slot.entry.clone())
            .collect()
    }

    /// Observe the view model: once now, then after every settled entry.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ViewModel<S>) + Send + Sync + 'static,
    {
        let current = self.view_model();
        self.shared.observers.subscribe(&current, callback)
    }

    /// Resolve once the queue is empty and nothing is in flight.
    pub async fn wait_until_stable(&self) {
        let mut stable = self.shared.stable.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = stable.wait_for(|is_stable| *is_stable).await;
    }
}

impl<S: State, H: TransitionHandler<S>> Shared<S, H> {
    async fn process_queue(self: Arc<Self>) {
        loop {
            let (transition, input) = {
                let mut inner = self.inner.lock();
                if inner.is_processing {
                    return;
                }
                let Some(head) = inner.entries.front_mut() else {
                    return;
                };
                head.entry.status = QueueStatus::Processing;
                let transition = head.entry.transition.clone();
                let input = head.input.take();
                inner.is_processing = true;
                (transition, input)
            };

            let drain = DrainGuard {
                shared: Some(Arc::clone(&self)),
            };
            let outcome = match input {
                Some(input) => self.run_handler(&transition, input).await,
                None => Err(TransitionError::failed("queue entry was already consumed")),
            };
            drain.disarm();

            if !self.finish_head(outcome) {
                return;
            }
        }
    }

    async fn run_handler(
        &self,
        transition: &StateTransition<S>,
        input: H::Input,
    ) -> Result<(), TransitionError> {
        let work = self.handler.process(transition, input);
        match self.config.handler_timeout {
            Some(limit) => tokio::time::timeout(limit, work)
                .await
                .unwrap_or(Err(TransitionError::TimedOut(limit))),
            None => work.await,
        }
    }

    /// Settle the head entry and release the drain loop.
    ///
    /// Returns whether entries remain.
    fn finish_head(&self, outcome: Result<(), TransitionError>) -> bool {
        let (snapshot, more) = {
            let mut inner = self.inner.lock();
            if let Some(slot) = inner.entries.pop_front() {
                self.settle(&mut inner.view_model, slot.entry, outcome);
            }
            inner.is_processing = false;
            inner.view_model.is_stable = inner.entries.is_empty();
            self.stable.send_replace(inner.view_model.is_stable);
            (inner.view_model.clone(), !inner.entries.is_empty())
        };

        self.observers.notify(&snapshot);
        more
    }

    fn settle(
        &self,
        view_model: &mut ViewModel<S>,
        mut entry: QueueEntry<S>,
        outcome: Result<(), TransitionError>,
    ) {
        let label = entry.transition.label();
        self.handler.on_settled(&entry.transition, outcome.is_ok());
        match outcome {
            Ok(()) => {
                entry.status = QueueStatus::Completed;
                view_model.transitions.push(entry.transition.clone());
                view_model.current_state = entry.transition.to.clone();
                debug!(machine = %self.name, entry = %entry.id, transition = %label, "transition completed");
                view_model.append_log(
                    LogLevel::Info,
                    format!("Transition completed: {label}"),
                    transition_metadata(&entry.transition),
                    self.config.max_log_entries,
                );
            }
            Err(err) => {
                let text = err.to_string();
                entry.status = QueueStatus::Error;
                entry.error = Some(text.clone());
                warn!(machine = %self.name, entry = %entry.id, transition = %label, error = %text, "transition failed");
                let mut metadata = transition_metadata(&entry.transition);
                if let Value::Object(map) = &mut metadata {
                    map.insert("error".to_string(), Value::String(text.clone()));
                }
                view_model.append_log(
                    LogLevel::Error,
                    format!("Transition failed: {text}"),
                    metadata,
                    self.config.max_log_entries,
                );
            }
        }
    }
}

/// Held by the drain loop while a handler runs.
///
/// Dropped while still armed, it settles the head as abandoned and resumes
/// draining on a new task.
struct DrainGuard<S: State, H: TransitionHandler<S>> {
    shared: Option<Arc<Shared<S, H>>>,
}

impl<S: State, H: TransitionHandler<S>> DrainGuard<S, H> {
    fn disarm(mut self) {
        self.shared = None;
    }
}

impl<S: State, H: TransitionHandler<S>> Drop for DrainGuard<S, H> {
    fn drop(&mut self) {
        let Some(shared) = self.shared.take() else {
            return;
        };
        warn!(machine = %shared.name, "drain loop dropped while a handler was running");
        if !shared.finish_head(Err(TransitionError::Abandoned)) {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(shared.process_queue());
            }
            Err(_) => {
                warn!(machine = %shared.name, "no runtime to resume draining; remaining entries wait for the next enqueue");
            }
        }
    }
}

fn transition_metadata<S: State>(transition: &StateTransition<S>) -> Value {
    json!({
        "from": transition.from.name(),
        "to": transition.to.name(),
        "timestamp": transition.timestamp.to_rfc3339(),
    })
}
