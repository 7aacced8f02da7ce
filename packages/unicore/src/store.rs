//! The store: one state value, one mutator, one ordering domain.
//!
//! # Flow
//!
//! ```text
//! dispatch(action) ─┐
//! listen(..)       ─┤
//! observe(..)      ─┼─► mpsc queue ─► worker thread (ordering domain)
//! dispose()        ─┤                    │
//! flush()          ─┘                    ├─► listeners(old state, action)
//!                                        ├─► state = mutator(old state, action)
//!                                        └─► observers(new state)
//! ```
//!
//! Every operation is a message on a single FIFO queue, consumed by one
//! dedicated thread. Callers never block and never touch the state; the worker
//! owns the state and both subscriber lists outright.
//!
//! # Guarantees
//!
//! - Dispatches are applied in submission order, one full step at a time.
//! - Within a step: all listeners, then the mutator (exactly once), then all
//!   observers. Each list runs in registration order.
//! - `observe` replays the current state to the new observer before it sees
//!   any later state.
//! - A callback that dispatches appends to the back of the queue; steps never
//!   nest.
//! - Removal is queued like everything else, so it never races a step. Use
//!   [`Store::flush`] when a caller needs to know it has taken effect.
//!
//! # Failure
//!
//! A panic in the mutator or in an inline callback stops the ordering domain
//! for good. It is logged, queued work is dropped, and further submissions are
//! ignored with a warning.
//!
//! There is no backpressure: if steps are slow the queue grows without bound.

use std::fmt;
use std::ops::ControlFlow;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

use crate::action::Action;
use crate::command::Command;
use crate::context::{panic_message, spawn_worker, ExecutionContext};
use crate::dispose::DisposalHandle;
use crate::error::StoreError;
use crate::stream::StateStream;

/// Default store name, used for the worker thread and log fields.
pub const DEFAULT_STORE_NAME: &str = "unicore-store";

/// Pure transition function: `(current state, action) -> next state`.
pub type Mutator<S> = Box<dyn Fn(&S, &dyn Action) -> S + Send + 'static>;

type Listener<S> = Command<(Arc<S>, Arc<dyn Action>)>;
type Observer<S> = Command<Arc<S>>;

/// Identifies one listener or observer registration within a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// =============================================================================
// Messages
// =============================================================================

enum Message<S> {
    Dispatch(Arc<dyn Action>),
    Listen(SubscriptionId, Listener<S>),
    Observe(SubscriptionId, Observer<S>),
    Remove(SubscriptionId),
    Flush(oneshot::Sender<()>),
}

// =============================================================================
// Ordering Domain
// =============================================================================

/// Everything the worker thread owns. Never shared.
struct Core<S> {
    name: Arc<str>,
    state: Arc<S>,
    mutator: Mutator<S>,
    listeners: Vec<(SubscriptionId, Listener<S>)>,
    observers: Vec<(SubscriptionId, Observer<S>)>,
}

impl<S> Core<S> {
    /// Handle one message. A panic ends the ordering domain.
    fn process(&mut self, message: Message<S>) -> ControlFlow<()> {
        match catch_unwind(AssertUnwindSafe(|| self.handle(message))) {
            Ok(()) => ControlFlow::Continue(()),
            Err(panic) => {
                error!(
                    store = %self.name,
                    panic = %panic_message(panic.as_ref()),
                    "store step panicked; ordering domain stopped"
                );
                ControlFlow::Break(())
            }
        }
    }

    fn handle(&mut self, message: Message<S>) {
        match message {
            Message::Dispatch(action) => self.step(action),
            Message::Listen(id, listener) => {
                self.listeners.push((id, listener));
                debug!(store = %self.name, subscription = %id, "listener registered");
            }
            Message::Observe(id, observer) => {
                self.observers.push((id, observer.clone()));
                debug!(store = %self.name, subscription = %id, "observer registered");
                observer.execute(Arc::clone(&self.state));
            }
            Message::Remove(id) => self.remove(id),
            Message::Flush(reply) => {
                // The caller may have given up waiting.
                let _ = reply.send(());
            }
        }
    }

    fn step(&mut self, action: Arc<dyn Action>) {
        trace!(
            store = %self.name,
            action = ?action,
            listeners = self.listeners.len(),
            observers = self.observers.len(),
            "applying action"
        );

        for (_, listener) in &self.listeners {
            listener.execute((Arc::clone(&self.state), Arc::clone(&action)));
        }

        self.state = Arc::new((self.mutator)(&*self.state, &*action));

        for (_, observer) in &self.observers {
            observer.execute(Arc::clone(&self.state));
        }
    }

    fn remove(&mut self, id: SubscriptionId) {
        let before = self.listeners.len() + self.observers.len();
        self.listeners.retain(|(entry, _)| *entry != id);
        self.observers.retain(|(entry, _)| *entry != id);

        if before == self.listeners.len() + self.observers.len() {
            trace!(store = %self.name, subscription = %id, "subscription already removed");
        } else {
            debug!(store = %self.name, subscription = %id, "subscription removed");
        }
    }
}

impl<S> Drop for Core<S> {
    fn drop(&mut self) {
        info!(store = %self.name, "store stopped");
    }
}

// =============================================================================
// Store
// =============================================================================

struct Shared {
    name: Arc<str>,
    worker: ThreadId,
    next_id: AtomicU64,
}

/// Thread-safe unidirectional state container.
///
/// The state can't be read directly. Subscribe to receive it, and dispatch
/// actions to change it.
///
/// `Store` is cheap to clone; clones feed the same ordering domain. The domain
/// shuts down once every clone is dropped. Callbacks that need to reach the
/// store should capture a [`WeakStore`] so they don't keep it alive.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug)]
/// struct Add(i64);
/// impl Action for Add {}
///
/// let store = Store::new(0i64, |total, action| match action.downcast_ref::<Add>() {
///     Some(Add(n)) => total + n,
///     None => *total,
/// });
///
/// let handle = store.observe(|total| println!("total = {total}"));
/// store.dispatch(Add(2));
/// store.flush_blocking()?;
/// handle.dispose();
/// ```
pub struct Store<S> {
    sender: mpsc::UnboundedSender<Message<S>>,
    shared: Arc<Shared>,
}

impl<S: Send + Sync + 'static> Store<S> {
    /// Create a store with the default name.
    ///
    /// # Panics
    ///
    /// If the worker thread can't be spawned, as `std::thread::spawn` does.
    /// Use [`StoreBuilder::try_build`] to handle that case.
    pub fn new<F>(state: S, mutator: F) -> Self
    where
        F: Fn(&S, &dyn Action) -> S + Send + 'static,
    {
        StoreBuilder::new(state, mutator).build()
    }

    /// Start configuring a store.
    pub fn builder<F>(state: S, mutator: F) -> StoreBuilder<S>
    where
        F: Fn(&S, &dyn Action) -> S + Send + 'static,
    {
        StoreBuilder::new(state, mutator)
    }

    fn spawn(name: Arc<str>, state: S, mutator: Mutator<S>) -> Result<Self, StoreError> {
        let (sender, receiver) = mpsc::unbounded_channel();

        let mut core = Core {
            name: name.clone(),
            state: Arc::new(state),
            mutator,
            listeners: Vec::new(),
            observers: Vec::new(),
        };
        let worker = spawn_worker(&name, receiver, move |message| core.process(message))?;

        info!(store = %name, "store started");

        Ok(Self {
            sender,
            shared: Arc::new(Shared {
                name,
                worker,
                next_id: AtomicU64::new(1),
            }),
        })
    }

    /// Submit an action. Returns immediately; the step runs on the worker.
    pub fn dispatch<A: Action>(&self, action: A) {
        self.dispatch_arc(Arc::new(action));
    }

    /// Submit an already type-erased action.
    pub fn dispatch_arc(&self, action: Arc<dyn Action>) {
        self.submit(Message::Dispatch(action));
    }

    /// Observe every state after it changes.
    ///
    /// The observer is first called with the current state, then with the
    /// result of every later dispatch.
    pub fn observe<F>(&self, observer: F) -> DisposalHandle
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        self.register_observer(Command::new(move |state: Arc<S>| observer(&*state)))
    }

    /// Like [`observe`](Self::observe), but each call runs on `context`.
    ///
    /// The store hands over the snapshot and moves on; it does not wait for
    /// the callback before the next step. Delivery order to this observer is
    /// preserved when `context` is FIFO (e.g. [`SerialQueue`]).
    ///
    /// [`SerialQueue`]: crate::SerialQueue
    pub fn observe_on<C, F>(&self, context: C, observer: F) -> DisposalHandle
    where
        C: ExecutionContext + 'static,
        F: Fn(&S) + Send + Sync + 'static,
    {
        let command = Command::new(move |state: Arc<S>| observer(&*state));
        self.register_observer(command.dispatched_on(context))
    }

    /// Observe every state as a stream of shared snapshots.
    pub fn subscribe(&self) -> StateStream<S> {
        let (tx, rx) = mpsc::unbounded_channel();
        let disposal = self.register_observer(Command::new(move |state: Arc<S>| {
            // The stream may already be gone; its disposal is queued behind us.
            let _ = tx.send(state);
        }));
        StateStream::new(rx, disposal)
    }

    /// Listen to each action before it is applied.
    ///
    /// The listener gets the state as it was before the mutator runs, plus the
    /// action. Registration alone never calls it.
    pub fn listen<F>(&self, listener: F) -> DisposalHandle
    where
        F: Fn(&S, &dyn Action) + Send + Sync + 'static,
    {
        self.register_listener(Command::new(
            move |(state, action): (Arc<S>, Arc<dyn Action>)| listener(&*state, &*action),
        ))
    }

    /// Like [`listen`](Self::listen), but each call runs on `context`.
    pub fn listen_on<C, F>(&self, context: C, listener: F) -> DisposalHandle
    where
        C: ExecutionContext + 'static,
        F: Fn(&S, &dyn Action) + Send + Sync + 'static,
    {
        let command = Command::new(move |(state, action): (Arc<S>, Arc<dyn Action>)| {
            listener(&*state, &*action)
        });
        self.register_listener(command.dispatched_on(context))
    }

    /// Wait until everything submitted before this call has been processed.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let reply = self.request_flush()?;
        reply.await.map_err(|_| StoreError::Closed)
    }

    /// Blocking variant of [`flush`](Self::flush).
    ///
    /// # Panics
    ///
    /// When called from inside an asynchronous runtime; use `flush().await`
    /// there.
    pub fn flush_blocking(&self) -> Result<(), StoreError> {
        let reply = self.request_flush()?;
        reply.blocking_recv().map_err(|_| StoreError::Closed)
    }

    /// Whether the ordering domain is still accepting work.
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// A handle that does not keep the store alive.
    pub fn downgrade(&self) -> WeakStore<S> {
        WeakStore {
            sender: self.sender.downgrade(),
            shared: Arc::clone(&self.shared),
        }
    }

    fn register_observer(&self, observer: Observer<S>) -> DisposalHandle {
        let id = self.next_id();
        self.submit(Message::Observe(id, observer));
        self.disposal_for(id)
    }

    fn register_listener(&self, listener: Listener<S>) -> DisposalHandle {
        let id = self.next_id();
        self.submit(Message::Listen(id, listener));
        self.disposal_for(id)
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.shared.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// The handle only holds a weak sender: once the store is gone, disposing
    /// is a no-op without touching any queue.
    fn disposal_for(&self, id: SubscriptionId) -> DisposalHandle {
        let sender = self.sender.downgrade();
        DisposalHandle::new(move || {
            if let Some(sender) = sender.upgrade() {
                let _ = sender.send(Message::Remove(id));
            }
        })
    }

    fn request_flush(&self) -> Result<oneshot::Receiver<()>, StoreError> {
        if thread::current().id() == self.shared.worker {
            return Err(StoreError::Reentrant);
        }
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Message::Flush(tx))
            .map_err(|_| StoreError::Closed)?;
        Ok(rx)
    }

    fn submit(&self, message: Message<S>) {
        if self.sender.send(message).is_err() {
            warn!(store = %self.shared.name, "store has stopped; submission dropped");
        }
    }
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.shared.name)
            .field("running", &!self.sender.is_closed())
            .finish_non_exhaustive()
    }
}

/// Non-owning reference to a [`Store`].
pub struct WeakStore<S> {
    sender: mpsc::WeakUnboundedSender<Message<S>>,
    shared: Arc<Shared>,
}

impl<S> WeakStore<S> {
    /// Get the store back if any strong handle is still alive.
    pub fn upgrade(&self) -> Option<Store<S>> {
        let sender = self.sender.upgrade()?;
        Some(Store {
            sender,
            shared: Arc::clone(&self.shared),
        })
    }
}

impl<S> Clone for WeakStore<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> fmt::Debug for WeakStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakStore")
            .field("name", &self.shared.name)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for a [`Store`].
///
/// ```ignore
/// let store = StoreBuilder::new(Session::default(), session_mutator)
///     .with_name("session")
///     .try_build()?;
/// ```
pub struct StoreBuilder<S> {
    name: String,
    state: S,
    mutator: Mutator<S>,
}

impl<S: Send + Sync + 'static> StoreBuilder<S> {
    pub fn new<F>(state: S, mutator: F) -> Self
    where
        F: Fn(&S, &dyn Action) -> S + Send + 'static,
    {
        Self {
            name: DEFAULT_STORE_NAME.to_string(),
            state,
            mutator: Box::new(mutator),
        }
    }

    /// Name the store. Used as the worker thread name and in log fields.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Start the store's worker thread.
    pub fn try_build(self) -> Result<Store<S>, StoreError> {
        Store::spawn(Arc::from(self.name), self.state, self.mutator)
    }

    /// Start the store's worker thread.
    ///
    /// # Panics
    ///
    /// If the worker thread can't be spawned.
    pub fn build(self) -> Store<S> {
        match self.try_build() {
            Ok(store) => store,
            Err(err) => panic!("failed to start store: {err}"),
        }
    }
}

impl<S> fmt::Debug for StoreBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreBuilder")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
