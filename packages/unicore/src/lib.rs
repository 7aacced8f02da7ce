//! # Unicore
//!
//! A thread-safe, unidirectional state store. Actions go in, a pure mutator
//! folds them into the next state, and subscribers hear about it.
//!
//! ## Core Concepts
//!
//! - [`Action`] = something that happened (plain data, no behavior)
//! - [`Mutator`] = `(state, action) -> state`, the only way state changes
//! - Observers = callbacks that receive every state, starting with the current one
//! - Listeners = callbacks that see each action together with the state it was applied to
//!
//! ## Architecture
//!
//! ```text
//! dispatch() / observe() / listen() / dispose()   (any thread)
//!     │
//!     ▼ unbounded channel
//! Store worker thread (the single ordering domain)
//!     │
//!     ├─► listeners(state, action)      in registration order
//!     ├─► state = mutator(state, action)
//!     └─► observers(state)              in registration order
//! ```
//!
//! ## Key Invariants
//!
//! 1. **One ordering domain** - every request is handled on the store worker, in submission order
//! 2. **Listen, mutate, observe** - each dispatch runs the three phases in that order
//! 3. **Replay on subscribe** - a new observer is called once with the current state
//! 4. **Re-entrancy is queued** - dispatching from a callback runs after the current step
//! 5. **Disposal is idempotent** - a handle fires at most once, however many clones exist
//!
//! ## Example
//!
//! ```
//! use unicore::{Action, Disposer, Store};
//!
//! #[derive(Debug)]
//! struct Increment;
//! impl Action for Increment {}
//!
//! let store = Store::new(0i64, |count: &i64, action: &dyn Action| {
//!     if action.is::<Increment>() { count + 1 } else { *count }
//! });
//!
//! let disposer = Disposer::new();
//! store
//!     .observe(|count| println!("count = {count}"))
//!     .dispose_on(&disposer);
//!
//! store.dispatch(Increment);
//! store.flush_blocking().unwrap();
//! ```

// Core modules
mod action;
mod atomic;
mod command;
mod context;
mod dispose;
mod error;
mod store;
mod stream;


// Re-export the action model
#[doc(hidden)]
pub use crate::action::AsAny;
pub use crate::action::Action;

// Re-export the shared-value helper
pub use crate::atomic::AtomicValue;

// Re-export callbacks and execution contexts
pub use crate::command::{Command, PlainCommand};
pub use crate::context::{ExecutionContext, Job, SerialQueue};

// Re-export disposal
pub use crate::dispose::{DisposalHandle, Disposer};

// Re-export error types
pub use crate::error::StoreError;

// Re-export the store
pub use crate::store::{
    Mutator, Store, StoreBuilder, SubscriptionId, WeakStore, DEFAULT_STORE_NAME,
};
pub use crate::stream::StateStream;
