//! Structured error type for the store.
//!
//! Subscribing, dispatching and disposing are total and never return errors.
//! `StoreError` only shows up where a caller asks the store for something it
//! can no longer provide: spawning the worker, or waiting on a round trip.

use thiserror::Error;

/// Pattern-matchable failures surfaced by the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The OS refused to start the worker thread backing the ordering domain.
    #[error("failed to spawn store worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The ordering domain has stopped, either because every `Store` handle was
    /// dropped or because a step panicked.
    #[error("store worker has stopped")]
    Closed,

    /// A round trip was requested from the worker thread itself, which would
    /// wait on its own queue forever.
    #[error("flush requested from the store's own worker thread")]
    Reentrant,
}
