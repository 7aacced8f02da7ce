//! Subscription teardown.
//!
//! Every subscription hands back a [`DisposalHandle`]. Calling
//! [`dispose`](DisposalHandle::dispose) cancels exactly that subscription, once,
//! no matter how many times or from how many threads it is called.
//!
//! A [`Disposer`] collects handles for an owner and fires them all when the
//! owner drops it:
//!
//! ```ignore
//! struct Dashboard {
//!     disposer: Disposer,
//! }
//!
//! impl Dashboard {
//!     fn bind(&self, store: &Store<AppState>) {
//!         store
//!             .observe(|state| render(state))
//!             .dispose_on(&self.disposer);
//!         // Unsubscribed when the dashboard is dropped.
//!     }
//! }
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use smallvec::SmallVec;

use crate::command::PlainCommand;

// =============================================================================
// Disposal Handle
// =============================================================================

/// Token that cancels one subscription.
///
/// Clones share identity and the disposed flag: disposing any clone disposes
/// all of them.
#[derive(Clone)]
pub struct DisposalHandle {
    command: PlainCommand,
    disposed: Arc<AtomicBool>,
}

impl DisposalHandle {
    /// Wrap arbitrary teardown work.
    pub fn new<F>(teardown: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::from_command(PlainCommand::new(move |()| teardown()))
    }

    /// Wrap an existing plain command, keeping its identity.
    pub fn from_command(command: PlainCommand) -> Self {
        Self {
            command,
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run the teardown if it has not run yet. Later calls are no-ops.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.command.execute(());
    }

    /// Whether `dispose` has been called on this handle or any clone.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Park this handle on `disposer`, to be fired when the disposer drops.
    pub fn dispose_on(self, disposer: &Disposer) {
        disposer.add(self);
    }
}

impl PartialEq for DisposalHandle {
    fn eq(&self, other: &Self) -> bool {
        self.command == other.command
    }
}

impl Eq for DisposalHandle {}

impl Hash for DisposalHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.command.hash(state);
    }
}

impl fmt::Debug for DisposalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposalHandle")
            .field("command", &self.command)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// =============================================================================
// Disposer
// =============================================================================

/// Owner-scoped bag of disposal handles.
///
/// Handles are disposed in insertion order when the disposer is dropped.
#[derive(Default)]
pub struct Disposer {
    disposals: Mutex<SmallVec<[DisposalHandle; 4]>>,
}

impl Disposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handle to fire on teardown.
    pub fn add(&self, handle: DisposalHandle) {
        self.lock().push(handle);
    }

    /// Number of handles waiting for teardown.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panicking `add` caller must not wedge teardown.
    fn lock(&self) -> MutexGuard<'_, SmallVec<[DisposalHandle; 4]>> {
        self.disposals.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        let disposals = std::mem::take(
            self.disposals
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for handle in disposals {
            handle.dispose();
        }
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("pending", &self.len())
            .finish()
    }
}
