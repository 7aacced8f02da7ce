//! Callables with identity.
//!
//! A [`Command`] wraps a single-argument closure behind an `Arc`. Two commands
//! are equal only if they are clones of the same wrapper, never because they
//! happen to run the same logic, so commands can be used as set and map keys.
//!
//! Commands can also be rebound: [`Command::bound`] captures the argument ahead
//! of time, and [`Command::dispatched_on`] moves every invocation onto an
//! [`ExecutionContext`].

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::context::ExecutionContext;

/// Identity-bearing wrapper over `Fn(T)`.
pub struct Command<T> {
    action: Arc<dyn Fn(T) + Send + Sync>,
}

/// A command that takes no meaningful argument.
pub type PlainCommand = Command<()>;

impl<T> Command<T> {
    /// Wrap a closure. Every call to `new` produces a distinct identity.
    pub fn new<F>(action: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self {
            action: Arc::new(action),
        }
    }

    /// Run the underlying closure.
    pub fn execute(&self, value: T) {
        (self.action)(value)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.action) as *const ()
    }
}

impl<T: Clone + Send + Sync + 'static> Command<T> {
    /// Capture `value` and return a plain command that runs this one with it.
    pub fn bound(&self, value: T) -> PlainCommand {
        let command = self.clone();
        PlainCommand::new(move |()| command.execute(value.clone()))
    }
}

impl<T: Send + 'static> Command<T> {
    /// Return a command that hands each invocation to `context` instead of
    /// running it on the caller's thread.
    ///
    /// The returned command has its own identity; the argument is moved onto
    /// the context, so the caller never waits for the closure to finish.
    pub fn dispatched_on<C>(&self, context: C) -> Command<T>
    where
        C: ExecutionContext + 'static,
    {
        let command = self.clone();
        Command::new(move |value: T| {
            let command = command.clone();
            context.execute(Box::new(move || command.execute(value)));
        })
    }
}

impl<T> Clone for Command<T> {
    fn clone(&self) -> Self {
        Self {
            action: Arc::clone(&self.action),
        }
    }
}

impl<T> PartialEq for Command<T> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.addr(), other.addr())
    }
}

impl<T> Eq for Command<T> {}

impl<T> Hash for Command<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl<T> fmt::Debug for Command<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.addr())
            .finish_non_exhaustive()
    }
}
