//! Execution contexts: where a piece of work actually runs.
//!
//! The store serializes its own work on a dedicated worker thread. Subscribers
//! that do slow or thread-affine work can ask for their callbacks to be handed
//! off to another [`ExecutionContext`]:
//!
//! - [`SerialQueue`]: one dedicated thread, jobs run FIFO.
//! - `tokio::runtime::Handle`: each job runs on the runtime's blocking pool,
//!   with no ordering between jobs.
//!
//! # Guarantees
//!
//! Handing a job to a context never blocks the caller. Nothing links the
//! completion of a handed-off job to the submitter's later work.

use std::any::Any;
use std::io;
use std::ops::ControlFlow;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

use crate::error::StoreError;

/// A unit of work handed to a context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Somewhere a [`Job`] can be sent to run later.
pub trait ExecutionContext: Send + Sync {
    /// Queue `job` for execution. Must not block.
    fn execute(&self, job: Job);
}

impl<C: ExecutionContext + ?Sized> ExecutionContext for Arc<C> {
    fn execute(&self, job: Job) {
        (**self).execute(job)
    }
}

impl ExecutionContext for tokio::runtime::Handle {
    fn execute(&self, job: Job) {
        // Callbacks are synchronous; keep them off the async worker threads.
        drop(self.spawn_blocking(job));
    }
}

// =============================================================================
// Serial Queue
// =============================================================================

/// FIFO execution context backed by one dedicated, named thread.
///
/// Clones share the same thread. The thread exits once every clone has been
/// dropped and the backlog is drained. A panicking job is logged and skipped;
/// later jobs still run.
#[derive(Clone)]
pub struct SerialQueue {
    label: Arc<str>,
    sender: mpsc::UnboundedSender<Job>,
}

impl SerialQueue {
    /// Start a queue whose thread is named `label`.
    pub fn new(label: impl Into<String>) -> Result<Self, StoreError> {
        let label: String = label.into();
        let label: Arc<str> = Arc::from(label);
        let (sender, receiver) = mpsc::unbounded_channel::<Job>();

        let queue_label = label.clone();
        spawn_worker(&label, receiver, move |job: Job| {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(job)) {
                error!(
                    queue = %queue_label,
                    panic = %panic_message(panic.as_ref()),
                    "job panicked on serial queue"
                );
            }
            ControlFlow::Continue(())
        })?;

        debug!(queue = %label, "serial queue started");
        Ok(Self { label, sender })
    }

    /// The queue's label, also used as its thread name.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl ExecutionContext for SerialQueue {
    fn execute(&self, job: Job) {
        if self.sender.send(job).is_err() {
            warn!(queue = %self.label, "serial queue has stopped; job dropped");
        }
    }
}

impl std::fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialQueue")
            .field("label", &self.label)
            .field("running", &!self.sender.is_closed())
            .finish()
    }
}

// =============================================================================
// Worker Threads
// =============================================================================

/// Spawn a named thread that feeds every message from `receiver` to `handler`.
///
/// The loop ends when all senders are gone or the handler breaks. The receiver
/// is dropped on exit, which closes the channel for any remaining senders.
pub(crate) fn spawn_worker<M, F>(
    label: &str,
    mut receiver: mpsc::UnboundedReceiver<M>,
    mut handler: F,
) -> io::Result<ThreadId>
where
    M: Send + 'static,
    F: FnMut(M) -> ControlFlow<()> + Send + 'static,
{
    let worker_label = label.to_owned();
    let handle = thread::Builder::new()
        .name(label.to_owned())
        .spawn(move || {
            while let Some(message) = receiver.blocking_recv() {
                if handler(message).is_break() {
                    break;
                }
            }
            trace!(worker = %worker_label, "worker loop exited");
        })?;

    Ok(handle.thread().id())
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
