//! Execution contexts for promise callbacks.
//!
//! ```text
//! ┌────────────────────┬──────────────────────────────────────────────┐
//! │ Immediate          │ runs the job inline on the calling thread    │
//! │ SerialQueue        │ one named thread, jobs run in FIFO order     │
//! │                    │ (stands in for the host's main/UI queue)     │
//! │ RuntimeExecutor    │ tokio runtime, by priority class:            │
//! │                    │   UserInteractive/UserInitiated/Default      │
//! │                    │     → spawn                                  │
//! │                    │   Utility/Background → spawn_blocking        │
//! └────────────────────┴──────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::thread::{self, ThreadId};

use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// A unit of work handed to an executor
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Strategy deciding where a callback runs
pub trait Executor: Send + Sync {
    /// Run or schedule the job
    fn execute(&self, job: Job);
}

/// Shared executor handle
pub type SharedExecutor = Arc<dyn Executor>;

impl<X: Executor + ?Sized> Executor for Arc<X> {
    fn execute(&self, job: Job) {
        (**self).execute(job)
    }
}

// ============================================================================
// IMMEDIATE
// ============================================================================

/// Runs jobs synchronously on whichever thread hands them over
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl Executor for Immediate {
    fn execute(&self, job: Job) {
        job()
    }
}

/// The default executor used by new promises
pub fn immediate() -> SharedExecutor {
    Arc::new(Immediate)
}

// ============================================================================
// SERIAL QUEUE
// ============================================================================

/// A dedicated thread draining jobs in submission order
///
/// The thread exits once the queue is dropped and every pending job ran.
pub struct SerialQueue {
    name: String,
    sender: mpsc::UnboundedSender<Job>,
    thread_id: ThreadId,
}

impl SerialQueue {
    /// Spawn the queue thread
    pub fn new(name: impl Into<String>) -> std::io::Result<Self> {
        let name = name.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            while let Some(job) = receiver.blocking_recv() {
                job();
            }
        })?;

        tracing::debug!(queue = %name, "Serial queue started");
        Ok(Self {
            thread_id: handle.thread().id(),
            name,
            sender,
        })
    }

    /// Queue name (also the thread name)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the caller is running on this queue's thread
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

impl Executor for SerialQueue {
    fn execute(&self, job: Job) {
        if self.sender.send(job).is_err() {
            tracing::warn!(queue = %self.name, "Serial queue is gone, dropping job");
        }
    }
}

impl std::fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialQueue").field("name", &self.name).finish()
    }
}

// ============================================================================
// RUNTIME EXECUTOR
// ============================================================================

/// Background priority classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    /// Work the user is waiting on right now
    UserInteractive,
    /// Work the user started and expects soon
    UserInitiated,
    /// No particular urgency
    #[default]
    Default,
    /// Long-running work the user is aware of
    Utility,
    /// Maintenance work nobody waits on
    Background,
}

impl Priority {
    /// Whether jobs of this class may block a worker thread
    fn is_blocking_class(&self) -> bool {
        matches!(self, Priority::Utility | Priority::Background)
    }
}

/// Runs jobs on a tokio runtime
#[derive(Debug, Clone)]
pub struct RuntimeExecutor {
    handle: Handle,
    priority: Priority,
}

impl RuntimeExecutor {
    /// Executor on the given runtime
    pub fn new(handle: Handle, priority: Priority) -> Self {
        Self { handle, priority }
    }

    /// Executor on the runtime the caller is running in, if any
    pub fn current(priority: Priority) -> Option<Self> {
        Handle::try_current().ok().map(|handle| Self::new(handle, priority))
    }

    /// Priority class of this executor
    pub fn priority(&self) -> Priority {
        self.priority
    }
}

impl Executor for RuntimeExecutor {
    fn execute(&self, job: Job) {
        if self.priority.is_blocking_class() {
            self.handle.spawn_blocking(job);
        } else {
            self.handle.spawn(async move { job() });
        }
    }
}
