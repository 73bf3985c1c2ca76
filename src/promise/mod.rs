//! # Promise
//!
//! Single-settlement asynchronous result with deferred callbacks and a
//! swappable execution context.
//!
//! ## State Machine
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          PROMISE LIFECYCLE                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │                  resolve(v)                                             │
//! │   ┌─────────┐ ─────────────────► ┌──────────────┐                       │
//! │   │ Pending │                    │ Resolved(v)  │  resolve/reject: no-op│
//! │   └─────────┘ ─────────────────► ├──────────────┤                       │
//! │        │         reject(e)       │ Rejected(e)  │  resolve/reject: no-op│
//! │        │                         └──────────────┘                       │
//! │        │ on_success / on_failure         │ on_success / on_failure      │
//! │        ▼                                 ▼                              │
//! │   queued in order,               job handed to the executor             │
//! │   flushed once at settlement     straight away                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Execution Context
//!
//! Callbacks never run on "whatever thread happens to settle" unless the
//! executor says so: every delivery goes through the promise's current
//! [`Executor`]. [`Promise::continue_on`] swaps it, affecting every callback
//! that has not been handed over yet. The default is [`Immediate`].
//!
//! ## Locking
//!
//! State sits behind a `parking_lot::ReentrantMutex`. The inner `RefCell` is
//! only borrowed while the queue is drained, never while callbacks run, so a
//! callback that re-enters the same promise on the settling thread (registers
//! another callback, tries to settle again) cannot deadlock or double-borrow.
//!
//! ## Example
//!
//! ```rust,ignore
//! let (promise, resolver) = Promise::<i64>::pending();
//! promise
//!     .continue_on(main_queue.clone())
//!     .on_success(|v| println!("got {v}"))
//!     .on_failure(|e| eprintln!("failed: {e}"));
//! resolver.resolve(42);
//! ```

mod executor;
mod state;

pub use executor::{
    immediate, Executor, Immediate, Job, Priority, RuntimeExecutor, SerialQueue, SharedExecutor,
};
pub use state::Status;

use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::oneshot;

use crate::error::Error;
use state::{Callback, State};

type Shared<T, E> = Arc<ReentrantMutex<RefCell<State<T, E>>>>;

/// Handle to a single-settlement asynchronous result
///
/// Clones share the same state.
pub struct Promise<T, E = Error> {
    inner: Shared<T, E>,
}

/// Settles the promise it was created with
///
/// Clones share the same promise; the first settlement wins.
pub struct Resolver<T, E = Error> {
    promise: Promise<T, E>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
        }
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    // ========================================================================
    // CONSTRUCTION
    // ========================================================================

    /// A pending promise and the resolver that settles it
    pub fn pending() -> (Self, Resolver<T, E>) {
        let promise = Self {
            inner: Arc::new(ReentrantMutex::new(RefCell::new(State::new(immediate())))),
        };
        let resolver = Resolver {
            promise: promise.clone(),
        };
        (promise, resolver)
    }

    /// Run `work` right away with a resolver
    ///
    /// An `Err` returned by `work` rejects the promise; construction itself
    /// never fails.
    pub fn new<F>(work: F) -> Self
    where
        F: FnOnce(Resolver<T, E>) -> Result<(), E>,
    {
        let (promise, resolver) = Self::pending();
        if let Err(e) = work(resolver.clone()) {
            resolver.reject(e);
        }
        promise
    }

    /// Run `work` on `executor`, rejecting if it returns `Err`
    pub fn scheduled<X, F>(executor: &X, work: F) -> Self
    where
        X: Executor + ?Sized,
        F: FnOnce(Resolver<T, E>) -> Result<(), E> + Send + 'static,
    {
        let (promise, resolver) = Self::pending();
        executor.execute(Box::new(move || {
            if let Err(e) = work(resolver.clone()) {
                resolver.reject(e);
            }
        }));
        promise
    }

    /// An already resolved promise
    pub fn resolved(value: T) -> Self {
        let (promise, resolver) = Self::pending();
        resolver.resolve(value);
        promise
    }

    /// An already rejected promise
    pub fn rejected(error: E) -> Self {
        let (promise, resolver) = Self::pending();
        resolver.reject(error);
        promise
    }

    /// An already settled promise carrying `result`
    pub fn from_result(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Self::resolved(v),
            Err(e) => Self::rejected(e),
        }
    }

    // ========================================================================
    // CALLBACKS
    // ========================================================================

    /// Deliver every callback not yet handed over on `executor`
    pub fn continue_on(self, executor: SharedExecutor) -> Self {
        {
            let guard = self.inner.lock();
            guard.borrow_mut().executor = executor;
        }
        self
    }

    /// Register a success callback
    pub fn on_success<F>(self, callback: F) -> Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.register(|state| state.add_success(Box::new(callback) as Callback<T>));
        self
    }

    /// Register a failure callback
    pub fn on_failure<F>(self, callback: F) -> Self
    where
        F: FnOnce(E) + Send + 'static,
    {
        self.register(|state| state.add_failure(Box::new(callback) as Callback<E>));
        self
    }

    /// Current status
    pub fn status(&self) -> Status {
        let guard = self.inner.lock();
        let status = guard.borrow().status();
        status
    }

    /// Whether the promise has settled
    pub fn is_settled(&self) -> bool {
        self.status() != Status::Pending
    }

    // ========================================================================
    // COMBINATORS
    // ========================================================================

    /// Transform the value once resolved
    pub fn map<U, F>(self, f: F) -> Promise<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let (mapped, resolver) = Promise::pending();
        let on_error = resolver.clone();
        self.on_success(move |v| {
            resolver.resolve(f(v));
        })
        .on_failure(move |e| {
            on_error.reject(e);
        });
        mapped
    }

    /// Transform the error once rejected
    pub fn map_err<E2, F>(self, f: F) -> Promise<T, E2>
    where
        E2: Clone + Send + 'static,
        F: FnOnce(E) -> E2 + Send + 'static,
    {
        let (mapped, resolver) = Promise::pending();
        let on_error = resolver.clone();
        self.on_success(move |v| {
            resolver.resolve(v);
        })
        .on_failure(move |e| {
            on_error.reject(f(e));
        });
        mapped
    }

    // ========================================================================
    // AWAITING
    // ========================================================================

    /// Await the outcome
    ///
    /// If every resolver is dropped while the promise is still pending, this
    /// yields an internal error instead of hanging forever.
    pub async fn wait(self) -> Result<T, E>
    where
        E: From<Error>,
    {
        let (tx, rx) = oneshot::channel::<Result<T, E>>();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let tx_failure = Arc::clone(&tx);

        drop(
            self.on_success(move |v| {
                if let Some(tx) = tx.lock().take() {
                    let _ = tx.send(Ok(v));
                }
            })
            .on_failure(move |e| {
                if let Some(tx) = tx_failure.lock().take() {
                    let _ = tx.send(Err(e));
                }
            }),
        );

        rx.await.unwrap_or_else(|_| Err(abandoned()))
    }

    /// Block the current thread until the outcome is known
    ///
    /// Must not be called on the thread the promise delivers on.
    pub fn wait_blocking(self) -> Result<T, E>
    where
        E: From<Error>,
    {
        let (tx, rx) = std::sync::mpsc::channel::<Result<T, E>>();
        let tx_failure = tx.clone();

        drop(
            self.on_success(move |v| {
                let _ = tx.send(Ok(v));
            })
            .on_failure(move |e| {
                let _ = tx_failure.send(Err(e));
            }),
        );

        rx.recv().unwrap_or_else(|_| Err(abandoned()))
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn register(&self, add: impl FnOnce(&mut State<T, E>) -> Option<Job>) {
        let guard = self.inner.lock();
        let ready = {
            let mut state = guard.borrow_mut();
            add(&mut state).map(|job| (job, Arc::clone(&state.executor)))
        };
        if let Some((job, executor)) = ready {
            executor.execute(job);
        }
    }

    fn settle(&self, apply: impl FnOnce(&mut State<T, E>) -> Option<Vec<Job>>) -> bool {
        let guard = self.inner.lock();
        let drained = {
            let mut state = guard.borrow_mut();
            apply(&mut state).map(|jobs| (jobs, Arc::clone(&state.executor)))
        };
        match drained {
            Some((jobs, executor)) => {
                for job in jobs {
                    executor.execute(job);
                }
                true
            }
            None => false,
        }
    }
}

fn abandoned<E: From<Error>>() -> E {
    E::from(Error::Internal("promise dropped before it settled".into()))
}

impl<T, E> Resolver<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Resolve with `value`. Returns `false` if already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.promise.settle(|state| state.resolve(value))
    }

    /// Reject with `error`. Returns `false` if already settled.
    pub fn reject(&self, error: E) -> bool {
        self.promise.settle(|state| state.reject(error))
    }

    /// Resolve or reject from a `Result`
    pub fn complete(&self, result: Result<T, E>) -> bool {
        match result {
            Ok(v) => self.resolve(v),
            Err(e) => self.reject(e),
        }
    }

    /// Whether the promise has settled
    pub fn is_settled(&self) -> bool {
        self.promise.is_settled()
    }
}

impl<T, E> std::fmt::Debug for Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise").field("status", &self.status()).finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Barrier, Mutex as StdMutex};
    use std::thread;
    use std::time::Duration;

    /// Runs jobs inline and records its tag for every delivery
    struct Tagged {
        tag: &'static str,
        log: Arc<StdMutex<Vec<&'static str>>>,
    }

    impl Executor for Tagged {
        fn execute(&self, job: Job) {
            self.log.lock().unwrap().push(self.tag);
            job()
        }
    }

    fn tagged(tag: &'static str, log: &Arc<StdMutex<Vec<&'static str>>>) -> SharedExecutor {
        Arc::new(Tagged {
            tag,
            log: Arc::clone(log),
        })
    }

    fn collector<A: Send + 'static>() -> (Arc<StdMutex<Vec<A>>>, impl Fn(A) + Send + Clone) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |v| sink.lock().unwrap().push(v))
    }

    #[test]
    fn test_resolved_before_registration_still_delivers() {
        let promise = Promise::<i64>::resolved(7);
        let (seen, push) = collector();
        promise.on_success(push);
        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[test]
    fn test_callbacks_flush_in_registration_order() {
        let (promise, resolver) = Promise::<i64>::pending();
        let (seen, push) = collector();
        let (p1, p2, p3) = (push.clone(), push.clone(), push);
        promise
            .clone()
            .on_success(move |v| p1(v))
            .on_success(move |v| p2(v * 10))
            .on_success(move |v| p3(v * 100));
        assert!(seen.lock().unwrap().is_empty());

        assert!(resolver.resolve(1));
        assert_eq!(*seen.lock().unwrap(), vec![1, 10, 100]);
        assert_eq!(promise.status(), Status::Resolved);
    }

    #[test]
    fn test_settles_only_once() {
        let (promise, resolver) = Promise::<i64>::pending();
        let (values, push_value) = collector();
        let (errors, push_error) = collector::<Error>();
        promise.clone().on_success(push_value).on_failure(push_error);

        assert!(resolver.resolve(1));
        assert!(!resolver.resolve(2));
        assert!(!resolver.reject(Error::Internal("late".into())));

        assert_eq!(*values.lock().unwrap(), vec![1]);
        assert!(errors.lock().unwrap().is_empty());
        assert_eq!(promise.status(), Status::Resolved);
    }

    #[test]
    fn test_reject_then_resolve_keeps_rejection() {
        let (promise, resolver) = Promise::<i64>::pending();
        assert!(resolver.reject(Error::MissingSetup));
        assert!(!resolver.resolve(5));
        assert_eq!(promise.wait_blocking(), Err(Error::MissingSetup));
    }

    #[test]
    fn test_work_error_rejects() {
        let promise = Promise::<i64>::new(|_resolver| Err(Error::bad_argument("x")));
        assert_eq!(promise.status(), Status::Rejected);
        assert_eq!(promise.wait_blocking(), Err(Error::bad_argument("x")));
    }

    #[test]
    fn test_work_may_resolve_later() {
        let promise = Promise::<String>::new(|resolver| {
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                resolver.resolve("done".to_string());
            });
            Ok(())
        });
        assert_eq!(promise.wait_blocking(), Ok("done".to_string()));
    }

    #[test]
    fn test_continue_on_applies_to_pending_callbacks() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let (promise, resolver) = Promise::<i64>::pending();
        let promise = promise.continue_on(tagged("a", &log)).on_success(|_| {});
        let _ = promise.continue_on(tagged("b", &log));
        resolver.resolve(1);
        assert_eq!(*log.lock().unwrap(), vec!["b"]);
    }

    #[test]
    fn test_continue_on_does_not_touch_delivered_callbacks() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let (seen, push) = collector();
        let second = push.clone();

        let promise = Promise::<i64>::resolved(3)
            .continue_on(tagged("a", &log))
            .on_success(push)
            .continue_on(tagged("b", &log))
            .on_success(second);

        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(*seen.lock().unwrap(), vec![3, 3]);
        assert!(promise.is_settled());
    }

    #[test]
    fn test_reentrant_registration_from_callback() {
        let (promise, resolver) = Promise::<i64>::pending();
        let (seen, push) = collector();
        let inner = promise.clone();
        promise.on_success(move |v| {
            // Registering on the same promise from inside delivery must not deadlock
            inner.on_success(move |w| push(v + w));
        });
        resolver.resolve(2);
        assert_eq!(*seen.lock().unwrap(), vec![4]);
    }

    #[test]
    fn test_reentrant_settlement_is_a_noop() {
        let (promise, resolver) = Promise::<i64>::pending();
        let again = resolver.clone();
        let (seen, push) = collector();
        promise.clone().on_success(move |v| {
            assert!(!again.resolve(v + 1));
            push(v);
        });
        resolver.resolve(1);
        assert_eq!(*seen.lock().unwrap(), vec![1]);
        assert_eq!(promise.wait_blocking(), Ok(1));
    }

    #[test]
    fn test_concurrent_settlement_has_one_winner() {
        const THREADS: usize = 16;
        let (promise, resolver) = Promise::<usize>::pending();
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let resolver = resolver.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    resolver.resolve(i)
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert!(promise.wait_blocking().is_ok());
    }

    #[test]
    fn test_scheduled_runs_on_serial_queue() {
        let queue: SharedExecutor = Arc::new(SerialQueue::new("promise-test").unwrap());
        let promise = Promise::<String>::scheduled(&queue, |resolver| {
            let name = thread::current().name().map(str::to_string);
            resolver.resolve(name.unwrap_or_default());
            Ok(())
        });
        assert_eq!(promise.wait_blocking(), Ok("promise-test".to_string()));
    }

    #[test]
    fn test_map_and_map_err() {
        let doubled = Promise::<i64>::resolved(21).map(|v| v * 2);
        assert_eq!(doubled.wait_blocking(), Ok(42));

        let described: Promise<i64, String> =
            Promise::<i64>::rejected(Error::MissingSetup).map_err(|e| e.to_string());
        assert!(described.status() == Status::Rejected);
    }

    #[tokio::test]
    async fn test_wait_resolves() {
        let (promise, resolver) = Promise::<i64>::pending();
        tokio::spawn(async move {
            resolver.resolve(9);
        });
        assert_eq!(promise.wait().await, Ok(9));
    }

    #[tokio::test]
    async fn test_wait_on_abandoned_promise() {
        let (promise, resolver) = Promise::<i64>::pending();
        drop(resolver);
        assert!(matches!(promise.wait().await, Err(Error::Internal(_))));
    }
}
