//! Shared settlement state behind a promise handle.

use super::executor::{Job, SharedExecutor};

/// Queued callback receiving a settled value
pub(crate) type Callback<A> = Box<dyn FnOnce(A) + Send + 'static>;

/// Observable state of a promise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Not settled yet
    Pending,
    /// Settled with a value
    Resolved,
    /// Settled with an error
    Rejected,
}

pub(crate) enum Outcome<T, E> {
    Pending,
    Resolved(T),
    Rejected(E),
}

pub(crate) struct State<T, E> {
    pub(crate) outcome: Outcome<T, E>,
    pub(crate) executor: SharedExecutor,
    success: Vec<Callback<T>>,
    failure: Vec<Callback<E>>,
}

impl<T, E> State<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub(crate) fn new(executor: SharedExecutor) -> Self {
        Self {
            outcome: Outcome::Pending,
            executor,
            success: Vec::new(),
            failure: Vec::new(),
        }
    }

    pub(crate) fn status(&self) -> Status {
        match self.outcome {
            Outcome::Pending => Status::Pending,
            Outcome::Resolved(_) => Status::Resolved,
            Outcome::Rejected(_) => Status::Rejected,
        }
    }

    /// Settle with a value and drain the success queue into jobs.
    ///
    /// Returns `None` if already settled.
    pub(crate) fn resolve(&mut self, value: T) -> Option<Vec<Job>> {
        if !matches!(self.outcome, Outcome::Pending) {
            return None;
        }
        self.failure.clear();
        let jobs = bind(std::mem::take(&mut self.success), &value);
        self.outcome = Outcome::Resolved(value);
        Some(jobs)
    }

    /// Settle with an error and drain the failure queue into jobs.
    pub(crate) fn reject(&mut self, error: E) -> Option<Vec<Job>> {
        if !matches!(self.outcome, Outcome::Pending) {
            return None;
        }
        self.success.clear();
        let jobs = bind(std::mem::take(&mut self.failure), &error);
        self.outcome = Outcome::Rejected(error);
        Some(jobs)
    }

    /// Queue a success callback, or turn it into a job if already resolved.
    pub(crate) fn add_success(&mut self, callback: Callback<T>) -> Option<Job> {
        match &self.outcome {
            Outcome::Pending => {
                self.success.push(callback);
                None
            }
            Outcome::Resolved(value) => {
                let value = value.clone();
                Some(Box::new(move || callback(value)))
            }
            // Never fires
            Outcome::Rejected(_) => None,
        }
    }

    /// Queue a failure callback, or turn it into a job if already rejected.
    pub(crate) fn add_failure(&mut self, callback: Callback<E>) -> Option<Job> {
        match &self.outcome {
            Outcome::Pending => {
                self.failure.push(callback);
                None
            }
            Outcome::Rejected(error) => {
                let error = error.clone();
                Some(Box::new(move || callback(error)))
            }
            Outcome::Resolved(_) => None,
        }
    }
}

fn bind<A: Clone + Send + 'static>(callbacks: Vec<Callback<A>>, arg: &A) -> Vec<Job> {
    callbacks
        .into_iter()
        .map(|callback| {
            let arg = arg.clone();
            Box::new(move || callback(arg)) as Job
        })
        .collect()
}
