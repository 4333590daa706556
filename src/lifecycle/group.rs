//! Run group: concurrent long-lived tasks with tied termination.
//!
//! # Responsibilities
//! - Start every registered task concurrently
//! - Fire the shared stop signal as soon as any task finishes
//! - Wait for all tasks before returning
//! - Report the first failure in completion order
//!
//! # Design Decisions
//! - `run` consumes the group, so tasks cannot be added once it is running
//! - A panicking task is contained and reported as a failure of that task

use std::any::Any;
use std::borrow::Cow;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::task::JoinSet;

use crate::lifecycle::StopSignal;

/// Error type returned by tasks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure reported by [`RunGroup::run`].
#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    /// A task returned an error.
    #[error("task `{task}` failed: {source}")]
    Task {
        task: Cow<'static, str>,
        #[source]
        source: BoxError,
    },

    /// A task panicked.
    #[error("task `{task}` panicked: {message}")]
    Panicked {
        task: Cow<'static, str>,
        message: String,
    },
}

impl GroupError {
    /// Name of the task that produced this error.
    pub fn task(&self) -> &str {
        match self {
            GroupError::Task { task, .. } | GroupError::Panicked { task, .. } => task,
        }
    }
}

type TaskFn = Box<dyn FnOnce(StopSignal) -> BoxFuture<'static, Result<(), BoxError>> + Send>;

/// A named unit of work driven by a [`RunGroup`].
///
/// The task receives the group's stop signal and is expected to return
/// promptly once it fires.
pub struct Task {
    name: Cow<'static, str>,
    run: TaskFn,
}

impl Task {
    /// Create a task from a closure producing its future.
    pub fn new<F, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: FnOnce(StopSignal) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            run: Box::new(move |stop| f(stop).boxed()),
        }
    }

    /// The task's name, used in logs and errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start the task outside a group, with the given stop signal.
    pub fn start(self, stop: StopSignal) -> BoxFuture<'static, Result<(), BoxError>> {
        (self.run)(stop)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Runs a set of tasks until the first one finishes, then stops the rest.
#[derive(Debug, Default)]
pub struct RunGroup {
    tasks: Vec<Task>,
}

enum Outcome {
    Finished(Result<(), BoxError>),
    Panicked(String),
}

impl RunGroup {
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task.
    pub fn add(&mut self, task: Task) {
        self.tasks.push(task);
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if no task is registered.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run all tasks to completion.
    ///
    /// Returns once every task has returned. The result is the first error
    /// observed in completion order, or `Ok(())` if no task failed.
    pub async fn run(self) -> Result<(), GroupError> {
        if self.tasks.is_empty() {
            return Ok(());
        }

        let stop = StopSignal::new();
        let mut running = JoinSet::new();

        for task in self.tasks {
            let name = task.name.clone();
            let fut = task.start(stop.clone());
            running.spawn(async move {
                let outcome = match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(result) => Outcome::Finished(result),
                    Err(panic) => Outcome::Panicked(panic_message(panic.as_ref())),
                };
                (name, outcome)
            });
        }

        let mut first_error = None;

        while let Some(joined) = running.join_next().await {
            // The first task to end, for whatever reason, stops the group.
            stop.fire();

            let error = match joined {
                Ok((name, Outcome::Finished(Ok(())))) => {
                    tracing::debug!(task = %name, "Task finished");
                    None
                }
                Ok((name, Outcome::Finished(Err(source)))) => {
                    tracing::debug!(task = %name, error = %source, "Task failed");
                    Some(GroupError::Task { task: name, source })
                }
                Ok((name, Outcome::Panicked(message))) => {
                    tracing::error!(task = %name, panic = %message, "Task panicked");
                    Some(GroupError::Panicked { task: name, message })
                }
                Err(join_error) => Some(GroupError::Panicked {
                    task: Cow::Borrowed("<unknown>"),
                    message: join_error.to_string(),
                }),
            };

            if first_error.is_none() {
                first_error = error;
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
