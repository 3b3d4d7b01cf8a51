//! Fan-out orchestration.
//!
//! Runs a batch of independent operations concurrently, each with its own
//! timeout, and joins on all of them. One task failing or timing out never
//! cancels its siblings, and no failure silently vanishes: every task
//! resolves to an explicit outcome, reported in original task order.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;

/// Discriminated result of one fan-out task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum TaskOutcome<T> {
    Success(T),
    Timeout,
    Error(String),
}

impl<T> TaskOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TaskOutcome::Timeout)
    }
}

/// Outcome of one task, tagged with its position in the original batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskResult<T> {
    pub task_id: usize,
    #[serde(flatten)]
    pub outcome: TaskOutcome<T>,
}

/// Run every task concurrently and wait for all of them to resolve.
///
/// Each task gets an independent deadline. The returned vector has the same
/// length and order as the input; `task_id` always equals the input index
/// regardless of completion order. An empty batch yields an empty vector.
///
/// Tasks are spawned, so a panicking task is isolated by the runtime and
/// surfaces as [`TaskOutcome::Error`] rather than unwinding into the caller.
pub async fn run_parallel<T, E, F>(tasks: Vec<(F, Duration)>) -> Vec<TaskResult<T>>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    let handles: Vec<_> = tasks
        .into_iter()
        .map(|(operation, deadline)| {
            tokio::spawn(async move {
                match tokio::time::timeout(deadline, operation).await {
                    Ok(Ok(value)) => TaskOutcome::Success(value),
                    Ok(Err(error)) => TaskOutcome::Error(error.to_string()),
                    Err(_) => TaskOutcome::Timeout,
                }
            })
        })
        .collect();

    futures_util::future::join_all(handles)
        .await
        .into_iter()
        .enumerate()
        .map(|(task_id, joined)| TaskResult {
            task_id,
            outcome: match joined {
                Ok(outcome) => outcome,
                Err(join_error) => TaskOutcome::Error(format!("task aborted: {join_error}")),
            },
        })
        .collect()
}
