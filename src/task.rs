//! Director background tasks and the polling loop that waits for them.
//!
//! Long-running director operations (cleanup, deploys, ...) follow the same
//! pattern:
//!
//! 1. **POST** the operation. The director answers `302 Found` with
//!    `Location: /tasks/{id}` (some versions answer `2xx` with the task body).
//! 2. **Poll** `GET /tasks/{id}` until the state is terminal: `done` on
//!    success; `error`, `cancelled` or `timeout` on failure.
//! 3. **Fetch** the result payload from `GET /tasks/{id}/output?type=result`.
//!
//! [`TaskClientRequest`] runs all three steps behind [`AsyncOp::post_result`].
//! The wait is bounded by [`PollConfig::timeout`] and can be cut short by a
//! caller-supplied `CancellationToken`. Failed tasks are reported, never
//! retried.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep_until, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{DirectorError, Result, ResultExt};
use crate::request::{ClientRequest, RawResponse, SyncOp, cancelled, ensure_success};

// ── Task types ───────────────────────────────────────────────────────

/// Lifecycle state of a director task.
///
///   queued → processing → done | error | cancelled | timeout
///
/// `cancelling` is a transitional state after a cancel request. `Unknown`
/// absorbs states added by newer directors and is treated as non-terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Accepted, waiting for a worker.
    Queued,
    /// A worker is running the task.
    Processing,
    /// Cancellation was requested and is in progress.
    Cancelling,
    /// Finished successfully.
    Done,
    /// Finished with an error.
    Error,
    /// Cancelled before completion.
    Cancelled,
    /// Timed out on the director side.
    Timeout,
    /// Any state this client does not know about.
    #[serde(other)]
    Unknown,
}

impl TaskState {
    /// Whether the task will not change state any more.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Done | TaskState::Error | TaskState::Cancelled | TaskState::Timeout
        )
    }

    /// The state name as the director spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Processing => "processing",
            TaskState::Cancelling => "cancelling",
            TaskState::Done => "done",
            TaskState::Error => "error",
            TaskState::Cancelled => "cancelled",
            TaskState::Timeout => "timeout",
            TaskState::Unknown => "unknown",
        }
    }
}

/// A director task as returned by `GET /tasks/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    /// Director-assigned task id.
    pub id: u64,
    /// Current lifecycle state.
    pub state: TaskState,
    /// Human-readable description, e.g. `"clean up"`.
    #[serde(default)]
    pub description: Option<String>,
    /// Short result text. On failure this is the director's error message.
    #[serde(default)]
    pub result: Option<String>,
    /// Unix timestamp of the last state change.
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// User that started the task.
    #[serde(default)]
    pub user: Option<String>,
    /// Correlation id the task was started with, if any.
    #[serde(default)]
    pub context_id: Option<String>,
}

// ── Polling configuration ────────────────────────────────────────────

/// Floor applied to [`PollConfig::interval`] so a zero interval cannot turn
/// the wait into a busy loop against the director.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Controls how long and how often a task is polled.
///
/// Defaults: a 1 second interval, and a 10 minute ceiling so a director
/// that never finishes a task cannot block the caller forever.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between consecutive status requests.
    pub interval: Duration,
    /// Maximum total time to wait, measured from the first status request.
    pub timeout: Duration,
}

impl PollConfig {
    /// Creates a `PollConfig` with the given interval and timeout.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        PollConfig { interval, timeout }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(600),
        }
    }
}

// ── Async operations ─────────────────────────────────────────────────

/// Operations the director runs as a background task.
#[async_trait]
pub trait AsyncOp: Clone + Send + Sync {
    /// A copy of `self` that tags every request with the correlation id `id`.
    fn with_context(&self, id: &str) -> Self;

    /// POSTs `body` to `path`, waits for the resulting task to finish and
    /// returns its result payload.
    ///
    /// # Errors
    ///
    /// - `DirectorError::Task` — the task ended in `error`, `cancelled` or `timeout`.
    /// - `DirectorError::TaskTimeout` — the poll deadline expired first.
    /// - `DirectorError::Cancelled` — `cancel` fired first.
    /// - `DirectorError::Endpoint` / `Transport` / `Decode` — a request failed.
    async fn post_result(
        &self,
        path: &str,
        body: Bytes,
        headers: &HeaderMap,
        cancel: Option<&CancellationToken>,
    ) -> Result<Bytes>;
}

/// Task-following executor built on a [`ClientRequest`].
#[derive(Debug, Clone)]
pub struct TaskClientRequest {
    request: ClientRequest,
    poll: PollConfig,
}

impl TaskClientRequest {
    /// Creates a task executor sharing `request`'s transport and scope.
    pub fn new(request: ClientRequest, poll: PollConfig) -> Self {
        TaskClientRequest { request, poll }
    }

    /// The polling settings in effect.
    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    /// A copy of `self` with different polling settings.
    pub fn with_poll_config(&self, poll: PollConfig) -> Self {
        TaskClientRequest {
            request: self.request.clone(),
            poll,
        }
    }

    /// The correlation id attached to requests, if scoped.
    pub fn context_id(&self) -> Option<&str> {
        self.request.context_id()
    }

    /// Polls `GET /tasks/{task_id}` until the task is terminal.
    ///
    /// Returns the task on `done`. The first status request is sent
    /// immediately; later ones are spaced by [`PollConfig::interval`], never
    /// closer than [`MIN_POLL_INTERVAL`]. [`PollConfig::timeout`] bounds the
    /// whole wait, including a status request that is still in flight.
    pub async fn wait_for_task(
        &self,
        task_id: u64,
        cancel: Option<&CancellationToken>,
    ) -> Result<Task> {
        let poll_path = format!("/tasks/{task_id}");
        let interval = self.poll.interval.max(MIN_POLL_INTERVAL);
        let started = Instant::now();
        let deadline = started + self.poll.timeout;
        let cancelled_err = || DirectorError::Cancelled {
            operation: format!("waiting for task {task_id}"),
        };
        let timed_out = || {
            warn!(
                task_id,
                timeout_ms = self.poll.timeout.as_millis() as u64,
                "task polling timed out"
            );
            DirectorError::TaskTimeout {
                task_id,
                elapsed: started.elapsed(),
            }
        };

        loop {
            let task: Task = tokio::select! {
                _ = cancelled(cancel) => return Err(cancelled_err()),
                task = timeout_at(deadline, self.request.get::<Task>(&poll_path)) => match task {
                    Ok(task) => task?,
                    Err(_) => return Err(timed_out()),
                },
            };

            match task.state {
                TaskState::Done => {
                    info!(
                        task_id,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "task done"
                    );
                    return Ok(task);
                }
                TaskState::Error | TaskState::Cancelled | TaskState::Timeout => {
                    warn!(task_id, state = task.state.as_str(), "task failed");
                    return Err(DirectorError::Task {
                        task_id,
                        state: task.state.as_str().to_string(),
                        result: task.result.unwrap_or_default(),
                    });
                }
                TaskState::Queued
                | TaskState::Processing
                | TaskState::Cancelling
                | TaskState::Unknown => {}
            }

            // No point sleeping through the deadline only to poll once more.
            if Instant::now() + interval > deadline {
                return Err(timed_out());
            }

            tokio::select! {
                _ = cancelled(cancel) => return Err(cancelled_err()),
                _ = sleep_until(Instant::now() + interval) => {}
            }
        }
    }

    /// Fetches the result payload of a finished task.
    pub async fn task_result(&self, task_id: u64) -> Result<Bytes> {
        let path = format!("/tasks/{task_id}/output?type=result");
        let resp = self.request.raw_get(&path, &HeaderMap::new()).await?;
        Ok(resp.body)
    }
}

#[async_trait]
impl AsyncOp for TaskClientRequest {
    fn with_context(&self, id: &str) -> Self {
        TaskClientRequest {
            request: self.request.with_context(id),
            poll: self.poll.clone(),
        }
    }

    async fn post_result(
        &self,
        path: &str,
        body: Bytes,
        headers: &HeaderMap,
        cancel: Option<&CancellationToken>,
    ) -> Result<Bytes> {
        let resp = self
            .request
            .execute(Method::POST, path, Some(body), headers)
            .await?;
        let task_id = task_id_from_submission(resp, path)?;
        info!(task_id, path, context_id = self.context_id(), "task submitted");

        self.wait_for_task(task_id, cancel)
            .await
            .wrap_with(|| format!("Waiting for task {task_id}"))?;
        self.task_result(task_id)
            .await
            .wrap_with(|| format!("Fetching result of task {task_id}"))
    }
}

/// Extracts the task id from the director's answer to a task submission.
fn task_id_from_submission(resp: RawResponse, path: &str) -> Result<u64> {
    let redirect = matches!(
        resp.status,
        StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::MOVED_PERMANENTLY
            | StatusCode::TEMPORARY_REDIRECT
    );
    if redirect {
        let location = resp
            .headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        return task_id_from_location(location).ok_or_else(|| DirectorError::Endpoint {
            status: resp.status,
            path: path.to_string(),
            body: format!("redirect location '{location}' does not name a task"),
        });
    }

    let resp = ensure_success(resp, path)?;
    let task: Task =
        serde_json::from_slice(&resp.body).map_err(|source| DirectorError::Decode {
            path: path.to_string(),
            source,
        })?;
    Ok(task.id)
}

/// Parses `.../tasks/{id}` (absolute or relative, query ignored).
fn task_id_from_location(location: &str) -> Option<u64> {
    let path = location.split('?').next()?;
    let mut segments = path.trim_end_matches('/').rsplit('/');
    let id = segments.next()?;
    if segments.next()? != "tasks" {
        return None;
    }
    id.parse().ok()
}
