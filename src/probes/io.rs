//! I/O-latency probes.
//!
//! Delays are cooperative sleeps: they suspend the request's task without
//! tying up a worker thread.

use std::convert::Infallible;
use std::time::{Duration, Instant};

use axum::extract::Query;
use axum::Json;
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::fanout;
use crate::http::ApiError;
use crate::probes::check_range;

/// Ceiling for one simulated parallel I/O task.
const PARALLEL_IO_TASK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
pub struct SlowParams {
    #[serde(default = "default_delay")]
    pub delay: u64,
}

fn default_delay() -> u64 {
    5
}

/// Sleeps for the requested number of seconds.
pub async fn slow(Query(params): Query<SlowParams>) -> Result<Json<Value>, ApiError> {
    let delay = check_range("delay", params.delay, 1, 30)?;

    let started = Instant::now();
    tokio::time::sleep(Duration::from_secs(delay)).await;
    let duration = started.elapsed();

    Ok(Json(json!({
        "status": "completed",
        "requested_delay": delay,
        "actual_duration": duration.as_secs_f64(),
    })))
}

/// Sleeps for a uniformly random 0.5–5 s to simulate unpredictable I/O.
pub async fn random_delay() -> Json<Value> {
    let delay = rand::thread_rng().gen_range(0.5..5.0);
    tokio::time::sleep(Duration::from_secs_f64(delay)).await;

    Json(json!({
        "status": "completed",
        "delay_seconds": delay,
    }))
}

#[derive(Debug, Deserialize)]
pub struct BlockingParams {
    #[serde(default = "default_blocking_duration")]
    pub duration: u64,
}

fn default_blocking_duration() -> u64 {
    5
}

/// Synchronous sleep directly on the handler path.
///
/// Unlike the cooperative probes this deliberately parks an async worker
/// thread for the whole duration, demonstrating runtime starvation.
pub async fn blocking(Query(params): Query<BlockingParams>) -> Result<Json<Value>, ApiError> {
    let duration = check_range("duration", params.duration, 1, 30)?;

    std::thread::sleep(Duration::from_secs(duration));

    Ok(Json(json!({
        "status": "completed",
        "blocked_for": duration,
        "warning": "this endpoint blocks a worker thread",
    })))
}

#[derive(Debug, Deserialize)]
pub struct ParallelIoParams {
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    5
}

/// Fans out `count` simulated I/O tasks and joins on all of them.
pub async fn parallel_io(Query(params): Query<ParallelIoParams>) -> Result<Json<Value>, ApiError> {
    let count = check_range("count", params.count, 1, 20)?;

    // ThreadRng is !Send, so pick the delays before the first await.
    let tasks: Vec<_> = {
        let mut rng = rand::thread_rng();
        (0..count)
            .map(|task_id| {
                let delay = rng.gen_range(0.5..2.0);
                let operation = async move {
                    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                    Ok::<Value, Infallible>(json!({ "task_id": task_id, "delay": delay }))
                };
                (operation, PARALLEL_IO_TASK_TIMEOUT)
            })
            .collect()
    };

    let started = Instant::now();
    let results = fanout::run_parallel(tasks).await;
    let duration = started.elapsed();

    Ok(Json(json!({
        "total_tasks": count,
        "total_duration": duration.as_secs_f64(),
        "results": results,
    })))
}
