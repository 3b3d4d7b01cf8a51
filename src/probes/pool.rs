//! Pool-exhaustion probe.
//!
//! Fans out N concurrent acquisitions against the bounded resource pool.
//! When N exceeds pool capacity, excess callers queue; those whose timeout
//! fires first resolve as timed out without aborting the rest. Per-task
//! outcomes are reported in task order.

use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::fanout::{self, TaskOutcome, TaskResult};
use crate::http::pipeline::CorrelationId;
use crate::http::server::AppState;
use crate::http::ApiError;
use crate::probes::check_range;
use crate::resource::AcquireOutcome;

pub const POOL_ACQUISITIONS_TOTAL: &str = "pool_acquisitions_total";

#[derive(Debug, Deserialize)]
pub struct PoolParams {
    #[serde(default = "default_concurrent")]
    pub concurrent: u32,
    #[serde(default = "default_hold_ms")]
    pub hold_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_concurrent() -> u32 {
    10
}

fn default_hold_ms() -> u64 {
    5_000
}

fn default_timeout_ms() -> u64 {
    1_000
}

/// Waiting longer than `timeout_ms` for a unit counts as exhaustion.
#[derive(Debug, thiserror::Error)]
#[error("timed out waiting for a pool unit after {waited_ms}ms")]
struct PoolWaitTimeout {
    waited_ms: u128,
}

pub async fn pool_exhaust(
    State(state): State<AppState>,
    Extension(CorrelationId(request_id)): Extension<CorrelationId>,
    Query(params): Query<PoolParams>,
) -> Result<Json<Value>, ApiError> {
    let concurrent = check_range("concurrent", params.concurrent, 1, 50)?;
    let hold_ms = check_range("hold_ms", params.hold_ms, 0, 30_000)?;
    let timeout_ms = check_range("timeout_ms", params.timeout_ms, 0, 30_000)?;

    let hold = Duration::from_millis(hold_ms);
    let acquire_timeout = Duration::from_millis(timeout_ms);
    // The acquire call enforces the wait timeout itself; the fan-out
    // deadline only has to cover the full wait-plus-hold envelope.
    let task_deadline = acquire_timeout + hold + Duration::from_secs(1);

    let tasks: Vec<_> = (0..concurrent)
        .map(|_| {
            let pool = state.pool.clone();
            let operation = async move {
                match pool.acquire(hold, acquire_timeout).await {
                    AcquireOutcome::Held { waited } => Ok(json!({
                        "status": "held",
                        "waited_ms": waited.as_millis() as u64,
                    })),
                    AcquireOutcome::TimedOut { waited } => Err(PoolWaitTimeout {
                        waited_ms: waited.as_millis(),
                    }),
                }
            };
            (operation, task_deadline)
        })
        .collect();

    let started = Instant::now();
    let results: Vec<TaskResult<Value>> = fanout::run_parallel(tasks).await;
    let duration = started.elapsed();

    let held = results.iter().filter(|r| r.outcome.is_success()).count();
    let timed_out = results
        .iter()
        .filter(|r| matches!(r.outcome, TaskOutcome::Error(_) | TaskOutcome::Timeout))
        .count();

    state
        .metrics
        .increment_counter(POOL_ACQUISITIONS_TOTAL, &[("result", "held")], held as u64);
    state.metrics.increment_counter(
        POOL_ACQUISITIONS_TOTAL,
        &[("result", "timed_out")],
        timed_out as u64,
    );

    tracing::info!(
        request_id = %request_id,
        concurrent,
        held,
        timed_out,
        capacity = state.pool.capacity(),
        "pool exhaustion probe finished"
    );

    Ok(Json(json!({
        "concurrent": concurrent,
        "capacity": state.pool.capacity(),
        "held": held,
        "timed_out": timed_out,
        "duration_seconds": duration.as_secs_f64(),
        "results": results,
    })))
}
