//! Downstream-dependency probes.
//!
//! `call-downstream` surfaces a single call's raw outcome: 504 on timeout,
//! 502 on any other downstream failure. `cascade-failure` fans out several
//! calls and reports each one's outcome without letting a failing call
//! cancel its siblings.

use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::fanout::{self, TaskResult};
use crate::http::server::AppState;
use crate::http::ApiError;
use crate::probes::check_range;

pub const DOWNSTREAM_CALLS_TOTAL: &str = "downstream_calls_total";

const CASCADE_CALLS: usize = 5;
const CASCADE_CALL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
pub struct CallParams {
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_timeout() -> u64 {
    5
}

/// Calls the downstream service once with a configurable timeout.
pub async fn call_downstream(
    State(state): State<AppState>,
    Query(params): Query<CallParams>,
) -> Result<Json<Value>, ApiError> {
    let timeout = check_range("timeout", params.timeout, 1, 60)?;
    let delay = state.downstream.slow_call_delay_secs().to_string();

    let started = Instant::now();
    let result = state
        .downstream
        .call(
            "/slow",
            &[("delay", delay.as_str())],
            Duration::from_secs(timeout),
        )
        .await;
    let duration = started.elapsed();

    match result {
        Ok(payload) => {
            state
                .metrics
                .increment_counter(DOWNSTREAM_CALLS_TOTAL, &[("result", "success")], 1);
            Ok(Json(json!({
                "status": "success",
                "downstream_response": payload,
                "duration_seconds": duration.as_secs_f64(),
                "timeout_configured": timeout,
            })))
        }
        Err(error) => {
            let result_label = if error.is_timeout() { "timeout" } else { "error" };
            state
                .metrics
                .increment_counter(DOWNSTREAM_CALLS_TOTAL, &[("result", result_label)], 1);
            tracing::warn!(
                error = %error,
                duration_secs = duration.as_secs_f64(),
                "downstream call failed"
            );
            Err(error.into())
        }
    }
}

/// Fans out several downstream calls in parallel and reports per-call
/// outcomes. Always returns 200; failures live inside the result list.
pub async fn cascade_failure(State(state): State<AppState>) -> Json<Value> {
    let delay = state.downstream.slow_call_delay_secs().to_string();

    // The fan-out deadline is the authoritative per-call timeout so a slow
    // call resolves as Timeout, not Error; the client's own deadline sits
    // above it as a backstop.
    let tasks: Vec<_> = (0..CASCADE_CALLS)
        .map(|_| {
            let client = state.downstream.clone();
            let delay = delay.clone();
            let operation = async move {
                client
                    .call(
                        "/slow",
                        &[("delay", delay.as_str())],
                        CASCADE_CALL_TIMEOUT + Duration::from_secs(1),
                    )
                    .await
            };
            (operation, CASCADE_CALL_TIMEOUT)
        })
        .collect();

    let started = Instant::now();
    let results: Vec<TaskResult<Value>> = fanout::run_parallel(tasks).await;
    let duration = started.elapsed();

    for result in &results {
        let label = if result.outcome.is_success() {
            "success"
        } else if result.outcome.is_timeout() {
            "timeout"
        } else {
            "error"
        };
        state
            .metrics
            .increment_counter(DOWNSTREAM_CALLS_TOTAL, &[("result", label)], 1);
    }

    Json(json!({
        "total_calls": CASCADE_CALLS,
        "duration_seconds": duration.as_secs_f64(),
        "results": results,
    }))
}
