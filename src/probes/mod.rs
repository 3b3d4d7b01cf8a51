//! HTTP probes.
//!
//! Each probe deliberately exercises one resource dimension: CPU, memory,
//! I/O latency, a downstream dependency, or the bounded resource pool. The
//! workloads themselves are arbitrary; what matters is that every probe runs
//! through the shared instrumentation pipeline and that the concurrent
//! probes (`parallel-io`, `cascade-failure`, `pool-exhaust`) report
//! per-task outcomes through the fan-out orchestrator.

pub mod cpu;
pub mod downstream;
pub mod healthy;
pub mod io;
pub mod memory;
pub mod pool;

use axum::routing::{get, post};
use axum::Router;

use crate::http::server::AppState;

/// Routes for all probes, nested under `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/fast", get(healthy::fast))
        .route("/ping", get(healthy::ping))
        .route("/cpu-intensive", get(cpu::cpu_intensive))
        .route("/hash", get(cpu::hash))
        .route("/json-processing", get(cpu::json_processing))
        .route("/slow", get(io::slow))
        .route("/random-delay", get(io::random_delay))
        .route("/blocking", get(io::blocking))
        .route("/parallel-io", get(io::parallel_io))
        .route("/call-downstream", get(downstream::call_downstream))
        .route("/cascade-failure", get(downstream::cascade_failure))
        .route("/pool-exhaust", get(pool::pool_exhaust))
        .route("/memory-retain", get(memory::memory_retain))
        .route("/memory-spike", get(memory::memory_spike))
        .route("/memory-clear", post(memory::memory_clear))
}

/// Validate that a probe parameter sits inside its allowed range.
pub(crate) fn check_range<T: PartialOrd + std::fmt::Display>(
    name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<T, crate::http::ApiError> {
    if value < min || value > max {
        return Err(crate::http::ApiError::InvalidParameter(format!(
            "{name} must be within {min}..={max}, got {value}"
        )));
    }
    Ok(value)
}
