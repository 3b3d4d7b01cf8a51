//! Memory probes.
//!
//! The retained-allocation registry models a memory leak explicitly: every
//! allocation is held in one owned registry with an explicit clear
//! operation, never accumulated behind the caller's back.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::http::server::AppState;
use crate::http::ApiError;
use crate::probes::check_range;

pub const RETAINED_BYTES: &str = "retained_bytes";

const MIB: usize = 1024 * 1024;

/// Registry of deliberately retained allocations.
///
/// Chunk list and byte total live under one mutex, so the count and total
/// always move together regardless of how `retain` and `clear` interleave.
#[derive(Debug, Default)]
pub struct RetainedAllocations {
    inner: Mutex<RetainedInner>,
}

#[derive(Debug, Default)]
struct RetainedInner {
    chunks: Vec<Vec<u8>>,
    total_bytes: usize,
}

impl RetainedAllocations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retain a chunk; returns (allocation count, total retained bytes).
    pub fn retain(&self, chunk: Vec<u8>) -> (usize, usize) {
        let mut inner = self.lock();
        inner.total_bytes += chunk.len();
        inner.chunks.push(chunk);
        (inner.chunks.len(), inner.total_bytes)
    }

    /// Drop everything; returns how many allocations were released.
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let count = inner.chunks.len();
        inner.chunks.clear();
        inner.total_bytes = 0;
        count
    }

    pub fn total_bytes(&self) -> usize {
        self.lock().total_bytes
    }

    fn lock(&self) -> MutexGuard<'_, RetainedInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RetainParams {
    #[serde(default = "default_retain_mb")]
    pub size_mb: usize,
}

fn default_retain_mb() -> usize {
    10
}

/// Allocates and retains memory until an explicit clear.
pub async fn memory_retain(
    State(state): State<AppState>,
    Query(params): Query<RetainParams>,
) -> Result<Json<Value>, ApiError> {
    let size_mb = check_range("size_mb", params.size_mb, 1, 100)?;

    let chunk = vec![0u8; size_mb * MIB];
    let (allocations, total_bytes) = state.retained.retain(chunk);
    state
        .metrics
        .set_gauge(RETAINED_BYTES, &[], total_bytes as i64);

    Ok(Json(json!({
        "allocated_mb": size_mb,
        "total_allocations": allocations,
        "total_retained_bytes": total_bytes,
        "warning": "memory is retained until POST /api/memory-clear",
    })))
}

#[derive(Debug, Deserialize)]
pub struct SpikeParams {
    #[serde(default = "default_spike_mb")]
    pub size_mb: usize,
}

fn default_spike_mb() -> usize {
    50
}

/// Allocates a transient chunk, holds it briefly, then frees it.
pub async fn memory_spike(Query(params): Query<SpikeParams>) -> Result<Json<Value>, ApiError> {
    let size_mb = check_range("size_mb", params.size_mb, 1, 500)?;

    let started = Instant::now();
    let chunk = vec![0u8; size_mb * MIB];
    tokio::time::sleep(Duration::from_secs(1)).await;
    drop(chunk);
    let duration = started.elapsed();

    Ok(Json(json!({
        "allocated_mb": size_mb,
        "duration_seconds": duration.as_secs_f64(),
        "note": "memory was freed when the handler returned",
    })))
}

/// Clears the retained-allocation registry.
pub async fn memory_clear(State(state): State<AppState>) -> Json<Value> {
    let cleared = state.retained.clear();
    state.metrics.set_gauge(RETAINED_BYTES, &[], 0);

    Json(json!({
        "cleared_allocations": cleared,
        "status": "memory cleared",
    }))
}
