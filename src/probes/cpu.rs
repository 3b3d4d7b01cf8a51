//! CPU-bound probes.
//!
//! All three workloads run on the blocking thread pool so they never stall
//! the async workers handling other requests.

use std::time::Instant;

use axum::extract::Query;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::http::ApiError;
use crate::probes::check_range;

/// Recursive Fibonacci, intentionally inefficient.
fn fibonacci(n: u32) -> u64 {
    if n <= 1 {
        return u64::from(n);
    }
    fibonacci(n - 1) + fibonacci(n - 2)
}

/// Chained SHA-256 hashing.
fn hash_chain(iterations: u32) -> String {
    let mut result = String::from("start");
    for _ in 0..iterations {
        result = hex::encode(Sha256::digest(result.as_bytes()));
    }
    result
}

#[derive(Debug, Deserialize)]
pub struct CpuParams {
    #[serde(default = "default_complexity")]
    pub complexity: u32,
}

fn default_complexity() -> u32 {
    30
}

/// CPU-bound probe: Fibonacci calculation.
pub async fn cpu_intensive(Query(params): Query<CpuParams>) -> Result<Json<Value>, ApiError> {
    let complexity = check_range("complexity", params.complexity, 1, 40)?;

    let started = Instant::now();
    let result = tokio::task::spawn_blocking(move || fibonacci(complexity)).await?;
    let duration = started.elapsed();

    Ok(Json(json!({
        "result": result,
        "complexity": complexity,
        "duration_seconds": duration.as_secs_f64(),
        "warning": "this endpoint is intentionally CPU-intensive",
    })))
}

#[derive(Debug, Deserialize)]
pub struct HashParams {
    #[serde(default = "default_iterations")]
    pub iterations: u32,
}

fn default_iterations() -> u32 {
    10_000
}

/// CPU-bound probe: chained hashing.
pub async fn hash(Query(params): Query<HashParams>) -> Result<Json<Value>, ApiError> {
    let iterations = check_range("iterations", params.iterations, 1, 100_000)?;

    let started = Instant::now();
    let digest = tokio::task::spawn_blocking(move || hash_chain(iterations)).await?;
    let duration = started.elapsed();

    Ok(Json(json!({
        "hash": digest,
        "iterations": iterations,
        "duration_seconds": duration.as_secs_f64(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct JsonParams {
    #[serde(default = "default_size")]
    pub size: u32,
}

fn default_size() -> u32 {
    100
}

/// CPU-bound probe: JSON serialization round trips over a nested structure.
pub async fn json_processing(Query(params): Query<JsonParams>) -> Result<Json<Value>, ApiError> {
    let size = check_range("size", params.size, 1, 1_000)?;

    let started = Instant::now();
    let serialized_len = tokio::task::spawn_blocking(move || -> Result<usize, serde_json::Error> {
        let mut data = Map::new();
        for i in 0..size {
            let mut nested = Map::new();
            for j in 0..size {
                nested.insert(format!("nested_{j}"), Value::String(format!("value_{i}_{j}")));
            }
            data.insert(format!("key_{i}"), Value::Object(nested));
        }
        let mut value = Value::Object(data);
        let mut serialized = String::new();
        for _ in 0..5 {
            serialized = serde_json::to_string(&value)?;
            value = serde_json::from_str(&serialized)?;
        }
        Ok(serialized.len())
    })
    .await?
    .map_err(|e| ApiError::Internal(format!("JSON round trip failed: {e}")))?;
    let duration = started.elapsed();

    Ok(Json(json!({
        "processed_items": u64::from(size) * u64::from(size),
        "duration_seconds": duration.as_secs_f64(),
        "data_size_bytes": serialized_len,
    })))
}
