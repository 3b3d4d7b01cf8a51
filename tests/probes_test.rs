//! Probe behavior through the full HTTP stack.

use std::time::{Duration, Instant};

use loadlab::ServiceConfig;
use serde_json::Value;

mod common;

#[tokio::test]
async fn fast_probe_returns_instrumentation_headers() {
    let (base, state, shutdown) = common::start_service(ServiceConfig::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{base}/api/fast"))
        .send()
        .await
        .expect("service unreachable");

    assert_eq!(response.status(), 200);
    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("missing x-request-id")
        .to_str()
        .unwrap()
        .to_owned();
    assert!(uuid::Uuid::parse_str(&request_id).is_ok());
    let process_time: f64 = response
        .headers()
        .get("x-process-time")
        .expect("missing x-process-time")
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(process_time >= 0.0);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "success");

    assert_eq!(state.tracker.active(), 0);
    assert_eq!(
        state.metrics.counter_value(
            "http_requests_total",
            &[("method", "GET"), ("path", "/api/fast"), ("outcome", "success")]
        ),
        1
    );

    shutdown.trigger();
}

#[tokio::test]
async fn hash_probe_returns_a_digest() {
    let (base, _state, shutdown) = common::start_service(ServiceConfig::default()).await;

    let body: Value = reqwest::get(format!("{base}/api/hash?iterations=10"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["iterations"], 10);
    assert_eq!(body["hash"].as_str().unwrap().len(), 64);

    shutdown.trigger();
}

#[tokio::test]
async fn json_processing_probe_round_trips() {
    let (base, _state, shutdown) = common::start_service(ServiceConfig::default()).await;

    let body: Value = reqwest::get(format!("{base}/api/json-processing?size=5"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["processed_items"], 25);
    assert!(body["data_size_bytes"].as_u64().unwrap() > 0);

    shutdown.trigger();
}

#[tokio::test]
async fn blocking_probe_parks_a_thread_for_the_full_duration() {
    let (base, _state, shutdown) = common::start_service(ServiceConfig::default()).await;

    let started = Instant::now();
    let body: Value = reqwest::get(format!("{base}/api/blocking?duration=1"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["blocked_for"], 1);
    assert!(started.elapsed() >= Duration::from_secs(1));

    shutdown.trigger();
}

#[tokio::test]
async fn out_of_range_parameter_returns_400_with_error_body() {
    let (base, state, shutdown) = common::start_service(ServiceConfig::default()).await;

    let response = reqwest::get(format!("{base}/api/slow?delay=9999"))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("delay"));

    assert_eq!(
        state.metrics.counter_value(
            "http_requests_total",
            &[("method", "GET"), ("path", "/api/slow"), ("outcome", "client_error")]
        ),
        1
    );

    shutdown.trigger();
}

#[tokio::test]
async fn memory_retain_and_clear_round_trip() {
    let (base, state, shutdown) = common::start_service(ServiceConfig::default()).await;
    let client = reqwest::Client::new();

    for expected in 1..=2 {
        let body: Value = client
            .get(format!("{base}/api/memory-retain?size_mb=1"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["total_allocations"], expected);
    }
    assert_eq!(state.metrics.gauge_value("retained_bytes", &[]), 2 * 1024 * 1024);

    let body: Value = client
        .post(format!("{base}/api/memory-clear"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["cleared_allocations"], 2);
    assert_eq!(state.metrics.gauge_value("retained_bytes", &[]), 0);

    shutdown.trigger();
}

#[tokio::test]
async fn metrics_endpoint_serves_the_exposition_format() {
    let (base, _state, shutdown) = common::start_service(ServiceConfig::default()).await;

    let _ = reqwest::get(format!("{base}/api/ping")).await.unwrap();
    let response = reqwest::get(format!("{base}/metrics")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/plain"));

    let text = response.text().await.unwrap();
    assert!(text.contains("# TYPE http_requests_total counter"));
    assert!(text.contains("path=\"/api/ping\""));
    assert!(text.contains("# TYPE http_request_duration_seconds histogram"));

    shutdown.trigger();
}
