//! Concurrency behavior: pipeline accounting under load and pool exhaustion.

use std::time::{Duration, Instant};

use loadlab::ServiceConfig;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

mod common;

#[tokio::test]
async fn concurrent_requests_settle_with_exact_counts() {
    let (base, state, shutdown) = common::start_service(ServiceConfig::default()).await;
    let client = reqwest::Client::new();

    let total = 20;
    let mut handles = Vec::new();
    for _ in 0..total {
        let client = client.clone();
        let url = format!("{base}/api/fast");
        handles.push(tokio::spawn(async move {
            client.get(url).send().await.unwrap().status()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), 200);
    }

    // Gauge back to zero, counter sum equals exactly the request count.
    assert_eq!(state.tracker.active(), 0);
    assert_eq!(state.metrics.counter_family_sum("http_requests_total"), total);

    shutdown.trigger();
}

#[tokio::test]
async fn client_disconnect_still_finalizes_the_request() {
    let (base, state, shutdown) = common::start_service(ServiceConfig::default()).await;
    let addr = base.trim_start_matches("http://").to_string();

    let mut socket = TcpStream::connect(&addr).await.unwrap();
    socket
        .write_all(b"GET /api/slow?delay=10 HTTP/1.1\r\nHost: loadlab\r\n\r\n")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(state.tracker.active(), 1);

    // Disconnect while the handler is still sleeping; hyper drops the
    // in-flight future once it notices.
    drop(socket);

    let mut settled = false;
    for _ in 0..50 {
        if state.tracker.active() == 0 {
            settled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(settled, "active gauge must return to 0 after a disconnect");
    assert_eq!(
        state.metrics.counter_value(
            "http_requests_total",
            &[("method", "GET"), ("path", "/api/slow"), ("outcome", "cancelled")]
        ),
        1
    );

    shutdown.trigger();
}

#[tokio::test]
async fn pool_exhaustion_reports_per_task_outcomes() {
    let mut config = ServiceConfig::default();
    config.pool.capacity = 3;
    let (base, state, shutdown) = common::start_service(config).await;

    let started = Instant::now();
    let response = reqwest::get(format!(
        "{base}/api/pool-exhaust?concurrent=10&hold_ms=2000&timeout_ms=500"
    ))
    .await
    .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["capacity"], 3);
    assert_eq!(body["held"], 3);
    assert_eq!(body["timed_out"], 7);

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 10);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result["task_id"], i as u64);
    }

    // Acquisitions ran concurrently: one 2s hold, not a serial pile-up.
    assert!(elapsed.as_secs_f64() < 8.0, "took {elapsed:?}");

    assert_eq!(
        state
            .metrics
            .counter_value("pool_acquisitions_total", &[("result", "held")]),
        3
    );
    assert_eq!(
        state
            .metrics
            .counter_value("pool_acquisitions_total", &[("result", "timed_out")]),
        7
    );
    assert_eq!(state.pool.in_use(), 0);

    shutdown.trigger();
}

#[tokio::test]
async fn parallel_io_joins_all_tasks() {
    let (base, _state, shutdown) = common::start_service(ServiceConfig::default()).await;

    let started = Instant::now();
    let body: Value = reqwest::get(format!("{base}/api/parallel-io?count=5"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(body["total_tasks"], 5);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|r| r["status"] == "success"));

    // Tasks sleep 0.5–2 s each; parallel wall time stays near the max.
    assert!(elapsed.as_secs_f64() < 5.0, "took {elapsed:?}");

    shutdown.trigger();
}
