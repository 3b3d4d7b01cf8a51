//! Per-request lifecycle tracking.
//!
//! # State Machine
//! ```text
//! RECEIVED → IN_FLIGHT → {COMPLETED, FAILED}
//! ```
//! `begin` performs RECEIVED → IN_FLIGHT: it assigns the correlation id,
//! records the start instant, and increments the active-requests gauge
//! before the handler runs. `finish` performs the terminal transition
//! exactly once: it derives the duration, updates the request counter and
//! latency histogram, and decrements the gauge. The pipeline guarantees
//! `finish` is reached on every exit path, including handler panics and
//! request futures dropped mid-flight.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use uuid::Uuid;

use crate::observability::metrics::MetricsRegistry;

pub const REQUESTS_TOTAL: &str = "http_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const REQUESTS_ACTIVE: &str = "http_requests_active";

/// Classification of a finished request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    ClientError,
    ServerError,
    /// The handler panicked; the pipeline recovered it as a 500.
    Exception,
    /// The request future was dropped before a response was produced
    /// (client disconnect or upstream cancellation).
    Cancelled,
}

impl Outcome {
    /// Classify a response status. Panics are flagged separately by the
    /// pipeline and never reach this path.
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_client_error() {
            Outcome::ClientError
        } else if status.is_server_error() {
            Outcome::ServerError
        } else {
            Outcome::Success
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::ClientError => "client_error",
            Outcome::ServerError => "server_error",
            Outcome::Exception => "exception",
            Outcome::Cancelled => "cancelled",
        }
    }
}

/// Lifecycle record for one in-flight request.
///
/// Owned exclusively by the instrumentation pipeline; consumed by
/// [`RequestTracker::finish`].
#[derive(Debug)]
pub struct RequestRecord {
    pub id: Uuid,
    pub method: String,
    pub path: String,
    started_at: Instant,
}

/// Summary of a finished request, used for the completion log line and
/// response headers.
#[derive(Debug)]
pub struct CompletedRequest {
    pub id: Uuid,
    pub outcome: Outcome,
    pub duration: Duration,
}

/// Registers requests with the metrics registry across their lifecycle.
#[derive(Debug)]
pub struct RequestTracker {
    metrics: Arc<MetricsRegistry>,
}

impl RequestTracker {
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self { metrics }
    }

    /// Transition RECEIVED → IN_FLIGHT.
    ///
    /// The gauge increment happens here, strictly before the handler is
    /// invoked, so there is no window where a request is in flight but
    /// uncounted.
    pub fn begin(&self, method: &str, path: &str) -> RequestRecord {
        let record = RequestRecord {
            id: Uuid::new_v4(),
            method: method.to_string(),
            path: path.to_string(),
            started_at: Instant::now(),
        };
        self.metrics.add_to_gauge(REQUESTS_ACTIVE, &[], 1);
        record
    }

    /// Transition IN_FLIGHT → {COMPLETED, FAILED}.
    ///
    /// Consumes the record so a request cannot be finalized twice.
    pub fn finish(&self, record: RequestRecord, outcome: Outcome) -> CompletedRequest {
        let duration = record.started_at.elapsed();

        self.metrics.increment_counter(
            REQUESTS_TOTAL,
            &[
                ("method", record.method.as_str()),
                ("path", record.path.as_str()),
                ("outcome", outcome.as_str()),
            ],
            1,
        );
        self.metrics.observe_histogram(
            REQUEST_DURATION_SECONDS,
            &[
                ("method", record.method.as_str()),
                ("path", record.path.as_str()),
            ],
            duration.as_secs_f64(),
        );
        self.metrics.add_to_gauge(REQUESTS_ACTIVE, &[], -1);

        CompletedRequest {
            id: record.id,
            outcome,
            duration,
        }
    }

    /// Number of requests currently between `begin` and `finish`.
    pub fn active(&self) -> i64 {
        self.metrics.gauge_value(REQUESTS_ACTIVE, &[])
    }
}
