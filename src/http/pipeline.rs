//! Instrumentation pipeline.
//!
//! The ordered wrapper around every inbound request. On entry it assigns the
//! correlation id, starts the timer, registers the request with the tracker
//! (gauge increment), and logs a start event. On exit (every exit, including
//! handler panics recovered by the catch-panic layer below it, and request
//! futures dropped by a client disconnect) it finalizes
//! exactly once: classifies the outcome, updates counters and the latency
//! histogram, decrements the gauge, logs a completion event, and attaches
//! `X-Request-ID` and `X-Process-Time` to the response.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use crate::http::server::AppState;
use crate::observability::tracker::{CompletedRequest, Outcome, RequestRecord, RequestTracker};

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_PROCESS_TIME: &str = "x-process-time";

/// Correlation id assigned at pipeline entry, readable by handlers via
/// request extensions.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

/// Marker inserted into the response by the panic recovery handler so the
/// pipeline can classify the request as an exception rather than a plain
/// server error.
#[derive(Debug, Clone, Copy)]
pub struct HandlerPanicked;

/// Owns the in-flight record and guarantees finalization.
///
/// The response path finalizes through [`FinalizeGuard::complete`]. If the
/// request future is dropped instead (client disconnect, upstream
/// cancellation), `Drop` finishes the record as cancelled, so the active
/// gauge and completion counter never miss an exit path.
struct FinalizeGuard {
    tracker: Arc<RequestTracker>,
    record: Option<RequestRecord>,
}

impl FinalizeGuard {
    fn complete(&mut self, outcome: Outcome) -> Option<CompletedRequest> {
        self.record
            .take()
            .map(|record| self.tracker.finish(record, outcome))
    }
}

impl Drop for FinalizeGuard {
    fn drop(&mut self) {
        if let Some(record) = self.record.take() {
            let request_id = record.id;
            let method = record.method.clone();
            let path = record.path.clone();
            let completed = self.tracker.finish(record, Outcome::Cancelled);
            tracing::info!(
                request_id = %request_id,
                method = %method,
                path = %path,
                outcome = completed.outcome.as_str(),
                duration_secs = completed.duration.as_secs_f64(),
                "request cancelled"
            );
        }
    }
}

/// Middleware wrapping every route.
pub async fn instrument(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    // Gauge increment happens inside begin, strictly before the handler.
    let record = state.tracker.begin(&method, &path);
    let request_id = record.id;
    request.extensions_mut().insert(CorrelationId(request_id));

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        "request started"
    );

    let mut guard = FinalizeGuard {
        tracker: state.tracker.clone(),
        record: Some(record),
    };

    let mut response = next.run(request).await;

    let outcome = if response.extensions().get::<HandlerPanicked>().is_some() {
        Outcome::Exception
    } else {
        Outcome::from_status(response.status())
    };

    if let Some(completed) = guard.complete(outcome) {
        tracing::info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            outcome = completed.outcome.as_str(),
            duration_secs = completed.duration.as_secs_f64(),
            "request completed"
        );

        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            headers.insert(X_REQUEST_ID, value);
        }
        if let Ok(value) =
            HeaderValue::from_str(&format!("{:.6}", completed.duration.as_secs_f64()))
        {
            headers.insert(X_PROCESS_TIME, value);
        }
    }

    response
}

/// Build the 500 response for a recovered handler panic.
///
/// Used by `CatchPanicLayer`, which sits inside the instrumentation
/// middleware so the pipeline still finalizes panicked requests.
pub fn panic_response(panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "handler panicked".to_string()
    };

    tracing::error!(panic = %detail, "handler panicked");

    let mut response = (
        axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal fault" })),
    )
        .into_response();
    response.extensions_mut().insert(HandlerPanicked);
    response
}
