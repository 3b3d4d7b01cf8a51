//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all probe handlers
//! - Wire up the middleware stack in finalization-safe order
//! - Own the shared state handed to every handler
//! - Serve with graceful shutdown
//!
//! # Middleware ordering
//! ```text
//! TraceLayer
//!   → instrumentation pipeline (begin / finalize)
//!     → TimeoutLayer (timeouts surface as responses, so they finalize)
//!       → CatchPanicLayer (panics surface as 500s, so they finalize)
//!         → handler
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{middleware, Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::downstream::DownstreamClient;
use crate::http::pipeline;
use crate::observability::{MetricsRegistry, RequestTracker};
use crate::probes;
use crate::probes::memory::RetainedAllocations;
use crate::resource::ResourcePool;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub metrics: Arc<MetricsRegistry>,
    pub tracker: Arc<RequestTracker>,
    pub downstream: DownstreamClient,
    pub pool: Arc<ResourcePool>,
    pub retained: Arc<RetainedAllocations>,
}

impl AppState {
    pub fn new(config: ServiceConfig) -> Self {
        let metrics = Arc::new(MetricsRegistry::new());
        let tracker = Arc::new(RequestTracker::new(metrics.clone()));
        let downstream = DownstreamClient::new(&config.downstream);
        let pool = Arc::new(ResourcePool::new(config.pool.capacity));
        let retained = Arc::new(RetainedAllocations::new());

        Self {
            config: Arc::new(config),
            metrics,
            tracker,
            downstream,
            pool,
            retained,
        }
    }
}

/// HTTP server for the fault-injection service.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServiceConfig) -> Self {
        let state = AppState::new(config);
        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Shared state, exposed for tests.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let request_timeout = Duration::from_secs(state.config.listener.request_timeout_secs);

        Router::new()
            .route("/", get(service_info))
            .route("/health", get(health_check))
            .route("/metrics", get(export_metrics))
            .nest("/api", probes::router())
            // Layers added first sit closest to the handler.
            .layer(CatchPanicLayer::custom(pipeline::panic_response))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                pipeline::instrument,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Service info for the root path.
async fn service_info() -> impl IntoResponse {
    Json(json!({
        "service": "loadlab",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "healthy",
    }))
}

/// Liveness probe.
async fn health_check() -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Json(json!({ "status": "healthy", "timestamp": timestamp }))
}

/// Metrics snapshot in Prometheus text exposition format.
async fn export_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.export(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::http::pipeline::{X_PROCESS_TIME, X_REQUEST_ID};
    use crate::observability::tracker::REQUESTS_TOTAL;

    fn test_state() -> AppState {
        AppState::new(ServiceConfig::default())
    }

    fn request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn fast_probe_finalizes_with_headers_and_metrics() {
        let state = test_state();
        let router = HttpServer::build_router(state.clone());

        let response = router.oneshot(request("/api/fast")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let id = response.headers()[X_REQUEST_ID].to_str().unwrap().to_owned();
        assert!(Uuid::parse_str(&id).is_ok());
        let process_time: f64 = response.headers()[X_PROCESS_TIME]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(process_time >= 0.0);

        assert_eq!(state.tracker.active(), 0);
        assert_eq!(
            state.metrics.counter_value(
                REQUESTS_TOTAL,
                &[
                    ("method", "GET"),
                    ("path", "/api/fast"),
                    ("outcome", "success")
                ]
            ),
            1
        );
    }

    #[tokio::test]
    async fn invalid_probe_parameter_is_a_client_error() {
        let state = test_state();
        let router = HttpServer::build_router(state.clone());

        let response = router
            .oneshot(request("/api/cpu-intensive?complexity=99"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            state.metrics.counter_value(
                REQUESTS_TOTAL,
                &[
                    ("method", "GET"),
                    ("path", "/api/cpu-intensive"),
                    ("outcome", "client_error")
                ]
            ),
            1
        );
    }

    #[tokio::test]
    async fn unknown_path_still_runs_the_pipeline() {
        let state = test_state();
        let router = HttpServer::build_router(state.clone());

        let response = router.oneshot(request("/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key(X_REQUEST_ID));
        assert_eq!(state.tracker.active(), 0);
    }

    #[tokio::test]
    async fn panicking_handler_finalizes_as_an_exception() {
        async fn boom() {
            panic!("kaboom")
        }

        let state = test_state();
        let router: Router = Router::new()
            .route("/boom", get(boom))
            .layer(CatchPanicLayer::custom(pipeline::panic_response))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                pipeline::instrument,
            ));

        let response = router.oneshot(request("/boom")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().contains_key(X_REQUEST_ID));

        // The gauge was decremented and the request counted as an exception.
        assert_eq!(state.tracker.active(), 0);
        assert_eq!(
            state.metrics.counter_value(
                REQUESTS_TOTAL,
                &[("method", "GET"), ("path", "/boom"), ("outcome", "exception")]
            ),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_request_future_finalizes_as_cancelled() {
        let state = test_state();
        let router = HttpServer::build_router(state.clone());

        // Drop the in-flight request future mid-handler, the way hyper does
        // when the client disconnects.
        let _ = tokio::time::timeout(
            Duration::from_millis(50),
            router.oneshot(request("/api/slow?delay=5")),
        )
        .await;

        assert_eq!(state.tracker.active(), 0);
        assert_eq!(
            state.metrics.counter_value(
                REQUESTS_TOTAL,
                &[
                    ("method", "GET"),
                    ("path", "/api/slow"),
                    ("outcome", "cancelled")
                ]
            ),
            1
        );
    }

    #[tokio::test]
    async fn metrics_endpoint_exports_counter_families() {
        let state = test_state();
        let router = HttpServer::build_router(state.clone());

        let _ = router
            .clone()
            .oneshot(request("/api/ping"))
            .await
            .unwrap();
        let response = router.oneshot(request("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("# TYPE http_requests_total counter"));
        assert!(text.contains("path=\"/api/ping\""));
        assert!(text.contains("# TYPE http_requests_active gauge"));
    }
}
