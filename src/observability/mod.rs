//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Instrumentation pipeline produces:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → tracker.rs (per-request lifecycle records)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Single owned registry instance shared via Arc, no module-level globals
//! - Request ID flows through all subsystems
//! - Metric updates are cheap (atomic increments, one mutex per histogram series)

pub mod logging;
pub mod metrics;
pub mod tracker;

pub use metrics::MetricsRegistry;
pub use tracker::{Outcome, RequestRecord, RequestTracker};
