//! Controlled fault/load-injection service library.
//!
//! Exposes HTTP probes that deliberately exercise CPU, memory, I/O-latency,
//! downstream-dependency, and connection-pool failure modes. Every request
//! passes through a shared instrumentation pipeline that records structured
//! logs and in-process time-series metrics.

pub mod config;
pub mod downstream;
pub mod fanout;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod probes;
pub mod resource;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
