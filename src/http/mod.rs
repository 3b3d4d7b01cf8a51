//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, routing, shared state)
//!     → pipeline.rs (correlation id, timer, metrics, log lines)
//!     → probe handler (may fan out or hit the bounded pool)
//!     → pipeline.rs finalize (outcome, headers)
//!     → Send to client
//! ```

pub mod error;
pub mod pipeline;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, HttpServer};
