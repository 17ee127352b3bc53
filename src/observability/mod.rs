//! Observability for the bot
//!
//! Structured logging through `tracing`, span macros that components take as
//! their logging handle, and per-dispatcher outcome counters.

pub mod logging;
pub mod metrics;

pub use logging::{init_default_logging, init_logging, level_from_env, LogFormat};
pub use metrics::{DispatchMetrics, MetricsSnapshot};

// Span macros for structured logging
pub use logging::{dispatch_span, feeder_span, lifecycle_span, reply_span};
