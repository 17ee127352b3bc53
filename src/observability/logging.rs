//! Structured logging system using tracing crate
//!
//! Console output goes through an `EnvFilter` at the chosen level. An
//! optional log file always records DEBUG and above, so a quiet console
//! still leaves a full trail on disk.
//!
//! ## Environment Variables
//!
//! - `LOG_LEVEL`: Log level (ERROR, WARN, INFO, DEBUG, TRACE, OFF) - defaults to INFO
//! - `LOG_FORMAT`: Output format (json, pretty, compact) - defaults to compact
//! - `LOG_SPANS`: Include span events (true/false) - defaults to false
//! - `LOG_FILE`: Path of the debug log file - unset disables it
//! - `RUST_LOG`: Override console filtering (follows env_logger format)
//!
//! ## Examples
//!
//! ```bash
//! # Production JSON logging with a debug trail on disk
//! LOG_FORMAT=json LOG_FILE=/var/log/nbviewerbot.log ./nbviewerbot
//!
//! # Development
//! LOG_FORMAT=pretty ./nbviewerbot -v
//! ```

use std::env;
use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter, Layer, Registry};

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON format for structured logging (machine-readable)
    Json,
    /// Pretty format with colors and indentation (human-readable)
    Pretty,
    /// Compact format with colors but minimal spacing (terminal-friendly)
    Compact,
}

impl LogFormat {
    /// Parse log format from string, defaulting to compact
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Compact,
        }
    }
}

/// Parse a level name; `None` means console logging is off
pub fn parse_level(s: &str) -> Option<Level> {
    match s.trim().to_uppercase().as_str() {
        "ERROR" => Some(Level::ERROR),
        "WARN" | "WARNING" => Some(Level::WARN),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        "OFF" | "NONE" => None,
        _ => Some(Level::INFO),
    }
}

/// Console level from `LOG_LEVEL`
pub fn level_from_env() -> Option<Level> {
    parse_level(&env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()))
}

fn span_events(include_spans: bool) -> fmt::format::FmtSpan {
    if include_spans {
        fmt::format::FmtSpan::NEW | fmt::format::FmtSpan::CLOSE
    } else {
        fmt::format::FmtSpan::NONE
    }
}

fn console_filter(level: Option<Level>) -> EnvFilter {
    if let Ok(rust_log) = env::var("RUST_LOG") {
        return EnvFilter::new(rust_log);
    }

    let Some(level) = level else {
        return EnvFilter::new("off");
    };

    // Reduce noise from dependencies
    EnvFilter::new(level.to_string())
        .add_directive("reqwest=warn".parse().expect("valid directive"))
        .add_directive("hyper=warn".parse().expect("valid directive"))
        .add_directive("hyper_util=warn".parse().expect("valid directive"))
        .add_directive("html5ever=warn".parse().expect("valid directive"))
        .add_directive("selectors=warn".parse().expect("valid directive"))
}

/// Initialize logging with manual configuration.
///
/// Keep the returned guard alive for the life of the process when a log file
/// is configured; dropping it flushes and stops the file writer.
pub fn init_logging(
    level: Option<Level>,
    format: LogFormat,
    include_spans: bool,
    log_file: Option<&Path>,
) -> Option<WorkerGuard> {
    let filter = console_filter(level);

    let console: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_span_events(span_events(include_spans))
            .with_filter(filter)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_ansi(true)
            .with_span_events(span_events(include_spans))
            .with_filter(filter)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_ansi(true)
            .with_target(false)
            .with_thread_names(true)
            .with_span_events(span_events(include_spans))
            .with_filter(filter)
            .boxed(),
    };

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "nbviewerbot.log".into());
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_names(true)
                .with_filter(LevelFilter::DEBUG);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let result = tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init();
    if result.is_err() {
        tracing::warn!("Tried to init logging twice, keeping the existing subscriber");
    }

    guard
}

/// Initialize logging from environment variables, letting `level_override`
/// replace `LOG_LEVEL` (used for the `-v`/`-q` flags)
pub fn init_default_logging(level_override: Option<Option<Level>>) -> Option<WorkerGuard> {
    let level = level_override.unwrap_or_else(level_from_env);

    let format = env::var("LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());
    let log_format = LogFormat::parse(&format);

    let include_spans = env::var("LOG_SPANS")
        .unwrap_or_else(|_| "false".to_string())
        .to_lowercase()
        == "true";

    let log_file = env::var_os("LOG_FILE").map(std::path::PathBuf::from);

    init_logging(level, log_format, include_spans, log_file.as_deref())
}

/// Span for a feeder task
#[macro_export]
macro_rules! feeder_span {
    () => {
        tracing::info_span!("feeder")
    };
    ($($field:tt)+) => {
        tracing::info_span!("feeder", $($field)+)
    };
}

/// Span for the dispatcher loop
#[macro_export]
macro_rules! dispatch_span {
    () => {
        tracing::info_span!("dispatcher")
    };
    ($($field:tt)+) => {
        tracing::info_span!("dispatcher", $($field)+)
    };
}

/// Span for the reply poster
#[macro_export]
macro_rules! reply_span {
    () => {
        tracing::info_span!("reply")
    };
    ($($field:tt)+) => {
        tracing::info_span!("reply", $($field)+)
    };
}

/// Create a lifecycle event span
#[macro_export]
macro_rules! lifecycle_span {
    () => {
        tracing::info_span!("lifecycle")
    };
    ($($field:tt)+) => {
        tracing::info_span!("lifecycle", $($field)+)
    };
}

// Re-export macros for convenience
pub use {dispatch_span, feeder_span, lifecycle_span, reply_span};
