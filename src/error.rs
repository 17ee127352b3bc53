//! Error taxonomy for the bot
//!
//! Errors local to one item are logged and dropped by the dispatcher.
//! Supervisor-level errors (a dead feeder, a closed queue) stop the whole worker.

use crate::bot::poster::PostError;
use crate::bot::store::StoreError;
use crate::config::ConfigError;
use crate::transport::TransportError;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Main error type for bot operations
#[derive(Debug, Error)]
pub enum BotError {
    #[error("Item source '{source_name}' failed: {message}")]
    SourceStream {
        source_name: String,
        message: String,
    },

    #[error("Feeder '{source_name}' panicked: {message}")]
    FeederPanicked {
        source_name: String,
        message: String,
    },

    #[error("Work queue closed unexpectedly")]
    QueueClosed,

    #[error("Failed to process item {item_id}: {message}")]
    Processing { item_id: String, message: String },

    #[error("Reply error: {0}")]
    Post(#[from] PostError),

    #[error("Reply log error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl BotError {
    /// Create a source stream failure
    pub fn source_stream<N: Into<String>, S: Into<String>>(source_name: N, message: S) -> Self {
        Self::SourceStream {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create a per-item processing failure
    pub fn processing<I: Into<String>, S: Into<String>>(item_id: I, message: S) -> Self {
        Self::Processing {
            item_id: item_id.into(),
            message: message.into(),
        }
    }

    /// Whether this error must shut the worker down.
    ///
    /// Only feeder and queue failures are fatal. Everything else is scoped to
    /// the item that raised it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BotError::SourceStream { .. } | BotError::FeederPanicked { .. } | BotError::QueueClosed
        )
    }

    /// Error text safe to write to logs
    pub fn sanitized(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

static SECRET_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*[^\s&]+").expect("valid secret regex")
});

static BEARER_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)bearer\s+[A-Za-z0-9._~+/-]+=*").expect("valid bearer regex"));

/// Redact credentials from an error message and cap its length at 500 bytes
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = SECRET_RX.replace_all(message, "${1}=***").to_string();
    sanitized = BEARER_RX.replace_all(&sanitized, "Bearer ***").to_string();

    if sanitized.len() > 500 {
        let truncate_suffix = "...[truncated]";
        let mut cut = 500 - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(BotError::source_stream("comments", "boom").is_fatal());
        assert!(BotError::QueueClosed.is_fatal());
        assert!(BotError::FeederPanicked {
            source_name: "submissions".to_string(),
            message: "oops".to_string(),
        }
        .is_fatal());

        assert!(!BotError::processing("abc", "bad html").is_fatal());
        assert!(!BotError::Post(PostError::PermissionDenied {
            message: "banned".to_string()
        })
        .is_fatal());
    }

    #[test]
    fn test_display_includes_context() {
        let error = BotError::source_stream("comments", "connection reset");
        assert_eq!(
            error.to_string(),
            "Item source 'comments' failed: connection reset"
        );

        let error = BotError::processing("t1_abc", "no body");
        assert_eq!(error.to_string(), "Failed to process item t1_abc: no body");
    }

    #[test]
    fn test_sanitize_secrets() {
        let message = "Auth failed: password=hunter2 client_secret=abc123 token: tok456";
        let sanitized = sanitize_error_message(message);

        assert!(!sanitized.contains("hunter2"));
        assert!(!sanitized.contains("abc123"));
        assert!(!sanitized.contains("tok456"));
        assert!(sanitized.contains("password=***"));
    }

    #[test]
    fn test_sanitize_form_encoded_body() {
        let message = "grant_type=password&username=bot&password=hunter2&scope=*";
        let sanitized = sanitize_error_message(message);

        assert!(!sanitized.contains("hunter2"));
        assert!(sanitized.contains("&scope=*"));
    }

    #[test]
    fn test_sanitize_bearer_token() {
        let sanitized = sanitize_error_message("header Authorization: Bearer abc.DEF-123");
        assert!(!sanitized.contains("abc.DEF-123"));
        assert!(sanitized.contains("Bearer ***"));
    }

    #[test]
    fn test_long_message_truncation() {
        let sanitized = sanitize_error_message(&"x".repeat(600));
        assert!(sanitized.len() <= 500);
        assert!(sanitized.ends_with("...[truncated]"));

        let exact = sanitize_error_message(&"x".repeat(500));
        assert_eq!(exact.len(), 500);
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let sanitized = sanitize_error_message(&"é".repeat(400));
        assert!(sanitized.ends_with("...[truncated]"));
        assert!(sanitized.len() <= 500);
    }
}
