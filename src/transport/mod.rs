//! Platform transport abstraction
//!
//! The bot talks to its platform through two seams: [`ItemSource`], an async
//! iterator over new discussion items, and [`Transport`], which posts replies.
//! Both are traits so the dispatcher can be driven by mocks in tests.
//!
//! ```rust
//! use nbviewerbot::testing::{notebook_comments, MockTransport, ScriptedSource};
//! use nbviewerbot::transport::{ItemSource, Transport};
//!
//! # tokio_test::block_on(async {
//! let mut source = ScriptedSource::new("comments", notebook_comments("c", 1));
//! let item = source.next_item().await.unwrap().expect("one item");
//!
//! let transport = MockTransport::new();
//! let reply = transport.reply(&item, "mirror").await.unwrap();
//! assert_eq!(reply.fullname, "t1_reply1");
//! assert!(source.next_item().await.unwrap().is_none());
//! # });
//! ```

use crate::bot::item::{DiscussionItem, Reply};
use std::time::Duration;
use thiserror::Error;

pub mod reddit;

/// Errors raised by the platform client
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("Rate limited by platform (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Platform server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Reply rejected by platform: {0}")]
    Rejected(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Failed to decode platform response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Whether a retry of the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::RateLimited { .. }
                | TransportError::Connection(_)
                | TransportError::Timeout(_)
                | TransportError::Server { .. }
        )
    }

    /// Platform-requested wait before the next attempt, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TransportError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Posting side of the platform client
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Post `text` as a reply to `item`
    async fn reply(&self, item: &DiscussionItem, text: &str) -> Result<Reply, TransportError>;
}

/// A live feed of discussion items from one platform listing.
///
/// `Ok(None)` means the source is exhausted; the live Reddit sources never
/// return it.
#[async_trait::async_trait]
pub trait ItemSource: Send {
    /// Short name for logs, e.g. "comments"
    fn name(&self) -> &str;

    /// Wait for the next item
    async fn next_item(&mut self) -> Result<Option<DiscussionItem>, TransportError>;
}

#[async_trait::async_trait]
impl<S: ItemSource + ?Sized> ItemSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn next_item(&mut self) -> Result<Option<DiscussionItem>, TransportError> {
        (**self).next_item().await
    }
}
