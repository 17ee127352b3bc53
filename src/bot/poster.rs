//! Reply posting with bounded exponential backoff
//!
//! Transient transport failures (rate limits, connection trouble, server
//! errors) are retried with a doubling delay up to `max_attempts` calls.
//! Permission denials and other rejections are returned immediately. A
//! cancelled stop token cuts the backoff short and gives up on the reply.

use crate::bot::item::{DiscussionItem, Reply};
use crate::config::RetrySection;
use crate::transport::{Transport, TransportError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument, Span};

/// Backoff schedule for reply attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total transport calls allowed, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySection::default())
    }
}

impl From<&RetrySection> for RetryPolicy {
    fn from(section: &RetrySection) -> Self {
        Self {
            max_attempts: section.max_attempts.max(1),
            base_delay: Duration::from_millis(section.base_delay_ms),
            max_delay: Duration::from_millis(section.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt number `attempt` (1-based):
    /// `base_delay * 2^(attempt - 1)`, capped at `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Why a reply could not be posted
#[derive(Debug, Error)]
pub enum PostError {
    #[error("Gave up after {attempts} attempts: {last_error}")]
    PostFailed {
        attempts: u32,
        last_error: TransportError,
    },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Reply rejected: {0}")]
    Rejected(TransportError),
}

/// Posts replies through a [`Transport`], retrying transient failures
pub struct ReplyPoster<T: Transport + ?Sized> {
    transport: Arc<T>,
    policy: RetryPolicy,
    stop: CancellationToken,
    span: Span,
}

impl<T: Transport + ?Sized> ReplyPoster<T> {
    pub fn new(transport: Arc<T>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            stop: CancellationToken::new(),
            span: crate::reply_span!(),
        }
    }

    /// Abandon backoff waits once `stop` is cancelled
    pub fn with_stop_token(mut self, stop: CancellationToken) -> Self {
        self.stop = stop;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Post `text` as a reply to `item`
    pub async fn post(&self, item: &DiscussionItem, text: &str) -> Result<Reply, PostError> {
        self.post_with_retry(item, text)
            .instrument(self.span.clone())
            .await
    }

    async fn post_with_retry(&self, item: &DiscussionItem, text: &str) -> Result<Reply, PostError> {
        let mut attempt = 1;

        loop {
            match self.transport.reply(item, text).await {
                Ok(reply) => {
                    info!(
                        item_id = %item.id,
                        reply_id = %reply.id,
                        attempt,
                        "Replied to {} with new comment {}",
                        item.id,
                        reply.id
                    );
                    return Ok(reply);
                }
                Err(TransportError::PermissionDenied(message)) => {
                    warn!(
                        item_id = %item.id,
                        subreddit = item.subreddit.as_deref().unwrap_or("?"),
                        error = %message,
                        "Not allowed to reply, skipping item"
                    );
                    return Err(PostError::PermissionDenied { message });
                }
                Err(e) if e.is_transient() => {
                    if attempt >= self.policy.max_attempts {
                        error!(
                            item_id = %item.id,
                            attempts = attempt,
                            error = %e,
                            "Giving up on reply after exhausting retries"
                        );
                        return Err(PostError::PostFailed {
                            attempts: attempt,
                            last_error: e,
                        });
                    }

                    let delay = self
                        .policy
                        .delay_for(attempt)
                        .max(e.retry_after().unwrap_or_default());
                    warn!(
                        item_id = %item.id,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient error replying, backing off"
                    );
                    tokio::select! {
                        biased;
                        _ = self.stop.cancelled() => {
                            warn!(
                                item_id = %item.id,
                                attempts = attempt,
                                "Stop requested during backoff, giving up on reply"
                            );
                            return Err(PostError::PostFailed {
                                attempts: attempt,
                                last_error: e,
                            });
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => {
                    warn!(item_id = %item.id, error = %e, "Reply rejected, not retrying");
                    return Err(PostError::Rejected(e));
                }
            }
        }
    }
}
