//! Polling item streams over Reddit listings
//!
//! Each poll fetches the newest 100 items of a listing, drops the ones
//! already yielded, and queues the rest oldest-first. Polls that find
//! nothing back off exponentially; a poll with new items resets the wait.

use super::client::RedditClient;
use crate::bot::item::{DiscussionItem, ItemKind};
use crate::transport::{ItemSource, TransportError};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Fullnames remembered to filter repeats across polls
pub const SEEN_CAPACITY: usize = 301;

const LISTING_LIMIT: u32 = 100;
const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(16);
/// Consecutive transient poll failures tolerated before the stream gives up
const MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Insertion-ordered set that forgets its oldest entry when full
#[derive(Debug)]
pub struct BoundedSet {
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl BoundedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.members.contains(key)
    }

    /// Returns false if the key was already present
    pub fn insert(&mut self, key: String) -> bool {
        if self.members.contains(&key) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        self.members.insert(key.clone());
        self.order.push_back(key);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Live stream of comments or submissions from a set of subreddits
pub struct RedditStream {
    client: Arc<RedditClient>,
    name: String,
    path: String,
    seen: BoundedSet,
    pending: VecDeque<DiscussionItem>,
    polled: bool,
    empty_polls: u32,
    failures: u32,
    min_delay: Duration,
    max_delay: Duration,
}

impl RedditStream {
    /// New comments in `subreddits`
    pub fn comments(client: Arc<RedditClient>, subreddits: &[String]) -> Self {
        Self::new(client, ItemKind::Comment, subreddits)
    }

    /// New submissions in `subreddits`
    pub fn submissions(client: Arc<RedditClient>, subreddits: &[String]) -> Self {
        Self::new(client, ItemKind::Submission, subreddits)
    }

    fn new(client: Arc<RedditClient>, kind: ItemKind, subreddits: &[String]) -> Self {
        let listing = match kind {
            ItemKind::Comment => "comments",
            ItemKind::Submission => "new",
        };
        Self {
            client,
            name: format!("{kind}s"),
            path: listing_path(subreddits, listing),
            seen: BoundedSet::new(SEEN_CAPACITY),
            pending: VecDeque::new(),
            polled: false,
            empty_polls: 0,
            failures: 0,
            min_delay: DEFAULT_MIN_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    /// Override the wait between polls (shortened in tests)
    pub fn with_poll_delays(mut self, min_delay: Duration, max_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self.max_delay = max_delay.max(min_delay);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Wait before the next poll: `min_delay * 2^empty_polls`, capped (pure)
    fn poll_delay(&self) -> Duration {
        let exponent = self.empty_polls.min(16);
        self.min_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Queue unseen items from a newest-first batch, oldest first
    fn absorb(&mut self, batch: Vec<DiscussionItem>) -> usize {
        let fresh: Vec<DiscussionItem> = batch
            .into_iter()
            .rev()
            .filter(|item| self.seen.insert(item.fullname()))
            .collect();
        let count = fresh.len();
        self.pending.extend(fresh);
        count
    }

    async fn poll(&mut self) -> Result<(), TransportError> {
        if self.polled {
            tokio::time::sleep(self.poll_delay()).await;
        }
        self.polled = true;

        let result = match self.client.listing(&self.path, LISTING_LIMIT).await {
            // The client dropped its token on the 401; one retry fetches a new one
            Err(TransportError::Auth(message)) => {
                warn!(
                    source = %self.name,
                    error = %message,
                    "Listing rejected the access token, retrying with a fresh one"
                );
                self.client.listing(&self.path, LISTING_LIMIT).await
            }
            other => other,
        };

        match result {
            Ok(batch) => {
                self.failures = 0;
                let fresh = self.absorb(batch);
                if fresh == 0 {
                    self.empty_polls = self.empty_polls.saturating_add(1);
                } else {
                    self.empty_polls = 0;
                    debug!(source = %self.name, fresh, "New items from listing");
                }
                Ok(())
            }
            Err(e) if e.is_transient() && self.failures + 1 < MAX_CONSECUTIVE_FAILURES => {
                self.failures += 1;
                self.empty_polls = self.empty_polls.saturating_add(1);
                warn!(
                    source = %self.name,
                    failures = self.failures,
                    error = %e,
                    "Listing poll failed, will retry"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ItemSource for RedditStream {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_item(&mut self) -> Result<Option<DiscussionItem>, TransportError> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Ok(Some(item));
            }
            self.poll().await?;
        }
    }
}

/// `/r/a+b+c/{listing}`
pub fn listing_path(subreddits: &[String], listing: &str) -> String {
    format!("/r/{}/{}", subreddits.join("+"), listing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_set_evicts_oldest() {
        let mut set = BoundedSet::new(2);
        assert!(set.insert("a".into()));
        assert!(set.insert("b".into()));
        assert!(!set.insert("a".into()));
        assert!(set.insert("c".into()));

        assert_eq!(set.len(), 2);
        assert!(!set.contains("a"));
        assert!(set.contains("b"));
        assert!(set.contains("c"));
    }

    #[test]
    fn test_listing_path() {
        let subs = vec!["Python".to_string(), "datascience".to_string()];
        assert_eq!(listing_path(&subs, "comments"), "/r/Python+datascience/comments");
        assert_eq!(listing_path(&["all".to_string()], "new"), "/r/all/new");
    }
}
