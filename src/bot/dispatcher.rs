//! Reply dispatcher
//!
//! Single consumer of the work queue. For each item it checks the reply
//! log, extracts notebook links, renders a reply and posts it. Per-item
//! failures are logged and the loop moves on; a dead feeder or a closed
//! queue ends the loop with a fatal error.

use crate::bot::feeder::FeederSet;
use crate::bot::item::{DiscussionItem, Reply};
use crate::bot::links::{item_links, LinkExtractor, NotebookLinkExtractor};
use crate::bot::poster::{PostError, ReplyPoster};
use crate::bot::store::{ReplyRecord, ReplyStore};
use crate::bot::template::ReplyRenderer;
use crate::error::BotError;
use crate::observability::DispatchMetrics;
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, Instrument, Span};

/// What happened to one dequeued item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Already in the reply log
    Skipped,
    /// No qualifying links, nothing posted
    NoLinks,
    /// Reply posted and recorded
    Replied(Reply),
    /// Transient failures exhausted the retry budget
    GaveUp,
    /// Bot may not reply here
    PermissionDenied,
}

pub struct Dispatcher<T: Transport + ?Sized, S: ReplyStore> {
    store: S,
    extractor: Arc<dyn LinkExtractor>,
    renderer: ReplyRenderer,
    poster: ReplyPoster<T>,
    metrics: Arc<DispatchMetrics>,
    poll_interval: Duration,
    span: Span,
}

impl<T: Transport + ?Sized, S: ReplyStore> Dispatcher<T, S> {
    pub fn new(store: S, poster: ReplyPoster<T>) -> Self {
        Self {
            store,
            extractor: Arc::new(NotebookLinkExtractor),
            renderer: ReplyRenderer::default(),
            poster,
            metrics: Arc::new(DispatchMetrics::new()),
            poll_interval: Duration::from_secs(1),
            span: crate::dispatch_span!(),
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn LinkExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_renderer(mut self, renderer: ReplyRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<DispatchMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// How long to wait on an empty queue before re-checking feeders and stop
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Let a cancelled `stop` cut short a reply that is backing off
    pub fn with_stop_token(mut self, stop: CancellationToken) -> Self {
        self.poster = self.poster.with_stop_token(stop);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    /// Handle one item end to end.
    ///
    /// Only a successful reply is recorded in the reply log. Permission
    /// denials and exhausted retries are outcomes, not errors; an item that
    /// gave up may be answered if it is ever delivered again.
    pub async fn process_item(&mut self, item: &DiscussionItem) -> Result<ItemOutcome, BotError> {
        self.metrics.item_received();
        let span = self.span.clone();
        let result = self.handle(item).instrument(span).await;
        match &result {
            Ok(outcome) => self.metrics.record_outcome(outcome),
            Err(_) => self.metrics.item_error(),
        }
        result
    }

    async fn handle(&mut self, item: &DiscussionItem) -> Result<ItemOutcome, BotError> {
        debug!(item_id = %item.id, kind = %item.kind, "Got new {} {}", item.kind, item.id);

        if self.store.has(&item.id) {
            debug!(item_id = %item.id, "Already replied to {}, skipping", item.id);
            return Ok(ItemOutcome::Skipped);
        }

        let links = item_links(self.extractor.as_ref(), item);
        if links.is_empty() {
            return Ok(ItemOutcome::NoLinks);
        }
        info!(
            item_id = %item.id,
            links = links.len(),
            "Found Jupyter link(s) in {} {}",
            item.kind,
            item.id
        );

        let text = self
            .renderer
            .render(&links)
            .ok_or_else(|| BotError::processing(&item.id, "no reply text for links"))?;

        match self.poster.post(item, &text).await {
            Ok(reply) => {
                self.store
                    .mark(&item.id, ReplyRecord::new(&reply, item.kind));
                Ok(ItemOutcome::Replied(reply))
            }
            Err(PostError::PermissionDenied { .. }) => Ok(ItemOutcome::PermissionDenied),
            Err(PostError::PostFailed { .. }) => Ok(ItemOutcome::GaveUp),
            Err(e @ PostError::Rejected(_)) => Err(BotError::Post(e)),
        }
    }

    /// Consume `queue` until `stop` fires or a fatal error occurs.
    ///
    /// Between items (and at least once per poll interval while idle) the
    /// feeders are checked; a finished feeder ends the loop with its error.
    pub async fn run(
        &mut self,
        queue: &mut mpsc::Receiver<DiscussionItem>,
        feeders: &mut FeederSet,
        stop: &CancellationToken,
    ) -> Result<(), BotError> {
        let span = self.span.clone();
        self.dispatch_loop(queue, feeders, stop)
            .instrument(span)
            .await
    }

    async fn dispatch_loop(
        &mut self,
        queue: &mut mpsc::Receiver<DiscussionItem>,
        feeders: &mut FeederSet,
        stop: &CancellationToken,
    ) -> Result<(), BotError> {
        info!(feeders = feeders.len(), "Dispatcher started, waiting for items");

        loop {
            if stop.is_cancelled() {
                info!("Stop requested, dispatcher exiting");
                return Ok(());
            }

            if let Some(e) = feeders.check().await {
                error!(error = %e.sanitized(), "Feeder died, stopping dispatcher");
                return Err(e);
            }

            let received = tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    info!("Stop requested, dispatcher exiting");
                    return Ok(());
                }
                received = tokio::time::timeout(self.poll_interval, queue.recv()) => received,
            };

            match received {
                // Idle; loop around to re-check stop and feeders
                Err(_) => continue,
                Ok(Some(item)) => self.dispatch(item).await,
                Ok(None) => {
                    let e = feeders.check().await.unwrap_or(BotError::QueueClosed);
                    error!(error = %e.sanitized(), "Work queue closed, stopping dispatcher");
                    return Err(e);
                }
            }
        }
    }

    async fn dispatch(&mut self, item: DiscussionItem) {
        match self.process_item(&item).await {
            Ok(outcome) => {
                debug!(item_id = %item.id, outcome = ?outcome, "Finished {} {}", item.kind, item.id)
            }
            Err(e) => error!(
                item_id = %item.id,
                error = %e.sanitized(),
                "Failed to handle {} {}, moving on",
                item.kind,
                item.id
            ),
        }
    }
}
