//! Feeders: one task per item source, pushing into the shared work queue
//!
//! A feeder blocks on `send` while the queue is full, which is the only
//! backpressure in the system. It watches the stop token both while waiting
//! on its source and while blocked on the queue.

use crate::bot::item::DiscussionItem;
use crate::error::BotError;
use crate::transport::ItemSource;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument, Span};

/// Drives one [`ItemSource`] into the work queue
pub struct Feeder<S: ItemSource> {
    source: S,
    span: Span,
}

impl<S: ItemSource> Feeder<S> {
    pub fn new(source: S) -> Self {
        let span = crate::feeder_span!(source = %source.name());
        Self { source, span }
    }

    /// Push every item from the source onto `sink` until `stop` fires.
    ///
    /// Returns `Ok(())` when stopped or when the source runs dry, and
    /// `BotError::SourceStream` when the source fails.
    pub async fn run(
        mut self,
        sink: mpsc::Sender<DiscussionItem>,
        stop: CancellationToken,
    ) -> Result<(), BotError> {
        let span = self.span.clone();
        self.feed(sink, stop).instrument(span).await
    }

    async fn feed(
        &mut self,
        sink: mpsc::Sender<DiscussionItem>,
        stop: CancellationToken,
    ) -> Result<(), BotError> {
        let name = self.source.name().to_string();
        info!("Streaming {} into work queue", name);

        loop {
            let next = tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    info!("Stop signal received, stopping");
                    return Ok(());
                }
                next = self.source.next_item() => next,
            };

            let item = match next {
                Ok(Some(item)) => item,
                Ok(None) => {
                    warn!("Item source {} has no more items", name);
                    return Ok(());
                }
                Err(e) => {
                    error!(error = %e, "Item source {} failed", name);
                    return Err(BotError::source_stream(name, e.to_string()));
                }
            };

            let item_id = item.id.clone();
            tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    info!("Stop signal received while queue was full, stopping");
                    return Ok(());
                }
                sent = sink.send(item) => {
                    if sent.is_err() {
                        warn!("Work queue closed, stopping");
                        return Err(BotError::QueueClosed);
                    }
                }
            }
            debug!(item_id = %item_id, "Queued item {}", item_id);
        }
    }
}

/// The running feeder tasks, watched by the dispatcher
#[derive(Default)]
pub struct FeederSet {
    feeders: Vec<(String, JoinHandle<Result<(), BotError>>)>,
}

impl FeederSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a feeder task for `source`
    pub fn spawn<S>(
        &mut self,
        source: S,
        sink: mpsc::Sender<DiscussionItem>,
        stop: CancellationToken,
    ) where
        S: ItemSource + 'static,
    {
        let name = source.name().to_string();
        let feeder = Feeder::new(source);
        let handle = tokio::spawn(feeder.run(sink, stop));
        info!(source = %name, "Feeder started");
        self.feeders.push((name, handle));
    }

    pub fn len(&self) -> usize {
        self.feeders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeders.is_empty()
    }

    /// Check whether any feeder has stopped.
    ///
    /// Every feeder is meant to run for the life of the worker, so a
    /// finished one is a failure even if it returned `Ok`. The finished
    /// feeder is removed and its failure returned.
    pub async fn check(&mut self) -> Option<BotError> {
        let index = self
            .feeders
            .iter()
            .position(|(_, handle)| handle.is_finished())?;
        let (name, handle) = self.feeders.remove(index);

        let error = match handle.await {
            Ok(Ok(())) => BotError::source_stream(&name, "feeder exited"),
            Ok(Err(e @ BotError::SourceStream { .. })) => e,
            Ok(Err(e)) => BotError::source_stream(&name, e.to_string()),
            Err(join_error) if join_error.is_panic() => BotError::FeederPanicked {
                source_name: name,
                message: join_error.to_string(),
            },
            Err(join_error) => {
                BotError::source_stream(&name, format!("feeder cancelled: {join_error}"))
            }
        };
        Some(error)
    }

    /// Abort all feeders and wait for them to finish
    pub async fn shutdown(&mut self) {
        for (name, handle) in self.feeders.drain(..) {
            handle.abort();
            match handle.await {
                Ok(Ok(())) => debug!(source = %name, "Feeder stopped"),
                Ok(Err(e)) => warn!(source = %name, error = %e, "Feeder stopped with error"),
                Err(e) if e.is_cancelled() => debug!(source = %name, "Feeder aborted"),
                Err(e) => error!(source = %name, error = %e, "Feeder shutdown error"),
            }
        }
    }
}
