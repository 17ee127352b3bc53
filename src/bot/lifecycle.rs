//! Bot lifecycle: startup, supervision and orderly shutdown
//!
//! `start` loads the reply log and spawns one feeder per item source.
//! `run` drives the dispatcher until a shutdown signal or a fatal error.
//! `shutdown` stops the feeders, logs a summary and persists the reply log.

use crate::bot::dispatcher::Dispatcher;
use crate::bot::feeder::FeederSet;
use crate::bot::item::DiscussionItem;
use crate::bot::poster::{ReplyPoster, RetryPolicy};
use crate::bot::store::ReplyStore;
use crate::bot::template::ReplyRenderer;
use crate::config::BotConfig;
use crate::error::BotError;
use crate::observability::{DispatchMetrics, MetricsSnapshot};
use crate::transport::{ItemSource, Transport};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument, Span};

/// Owns the dispatcher, the feeders and the work queue
pub struct BotLifecycle<T, S>
where
    T: Transport + ?Sized + 'static,
    S: ReplyStore,
{
    dispatcher: Dispatcher<T, S>,
    sources: Vec<Box<dyn ItemSource>>,
    queue_capacity: usize,
    queue: Option<mpsc::Receiver<DiscussionItem>>,
    feeders: FeederSet,
    stop: CancellationToken,
    span: Span,
}

impl<T, S> BotLifecycle<T, S>
where
    T: Transport + ?Sized + 'static,
    S: ReplyStore,
{
    /// Wire a lifecycle from configuration and injected collaborators
    pub fn new(
        config: &BotConfig,
        transport: Arc<T>,
        sources: Vec<Box<dyn ItemSource>>,
        store: S,
    ) -> Self {
        let poster = ReplyPoster::new(transport, RetryPolicy::from(&config.retry));
        let dispatcher = Dispatcher::new(store, poster)
            .with_renderer(ReplyRenderer::new(config.bot.binder_links))
            .with_poll_interval(config.bot.poll_interval());
        Self::from_parts(dispatcher, sources, config.bot.queue_capacity)
    }

    /// Wrap a ready-made dispatcher
    pub fn from_parts(
        dispatcher: Dispatcher<T, S>,
        sources: Vec<Box<dyn ItemSource>>,
        queue_capacity: usize,
    ) -> Self {
        let stop = CancellationToken::new();
        Self {
            dispatcher: dispatcher.with_stop_token(stop.clone()),
            sources,
            queue_capacity: queue_capacity.max(1),
            queue: None,
            feeders: FeederSet::new(),
            stop,
            span: crate::lifecycle_span!(),
        }
    }

    /// Token that stops the feeders and the dispatcher when cancelled
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub fn dispatcher(&self) -> &Dispatcher<T, S> {
        &self.dispatcher
    }

    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        self.dispatcher.metrics()
    }

    pub fn feeder_count(&self) -> usize {
        self.feeders.len()
    }

    /// Load the reply log and spawn a feeder per source
    pub fn start(&mut self) -> Result<(), BotError> {
        let _enter = self.span.enter();
        info!("Starting nbviewerbot");

        let loaded = self.dispatcher.store_mut().load().map_err(|e| {
            error!(error = %e, "Could not load reply log");
            BotError::from(e)
        })?;
        info!(entries = loaded, "Reply log ready");

        let (tx, rx) = mpsc::channel(self.queue_capacity);
        for source in self.sources.drain(..) {
            self.feeders.spawn(source, tx.clone(), self.stop.clone());
        }
        self.queue = Some(rx);

        info!(
            feeders = self.feeders.len(),
            queue_capacity = self.queue_capacity,
            "Bot started"
        );
        Ok(())
    }

    /// Dispatch until `shutdown` resolves or a fatal error occurs.
    ///
    /// On shutdown the item in hand gets at most its current attempt; a reply
    /// waiting out a backoff is abandoned.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<(), BotError>
    where
        F: Future<Output = ()>,
    {
        let Some(mut queue) = self.queue.take() else {
            error!("run called before start");
            return Err(BotError::QueueClosed);
        };

        let stop = self.stop.clone();
        let watch_shutdown = {
            let stop = stop.clone();
            async move {
                shutdown.await;
                info!("Shutdown signal received");
                stop.cancel();
                std::future::pending::<()>().await
            }
        };

        let span = self.span.clone();
        let result = tokio::select! {
            result = self.dispatcher.run(&mut queue, &mut self.feeders, &stop) => result,
            _ = watch_shutdown => Ok(()),
        };
        self.queue = Some(queue);

        if let Err(e) = &result {
            span.in_scope(|| error!(error = %e.sanitized(), fatal = e.is_fatal(), "Bot stopped"));
        }
        result
    }

    /// Stop feeders, report counts and persist the reply log
    pub async fn shutdown(&mut self) -> Result<MetricsSnapshot, BotError> {
        let span = self.span.clone();
        self.stop_and_flush().instrument(span).await
    }

    async fn stop_and_flush(&mut self) -> Result<MetricsSnapshot, BotError> {
        info!("Shutting down nbviewerbot");
        self.stop.cancel();
        self.feeders.shutdown().await;

        let snapshot = self.dispatcher.metrics().snapshot();
        info!(
            received = snapshot.items_received,
            replied = snapshot.replied,
            skipped = snapshot.skipped,
            no_links = snapshot.no_links,
            gave_up = snapshot.gave_up,
            permission_denied = snapshot.permission_denied,
            item_errors = snapshot.item_errors,
            "Dispatch summary"
        );

        self.dispatcher.store().persist().map_err(|e| {
            error!(error = %e, "Could not save reply log");
            BotError::from(e)
        })?;

        info!("Exited nbviewerbot");
        Ok(snapshot)
    }

    /// Start, run until `shutdown` resolves, then shut down.
    ///
    /// The reply log is persisted even when the run ends with an error. A
    /// failure to load it aborts before anything runs, so a bad log file is
    /// never overwritten.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<MetricsSnapshot, BotError>
    where
        F: Future<Output = ()>,
    {
        self.start()?;
        let run_result = self.run(shutdown).await;
        let shutdown_result = self.shutdown().await;
        run_result.and(shutdown_result)
    }
}
