//! Mock implementations for testing
//!
//! `MockTransport` records every reply attempt and plays back scripted
//! results. `ScriptedSource` yields a fixed list of items and then ends in
//! a chosen way: exhausted, pending forever, or failing.

use crate::bot::item::{DiscussionItem, Reply};
use crate::transport::{ItemSource, Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One call made to [`MockTransport::reply`]
#[derive(Debug, Clone)]
pub struct ReplyCall {
    pub item_id: String,
    pub text: String,
    pub at: tokio::time::Instant,
}

/// Mock transport for testing
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    calls: Arc<Mutex<Vec<ReplyCall>>>,
    scripted: Arc<Mutex<VecDeque<Result<Reply, TransportError>>>>,
    always_fail: Option<TransportError>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with `error`
    pub fn always_fail(mut self, error: TransportError) -> Self {
        self.always_fail = Some(error);
        self
    }

    /// Queue a result for the next call; unscripted calls succeed
    pub fn push_result(&self, result: Result<Reply, TransportError>) {
        self.scripted
            .lock()
            .expect("scripted results lock")
            .push_back(result);
    }

    pub fn calls(&self) -> Vec<ReplyCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }

    /// Item ids in call order
    pub fn replied_ids(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|call| call.item_id)
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn reply(&self, item: &DiscussionItem, text: &str) -> Result<Reply, TransportError> {
        let call_number = {
            let mut calls = self.calls.lock().expect("calls lock");
            calls.push(ReplyCall {
                item_id: item.id.clone(),
                text: text.to_string(),
                at: tokio::time::Instant::now(),
            });
            calls.len()
        };

        if let Some(error) = &self.always_fail {
            return Err(error.clone());
        }

        let scripted = self
            .scripted
            .lock()
            .expect("scripted results lock")
            .pop_front();
        scripted.unwrap_or_else(|| {
            let id = format!("reply{call_number}");
            Ok(Reply {
                fullname: format!("t1_{id}"),
                id,
            })
        })
    }
}

/// What a [`ScriptedSource`] does after its items run out
#[derive(Debug, Clone)]
pub enum SourceEnd {
    /// Return `Ok(None)`
    Exhaust,
    /// Never return again
    Pend,
    /// Return an error with this message
    Fail(String),
}

/// Item source that yields a fixed list of items
#[derive(Debug)]
pub struct ScriptedSource {
    name: String,
    items: VecDeque<DiscussionItem>,
    end: SourceEnd,
    pulled: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new<N: Into<String>>(name: N, items: Vec<DiscussionItem>) -> Self {
        Self {
            name: name.into(),
            items: items.into(),
            end: SourceEnd::Exhaust,
            pulled: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn then_pend(mut self) -> Self {
        self.end = SourceEnd::Pend;
        self
    }

    pub fn then_fail<M: Into<String>>(mut self, message: M) -> Self {
        self.end = SourceEnd::Fail(message.into());
        self
    }

    /// Counter of items handed out so far, readable after the source moves
    pub fn pulled(&self) -> Arc<AtomicUsize> {
        self.pulled.clone()
    }
}

#[async_trait]
impl ItemSource for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_item(&mut self) -> Result<Option<DiscussionItem>, TransportError> {
        if let Some(item) = self.items.pop_front() {
            self.pulled.fetch_add(1, Ordering::SeqCst);
            return Ok(Some(item));
        }

        match &self.end {
            SourceEnd::Exhaust => Ok(None),
            SourceEnd::Pend => std::future::pending().await,
            SourceEnd::Fail(message) => Err(TransportError::Connection(message.clone())),
        }
    }
}

/// `count` comments named `{prefix}{n}`, each linking one notebook
pub fn notebook_comments(prefix: &str, count: usize) -> Vec<DiscussionItem> {
    (0..count)
        .map(|n| {
            DiscussionItem::comment(
                format!("{prefix}{n}"),
                format!(
                    r#"<div class="md"><p><a href="https://github.com/user/repo/blob/master/{prefix}{n}.ipynb">notebook</a></p></div>"#
                ),
            )
        })
        .collect()
}
