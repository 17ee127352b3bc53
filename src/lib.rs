//! nbviewerbot
//!
//! A Reddit bot that watches comment and submission streams for links to
//! Jupyter notebooks on GitHub and replies with nbviewer (and optionally
//! Binder) mirrors, since GitHub's own notebook renderer is slow and often
//! fails on large notebooks.
//!
//! # Overview
//!
//! - Feeders pull items from platform listings into a bounded work queue
//! - A single dispatcher checks the reply log, extracts notebook links and
//!   posts a rendered reply with bounded exponential backoff
//! - The reply log is loaded at startup and persisted at shutdown
//! - A dead feeder stops the whole worker
//!
//! # Quick Start
//!
//! ```rust
//! use nbviewerbot::bot::{item_links, DiscussionItem, NotebookLinkExtractor, ReplyRenderer};
//!
//! let item = DiscussionItem::comment(
//!     "abc123",
//!     r#"<p><a href="https://github.com/user/repo/blob/master/nb.ipynb">nb</a></p>"#,
//! );
//! let links = item_links(&NotebookLinkExtractor, &item);
//! assert_eq!(links.len(), 1);
//!
//! let reply = ReplyRenderer::new(true).render(&links).unwrap();
//! assert!(reply.contains("https://nbviewer.jupyter.org/url/github.com/user/repo/blob/master/nb.ipynb"));
//! ```

pub mod bot;
pub mod config;
pub mod error;
pub mod observability;
pub mod testing;
pub mod transport;

pub use bot::{BotLifecycle, DiscussionItem, ItemKind, ItemOutcome, Reply};
pub use config::*;
pub use error::BotError;
pub use transport::reddit::{RedditClient, RedditStream};
pub use transport::{ItemSource, Transport, TransportError};
