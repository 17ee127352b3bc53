//! The reply bot: item model, reply log, link extraction, rendering,
//! posting, feeders, dispatcher and lifecycle

pub mod dispatcher;
pub mod feeder;
pub mod item;
pub mod lifecycle;
pub mod links;
pub mod poster;
pub mod store;
pub mod template;

pub use dispatcher::{Dispatcher, ItemOutcome};
pub use feeder::{Feeder, FeederSet};
pub use item::{DiscussionItem, ItemKind, Reply};
pub use lifecycle::BotLifecycle;
pub use links::{item_links, LinkExtractor, NotebookLinkExtractor};
pub use poster::{PostError, ReplyPoster, RetryPolicy};
pub use store::{FileReplyStore, MemoryReplyStore, ReplyRecord, ReplyStore, StoreError};
pub use template::ReplyRenderer;
