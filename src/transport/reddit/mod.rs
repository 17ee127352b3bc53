//! Reddit implementation of the transport seams
//!
//! [`RedditClient`] posts replies; [`RedditStream`] turns a listing into an
//! [`ItemSource`](crate::transport::ItemSource).

pub mod client;
pub mod listing;
pub mod stream;

pub use client::RedditClient;
pub use stream::{BoundedSet, RedditStream};
