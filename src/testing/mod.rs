//! Testing utilities and mock implementations
//!
//! Mock transports and scripted item sources for driving the dispatcher,
//! feeders and lifecycle without talking to Reddit.

pub mod mocks;

pub use mocks::*;
