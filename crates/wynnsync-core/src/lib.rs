//! Core types and trait definitions for the wynnsync change tracker.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the canonical data model, the canonicalizer, the snapshot differ, and the
//! traits that the store and upstream collaborators implement.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod canonical;
pub mod changelog;
pub mod collection;
pub mod diff;
pub mod error;
pub mod presence;
pub mod snapshot;
pub mod store;
pub mod upstream;

pub use error::{Error, Result};
