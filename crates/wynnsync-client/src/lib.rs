//! Async HTTP client for the game-data API.
//!
//! Implements [`wynnsync_core::upstream::Upstream`] on top of `reqwest`, with
//! request pacing and a fixed-window cooldown after the upstream rate-limits
//! us.

mod client;
mod pacer;

pub mod error;

pub use client::{ApiClient, ClientConfig};
pub use error::{Error, Result};
