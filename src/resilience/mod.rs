//! Resilience helpers.
//!
//! # Design Decisions
//! - Discovery and activation calls are not retried within a cycle; the next
//!   poll is the retry
//! - Only the event subscription retries, and only when enabled, with
//!   jittered exponential backoff

pub mod backoff;

pub use backoff::Backoff;
