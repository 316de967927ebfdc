//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → controller, event task and watcher stop
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Trigger::Refresh to the reconcile controller
//! ```
//!
//! # Design Decisions
//! - A cycle in progress is never interrupted; shutdown is observed between cycles
//! - Startup failures (settings, engine unreachable) are fatal; nothing after is

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
