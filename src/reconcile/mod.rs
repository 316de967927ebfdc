//! Reconciliation subsystem.
//!
//! # Data Flow
//! ```text
//! events.rs (orchestrator event stream) ─┐
//! config::watcher (seed file changes) ───┼→ Trigger channel
//! lifecycle::signals (SIGHUP) ───────────┘        │
//!                                                 ▼
//!                          controller.rs (single actor, poll + debounce timers)
//!                                                 │
//!                                                 ▼
//!                          generator.rs (discover → parse → merge → serialize)
//!                                                 │ bytes changed?
//!                                                 ▼
//!                          apply.rs (validate → activate)
//! ```
//!
//! # Design Decisions
//! - One actor owns all mutable cycle state; triggers are messages, so
//!   cycles never overlap
//! - A rejected document is still remembered, so it is not re-submitted
//!   until the generated output changes again
//! - Diagnostic text is diffed separately from the document and only logged
//!   when it changes

pub mod apply;
pub mod controller;
pub mod events;
pub mod generator;

pub use apply::{ActiveDocument, Applier, ApplyError, CaddyAdminApplier, MemoryApplier};
pub use controller::{CycleOutcome, ReconcileController, Trigger};
pub use events::EventSubscription;
pub use generator::{CycleError, Generation, Generator};
