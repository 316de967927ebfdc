//! Cluster-mode availability subsystem.
//!
//! # State Machine
//! ```text
//! Unavailable ←→ Available
//! ```
//! Transitions happen only on an explicit probe, and at most one probe runs
//! per interval. A failed probe means Unavailable.
//!
//! # Design Decisions
//! - Cached so a node without cluster mode is not asked every cycle
//! - Logged only on the first probe and on flips, so a persistently failing
//!   probe does not flood the log

pub mod prober;

pub use prober::{Availability, AvailabilityProber, DEFAULT_PROBE_INTERVAL};
