//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - The per-cycle diagnostic text is separate from the tracing stream;
//!   it is only emitted when it differs from the previous cycle's
//! - Metrics are cheap no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
