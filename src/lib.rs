//! Caddyfile generation from Docker labels.

pub mod availability;
pub mod config;
pub mod directive;
pub mod discovery;
pub mod labels;
pub mod lifecycle;
pub mod observability;
pub mod reconcile;
pub mod resilience;

pub use config::Settings;
pub use lifecycle::Shutdown;
pub use reconcile::{ReconcileController, Trigger};
