//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → cli.rs (flags that were given)
//!     → loader.rs (CADDY_DOCKER_* environment, wins over flags)
//!     → validation.rs (semantic checks)
//!     → Settings (validated, immutable)
//!     → passed by value into each subsystem's constructor
//!
//! On seed document change:
//!     watcher.rs detects change
//!     → Trigger::Event sent to the reconcile controller
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded; the seed document is re-read every cycle
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use cli::Cli;
pub use loader::{load_settings, ConfigError};
pub use schema::{parse_duration, Settings};
