//! Structured logging setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "caddyfile_sync=info";

/// Install the global tracing subscriber.
///
/// `level` overrides the default filter; `RUST_LOG` overrides both.
pub fn init(level: Option<&str>) {
    let fallback = match level {
        Some(level) => format!("caddyfile_sync={}", level),
        None => DEFAULT_FILTER.to_string(),
    };

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
