//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the optional TOML
//! settings file. Every field has a default so an empty file is valid.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::directive::SuffixSource;
use crate::labels::DEFAULT_LABEL_PREFIX;

/// Root settings for the generator.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Label namespace recognized on containers, services and configs.
    pub label_prefix: String,

    /// Seed document prepended to every generated document.
    pub caddyfile_path: Option<PathBuf>,

    /// Strict mode: abort a cycle on any discovery error or when cluster
    /// mode is unavailable.
    pub ignore_swarm_error: bool,

    /// Proxy to individual task replicas instead of the service name.
    pub proxy_service_tasks: bool,

    /// Only accept addresses on networks shared with this process.
    pub validate_network: bool,

    /// Validate seed server blocks one by one and drop the invalid ones.
    pub process_caddyfile: bool,

    /// Re-subscribe to orchestrator events after the stream fails.
    pub resubscribe_events: bool,

    /// Timer settings.
    pub timing: TimingConfig,

    /// Conflict suffix source.
    pub suffix: SuffixSource,

    /// Orchestrator connection.
    pub docker: DockerConfig,

    /// Document activation target.
    pub caddy: CaddyConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            label_prefix: DEFAULT_LABEL_PREFIX.to_string(),
            caddyfile_path: None,
            ignore_swarm_error: false,
            proxy_service_tasks: false,
            validate_network: true,
            process_caddyfile: false,
            resubscribe_events: false,
            timing: TimingConfig::default(),
            suffix: SuffixSource::default(),
            docker: DockerConfig::default(),
            caddy: CaddyConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Timer configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    /// Periodic regeneration interval.
    #[serde(with = "humanized")]
    pub polling_interval: Duration,

    /// Quiet period after an event before regenerating.
    #[serde(with = "humanized")]
    pub debounce: Duration,

    /// Minimum time between cluster-mode probes.
    #[serde(with = "humanized")]
    pub availability_interval: Duration,

    /// Ceiling for event re-subscription backoff.
    #[serde(with = "humanized")]
    pub resubscribe_max_delay: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            polling_interval: Duration::from_secs(30),
            debounce: Duration::from_millis(100),
            availability_interval: Duration::from_secs(60),
            resubscribe_max_delay: Duration::from_secs(30),
        }
    }
}

/// Docker Engine connection.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DockerConfig {
    /// `unix:///path` or `tcp://host:port`.
    pub host: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            host: crate::discovery::docker::DEFAULT_DOCKER_HOST.to_string(),
        }
    }
}

/// Caddy admin API settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CaddyConfig {
    /// Admin endpoint base URL. Empty keeps documents in memory only.
    pub admin_url: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CaddyConfig {
    fn default() -> Self {
        Self {
            admin_url: "http://localhost:2019".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Error returned for an unparsable duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationError(pub String);

impl fmt::Display for DurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid duration '{}'", self.0)
    }
}

impl std::error::Error for DurationError {}

/// Parse `500ms`, `30s`, `1m30s`, `2h`. A bare number is seconds.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let text = input.trim();
    if text.is_empty() {
        return Err(DurationError(input.to_string()));
    }
    if let Ok(secs) = text.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = text;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| DurationError(input.to_string()))?;
        if digits == 0 {
            return Err(DurationError(input.to_string()));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|_| DurationError(input.to_string()))?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let part = match &rest[..unit_len] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value * 60),
            "h" => Duration::from_secs(value * 3600),
            _ => return Err(DurationError(input.to_string())),
        };
        total += part;
        rest = &rest[unit_len..];
    }
    Ok(total)
}

/// Render a duration in the form `parse_duration` accepts.
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis % 1000 != 0 {
        return format!("{}ms", millis);
    }
    let secs = duration.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut out = String::new();
    if h > 0 {
        out.push_str(&format!("{}h", h));
    }
    if m > 0 {
        out.push_str(&format!("{}m", m));
    }
    if s > 0 || out.is_empty() {
        out.push_str(&format!("{}s", s));
    }
    out
}

/// Serde adapter for humanized durations.
mod humanized {
    use super::{format_duration, parse_duration};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
