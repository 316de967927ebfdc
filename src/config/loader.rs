//! Settings loading: file, then flags, then environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::config::cli::Cli;
use crate::config::schema::{parse_duration, Settings};
use crate::config::validation::{validate_settings, ValidationError};

/// Error type for settings loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse a TOML settings file without validating it.
pub fn load_config(path: &Path) -> Result<Settings, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Build the effective settings from every layer and validate them.
pub fn load_settings<F>(cli: &Cli, lookup: F) -> Result<Settings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = match &cli.config {
        Some(path) => load_config(path)?,
        None => Settings::default(),
    };
    cli.apply(&mut settings);
    apply_env_overrides(&mut settings, lookup);

    validate_settings(&settings).map_err(ConfigError::Validation)?;
    Ok(settings)
}

/// Matches the boolean spellings accepted from the environment.
pub fn is_true(value: &str) -> bool {
    static TRUE: OnceLock<Regex> = OnceLock::new();
    TRUE.get_or_init(|| Regex::new(r"(?i)^(true|yes|1)$").expect("static regex"))
        .is_match(value)
}

/// Apply `CADDY_DOCKER_*` (and `DOCKER_HOST`) variables. Empty values are
/// ignored; an unparsable duration is logged and ignored.
pub fn apply_env_overrides<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = get("CADDY_DOCKER_LABEL_PREFIX") {
        settings.label_prefix = v;
    }
    if let Some(v) = get("CADDY_DOCKER_CADDYFILE_PATH") {
        settings.caddyfile_path = Some(PathBuf::from(v));
    }
    if let Some(v) = get("CADDY_DOCKER_IGNORE_SWARM_ERROR") {
        settings.ignore_swarm_error = is_true(&v);
    }
    if let Some(v) = get("CADDY_DOCKER_PROXY_SERVICE_TASKS") {
        settings.proxy_service_tasks = is_true(&v);
    }
    if let Some(v) = get("CADDY_DOCKER_VALIDATE_NETWORK") {
        settings.validate_network = is_true(&v);
    }
    if let Some(v) = get("CADDY_DOCKER_PROCESS_CADDYFILE") {
        settings.process_caddyfile = is_true(&v);
    }
    if let Some(v) = get("CADDY_DOCKER_POLLING_INTERVAL") {
        match parse_duration(&v) {
            Ok(interval) => settings.timing.polling_interval = interval,
            Err(e) => tracing::error!(error = %e, "Failed to parse CADDY_DOCKER_POLLING_INTERVAL"),
        }
    }
    if let Some(v) = get("DOCKER_HOST") {
        settings.docker.host = v;
    }
}
