//! Command-line flags.
//!
//! Every flag is optional so an unset flag never clobbers a value from the
//! settings file. Environment variables are applied after flags.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::schema::{parse_duration, Settings};
use crate::directive::SuffixSource;

#[derive(Parser, Debug, Default)]
#[command(name = "caddyfile-sync")]
#[command(about = "Generates a Caddyfile from Docker labels and keeps it in sync", long_about = None)]
pub struct Cli {
    /// TOML settings file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Label namespace to read.
    #[arg(long)]
    pub label_prefix: Option<String>,

    /// Seed Caddyfile prepended to the generated output.
    #[arg(long)]
    pub caddyfile_path: Option<PathBuf>,

    /// Abort a cycle on any discovery error.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub ignore_swarm_error: Option<bool>,

    /// Proxy to task replicas instead of the service name.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub proxy_service_tasks: Option<bool>,

    /// Only accept addresses on networks shared with this process.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub validate_network: Option<bool>,

    /// Validate seed server blocks individually and drop invalid ones.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub process_caddyfile: Option<bool>,

    /// Periodic regeneration interval (e.g. 30s, 1m30s).
    #[arg(long, value_parser = parse_duration)]
    pub polling_interval: Option<Duration>,

    /// Event debounce window.
    #[arg(long, value_parser = parse_duration)]
    pub debounce: Option<Duration>,

    /// Conflict suffix source: secure, seeded or seeded:<n>.
    #[arg(long)]
    pub suffix_source: Option<SuffixSource>,

    /// Docker Engine address.
    #[arg(long)]
    pub docker_host: Option<String>,

    /// Caddy admin endpoint; empty keeps documents in memory only.
    #[arg(long)]
    pub caddy_admin: Option<String>,

    /// Re-subscribe to events after the stream fails.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub resubscribe_events: Option<bool>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Enable the Prometheus endpoint on this address.
    #[arg(long)]
    pub metrics_address: Option<String>,

    /// Generate once, print the document and exit.
    #[arg(long)]
    pub once: bool,
}

impl Cli {
    /// Overlay the flags that were given onto `settings`.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(prefix) = &self.label_prefix {
            settings.label_prefix = prefix.clone();
        }
        if let Some(path) = &self.caddyfile_path {
            settings.caddyfile_path = Some(path.clone());
        }
        if let Some(v) = self.ignore_swarm_error {
            settings.ignore_swarm_error = v;
        }
        if let Some(v) = self.proxy_service_tasks {
            settings.proxy_service_tasks = v;
        }
        if let Some(v) = self.validate_network {
            settings.validate_network = v;
        }
        if let Some(v) = self.process_caddyfile {
            settings.process_caddyfile = v;
        }
        if let Some(v) = self.polling_interval {
            settings.timing.polling_interval = v;
        }
        if let Some(v) = self.debounce {
            settings.timing.debounce = v;
        }
        if let Some(v) = self.suffix_source {
            settings.suffix = v;
        }
        if let Some(host) = &self.docker_host {
            settings.docker.host = host.clone();
        }
        if let Some(url) = &self.caddy_admin {
            settings.caddy.admin_url = url.clone();
        }
        if let Some(v) = self.resubscribe_events {
            settings.resubscribe_events = v;
        }
        if let Some(level) = &self.log_level {
            settings.observability.log_level = level.clone();
        }
        if let Some(addr) = &self.metrics_address {
            settings.observability.metrics_enabled = true;
            settings.observability.metrics_address = addr.clone();
        }
    }
}
