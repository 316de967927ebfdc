//! Rate-limited cluster-mode probe.

use std::time::Duration;

use tokio::time::Instant;

use crate::discovery::{ClusterState, Orchestrator};
use crate::observability::metrics;

/// Default minimum time between probes.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(60);

/// Cached cluster-mode state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Unavailable,
    Available,
}

/// Caches whether cluster-scoped discovery can be used.
#[derive(Debug)]
pub struct AvailabilityProber {
    interval: Duration,
    state: Availability,
    last_probe: Option<Instant>,
}

impl AvailabilityProber {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Availability::Unavailable,
            last_probe: None,
        }
    }

    pub fn state(&self) -> Availability {
        self.state
    }

    pub fn is_available(&self) -> bool {
        self.state == Availability::Available
    }

    /// Whether the cached state has expired.
    pub fn is_stale(&self) -> bool {
        self.last_probe
            .map_or(true, |at| at.elapsed() > self.interval)
    }

    /// Probe if the cache is stale, then return the cached state.
    pub async fn refresh(&mut self, orchestrator: &dyn Orchestrator) -> Availability {
        if self.is_stale() {
            self.probe(orchestrator).await;
        }
        self.state
    }

    /// Probe unconditionally.
    pub async fn probe(&mut self, orchestrator: &dyn Orchestrator) -> Availability {
        let first = self.last_probe.is_none();
        let result = orchestrator.probe_cluster_mode().await;
        self.last_probe = Some(Instant::now());

        let next = match &result {
            Ok(ClusterState::Active) => Availability::Available,
            Ok(ClusterState::Inactive) | Err(_) => Availability::Unavailable,
        };
        let flipped = next != self.state;
        self.state = next;

        if first || flipped {
            match result {
                Ok(_) if first => tracing::info!(available = self.is_available(), "Swarm availability"),
                Ok(_) => tracing::info!(
                    available = self.is_available(),
                    "Swarm availability changed"
                ),
                Err(e) => tracing::error!(
                    error = %e,
                    "Swarm availability check failed"
                ),
            }
        }

        metrics::record_swarm_available(self.is_available());
        self.state
    }
}

impl Default for AvailabilityProber {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_INTERVAL)
    }
}
