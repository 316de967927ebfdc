//! Discovered resource types and discovery errors.

use std::collections::HashMap;
use std::pin::Pin;

use futures_util::Stream;
use thiserror::Error;

/// Label key → value, as attached to a container, service or config.
pub type LabelSet = HashMap<String, String>;

/// A container's (or service VIP's, or task's) address on one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkEndpoint {
    /// Network identifier.
    pub network_id: String,
    /// Address on that network. May carry a `/prefix` CIDR suffix.
    pub address: String,
}

impl NetworkEndpoint {
    pub fn new(network_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            network_id: network_id.into(),
            address: address.into(),
        }
    }

    /// The address without any CIDR suffix.
    pub fn ip(&self) -> &str {
        self.address
            .split_once('/')
            .map_or(self.address.as_str(), |(ip, _)| ip)
    }
}

/// A running container as returned by container listing.
#[derive(Debug, Clone, Default)]
pub struct ContainerSummary {
    pub id: String,
    /// Names as reported by the engine (usually with a leading `/`).
    pub names: Vec<String>,
    pub image: String,
    pub labels: LabelSet,
    pub networks: Vec<NetworkEndpoint>,
}

/// Container details from inspection.
#[derive(Debug, Clone, Default)]
pub struct ContainerDetails {
    pub id: String,
    pub networks: Vec<NetworkEndpoint>,
}

/// A cluster service.
#[derive(Debug, Clone, Default)]
pub struct ServiceSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub labels: LabelSet,
    /// Load-balanced addresses, one per attached network.
    pub virtual_ips: Vec<NetworkEndpoint>,
}

/// A running task (replica) of a service.
#[derive(Debug, Clone, Default)]
pub struct TaskSummary {
    pub id: String,
    pub service_id: String,
    pub attachments: Vec<NetworkEndpoint>,
}

/// A cluster configuration object.
#[derive(Debug, Clone, Default)]
pub struct ConfigSummary {
    pub id: String,
    pub name: String,
    pub labels: LabelSet,
}

/// Network details from inspection.
#[derive(Debug, Clone, Default)]
pub struct NetworkDetails {
    pub id: String,
    pub name: String,
    /// Routing-mesh ingress network; never a valid proxy path.
    pub ingress: bool,
}

/// Whether the orchestrator's cluster mode is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterState {
    Active,
    Inactive,
}

/// A lifecycle event from the event subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorEvent {
    /// Resource type, e.g. `container`, `service`, `config`.
    pub kind: String,
    /// Action, e.g. `start`, `destroy`, `update`.
    pub action: String,
}

impl OrchestratorEvent {
    pub fn new(kind: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            action: action.into(),
        }
    }

    /// True for events that can change the generated document.
    pub fn affects_routing(&self) -> bool {
        matches!(
            (self.kind.as_str(), self.action.as_str()),
            ("container", "create" | "start" | "stop" | "die" | "destroy")
                | ("service", "create" | "update" | "remove")
                | ("config", "create" | "remove")
        )
    }
}

/// Event subscription filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub scopes: Vec<String>,
    pub kinds: Vec<String>,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self {
            scopes: vec!["swarm".into(), "local".into()],
            kinds: vec!["service".into(), "container".into(), "config".into()],
        }
    }
}

/// Live event stream. Ends, or yields a terminal error, when the source is gone.
pub type EventStream = Pin<Box<dyn Stream<Item = DiscoveryResult<OrchestratorEvent>> + Send>>;

/// Errors from the orchestrator API.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Connection to the orchestrator failed or broke.
    #[error("transport error: {0}")]
    Transport(String),

    /// The API answered with a non-success status.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// A response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The identity of the proxy's own container could not be determined.
    #[error("cannot determine own container id: {0}")]
    Identity(String),

    /// The requested operation is not available (e.g. cluster mode inactive).
    #[error("not available: {0}")]
    Unavailable(String),
}

impl DiscoveryError {
    /// Whether an event stream yielding this error is finished.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DiscoveryError::Decode(_))
    }
}

/// Result type for orchestrator operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_ip_strips_cidr() {
        assert_eq!(NetworkEndpoint::new("n", "10.0.0.3/24").ip(), "10.0.0.3");
        assert_eq!(NetworkEndpoint::new("n", "10.0.0.3").ip(), "10.0.0.3");
    }

    #[test]
    fn test_routing_events() {
        assert!(OrchestratorEvent::new("container", "start").affects_routing());
        assert!(OrchestratorEvent::new("config", "remove").affects_routing());
        assert!(OrchestratorEvent::new("service", "update").affects_routing());
        assert!(!OrchestratorEvent::new("container", "exec_start").affects_routing());
        assert!(!OrchestratorEvent::new("network", "create").affects_routing());
    }

    #[test]
    fn test_error_display() {
        let err = DiscoveryError::Api {
            status: 503,
            message: "This node is not a swarm manager.".into(),
        };
        assert!(err.to_string().contains("503"));
        assert!(err.is_terminal());
        assert!(!DiscoveryError::Decode("bad".into()).is_terminal());
    }
}
