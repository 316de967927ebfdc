//! Orchestrator discovery subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator (trait, docker.rs implements it for the Docker Engine API)
//!     → list containers / services / configs
//!     → resource.rs (uniform view: labels, template context, scope)
//!     → targets.rs (backend addresses per resource, by scope)
//! ```
//!
//! # Design Decisions
//! - All orchestrator access goes through [`Orchestrator`] so the
//!   reconciliation loop can be driven by a fake in tests
//! - Calls are sequential and carry no timeout of their own

use async_trait::async_trait;

pub mod docker;
pub mod identity;
pub mod resource;
pub mod targets;
pub mod types;

pub use docker::DockerClient;
pub use resource::{ResourceDescriptor, Scope};
pub use targets::{ProxyTargetResolver, ResolveError};
pub use types::{
    ClusterState, ConfigSummary, ContainerDetails, ContainerSummary, DiscoveryError,
    DiscoveryResult, EventFilter, EventStream, LabelSet, NetworkDetails, NetworkEndpoint,
    OrchestratorEvent, ServiceSummary, TaskSummary,
};

/// Capabilities the generator needs from the container orchestrator.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Running containers.
    async fn list_containers(&self) -> DiscoveryResult<Vec<ContainerSummary>>;

    /// Cluster services. Fails when cluster mode is inactive.
    async fn list_services(&self) -> DiscoveryResult<Vec<ServiceSummary>>;

    /// Tasks of `service_id` whose desired state is running.
    async fn list_service_tasks(&self, service_id: &str) -> DiscoveryResult<Vec<TaskSummary>>;

    /// Cluster configuration objects (metadata only).
    async fn list_configs(&self) -> DiscoveryResult<Vec<ConfigSummary>>;

    async fn inspect_container(&self, id: &str) -> DiscoveryResult<ContainerDetails>;

    async fn inspect_network(&self, id: &str) -> DiscoveryResult<NetworkDetails>;

    /// Raw payload of a configuration object.
    async fn config_data(&self, id: &str) -> DiscoveryResult<Vec<u8>>;

    /// Subscribe to lifecycle events matching `filter`.
    async fn subscribe_events(&self, filter: &EventFilter) -> DiscoveryResult<EventStream>;

    /// Whether cluster mode is active on this node.
    async fn probe_cluster_mode(&self) -> DiscoveryResult<ClusterState>;

    /// Id of the container this process runs in.
    async fn current_container_id(&self) -> DiscoveryResult<String> {
        identity::current_container_id()
    }
}
