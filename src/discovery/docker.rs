//! Docker Engine API client.
//!
//! # Responsibilities
//! - Connect to the engine over its unix socket or a `tcp://` host
//! - Map the engine's models onto the discovery types
//! - Resolve task addresses from verbose swarm network inspection, since task
//!   listings carry no network attachments
//!
//! # Design Decisions
//! - The API version is negotiated once, at connect time
//! - The request timeout bounds response headers only; the event stream is open-ended

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use base64::Engine;
use bollard::errors::Error as EngineError;
use bollard::models::{self, EndpointSettings, EventMessage, LocalNodeState, ServiceInfo};
use bollard::query_parameters::{EventsOptionsBuilder, InspectNetworkOptionsBuilder, ListTasksOptionsBuilder};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures_util::StreamExt;
use url::Url;

use super::types::*;
use super::Orchestrator;

/// Default engine socket.
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

/// Seconds to wait for a response from the engine.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Where the engine listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerEndpoint {
    Unix(PathBuf),
    Tcp(String),
}

impl DockerEndpoint {
    /// Parse a `DOCKER_HOST`-style address.
    pub fn parse(host: &str) -> DiscoveryResult<Self> {
        let url = Url::parse(host).map_err(|e| DiscoveryError::Transport(format!("invalid docker host {:?}: {}", host, e)))?;
        match url.scheme() {
            "unix" => Ok(Self::Unix(PathBuf::from(url.path()))),
            "tcp" | "http" => {
                let hostname = url
                    .host_str()
                    .ok_or_else(|| DiscoveryError::Transport(format!("docker host {:?} has no host", host)))?;
                let port = url.port().unwrap_or(2375);
                Ok(Self::Tcp(format!("{}:{}", hostname, port)))
            }
            other => Err(DiscoveryError::Transport(format!(
                "unsupported docker host scheme {:?}",
                other
            ))),
        }
    }
}

/// [`Orchestrator`] backed by the Docker Engine API.
#[derive(Debug, Clone)]
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// Client for `endpoint`. Nothing is sent until the first call.
    pub fn new(endpoint: &DockerEndpoint) -> DiscoveryResult<Self> {
        let docker = match endpoint {
            DockerEndpoint::Unix(path) => {
                Docker::connect_with_unix(&path.to_string_lossy(), REQUEST_TIMEOUT_SECS, API_DEFAULT_VERSION)
            }
            DockerEndpoint::Tcp(addr) => Docker::connect_with_http(addr, REQUEST_TIMEOUT_SECS, API_DEFAULT_VERSION),
        }
        .map_err(engine_error)?;
        Ok(Self { docker })
    }

    /// Connect to a `DOCKER_HOST`-style address, negotiate the API version
    /// and check that the engine answers.
    pub async fn connect(host: &str) -> DiscoveryResult<Self> {
        let client = Self::new(&DockerEndpoint::parse(host)?)?;
        let docker = client.docker.negotiate_version().await.map_err(engine_error)?;
        docker.ping().await.map_err(engine_error)?;
        tracing::debug!(api_version = ?docker.client_version(), "docker API version negotiated");
        Ok(Self { docker })
    }
}

fn engine_error(e: EngineError) -> DiscoveryError {
    match e {
        EngineError::DockerResponseServerError { status_code, message } => DiscoveryError::Api {
            status: status_code,
            message,
        },
        e @ (EngineError::JsonDataError { .. } | EngineError::JsonSerdeError { .. }) => {
            DiscoveryError::Decode(e.to_string())
        }
        e => DiscoveryError::Transport(e.to_string()),
    }
}

// --- Model mapping ---

fn endpoints(networks: Option<HashMap<String, EndpointSettings>>) -> Vec<NetworkEndpoint> {
    let mut endpoints: Vec<NetworkEndpoint> = networks
        .unwrap_or_default()
        .into_values()
        .map(|n| NetworkEndpoint::new(n.network_id.unwrap_or_default(), n.ip_address.unwrap_or_default()))
        .collect();
    endpoints.sort_by(|a, b| a.network_id.cmp(&b.network_id));
    endpoints
}

fn container_summary(c: models::ContainerSummary) -> ContainerSummary {
    ContainerSummary {
        id: c.id.unwrap_or_default(),
        names: c.names.unwrap_or_default(),
        image: c.image.unwrap_or_default(),
        labels: c.labels.unwrap_or_default(),
        networks: endpoints(c.network_settings.and_then(|s| s.networks)),
    }
}

fn service_summary(s: models::Service) -> ServiceSummary {
    let spec = s.spec.unwrap_or_default();
    ServiceSummary {
        id: s.id.unwrap_or_default(),
        name: spec.name.unwrap_or_default(),
        image: spec
            .task_template
            .and_then(|t| t.container_spec)
            .and_then(|c| c.image)
            .unwrap_or_default(),
        labels: spec.labels.unwrap_or_default(),
        virtual_ips: s
            .endpoint
            .and_then(|e| e.virtual_ips)
            .unwrap_or_default()
            .into_iter()
            .map(|v| NetworkEndpoint::new(v.network_id.unwrap_or_default(), v.addr.unwrap_or_default()))
            .collect(),
    }
}

/// Networks a service is attached to, VIP networks first.
fn service_networks(s: &models::Service) -> Vec<String> {
    let vips = s
        .endpoint
        .iter()
        .flat_map(|e| e.virtual_ips.iter().flatten())
        .filter_map(|v| v.network_id.clone());
    let spec = s.spec.as_ref();
    let attached = spec
        .and_then(|spec| spec.task_template.as_ref())
        .and_then(|t| t.networks.as_ref())
        .into_iter()
        .chain(spec.and_then(|spec| spec.networks.as_ref()))
        .flatten()
        .filter_map(|n| n.target.clone());

    let mut networks: Vec<String> = Vec::new();
    for id in vips.chain(attached) {
        if !networks.contains(&id) {
            networks.push(id);
        }
    }
    networks
}

/// Task endpoints of `service_name` from a verbose network inspection, keyed
/// by the network's task name (`<service>.<slot>.<task id>`).
fn service_task_endpoints(
    network_id: &str,
    services: Option<HashMap<String, serde_json::Value>>,
    service_name: &str,
) -> DiscoveryResult<Vec<(String, NetworkEndpoint)>> {
    let Some(info) = services.and_then(|mut s| s.remove(service_name)) else {
        return Ok(Vec::new());
    };
    let info: ServiceInfo = serde_json::from_value(info)
        .map_err(|e| DiscoveryError::Decode(format!("network {} service {}: {}", network_id, service_name, e)))?;
    Ok(info
        .tasks
        .unwrap_or_default()
        .into_iter()
        .filter_map(|t| Some((t.name?, NetworkEndpoint::new(network_id, t.endpoint_ip?))))
        .collect())
}

fn task_summary(t: models::Task, endpoints: &[(String, NetworkEndpoint)]) -> TaskSummary {
    let id = t.id.unwrap_or_default();
    let suffix = format!(".{}", id);
    TaskSummary {
        attachments: endpoints
            .iter()
            .filter(|(name, _)| !id.is_empty() && name.ends_with(&suffix))
            .map(|(_, endpoint)| endpoint.clone())
            .collect(),
        service_id: t.service_id.unwrap_or_default(),
        id,
    }
}

fn config_summary(c: models::Config) -> ConfigSummary {
    let spec = c.spec.unwrap_or_default();
    ConfigSummary {
        id: c.id.unwrap_or_default(),
        name: spec.name.unwrap_or_default(),
        labels: spec.labels.unwrap_or_default(),
    }
}

fn orchestrator_event(m: EventMessage) -> OrchestratorEvent {
    OrchestratorEvent::new(
        m.typ.map(|t| t.to_string()).unwrap_or_default(),
        m.action.unwrap_or_default(),
    )
}

#[async_trait]
impl Orchestrator for DockerClient {
    async fn list_containers(&self) -> DiscoveryResult<Vec<ContainerSummary>> {
        let containers = self.docker.list_containers(None).await.map_err(engine_error)?;
        Ok(containers.into_iter().map(container_summary).collect())
    }

    async fn list_services(&self) -> DiscoveryResult<Vec<ServiceSummary>> {
        let services = self.docker.list_services(None).await.map_err(engine_error)?;
        Ok(services.into_iter().map(service_summary).collect())
    }

    async fn list_service_tasks(&self, service_id: &str) -> DiscoveryResult<Vec<TaskSummary>> {
        let service = self
            .docker
            .inspect_service(service_id, None)
            .await
            .map_err(engine_error)?;
        let service_name = service.spec.as_ref().and_then(|s| s.name.clone()).unwrap_or_default();

        let filters = HashMap::from([("service", vec![service_id]), ("desired-state", vec!["running"])]);
        let tasks = self
            .docker
            .list_tasks(Some(ListTasksOptionsBuilder::new().filters(&filters).build()))
            .await
            .map_err(engine_error)?;

        let mut task_endpoints = Vec::new();
        for network in service_networks(&service) {
            let options = InspectNetworkOptionsBuilder::new().verbose(true).scope("swarm").build();
            let inspected = self
                .docker
                .inspect_network(&network, Some(options))
                .await
                .map_err(engine_error)?;
            let network_id = inspected.id.unwrap_or(network);
            task_endpoints.extend(service_task_endpoints(&network_id, inspected.services, &service_name)?);
        }

        Ok(tasks
            .into_iter()
            .map(|t| task_summary(t, &task_endpoints))
            .collect())
    }

    async fn list_configs(&self) -> DiscoveryResult<Vec<ConfigSummary>> {
        let configs = self.docker.list_configs(None).await.map_err(engine_error)?;
        Ok(configs.into_iter().map(config_summary).collect())
    }

    async fn inspect_container(&self, id: &str) -> DiscoveryResult<ContainerDetails> {
        let container = self.docker.inspect_container(id, None).await.map_err(engine_error)?;
        Ok(ContainerDetails {
            id: container.id.unwrap_or_else(|| id.to_string()),
            networks: endpoints(container.network_settings.and_then(|s| s.networks)),
        })
    }

    async fn inspect_network(&self, id: &str) -> DiscoveryResult<NetworkDetails> {
        let network = self.docker.inspect_network(id, None).await.map_err(engine_error)?;
        Ok(NetworkDetails {
            id: network.id.unwrap_or_else(|| id.to_string()),
            name: network.name.unwrap_or_default(),
            ingress: network.ingress.unwrap_or(false),
        })
    }

    async fn config_data(&self, id: &str) -> DiscoveryResult<Vec<u8>> {
        let config = self.docker.inspect_config(id).await.map_err(engine_error)?;
        let data = config.spec.and_then(|s| s.data).unwrap_or_default();
        base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| DiscoveryError::Decode(format!("config {} data: {}", id, e)))
    }

    async fn subscribe_events(&self, filter: &EventFilter) -> DiscoveryResult<EventStream> {
        let filters = HashMap::from([("scope", filter.scopes.clone()), ("type", filter.kinds.clone())]);
        let options = EventsOptionsBuilder::new().filters(&filters).build();
        let events = self
            .docker
            .events(Some(options))
            .map(|item| item.map(orchestrator_event).map_err(engine_error));
        Ok(Box::pin(events))
    }

    async fn probe_cluster_mode(&self) -> DiscoveryResult<ClusterState> {
        let info = self.docker.info().await.map_err(engine_error)?;
        match info.swarm.and_then(|s| s.local_node_state) {
            Some(LocalNodeState::ACTIVE) => Ok(ClusterState::Active),
            _ => Ok(ClusterState::Inactive),
        }
    }
}
