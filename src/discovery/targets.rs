//! Proxy target resolution.
//!
//! # Strategies
//! - Container: the container's own addresses on the proxy's networks
//! - Service: the service name, resolved to the load-balanced VIP by DNS
//! - Service with task proxying: one address per running task
//!
//! # Design Decisions
//! - With network validation on, only networks the proxy itself is attached
//!   to count; a resource sharing none of them is an error, not a silent skip
//! - Addresses are returned in network-id / task-id order so the generated
//!   arguments are stable between polls

use std::collections::HashSet;

use thiserror::Error;

use super::resource::{ResourceDescriptor, Scope};
use super::types::{DiscoveryError, NetworkEndpoint, ServiceSummary};
use super::Orchestrator;

/// Errors resolving backend addresses for a resource.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The resource shares no network with the proxy.
    #[error("{kind} {id} and caddy are not in same network")]
    NotInSameNetwork { kind: &'static str, id: String },

    /// Looking up tasks or addresses failed.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// Scope-aware backend address resolver.
#[derive(Debug, Clone, Copy)]
pub struct ProxyTargetResolver {
    validate_network: bool,
    proxy_service_tasks: bool,
}

impl ProxyTargetResolver {
    pub fn new(validate_network: bool, proxy_service_tasks: bool) -> Self {
        Self {
            validate_network,
            proxy_service_tasks,
        }
    }

    /// Backend addresses for `resource`.
    ///
    /// `networks` is the proxy's own network allowlist; `None` means it could
    /// not be determined, which fails every lookup when validation is on.
    pub async fn resolve(
        &self,
        orchestrator: &dyn Orchestrator,
        resource: ResourceDescriptor<'_>,
        networks: Option<&HashSet<String>>,
    ) -> Result<Vec<String>, ResolveError> {
        match (resource.scope(self.proxy_service_tasks), resource) {
            (Scope::Container, ResourceDescriptor::Container(container)) => {
                let ips = self.allowed_ips(&container.networks, networks);
                if ips.is_empty() {
                    return Err(not_in_same_network(resource));
                }
                Ok(ips)
            }
            (Scope::ServiceTask, ResourceDescriptor::Service(service)) => {
                self.task_ips(orchestrator, service, networks).await
            }
            (_, ResourceDescriptor::Service(service)) => {
                if self.validate_network && !self.shares_network(&service.virtual_ips, networks) {
                    return Err(not_in_same_network(resource));
                }
                Ok(vec![service.name.clone()])
            }
            (_, ResourceDescriptor::Container(_)) => Err(not_in_same_network(resource)),
        }
    }

    async fn task_ips(
        &self,
        orchestrator: &dyn Orchestrator,
        service: &ServiceSummary,
        networks: Option<&HashSet<String>>,
    ) -> Result<Vec<String>, ResolveError> {
        let mut tasks = orchestrator.list_service_tasks(&service.id).await?;
        tasks.sort_by(|a, b| a.id.cmp(&b.id));

        let ips: Vec<String> = tasks
            .iter()
            .flat_map(|task| self.allowed_ips(&task.attachments, networks))
            .collect();

        if ips.is_empty() {
            return Err(not_in_same_network(ResourceDescriptor::Service(service)));
        }
        Ok(ips)
    }

    fn is_allowed(&self, network_id: &str, networks: Option<&HashSet<String>>) -> bool {
        !self.validate_network || networks.is_some_and(|n| n.contains(network_id))
    }

    fn shares_network(&self, endpoints: &[NetworkEndpoint], networks: Option<&HashSet<String>>) -> bool {
        endpoints.iter().any(|e| self.is_allowed(&e.network_id, networks))
    }

    fn allowed_ips(&self, endpoints: &[NetworkEndpoint], networks: Option<&HashSet<String>>) -> Vec<String> {
        let mut endpoints: Vec<&NetworkEndpoint> = endpoints
            .iter()
            .filter(|e| !e.address.is_empty() && self.is_allowed(&e.network_id, networks))
            .collect();
        endpoints.sort_by(|a, b| a.network_id.cmp(&b.network_id));
        endpoints.into_iter().map(|e| e.ip().to_string()).collect()
    }
}

fn not_in_same_network(resource: ResourceDescriptor<'_>) -> ResolveError {
    ResolveError::NotInSameNetwork {
        kind: resource.kind(),
        id: resource.id().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::types::*;
    use async_trait::async_trait;

    struct Tasks(Vec<TaskSummary>);

    #[async_trait]
    impl Orchestrator for Tasks {
        async fn list_containers(&self) -> DiscoveryResult<Vec<ContainerSummary>> {
            Ok(vec![])
        }
        async fn list_services(&self) -> DiscoveryResult<Vec<ServiceSummary>> {
            Ok(vec![])
        }
        async fn list_service_tasks(&self, service_id: &str) -> DiscoveryResult<Vec<TaskSummary>> {
            Ok(self.0.iter().filter(|t| t.service_id == service_id).cloned().collect())
        }
        async fn list_configs(&self) -> DiscoveryResult<Vec<ConfigSummary>> {
            Ok(vec![])
        }
        async fn inspect_container(&self, _id: &str) -> DiscoveryResult<ContainerDetails> {
            Err(DiscoveryError::Unavailable("test".into()))
        }
        async fn inspect_network(&self, _id: &str) -> DiscoveryResult<NetworkDetails> {
            Err(DiscoveryError::Unavailable("test".into()))
        }
        async fn config_data(&self, _id: &str) -> DiscoveryResult<Vec<u8>> {
            Ok(vec![])
        }
        async fn subscribe_events(&self, _filter: &EventFilter) -> DiscoveryResult<EventStream> {
            Err(DiscoveryError::Unavailable("test".into()))
        }
        async fn probe_cluster_mode(&self) -> DiscoveryResult<ClusterState> {
            Ok(ClusterState::Active)
        }
    }

    fn allowlist(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn container() -> ContainerSummary {
        ContainerSummary {
            id: "c1".into(),
            networks: vec![
                NetworkEndpoint::new("net-b", "172.18.0.4"),
                NetworkEndpoint::new("net-a", "10.0.0.5"),
            ],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_container_filtered_by_allowlist() {
        let resolver = ProxyTargetResolver::new(true, false);
        let c = container();
        let nets = allowlist(&["net-a"]);
        let ips = resolver
            .resolve(&Tasks(vec![]), ResourceDescriptor::Container(&c), Some(&nets))
            .await
            .unwrap();
        assert_eq!(ips, vec!["10.0.0.5"]);
    }

    #[tokio::test]
    async fn test_container_without_validation_uses_all_networks() {
        let resolver = ProxyTargetResolver::new(false, false);
        let c = container();
        let ips = resolver
            .resolve(&Tasks(vec![]), ResourceDescriptor::Container(&c), None)
            .await
            .unwrap();
        assert_eq!(ips, vec!["10.0.0.5", "172.18.0.4"]);
    }

    #[tokio::test]
    async fn test_container_not_in_same_network() {
        let resolver = ProxyTargetResolver::new(true, false);
        let c = container();
        let nets = allowlist(&["other"]);
        let err = resolver
            .resolve(&Tasks(vec![]), ResourceDescriptor::Container(&c), Some(&nets))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "container c1 and caddy are not in same network");

        // unknown allowlist fails closed
        assert!(resolver
            .resolve(&Tasks(vec![]), ResourceDescriptor::Container(&c), None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_service_uses_name() {
        let resolver = ProxyTargetResolver::new(true, false);
        let service = ServiceSummary {
            id: "s1".into(),
            name: "api".into(),
            virtual_ips: vec![NetworkEndpoint::new("net-a", "10.0.1.2/24")],
            ..Default::default()
        };
        let nets = allowlist(&["net-a"]);
        let targets = resolver
            .resolve(&Tasks(vec![]), ResourceDescriptor::Service(&service), Some(&nets))
            .await
            .unwrap();
        assert_eq!(targets, vec!["api"]);

        let other = allowlist(&["net-z"]);
        assert!(resolver
            .resolve(&Tasks(vec![]), ResourceDescriptor::Service(&service), Some(&other))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_service_tasks() {
        let resolver = ProxyTargetResolver::new(true, true);
        let service = ServiceSummary {
            id: "s1".into(),
            name: "api".into(),
            ..Default::default()
        };
        let tasks = Tasks(vec![
            TaskSummary {
                id: "t2".into(),
                service_id: "s1".into(),
                attachments: vec![
                    NetworkEndpoint::new("net-a", "10.0.1.8/24"),
                    NetworkEndpoint::new("ingress", "10.255.0.8/16"),
                ],
            },
            TaskSummary {
                id: "t1".into(),
                service_id: "s1".into(),
                attachments: vec![NetworkEndpoint::new("net-a", "10.0.1.7/24")],
            },
            TaskSummary {
                id: "t3".into(),
                service_id: "other".into(),
                attachments: vec![NetworkEndpoint::new("net-a", "10.0.1.9/24")],
            },
        ]);
        let nets = allowlist(&["net-a"]);
        let targets = resolver
            .resolve(&tasks, ResourceDescriptor::Service(&service), Some(&nets))
            .await
            .unwrap();
        assert_eq!(targets, vec!["10.0.1.7", "10.0.1.8"]);
    }
}
