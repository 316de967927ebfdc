//! One generation pass: discover, parse, merge, serialize.

use std::collections::HashSet;
use std::fmt::{Display, Write as _};
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::availability::AvailabilityProber;
use crate::config::Settings;
use crate::directive::{merge_map, write_directives, DirectiveMap, SuffixGenerator};
use crate::discovery::{
    DiscoveryResult, Orchestrator, ProxyTargetResolver, ResolveError, ResourceDescriptor,
};
use crate::labels::LabelParser;
use crate::observability::metrics;

/// Why a cycle produced no document.
#[derive(Debug, Error)]
pub enum CycleError {
    /// Strict mode is on and cluster mode is unavailable.
    #[error("swarm is unavailable")]
    ClusterUnavailable { log: String },

    /// Strict mode is on and a discovery call or resource failed.
    #[error("aborting in strict mode after {stage} failure")]
    StrictAbort { stage: &'static str, log: String },
}

impl CycleError {
    /// Diagnostic text gathered before the abort.
    pub fn log(&self) -> &str {
        match self {
            Self::ClusterUnavailable { log } | Self::StrictAbort { log, .. } => log,
        }
    }
}

/// Output of one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    /// Seed text, then labeled configs, then generated directives.
    pub document: Vec<u8>,
    /// `[INFO]` / `[ERROR]` lines describing what was skipped or failed.
    pub log: String,
    /// Resources that contributed at least one site.
    pub resources: usize,
}

/// Owns everything a generation pass reads and mutates.
pub struct Generator {
    orchestrator: Arc<dyn Orchestrator>,
    parser: LabelParser,
    resolver: ProxyTargetResolver,
    prober: AvailabilityProber,
    suffixes: SuffixGenerator,
    seed_path: Option<PathBuf>,
    strict: bool,
    validate_network: bool,
    networks: Option<HashSet<String>>,
}

impl Generator {
    pub fn new(orchestrator: Arc<dyn Orchestrator>, settings: &Settings) -> Self {
        Self {
            orchestrator,
            parser: LabelParser::new(&settings.label_prefix),
            resolver: ProxyTargetResolver::new(settings.validate_network, settings.proxy_service_tasks),
            prober: AvailabilityProber::new(settings.timing.availability_interval),
            suffixes: SuffixGenerator::new(settings.suffix),
            seed_path: settings.caddyfile_path.clone(),
            strict: settings.ignore_swarm_error,
            validate_network: settings.validate_network,
            networks: None,
        }
    }

    pub fn prober(&self) -> &AvailabilityProber {
        &self.prober
    }

    /// Run one pass.
    pub async fn generate(&mut self) -> Result<Generation, CycleError> {
        let mut log = String::new();
        let mut document = Vec::new();
        self.suffixes.reset();

        if self.validate_network && self.networks.is_none() {
            match self.load_networks().await {
                Ok(networks) => self.networks = Some(networks),
                Err(e) => {
                    metrics::record_discovery_error("networks");
                    error_line(&mut log, e);
                }
            }
        }

        self.prober.refresh(self.orchestrator.as_ref()).await;
        let available = self.prober.is_available();
        if self.strict && !available {
            error_line(&mut log, "Skipping Caddyfile update because swarm is not available");
            return Err(CycleError::ClusterUnavailable { log });
        }

        match &self.seed_path {
            Some(path) => match tokio::fs::read(path).await {
                Ok(seed) => document.extend_from_slice(&seed),
                Err(e) => error_line(&mut log, format_args!("{}: {}", path.display(), e)),
            },
            None => info_line(&mut log, "Skipping seed Caddyfile because no path is set"),
        }

        let mut directives = DirectiveMap::new();
        let mut resources = 0;

        match self.orchestrator.list_containers().await {
            Ok(mut containers) => {
                containers.sort_by(|a, b| a.id.cmp(&b.id));
                for container in &containers {
                    let resource = ResourceDescriptor::Container(container);
                    match self.resource_directives(resource).await {
                        Ok(sites) => {
                            resources += usize::from(!sites.is_empty());
                            merge_map(&mut directives, sites, &mut self.suffixes);
                        }
                        Err(e) => {
                            metrics::record_resource_error("container");
                            error_line(&mut log, e);
                            if self.strict {
                                return Err(CycleError::StrictAbort { stage: "container", log });
                            }
                        }
                    }
                }
            }
            Err(e) => {
                metrics::record_discovery_error("containers");
                error_line(&mut log, e);
                if self.strict {
                    return Err(CycleError::StrictAbort { stage: "container list", log });
                }
            }
        }

        if available {
            match self.orchestrator.list_services().await {
                Ok(mut services) => {
                    services.sort_by(|a, b| a.id.cmp(&b.id));
                    for service in &services {
                        let resource = ResourceDescriptor::Service(service);
                        match self.resource_directives(resource).await {
                            Ok(sites) => {
                                resources += usize::from(!sites.is_empty());
                                merge_map(&mut directives, sites, &mut self.suffixes);
                            }
                            Err(e) => {
                                metrics::record_resource_error("service");
                                error_line(&mut log, e);
                                if self.strict {
                                    return Err(CycleError::StrictAbort { stage: "service", log });
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    metrics::record_discovery_error("services");
                    error_line(&mut log, e);
                    if self.strict {
                        return Err(CycleError::StrictAbort { stage: "service list", log });
                    }
                }
            }
        } else {
            info_line(&mut log, "Skipping services because swarm is not available");
        }

        if available {
            match self.orchestrator.list_configs().await {
                Ok(mut configs) => {
                    configs.sort_by(|a, b| a.id.cmp(&b.id));
                    let prefix = self.parser.prefix();
                    for config in configs.iter().filter(|c| c.labels.contains_key(prefix)) {
                        match self.orchestrator.config_data(&config.id).await {
                            Ok(data) => {
                                document.extend_from_slice(&data);
                                document.push(b'\n');
                            }
                            Err(e) => {
                                metrics::record_discovery_error("config_data");
                                error_line(&mut log, e);
                                if self.strict {
                                    return Err(CycleError::StrictAbort { stage: "config data", log });
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    metrics::record_discovery_error("configs");
                    error_line(&mut log, e);
                    if self.strict {
                        return Err(CycleError::StrictAbort { stage: "config list", log });
                    }
                }
            }
        } else {
            info_line(&mut log, "Skipping configs because swarm is not available");
        }

        let mut generated = String::new();
        write_directives(&mut generated, &directives, 0);
        document.extend_from_slice(generated.as_bytes());

        Ok(Generation {
            document,
            log,
            resources,
        })
    }

    async fn resource_directives(&mut self, resource: ResourceDescriptor<'_>) -> Result<DirectiveMap, ResolveError> {
        let orchestrator = self.orchestrator.as_ref();
        let resolver = &self.resolver;
        let networks = self.networks.as_ref();
        let context = resource.template_context();

        self.parser
            .parse(resource.labels(), &context, &mut self.suffixes, move || {
                resolver.resolve(orchestrator, resource, networks)
            })
            .await
    }

    /// Networks this process is attached to, excluding ingress.
    async fn load_networks(&self) -> DiscoveryResult<HashSet<String>> {
        let id = self.orchestrator.current_container_id().await?;
        tracing::info!(container_id = %id, "Resolved own container");

        let container = self.orchestrator.inspect_container(&id).await?;
        let mut networks = HashSet::new();
        for endpoint in &container.networks {
            let network = self.orchestrator.inspect_network(&endpoint.network_id).await?;
            if !network.ingress {
                networks.insert(endpoint.network_id.clone());
            }
        }

        let mut sorted: Vec<_> = networks.iter().collect();
        sorted.sort();
        tracing::info!(networks = ?sorted, "Resolved own networks");
        Ok(networks)
    }
}

fn info_line(log: &mut String, message: impl Display) {
    let _ = writeln!(log, "[INFO] {}", message);
}

fn error_line(log: &mut String, message: impl Display) {
    let _ = writeln!(log, "[ERROR] {}", message);
}
