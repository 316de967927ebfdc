//! Shared fakes for integration testing.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use caddyfile_sync::discovery::*;
use caddyfile_sync::reconcile::{Applier, ApplyError};

pub fn labels(pairs: &[(&str, &str)]) -> LabelSet {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

pub fn container(id: &str, name: &str, pairs: &[(&str, &str)], networks: &[(&str, &str)]) -> ContainerSummary {
    ContainerSummary {
        id: id.into(),
        names: vec![format!("/{}", name)],
        image: "nginx".into(),
        labels: labels(pairs),
        networks: networks.iter().map(|(n, a)| NetworkEndpoint::new(*n, *a)).collect(),
    }
}

pub fn service(id: &str, name: &str, pairs: &[(&str, &str)], vips: &[(&str, &str)]) -> ServiceSummary {
    ServiceSummary {
        id: id.into(),
        name: name.into(),
        image: "nginx".into(),
        labels: labels(pairs),
        virtual_ips: vips.iter().map(|(n, a)| NetworkEndpoint::new(*n, *a)).collect(),
    }
}

/// Mutable world the fake orchestrator answers from.
#[derive(Default)]
pub struct World {
    pub containers: Vec<ContainerSummary>,
    pub services: Vec<ServiceSummary>,
    pub tasks: HashMap<String, Vec<TaskSummary>>,
    pub configs: Vec<(ConfigSummary, Vec<u8>)>,
    pub cluster: Option<ClusterState>,
    pub own_networks: Vec<NetworkDetails>,
    pub fail_containers: bool,
    pub fail_services: bool,
    pub fail_configs: bool,
}

/// In-memory orchestrator. The process itself is container `self` attached
/// to `own_networks`.
#[derive(Default)]
pub struct FakeOrchestrator {
    pub world: Mutex<World>,
    pub container_lists: AtomicU32,
    pub cluster_checks: AtomicU32,
    pub subscriptions: AtomicU32,
    events: Mutex<VecDeque<mpsc::UnboundedReceiver<DiscoveryResult<OrchestratorEvent>>>>,
}

impl FakeOrchestrator {
    /// Orchestrator whose own container sits on `net1`, swarm inactive.
    pub fn new() -> Self {
        let fake = Self::default();
        fake.world.lock().unwrap().own_networks = vec![NetworkDetails {
            id: "net1".into(),
            name: "caddy".into(),
            ingress: false,
        }];
        fake
    }

    pub fn with_world(self, f: impl FnOnce(&mut World)) -> Self {
        f(&mut self.world.lock().unwrap());
        self
    }

    /// Queue a feed. Each `subscribe_events` call takes the oldest queued
    /// feed, and fails once none are left.
    pub fn event_feed(&self) -> mpsc::UnboundedSender<DiscoveryResult<OrchestratorEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events.lock().unwrap().push_back(rx);
        tx
    }

    pub fn subscriptions(&self) -> u32 {
        self.subscriptions.load(Ordering::SeqCst)
    }

    pub fn container_lists(&self) -> u32 {
        self.container_lists.load(Ordering::SeqCst)
    }
}

fn unavailable(what: &str) -> DiscoveryError {
    DiscoveryError::Transport(format!("{}: connection refused", what))
}

#[async_trait]
impl Orchestrator for FakeOrchestrator {
    async fn list_containers(&self) -> DiscoveryResult<Vec<ContainerSummary>> {
        self.container_lists.fetch_add(1, Ordering::SeqCst);
        let world = self.world.lock().unwrap();
        if world.fail_containers {
            return Err(unavailable("containers"));
        }
        Ok(world.containers.clone())
    }

    async fn list_services(&self) -> DiscoveryResult<Vec<ServiceSummary>> {
        let world = self.world.lock().unwrap();
        if world.fail_services {
            return Err(unavailable("services"));
        }
        Ok(world.services.clone())
    }

    async fn list_service_tasks(&self, service_id: &str) -> DiscoveryResult<Vec<TaskSummary>> {
        Ok(self.world.lock().unwrap().tasks.get(service_id).cloned().unwrap_or_default())
    }

    async fn list_configs(&self) -> DiscoveryResult<Vec<ConfigSummary>> {
        let world = self.world.lock().unwrap();
        if world.fail_configs {
            return Err(unavailable("configs"));
        }
        Ok(world.configs.iter().map(|(c, _)| c.clone()).collect())
    }

    async fn inspect_container(&self, id: &str) -> DiscoveryResult<ContainerDetails> {
        let world = self.world.lock().unwrap();
        Ok(ContainerDetails {
            id: id.to_string(),
            networks: world
                .own_networks
                .iter()
                .map(|n| NetworkEndpoint::new(n.id.clone(), "10.0.0.2/24"))
                .collect(),
        })
    }

    async fn inspect_network(&self, id: &str) -> DiscoveryResult<NetworkDetails> {
        let world = self.world.lock().unwrap();
        world
            .own_networks
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or_else(|| DiscoveryError::Api {
                status: 404,
                message: format!("network {} not found", id),
            })
    }

    async fn config_data(&self, id: &str) -> DiscoveryResult<Vec<u8>> {
        let world = self.world.lock().unwrap();
        world
            .configs
            .iter()
            .find(|(c, _)| c.id == id)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| unavailable("config"))
    }

    async fn subscribe_events(&self, _filter: &EventFilter) -> DiscoveryResult<EventStream> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let rx = self
            .events
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| unavailable("events"))?;
        Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
            let item = rx.recv().await?;
            Some((item, rx))
        })))
    }

    async fn probe_cluster_mode(&self) -> DiscoveryResult<ClusterState> {
        self.cluster_checks.fetch_add(1, Ordering::SeqCst);
        self.world
            .lock()
            .unwrap()
            .cluster
            .ok_or_else(|| unavailable("info"))
    }

    async fn current_container_id(&self) -> DiscoveryResult<String> {
        Ok("self".to_string())
    }
}

/// Applier that records what it was given.
#[derive(Default)]
pub struct RecordingApplier {
    pub validated: Mutex<Vec<String>>,
    pub activated: Mutex<Vec<String>>,
    /// Documents containing this text are rejected.
    pub reject_containing: Mutex<Option<String>>,
}

impl RecordingApplier {
    pub fn rejecting(text: &str) -> Self {
        let applier = Self::default();
        *applier.reject_containing.lock().unwrap() = Some(text.to_string());
        applier
    }

    pub fn activated(&self) -> Vec<String> {
        self.activated.lock().unwrap().clone()
    }

    pub fn validations(&self) -> usize {
        self.validated.lock().unwrap().len()
    }
}

#[async_trait]
impl Applier for RecordingApplier {
    async fn validate(&self, document: &[u8]) -> Result<(), ApplyError> {
        let text = String::from_utf8_lossy(document).into_owned();
        self.validated.lock().unwrap().push(text.clone());
        match self.reject_containing.lock().unwrap().as_deref() {
            Some(bad) if text.contains(bad) => Err(ApplyError::Rejected(format!("found {:?}", bad))),
            _ => Ok(()),
        }
    }

    async fn activate(&self, document: &[u8]) -> Result<(), ApplyError> {
        self.activated
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(document).into_owned());
        Ok(())
    }
}

/// Collects formatted log output for the current thread.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Route `tracing` output on this thread into the capture until the guard drops.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::INFO)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.text().matches(needle).count()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A request received by the mock admin API.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub content_type: Option<String>,
    pub body: String,
}

/// Start a programmable mock admin API on an ephemeral port.
pub async fn start_admin_api<F, Fut>(f: F) -> (SocketAddr, Arc<Mutex<Vec<RecordedRequest>>>)
where
    F: Fn(RecordedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let log = recorded.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let Some(request) = read_request(&mut socket).await else {
                    return;
                };
                log.lock().unwrap().push(request.clone());

                let (status, body) = f(request).await;
                let status_text = match status {
                    200 => "200 OK",
                    400 => "400 Bad Request",
                    500 => "500 Internal Server Error",
                    _ => "200 OK",
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, recorded)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.lines();
    let path = lines.next()?.split_whitespace().nth(1)?.to_string();
    let mut content_length = 0;
    let mut content_type = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.trim().parse().unwrap_or(0),
                "content-type" => content_type = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Some(RecordedRequest {
        path,
        content_type,
        body: String::from_utf8_lossy(&buf[header_end..]).into_owned(),
    })
}
