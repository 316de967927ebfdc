//! Uniform view over discovered resources.

use serde_json::{json, Value};

use super::types::{ContainerSummary, LabelSet, ServiceSummary};

/// How a resource's backends are addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Standalone container: its own network addresses.
    Container,
    /// Service through its load-balanced virtual address.
    Service,
    /// Service through each running task's address.
    ServiceTask,
}

/// A discovered container or service.
#[derive(Debug, Clone, Copy)]
pub enum ResourceDescriptor<'a> {
    Container(&'a ContainerSummary),
    Service(&'a ServiceSummary),
}

impl<'a> ResourceDescriptor<'a> {
    pub fn labels(&self) -> &'a LabelSet {
        match *self {
            Self::Container(c) => &c.labels,
            Self::Service(s) => &s.labels,
        }
    }

    pub fn id(&self) -> &'a str {
        match *self {
            Self::Container(c) => &c.id,
            Self::Service(s) => &s.id,
        }
    }

    /// Human-readable name: the first container name without its leading
    /// slash, or the service name.
    pub fn name(&self) -> &'a str {
        match *self {
            Self::Container(c) => c
                .names
                .first()
                .map(|n| n.trim_start_matches('/'))
                .unwrap_or(c.id.as_str()),
            Self::Service(s) => &s.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Container(_) => "container",
            Self::Service(_) => "service",
        }
    }

    /// Addressing scope given whether task proxying is enabled.
    pub fn scope(&self, proxy_service_tasks: bool) -> Scope {
        match self {
            Self::Container(_) => Scope::Container,
            Self::Service(_) if proxy_service_tasks => Scope::ServiceTask,
            Self::Service(_) => Scope::Service,
        }
    }

    /// Data exposed to label value templates.
    pub fn template_context(&self) -> Value {
        let image = match self {
            Self::Container(c) => &c.image,
            Self::Service(s) => &s.image,
        };
        json!({
            "id": self.id(),
            "name": self.name(),
            "image": image,
            "kind": self.kind(),
            "labels": self.labels(),
        })
    }
}
