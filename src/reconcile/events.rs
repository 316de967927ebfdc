//! Event subscription task.
//!
//! Forwards routing-relevant orchestrator events to the controller as
//! `Trigger::Event`. Coalescing is the controller's job; this task sends one
//! trigger per relevant event.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{broadcast, mpsc};

use super::controller::Trigger;
use crate::discovery::{EventFilter, EventStream, Orchestrator};
use crate::resilience::Backoff;

const RESUBSCRIBE_BASE_DELAY: Duration = Duration::from_millis(500);

/// How a subscription ended.
#[derive(Debug, PartialEq, Eq)]
enum StreamEnd {
    Shutdown,
    Failed(String),
}

/// Long-lived event reader.
pub struct EventSubscription {
    orchestrator: Arc<dyn Orchestrator>,
    filter: EventFilter,
    triggers: mpsc::UnboundedSender<Trigger>,
    resubscribe: Option<Backoff>,
}

impl EventSubscription {
    pub fn new(orchestrator: Arc<dyn Orchestrator>, triggers: mpsc::UnboundedSender<Trigger>) -> Self {
        Self {
            orchestrator,
            filter: EventFilter::default(),
            triggers,
            resubscribe: None,
        }
    }

    /// Re-subscribe after failures instead of stopping, waiting up to
    /// `max_delay` between attempts.
    pub fn with_resubscribe(mut self, max_delay: Duration) -> Self {
        self.resubscribe = Some(Backoff::new(RESUBSCRIBE_BASE_DELAY, max_delay));
        self
    }

    /// Read events until shutdown, or until the stream fails and
    /// re-subscription is off.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            let end = match self.orchestrator.subscribe_events(&self.filter).await {
                Ok(stream) => {
                    tracing::info!("Subscribed to orchestrator events");
                    if let Some(backoff) = self.resubscribe.as_mut() {
                        backoff.reset();
                    }
                    self.forward(stream, &mut shutdown).await
                }
                Err(e) => StreamEnd::Failed(e.to_string()),
            };

            let reason = match end {
                StreamEnd::Shutdown => return,
                StreamEnd::Failed(reason) => reason,
            };

            let Some(backoff) = self.resubscribe.as_mut() else {
                tracing::warn!(error = %reason, "Event subscription stopped, relying on polling");
                return;
            };

            let delay = backoff.next_delay();
            tracing::warn!(
                error = %reason,
                attempt = backoff.attempt(),
                delay_ms = delay.as_millis() as u64,
                "Event subscription failed, re-subscribing"
            );
            tokio::select! {
                _ = shutdown.recv() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn forward(&self, mut stream: EventStream, shutdown: &mut broadcast::Receiver<()>) -> StreamEnd {
        loop {
            tokio::select! {
                _ = shutdown.recv() => return StreamEnd::Shutdown,
                item = stream.next() => match item {
                    Some(Ok(event)) => {
                        if !event.affects_routing() {
                            continue;
                        }
                        tracing::debug!(kind = %event.kind, action = %event.action, "Relevant event");
                        if self.triggers.send(Trigger::Event).is_err() {
                            return StreamEnd::Shutdown;
                        }
                    }
                    Some(Err(e)) if !e.is_terminal() => {
                        tracing::warn!(error = %e, "Skipping unreadable event");
                    }
                    Some(Err(e)) => return StreamEnd::Failed(e.to_string()),
                    None => return StreamEnd::Failed("event stream closed".to_string()),
                },
            }
        }
    }
}
