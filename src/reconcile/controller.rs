//! Reconciliation actor.
//!
//! # State Machine
//! ```text
//! IDLE → GENERATING → UNCHANGED → IDLE
//!                   → CHANGED → VALIDATING → APPLIED | REJECTED → IDLE
//!                   → ABORTED (strict mode) → IDLE
//! ```
//! Wakes on the poll deadline, on the debounce deadline, or on a
//! `Trigger::Refresh`. Entering GENERATING pushes the poll deadline out by a
//! full interval and clears any pending debounce.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Instant};

use super::apply::{process_document, Applier};
use super::generator::Generator;
use crate::config::Settings;
use crate::directive::EMPTY_DOCUMENT;
use crate::observability::metrics;

/// A request to regenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Something changed; regenerate after the debounce window. Ignored
    /// while a debounced regeneration is already pending.
    Event,
    /// Regenerate immediately.
    Refresh,
}

/// Result of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Output identical to the previous cycle; nothing was applied.
    Unchanged,
    /// New document accepted and active.
    Applied,
    /// New document refused; the previous one keeps serving.
    Rejected,
    /// Strict mode abort; previous state untouched.
    Aborted,
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Applied => "applied",
            Self::Rejected => "rejected",
            Self::Aborted => "aborted",
        }
    }
}

enum Wake {
    Shutdown,
    Poll,
    Debounce,
    Trigger(Option<Trigger>),
}

/// Owns the generator and the change-detection snapshot.
pub struct ReconcileController {
    generator: Generator,
    applier: Arc<dyn Applier>,
    process_document: bool,
    polling_interval: Duration,
    debounce: Duration,
    previous_output: Option<Vec<u8>>,
    previous_log: String,
}

impl ReconcileController {
    pub fn new(generator: Generator, applier: Arc<dyn Applier>, settings: &Settings) -> Self {
        Self {
            generator,
            applier,
            process_document: settings.process_caddyfile,
            polling_interval: settings.timing.polling_interval,
            debounce: settings.timing.debounce,
            previous_output: None,
            previous_log: String::new(),
        }
    }

    /// Bytes produced by the last completed cycle, applied or not.
    pub fn previous_output(&self) -> Option<&[u8]> {
        self.previous_output.as_deref()
    }

    /// Diagnostic log of the last cycle, aborted ones included.
    pub fn previous_log(&self) -> &str {
        &self.previous_log
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    /// Generate, diff and, if the document changed, validate and activate.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let outcome = self.cycle().await;
        metrics::record_cycle(outcome.as_str());
        outcome
    }

    async fn cycle(&mut self) -> CycleOutcome {
        let generation = match self.generator.generate().await {
            Ok(generation) => generation,
            Err(e) => {
                if e.log() != self.previous_log {
                    emit_diagnostics(e.log());
                    tracing::info!(error = %e, "Leaving Caddyfile as is");
                    self.previous_log = e.log().to_string();
                }
                return CycleOutcome::Aborted;
            }
        };

        let changed = self.previous_output.as_deref() != Some(generation.document.as_slice());
        let log_changed = generation.log != self.previous_log;
        self.previous_output = Some(generation.document.clone());
        self.previous_log = generation.log;

        if changed || log_changed {
            emit_diagnostics(&self.previous_log);
        }
        metrics::record_resources(generation.resources);

        if !changed {
            return CycleOutcome::Unchanged;
        }

        let mut document = generation.document;
        if self.process_document {
            tracing::info!("Processing Caddyfile");
            let mut log = String::new();
            document = process_document(self.applier.as_ref(), &document, &mut log).await;
            emit_diagnostics(&log);
        }
        if document.is_empty() {
            document = EMPTY_DOCUMENT.as_bytes().to_vec();
        }
        metrics::record_document_size(document.len());

        match self.applier.validate_and_activate(&document).await {
            Ok(()) => {
                tracing::info!("New Caddyfile:\n{}", String::from_utf8_lossy(&document));
                CycleOutcome::Applied
            }
            Err(e) => {
                tracing::error!(error = %e, "Caddyfile rejected");
                tracing::info!("Wrong Caddyfile:\n{}", String::from_utf8_lossy(&document));
                CycleOutcome::Rejected
            }
        }
    }

    /// Run until shutdown. The first cycle runs immediately.
    pub async fn run(
        mut self,
        mut triggers: mpsc::UnboundedReceiver<Trigger>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!(
            polling_interval_ms = self.polling_interval.as_millis() as u64,
            debounce_ms = self.debounce.as_millis() as u64,
            "Reconcile controller started"
        );

        let mut poll_deadline = self.cycle_and_reschedule().await;
        let mut debounce_deadline: Option<Instant> = None;
        let mut triggers_open = true;

        loop {
            let debounce = async move {
                match debounce_deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            let wake = tokio::select! {
                _ = shutdown.recv() => Wake::Shutdown,
                _ = sleep_until(poll_deadline) => Wake::Poll,
                _ = debounce => Wake::Debounce,
                trigger = triggers.recv(), if triggers_open => Wake::Trigger(trigger),
            };

            match wake {
                Wake::Shutdown => {
                    tracing::info!("Reconcile controller stopping");
                    return;
                }
                Wake::Poll | Wake::Debounce | Wake::Trigger(Some(Trigger::Refresh)) => {
                    poll_deadline = self.cycle_and_reschedule().await;
                    debounce_deadline = None;
                }
                Wake::Trigger(Some(Trigger::Event)) => {
                    if debounce_deadline.is_none() {
                        debounce_deadline = Some(Instant::now() + self.debounce);
                    }
                }
                Wake::Trigger(None) => {
                    tracing::debug!("Trigger channel closed, polling only");
                    triggers_open = false;
                }
            }
        }
    }

    async fn cycle_and_reschedule(&mut self) -> Instant {
        let deadline = Instant::now() + self.polling_interval;
        self.run_cycle().await;
        deadline
    }
}

/// Forward `[INFO]` / `[ERROR]` diagnostic lines to the log.
fn emit_diagnostics(log: &str) {
    for line in log.lines() {
        if let Some(message) = line.strip_prefix("[ERROR] ") {
            tracing::error!("{}", message);
        } else {
            tracing::info!("{}", line.strip_prefix("[INFO] ").unwrap_or(line));
        }
    }
}
