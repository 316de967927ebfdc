//! OS signal handling.
//!
//! - SIGTERM / SIGINT: graceful shutdown
//! - SIGHUP: regenerate immediately

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use super::Shutdown;
use crate::reconcile::Trigger;

/// Listen for signals until shutdown is triggered.
pub async fn handle_signals(
    shutdown: Arc<Shutdown>,
    triggers: mpsc::UnboundedSender<Trigger>,
) -> std::io::Result<()> {
    let mut term = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut hangup = signal(SignalKind::hangup())?;

    loop {
        tokio::select! {
            _ = term.recv() => {
                tracing::info!("SIGTERM received, shutting down");
                break;
            }
            _ = interrupt.recv() => {
                tracing::info!("SIGINT received, shutting down");
                break;
            }
            _ = hangup.recv() => {
                tracing::info!("SIGHUP received, regenerating");
                let _ = triggers.send(Trigger::Refresh);
            }
        }
    }

    shutdown.trigger();
    Ok(())
}
