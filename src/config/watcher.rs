//! Seed document watcher.
//!
//! Watches the directory holding the seed Caddyfile so edits made by
//! replacing the file are seen too, and turns changes into debounced
//! regeneration triggers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::reconcile::Trigger;

/// A watcher that monitors the seed document for changes.
pub struct SeedWatcher {
    path: PathBuf,
    trigger_tx: mpsc::UnboundedSender<Trigger>,
}

impl SeedWatcher {
    pub fn new(path: &Path, trigger_tx: mpsc::UnboundedSender<Trigger>) -> Self {
        Self {
            path: path.to_path_buf(),
            trigger_tx,
        }
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.trigger_tx;
        let target = self.path.clone();
        let file_name = target.file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = event.kind.is_modify()
                        || event.kind.is_create()
                        || event.kind.is_remove();
                    let touches_seed = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if relevant && touches_seed {
                        tracing::info!(path = ?target, "Seed document change detected");
                        let _ = tx.send(Trigger::Event);
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Seed watcher started");
        Ok(watcher)
    }
}
