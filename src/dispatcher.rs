//! Event dispatcher.
//!
//! Consumes the runtime's lifecycle events one at a time and turns
//! `start`/`stop` transitions into hosts-file mutations followed by a
//! notification.  All mutations happen on this single loop, so the
//! hosts-file has exactly one writer.
//!
//! ```text
//! runtime.watch() ── RawEvent ──▶ mpsc ──▶ Dispatcher ──▶ Reconciler ──▶ HostsFile
//!                                              │
//!                                              └──▶ Notifier (SIGHUP)
//! ```
//!
//! Shutdown is cooperative: cancelling the token stops the loop before the
//! next event is taken, after which the whole managed block is flushed so
//! no entries outlive the daemon.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, RuntimeError};
use crate::notifier::Notifier;
use crate::reconciler::Reconciler;
use crate::runtime::ContainerRuntime;
use crate::types::{ContainerStatus, RawEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Running,
    /// Terminal: the managed block has been flushed.
    Stopped,
}

pub struct Dispatcher {
    runtime: Arc<dyn ContainerRuntime>,
    reconciler: Reconciler,
    notifier: Notifier,
    event_buffer: usize,
    state: DaemonState,
}

impl Dispatcher {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        reconciler: Reconciler,
        notifier: Notifier,
        event_buffer: usize,
    ) -> Self {
        Self {
            runtime,
            reconciler,
            notifier,
            event_buffer: event_buffer.max(1),
            state: DaemonState::Running,
        }
    }

    pub fn state(&self) -> DaemonState {
        self.state
    }

    /// Bulk-seed: adds all currently running containers.
    pub async fn seed(&self) -> Result<usize> {
        let running = self.runtime.list_running().await?;
        info!("Initial scan found {} running containers", running.len());

        let added = self.reconciler.seed_all(&running).await?;
        if added > 0 {
            self.notifier.notify().await;
        }
        Ok(added)
    }

    /// Runs until `shutdown` is cancelled or the event stream dies, then
    /// flushes the managed block.
    ///
    /// The event subscription starts from a timestamp taken before the
    /// bulk-seed listing, so transitions racing the scan are replayed
    /// rather than lost.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
        let since = unix_now();
        let (event_tx, mut event_rx) = mpsc::channel(self.event_buffer);
        let runtime = Arc::clone(&self.runtime);
        let watcher = tokio::spawn(async move {
            if let Err(e) = runtime.watch(since, event_tx).await {
                error!("Container event stream failed: {}", e);
            }
        });

        if let Err(e) = self.seed().await {
            error!("Initial container scan failed: {}", e);
        }

        let outcome = loop {
            if shutdown.is_cancelled() {
                break Ok(());
            }

            let event = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break Ok(()),
                event = event_rx.recv() => event,
            };

            match event {
                Some(event) => self.handle_event(event).await,
                None => break Err(RuntimeError::Closed.into()),
            }
        };

        watcher.abort();
        self.stop().await;
        outcome
    }

    /// Handles a single raw event.  Never fails: unusable events are
    /// discarded and I/O errors are logged so the loop keeps going.
    pub async fn handle_event(&self, event: RawEvent) {
        let Some(status) = event.status() else {
            debug!("Discarding event without status: {:?}", event);
            return;
        };
        let Some(id) = event.id() else {
            debug!("Discarding {} event without container id", status);
            return;
        };
        if let ContainerStatus::Other(action) = &status {
            debug!("Ignoring {} event for {}", action, id);
            return;
        }

        let container = match self.runtime.resolve(id).await {
            Ok(Some(container)) => container,
            Ok(None) => {
                debug!("Container {} is gone, discarding {} event", id, status);
                return;
            }
            Err(e) => {
                warn!("Failed to resolve container {}: {}", id, e);
                return;
            }
        };

        match status {
            ContainerStatus::Start => {
                info!(
                    "START <{}> with IP <{}>",
                    container.name(),
                    container.ip_address()
                );
                match self
                    .reconciler
                    .apply_start(container.name(), container.ip_address())
                    .await
                {
                    Ok(Some(_)) => {
                        self.notifier.notify().await;
                    }
                    Ok(None) => {}
                    Err(e) => error!("Failed to add {}: {}", container.name(), e),
                }
            }
            ContainerStatus::Stop => {
                info!("STOP  <{}>", container.name());
                match self.reconciler.apply_stop(container.name()).await {
                    Ok(_) => {
                        self.notifier.notify().await;
                    }
                    Err(e) => error!("Failed to remove {}: {}", container.name(), e),
                }
            }
            ContainerStatus::Other(_) => {}
        }
    }

    /// Enters `Stopped` and flushes every managed entry.  A failing flush
    /// is logged; the transition happens regardless.
    async fn stop(&mut self) {
        if self.state == DaemonState::Stopped {
            return;
        }
        self.state = DaemonState::Stopped;
        info!("Daemon stopped, clean-up hosts file ...");

        match self.reconciler.clear().await {
            Ok(removed) => {
                info!("Removed {} managed entries", removed);
                self.notifier.notify().await;
            }
            Err(e) => error!("Failed to clean up hosts file: {}", e),
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
