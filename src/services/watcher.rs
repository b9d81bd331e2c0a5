//! Live change watcher
//!
//! Keeps the index fresh after the initial sweep. The watcher waits for
//! the upstream node to finish syncing and find peers, then subscribes to
//! the market event filters and refreshes one record per notification.
//!
//! State machine: `Disconnected -> Syncing -> Watching`. The Syncing
//! state self-loops on a fixed poll interval for as long as the node
//! reports still-syncing, zero peers, or a transient status error.

use crate::domain::{ChainEvent, ChainEventKind};
use crate::error::{CoreError, Result};
use crate::infrastructure::rpc::{ChainRpc, SyncStatus};
use crate::operations::indexer::MarketIndexer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Watcher lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum WatcherState {
    Disconnected,
    /// Waiting for the upstream node to sync and find peers
    Syncing,
    /// Subscribed and refreshing records on change notifications
    Watching,
}

/// Watcher tunables
#[derive(Debug, Clone)]
pub struct WatcherOptions {
    /// Delay between sync-status polls while the node is not ready
    pub poll_interval: Duration,
    /// Event kinds to subscribe to
    pub kinds: Vec<ChainEventKind>,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            kinds: ChainEventKind::ALL.to_vec(),
        }
    }
}

/// Subscribes to upstream change notifications and refreshes affected
/// records through the shared single-record write path
pub struct MarketWatcher {
    rpc: Arc<dyn ChainRpc>,
    indexer: Arc<MarketIndexer>,
    options: WatcherOptions,
    state: RwLock<WatcherState>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl MarketWatcher {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        indexer: Arc<MarketIndexer>,
        options: WatcherOptions,
    ) -> Self {
        Self {
            rpc,
            indexer,
            options,
            state: RwLock::new(WatcherState::Disconnected),
            event_loop: Mutex::new(None),
        }
    }

    pub async fn state(&self) -> WatcherState {
        *self.state.read().await
    }

    /// Wait for the node, then subscribe and start refreshing. Returns
    /// once the watcher has reached `Watching`.
    pub async fn watch(&self) -> Result<()> {
        self.wait_for_sync().await;
        self.start_watching().await
    }

    /// Poll sync status and peer count until the node is ready. Transient
    /// errors, still-syncing, and zero peers all re-poll after the fixed
    /// interval; there is no retry bound.
    pub async fn wait_for_sync(&self) {
        *self.state.write().await = WatcherState::Syncing;

        loop {
            match self.probe_readiness().await {
                Ok(()) => return,
                Err(e) => info!("{e}"),
            }
            tokio::time::sleep(self.options.poll_interval).await;
        }
    }

    /// One readiness probe: ready iff synced and at least one peer
    async fn probe_readiness(&self) -> Result<()> {
        let status = self
            .rpc
            .sync_status()
            .await
            .map_err(|e| CoreError::TransientSync(format!("rpc error: {e}")))?;
        let peers = self
            .rpc
            .peer_count()
            .await
            .map_err(|e| CoreError::TransientSync(format!("rpc error: {e}")))?;

        if peers == 0 {
            return Err(CoreError::TransientSync("waiting for peers".to_string()));
        }
        match status {
            SyncStatus::Synced => Ok(()),
            SyncStatus::Syncing { .. } => Err(CoreError::TransientSync(format!(
                "blockchain still syncing: {:.1}% complete",
                status.percent_complete()
            ))),
        }
    }

    /// Subscribe to the event filters and spawn the notification loop
    pub async fn start_watching(&self) -> Result<()> {
        let rx = self.rpc.subscribe(&self.options.kinds).await?;

        let indexer = self.indexer.clone();
        let handle = tokio::spawn(event_loop(rx, indexer));
        *self.event_loop.lock().await = Some(handle);
        *self.state.write().await = WatcherState::Watching;
        info!("watching {} event kinds", self.options.kinds.len());
        Ok(())
    }

    /// Tear down the subscriptions and stop the loop; idempotent
    pub async fn unwatch(&self) -> Result<()> {
        if let Some(handle) = self.event_loop.lock().await.take() {
            handle.abort();
        }
        self.rpc.unsubscribe().await?;
        *self.state.write().await = WatcherState::Disconnected;
        Ok(())
    }
}

/// Consume change notifications until the upstream closes the stream.
/// Each event is handled fire-and-forget: the per-record fetch is spawned
/// immediately and races freely against other refreshes. Two events for
/// the same id race too - the last `market_info` to complete wins.
async fn event_loop(mut rx: broadcast::Receiver<ChainEvent>, indexer: Arc<MarketIndexer>) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("event stream lagged, {skipped} notifications dropped");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("event stream closed");
                return;
            }
        };

        let Some(id) = event.market_id() else {
            // malformed payload, no market id under the expected key
            debug!(kind = %event.kind, "dropping event without market id");
            continue;
        };

        debug!(kind = %event.kind, market = %id, "refreshing market on event");
        let indexer = indexer.clone();
        tokio::spawn(async move {
            if let Err(e) = indexer.refresh_market(&id).await {
                warn!(market = %id, "event-driven refresh failed: {e}");
            }
        });
    }
}
