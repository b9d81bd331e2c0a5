//! Chain RPC collaborator interface
//!
//! The core never talks to a node directly; everything goes through
//! [`ChainRpc`]. The RPC source is assumed already connected - connection
//! bootstrap is the embedding application's problem. Keep in mind the
//! upstream degrades under heavy parallel load, so callers bound their
//! concurrency (see the bulk scanner).

use crate::domain::{BranchId, ChainEvent, ChainEventKind, MarketId, MarketInfo};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::broadcast;

/// Chain RPC errors
#[derive(Error, Debug)]
pub enum RpcError {
    /// The RPC client has no live connection
    #[error("rpc not connected")]
    NotConnected,

    /// Transport or node-side failure for a single call
    #[error("rpc call failed: {0}")]
    Call(String),

    /// The node rejected or could not answer a status query
    #[error("status query failed: {0}")]
    Status(String),
}

/// Upstream chain sync state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Fully synced and able to serve current state
    Synced,
    /// Still importing blocks
    Syncing {
        current_block: u64,
        highest_block: u64,
    },
}

impl SyncStatus {
    /// Sync progress as a percentage, for log output while waiting
    pub fn percent_complete(&self) -> f64 {
        match self {
            SyncStatus::Synced => 100.0,
            SyncStatus::Syncing {
                current_block,
                highest_block,
            } => {
                if *highest_block == 0 {
                    0.0
                } else {
                    *current_block as f64 / *highest_block as f64 * 100.0
                }
            }
        }
    }
}

/// The chain RPC source the core synchronizes from
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Current sync state of the node
    async fn sync_status(&self) -> Result<SyncStatus, RpcError>;

    /// Number of peers the node is connected to
    async fn peer_count(&self) -> Result<u64, RpcError>;

    /// Enumerate all branches
    async fn list_branches(&self) -> Result<Vec<BranchId>, RpcError>;

    /// Total number of markets on a branch
    async fn count_markets(&self, branch: &BranchId) -> Result<u64, RpcError>;

    /// One page of market ids on a branch. The node cannot return
    /// arbitrarily large result sets, so listing is always paginated.
    async fn list_market_ids(
        &self,
        branch: &BranchId,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<MarketId>, RpcError>;

    /// Current state of a single market
    async fn market_info(&self, id: &MarketId) -> Result<MarketInfo, RpcError>;

    /// Current state of a batch of markets, keyed by id
    async fn market_info_batch(
        &self,
        ids: &[MarketId],
    ) -> Result<HashMap<MarketId, MarketInfo>, RpcError>;

    /// Register event filters for the given kinds and return the
    /// notification stream
    async fn subscribe(
        &self,
        kinds: &[ChainEventKind],
    ) -> Result<broadcast::Receiver<ChainEvent>, RpcError>;

    /// Tear down all event filters; idempotent
    async fn unsubscribe(&self) -> Result<(), RpcError>;
}
