//! Core error taxonomy
//!
//! Collaborator errors ([`RpcError`], [`IndexError`]) convert into
//! [`CoreError`] at the component boundaries. Batch and mapping failures
//! stay scoped to their sync job; nothing here cancels sibling work.

use crate::infrastructure::{index::IndexError, rpc::RpcError};
use thiserror::Error;

/// Errors surfaced by the market index core
#[derive(Error, Debug)]
pub enum CoreError {
    /// A required field was missing from an operation's input
    #[error("validation error: {0}")]
    Validation(String),

    /// A collaborator is not connected or not ready
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The chain is still syncing, has no peers, or failed a status poll;
    /// retried on a fixed delay by the watcher
    #[error("chain not ready: {0}")]
    TransientSync(String),

    /// The bulk info fetch for one sync job failed; that job only
    #[error("batch fetch failed for job {job}: {source}")]
    BatchFetch {
        job: String,
        #[source]
        source: RpcError,
    },

    /// A single record within a batch could not be mapped or indexed
    #[error("failed to index market {id}: {reason}")]
    RecordMapping { id: String, reason: String },

    /// Chain RPC failure outside a batch fetch
    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),

    /// Search index failure
    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
