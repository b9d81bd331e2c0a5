//! Single-record write path
//!
//! Both the bulk scanner and the live watcher terminate here: map one raw
//! record into a document and upsert it. Keeping this in one place keeps
//! the two write paths identical.

use crate::domain::{MarketId, MarketInfo};
use crate::error::{CoreError, Result};
use crate::infrastructure::{index::SearchIndex, rpc::ChainRpc};
use crate::operations::mapper::to_document;
use std::sync::Arc;
use tracing::debug;

/// Shared single-record indexing path
pub struct MarketIndexer {
    rpc: Arc<dyn ChainRpc>,
    index: Arc<dyn SearchIndex>,
    index_name: String,
}

impl MarketIndexer {
    pub fn new(rpc: Arc<dyn ChainRpc>, index: Arc<dyn SearchIndex>, index_name: impl Into<String>) -> Self {
        Self {
            rpc,
            index,
            index_name: index_name.into(),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Map and upsert one record
    pub async fn index_market(&self, raw_id: &str, info: &MarketInfo) -> Result<MarketId> {
        let (id, doc) = to_document(raw_id, info)?;
        self.index
            .upsert_document(&self.index_name, &id, doc)
            .await?;
        debug!(market = %id, "indexed market");
        Ok(id)
    }

    /// Fetch the current state of one market and re-index it
    pub async fn refresh_market(&self, id: &MarketId) -> Result<MarketId> {
        let info = self.rpc.market_info(id).await?;
        self.index_market(id.as_str(), &info).await
    }
}
