//! Market index core
//!
//! A synchronization bridge between a chain node and a search index:
//! markets are pulled over RPC, projected into a flat document schema,
//! and kept fresh by event filters. The two collaborators are injected as
//! trait objects; their lifecycles belong to the embedding application.
//!
//! Startup sequencing mirrors the deployment's expectations: wait for the
//! node to sync, install event subscriptions (when `filtering` is set),
//! then run the bulk sweep (when `scan` is set).

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod operations;
pub mod services;

pub use config::AppConfig;
pub use domain::{BranchId, ChainEvent, ChainEventKind, MarketId, MarketInfo};
pub use error::{CoreError, Result};
pub use infrastructure::index::{
    IndexError, MarketDocument, MemoryIndex, QuerySpec, SearchIndex, SearchResponse, TermBucket,
};
pub use infrastructure::rpc::{ChainRpc, RpcError, SyncStatus};
pub use operations::{
    query, MarketFilter, MarketIndexer, MarketScanner, QueryOptions, ScanOptions, ScanSummary,
    SortKey,
};
pub use services::{MarketWatcher, WatcherState};

use std::sync::Arc;
use tracing::info;

/// Top-level process context owning the collaborator handles
pub struct MarketIndexCore {
    config: AppConfig,
    rpc: Arc<dyn ChainRpc>,
    index: Arc<dyn SearchIndex>,
    indexer: Arc<MarketIndexer>,
    watcher: Arc<MarketWatcher>,
}

impl MarketIndexCore {
    pub fn new(config: AppConfig, rpc: Arc<dyn ChainRpc>, index: Arc<dyn SearchIndex>) -> Self {
        let indexer = Arc::new(MarketIndexer::new(
            rpc.clone(),
            index.clone(),
            config.index_name.clone(),
        ));
        let watcher = Arc::new(MarketWatcher::new(
            rpc.clone(),
            indexer.clone(),
            config.watcher_options(),
        ));
        Self {
            config,
            rpc,
            index,
            indexer,
            watcher,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Create the market index with its schema mapping if it is missing
    pub async fn ensure_index(&self) -> Result<()> {
        if self.index.index_exists(&self.config.index_name).await? {
            return Ok(());
        }
        info!("creating index {}", self.config.index_name);
        self.index
            .create_index(&self.config.index_name, &MarketDocument::schema())
            .await?;
        Ok(())
    }

    /// Map and upsert one record (the shared single-record write path)
    pub async fn index_market(&self, raw_id: &str, info: &MarketInfo) -> Result<MarketId> {
        self.indexer.index_market(raw_id, info).await
    }

    /// Fetch one market's current state and re-index it
    pub async fn refresh_market(&self, id: &MarketId) -> Result<MarketId> {
        self.indexer.refresh_market(id).await
    }

    /// Run one bulk sweep over every branch. If the index is missing the
    /// sweep sets it up first and proceeds - the one connect-then-retry
    /// the entry points perform.
    pub async fn scan(&self) -> Result<ScanSummary> {
        self.ensure_index().await?;
        let scanner = MarketScanner::new(
            self.rpc.clone(),
            self.indexer.clone(),
            self.config.scan_options(),
        );
        scanner.run().await
    }

    /// Wait for the node and start the live watcher
    pub async fn watch(&self) -> Result<()> {
        self.ensure_index().await?;
        self.watcher.watch().await
    }

    /// Stop the live watcher; idempotent
    pub async fn unwatch(&self) -> Result<()> {
        self.watcher.unwatch().await
    }

    pub async fn watcher_state(&self) -> WatcherState {
        self.watcher.state().await
    }

    /// Full startup pipeline: wait for sync, subscribe if `filtering`,
    /// sweep if `scan`. Returns the sweep summary (empty when the sweep
    /// is disabled).
    pub async fn run(&self) -> Result<ScanSummary> {
        self.ensure_index().await?;
        self.watcher.wait_for_sync().await;

        if self.config.filtering {
            self.watcher.start_watching().await?;
        }

        if self.config.scan {
            let scanner = MarketScanner::new(
                self.rpc.clone(),
                self.indexer.clone(),
                self.config.scan_options(),
            );
            scanner.run().await
        } else {
            Ok(ScanSummary::default())
        }
    }

    /// Sorted, filtered market listing
    pub async fn load_markets(
        &self,
        filter: &MarketFilter,
        sort: SortKey,
        options: &QueryOptions,
    ) -> Result<SearchResponse> {
        let spec = query::load_markets(filter, sort, options)?;
        Ok(self.index.search(&self.config.index_name, &spec).await?)
    }

    /// Free-text relevance search
    pub async fn market_search(
        &self,
        filter: &MarketFilter,
        text: &str,
        options: &QueryOptions,
    ) -> Result<SearchResponse> {
        let spec = query::market_search(filter, text, options)?;
        Ok(self.index.search(&self.config.index_name, &spec).await?)
    }

    /// Most used exact tags, optionally scoped to a branch
    pub async fn top_tags(
        &self,
        filter: &MarketFilter,
        tag_count: Option<usize>,
    ) -> Result<Vec<TermBucket>> {
        let spec = query::top_tags(filter, tag_count)?;
        let response = self.index.search(&self.config.index_name, &spec).await?;
        Ok(response.aggregations)
    }
}

/// Install the default tracing subscriber, filtered by `RUST_LOG`
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
