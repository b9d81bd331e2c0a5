//! Application configuration
//!
//! Defaults are overridable from the environment, which is how the
//! deployment images configure the bridge. Collaborator endpoints are
//! plumbing the embedding application uses to construct its clients; the
//! core itself only consumes the behavioral options.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::operations::scan::ScanOptions;
use crate::services::watcher::WatcherOptions;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name of the search index markets are written to
    pub index_name: String,

    /// Chain RPC endpoint
    pub rpc_endpoint: String,

    /// Search backend endpoint
    pub index_endpoint: String,

    /// Run a bulk sweep at startup
    pub scan: bool,

    /// Delay readiness until the event subscriptions are installed
    pub filtering: bool,

    /// Max records per sweep; `None` means unbounded
    pub limit: Option<u64>,

    /// Records per fetch batch
    pub batch_size: usize,

    /// Ids per listing page
    pub page_size: u64,

    /// Sweep worker pool size
    pub concurrency: usize,

    /// Seconds between sync-status polls while waiting for the node
    pub poll_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let scan_defaults = ScanOptions::default();
        Self {
            index_name: "markets".to_string(),
            rpc_endpoint: "http://localhost:8545".to_string(),
            index_endpoint: "http://localhost:9200".to_string(),
            scan: true,
            filtering: true,
            limit: None,
            batch_size: scan_defaults.batch_size,
            page_size: scan_defaults.page_size,
            concurrency: scan_defaults.concurrency,
            poll_interval_secs: 30,
        }
    }
}

impl AppConfig {
    /// Build a config from defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(name) = env::var("MARKET_INDEX_NAME") {
            config.index_name = name;
        }
        if let Ok(endpoint) = env::var("CHAIN_RPC_URL") {
            config.rpc_endpoint = endpoint;
        }
        let index_host = env::var("INDEX_HOST").unwrap_or_else(|_| "localhost".to_string());
        let index_port = env::var("INDEX_PORT").unwrap_or_else(|_| "9200".to_string());
        config.index_endpoint = format!("http://{index_host}:{index_port}");

        if let Ok(scan) = env::var("MARKET_SCAN") {
            config.scan = parse_bool(&scan).context("MARKET_SCAN must be a boolean")?;
        }
        if let Ok(filtering) = env::var("MARKET_FILTERING") {
            config.filtering = parse_bool(&filtering).context("MARKET_FILTERING must be a boolean")?;
        }
        if let Ok(limit) = env::var("MARKET_LIMIT") {
            config.limit = Some(limit.parse().context("MARKET_LIMIT must be an integer")?);
        }
        if let Ok(batch) = env::var("SCAN_BATCH_SIZE") {
            config.batch_size = batch.parse().context("SCAN_BATCH_SIZE must be an integer")?;
        }
        if let Ok(page) = env::var("SCAN_PAGE_SIZE") {
            config.page_size = page.parse().context("SCAN_PAGE_SIZE must be an integer")?;
        }
        if let Ok(workers) = env::var("SCAN_CONCURRENCY") {
            config.concurrency = workers
                .parse()
                .context("SCAN_CONCURRENCY must be an integer")?;
        }
        if let Ok(secs) = env::var("SYNC_POLL_INTERVAL_SECS") {
            config.poll_interval_secs = secs
                .parse()
                .context("SYNC_POLL_INTERVAL_SECS must be an integer")?;
        }

        Ok(config)
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            limit: self.limit,
            batch_size: self.batch_size,
            page_size: self.page_size,
            concurrency: self.concurrency,
        }
    }

    pub fn watcher_options(&self) -> WatcherOptions {
        WatcherOptions {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            ..Default::default()
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
