//! Shared test doubles for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use market_index::{
    BranchId, ChainEvent, ChainEventKind, ChainRpc, MarketId, MarketInfo, RpcError, SyncStatus,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;

/// One step of a scripted status poll
#[derive(Debug, Clone)]
pub enum SyncStep {
    Status(SyncStatus),
    Error,
}

/// Programmable in-process chain RPC
pub struct MockRpc {
    branches: Vec<BranchId>,
    /// Ordered market ids per branch
    listings: HashMap<BranchId, Vec<MarketId>>,
    infos: HashMap<MarketId, MarketInfo>,
    /// Any batch containing one of these ids fails wholesale
    poisoned: HashSet<MarketId>,
    sync_script: Mutex<VecDeque<SyncStep>>,
    peer_script: Mutex<VecDeque<u64>>,
    pub batch_calls: AtomicUsize,
    pub fetched_ids: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub unsubscribed: AtomicBool,
    events: broadcast::Sender<ChainEvent>,
    subscribed_kinds: Mutex<Vec<ChainEventKind>>,
}

impl MockRpc {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            branches: Vec::new(),
            listings: HashMap::new(),
            infos: HashMap::new(),
            poisoned: HashSet::new(),
            sync_script: Mutex::new(VecDeque::new()),
            peer_script: Mutex::new(VecDeque::new()),
            batch_calls: AtomicUsize::new(0),
            fetched_ids: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            unsubscribed: AtomicBool::new(false),
            events,
            subscribed_kinds: Mutex::new(Vec::new()),
        }
    }

    /// Register a market on a branch, with info available for fetching
    pub fn add_market(&mut self, branch: &str, raw_id: &str, info: MarketInfo) {
        let branch_id = BranchId::new(branch);
        let id = MarketId::parse(raw_id).expect("test market id must be valid");
        if !self.branches.contains(&branch_id) {
            self.branches.push(branch_id.clone());
        }
        self.listings
            .entry(branch_id)
            .or_default()
            .push(id.clone());
        self.infos.insert(id, info);
    }

    /// Register a market id whose info fetch will come back empty
    pub fn add_market_without_info(&mut self, branch: &str, raw_id: &str) {
        let branch_id = BranchId::new(branch);
        let id = MarketId::parse(raw_id).expect("test market id must be valid");
        if !self.branches.contains(&branch_id) {
            self.branches.push(branch_id.clone());
        }
        self.listings.entry(branch_id).or_default().push(id);
    }

    /// Make any batch fetch containing this id fail
    pub fn poison_batch_containing(&mut self, raw_id: &str) {
        self.poisoned
            .insert(MarketId::parse(raw_id).expect("test market id must be valid"));
    }

    /// Script the answers of successive sync-status polls; the last step
    /// repeats forever
    pub fn script_sync(&self, steps: Vec<SyncStep>) {
        *self.sync_script.lock().unwrap() = steps.into();
    }

    /// Script the answers of successive peer-count polls; the last value
    /// repeats forever
    pub fn script_peers(&self, counts: Vec<u64>) {
        *self.peer_script.lock().unwrap() = counts.into();
    }

    pub fn emit(&self, kind: ChainEventKind, payload: serde_json::Value) {
        let _ = self.events.send(ChainEvent::new(kind, payload));
    }

    pub fn subscribed_kinds(&self) -> Vec<ChainEventKind> {
        self.subscribed_kinds.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainRpc for MockRpc {
    async fn sync_status(&self) -> Result<SyncStatus, RpcError> {
        let mut script = self.sync_script.lock().unwrap();
        let step = if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap_or(SyncStep::Status(SyncStatus::Synced))
        };
        match step {
            SyncStep::Status(status) => Ok(status),
            SyncStep::Error => Err(RpcError::Status("scripted status error".into())),
        }
    }

    async fn peer_count(&self) -> Result<u64, RpcError> {
        let mut script = self.peer_script.lock().unwrap();
        let count = if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().copied().unwrap_or(1)
        };
        Ok(count)
    }

    async fn list_branches(&self) -> Result<Vec<BranchId>, RpcError> {
        Ok(self.branches.clone())
    }

    async fn count_markets(&self, branch: &BranchId) -> Result<u64, RpcError> {
        Ok(self.listings.get(branch).map_or(0, |ids| ids.len() as u64))
    }

    async fn list_market_ids(
        &self,
        branch: &BranchId,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<MarketId>, RpcError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let ids = self.listings.get(branch).cloned().unwrap_or_default();
        Ok(ids
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn market_info(&self, id: &MarketId) -> Result<MarketInfo, RpcError> {
        self.infos
            .get(id)
            .cloned()
            .ok_or_else(|| RpcError::Call(format!("no such market: {id}")))
    }

    async fn market_info_batch(
        &self,
        ids: &[MarketId],
    ) -> Result<HashMap<MarketId, MarketInfo>, RpcError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetched_ids.fetch_add(ids.len(), Ordering::SeqCst);

        if ids.iter().any(|id| self.poisoned.contains(id)) {
            return Err(RpcError::Call("batch fetch exploded".into()));
        }

        Ok(ids
            .iter()
            .filter_map(|id| self.infos.get(id).map(|info| (id.clone(), info.clone())))
            .collect())
    }

    async fn subscribe(
        &self,
        kinds: &[ChainEventKind],
    ) -> Result<broadcast::Receiver<ChainEvent>, RpcError> {
        *self.subscribed_kinds.lock().unwrap() = kinds.to_vec();
        Ok(self.events.subscribe())
    }

    async fn unsubscribe(&self) -> Result<(), RpcError> {
        self.unsubscribed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Market info fixture on the given branch
pub fn market(branch: &str) -> MarketInfo {
    MarketInfo {
        branch_id: Some(BranchId::new(branch)),
        maker_fee: "0.01".into(),
        taker_fee: "0.02".into(),
        trading_fee: "0.03".into(),
        trading_period: 1,
        creation_time: 1000,
        end_date: 2000,
        description: "a market".into(),
        extra_info: String::new(),
        tags: vec![],
        volume: "0".into(),
        winning_outcomes: vec![],
    }
}

/// Poll an async predicate until it holds or the deadline passes
pub async fn wait_until<F, Fut>(deadline: Duration, mut predicate: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if predicate().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
