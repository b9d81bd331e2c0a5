//! Live watcher behavior: sync waiting, event-driven refresh, teardown

mod common;

use common::{market, wait_until, MockRpc, SyncStep};
use market_index::{
    AppConfig, ChainEventKind, ChainRpc, MarketId, MarketIndexCore, MemoryIndex, SearchIndex,
    SyncStatus, WatcherState,
};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing_test::traced_test;

fn build_core(rpc: MockRpc) -> (MarketIndexCore, Arc<MockRpc>, Arc<MemoryIndex>) {
    let rpc = Arc::new(rpc);
    let index = Arc::new(MemoryIndex::new());
    let mut config = AppConfig::default();
    // keep the sync-wait self-loop fast in tests
    config.poll_interval_secs = 0;
    let core = MarketIndexCore::new(
        config,
        rpc.clone() as Arc<dyn ChainRpc>,
        index.clone() as Arc<dyn SearchIndex>,
    );
    (core, rpc, index)
}

async fn doc_exists(index: &MemoryIndex, raw_id: &str) -> bool {
    let id = MarketId::parse(raw_id).unwrap();
    index
        .get_document("markets", &id)
        .await
        .unwrap()
        .is_some()
}

#[tokio::test]
#[traced_test]
async fn watch_waits_through_errors_syncing_and_missing_peers() {
    let mut rpc = MockRpc::new();
    rpc.add_market("1", "0x1", market("1"));
    rpc.script_sync(vec![
        SyncStep::Error,
        SyncStep::Status(SyncStatus::Syncing {
            current_block: 50,
            highest_block: 100,
        }),
        SyncStep::Status(SyncStatus::Synced),
    ]);
    rpc.script_peers(vec![0, 0, 0, 1]);

    let (core, rpc, _) = build_core(rpc);
    assert_eq!(core.watcher_state().await, WatcherState::Disconnected);

    tokio::time::timeout(Duration::from_secs(5), core.watch())
        .await
        .expect("watch should reach Watching")
        .unwrap();

    assert_eq!(core.watcher_state().await, WatcherState::Watching);
    assert_eq!(rpc.subscribed_kinds().len(), 5);
}

#[tokio::test]
#[traced_test]
async fn events_trigger_single_record_refreshes() {
    let mut rpc = MockRpc::new();
    rpc.add_market("1", "0xabc", market("1"));
    rpc.add_market("1", "0xdef", market("1"));

    let (core, rpc, index) = build_core(rpc);
    core.watch().await.unwrap();

    // ids arrive zero-padded from the filters
    rpc.emit(ChainEventKind::MarketCreated, json!({ "marketID": "0x0abc" }));
    rpc.emit(ChainEventKind::LogFillTx, json!({ "market": "0xdef" }));

    assert!(
        wait_until(Duration::from_secs(5), || doc_exists(&index, "0xabc")).await,
        "market-created event should index the market"
    );
    assert!(
        wait_until(Duration::from_secs(5), || doc_exists(&index, "0xdef")).await,
        "fill event should index the market"
    );
}

#[tokio::test]
async fn malformed_events_are_dropped_silently() {
    let mut rpc = MockRpc::new();
    rpc.add_market("1", "0xabc", market("1"));

    let (core, rpc, index) = build_core(rpc);
    core.watch().await.unwrap();

    // no id key at all, and an id under the wrong key for the kind
    rpc.emit(ChainEventKind::MarketCreated, json!({ "noise": true }));
    rpc.emit(ChainEventKind::LogFillTx, json!({ "marketID": "0xabc" }));

    // give the event loop a moment; nothing should land
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!doc_exists(&index, "0xabc").await);
    assert_eq!(core.watcher_state().await, WatcherState::Watching);
}

#[tokio::test]
async fn unwatch_tears_down_and_is_idempotent() {
    let mut rpc = MockRpc::new();
    rpc.add_market("1", "0xabc", market("1"));

    let (core, rpc, index) = build_core(rpc);
    core.watch().await.unwrap();

    core.unwatch().await.unwrap();
    assert_eq!(core.watcher_state().await, WatcherState::Disconnected);
    assert!(rpc.unsubscribed.load(Ordering::SeqCst));

    // calling again when already disconnected is fine
    core.unwatch().await.unwrap();

    rpc.emit(ChainEventKind::MarketCreated, json!({ "marketID": "0xabc" }));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!doc_exists(&index, "0xabc").await);
}

#[tokio::test]
async fn run_subscribes_before_sweeping_when_filtering() {
    let mut rpc = MockRpc::new();
    for i in 1..=3 {
        rpc.add_market("1", &format!("0x{i:x}"), market("1"));
    }

    let (core, rpc, index) = build_core(rpc);
    let summary = core.run().await.unwrap();

    assert_eq!(summary.records_indexed, 3);
    assert_eq!(core.watcher_state().await, WatcherState::Watching);
    assert_eq!(rpc.subscribed_kinds().len(), 5);
    assert!(doc_exists(&index, "0x1").await);
}

#[tokio::test]
async fn run_without_scan_skips_the_sweep() {
    let mut rpc = MockRpc::new();
    rpc.add_market("1", "0x1", market("1"));

    let rpc = Arc::new(rpc);
    let index = Arc::new(MemoryIndex::new());
    let mut config = AppConfig::default();
    config.poll_interval_secs = 0;
    config.scan = false;
    config.filtering = false;
    let core = MarketIndexCore::new(
        config,
        rpc.clone() as Arc<dyn ChainRpc>,
        index.clone() as Arc<dyn SearchIndex>,
    );

    let summary = core.run().await.unwrap();
    assert_eq!(summary.records_enqueued, 0);
    assert!(!doc_exists(&index, "0x1").await);
    // no filtering requested, so no subscriptions were installed
    assert!(rpc.subscribed_kinds().is_empty());
}
