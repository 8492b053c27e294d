use super::*;
use crate::config::DEFAULT_VIEWPORT;
use crate::geo::ProtectionLevel;
use crate::test_helpers::{MockGeoDataClient, map_data, point, zone};
use crate::viewport::MapViewport;

fn engine(client: Arc<MockGeoDataClient>) -> (Arc<MapSyncEngine>, SharedViewport) {
    let viewport = MapViewport::shared(DEFAULT_VIEWPORT);
    let engine = Arc::new(MapSyncEngine::new(client, viewport.clone(), Duration::from_secs(5)));
    (engine, viewport)
}

// =============================================================================
// tick
// =============================================================================

#[tokio::test(start_paused = true)]
async fn tick_replaces_layers_on_success() {
    let client = Arc::new(MockGeoDataClient::new());
    client.push_map_data(Ok(map_data(vec![zone("z", Some(ProtectionLevel::High))], vec![point("p", 24.0, 46.0)])));
    let (engine, viewport) = engine(client);

    assert_eq!(engine.tick().await, TickOutcome::Synced { zones: 1, points: 1 });
    assert_eq!(viewport.layer_counts(), (1, 1));
    assert_eq!(engine.state(), SyncState::Idle);
    assert_eq!(engine.stats().completed, 1);
}

#[tokio::test(start_paused = true)]
async fn failed_tick_keeps_previous_layers() {
    let client = Arc::new(MockGeoDataClient::new());
    client.push_map_data(Ok(map_data(vec![zone("z", None)], vec![point("p", 24.0, 46.0)])));
    client.push_map_data(Err(NetworkError::Status { status: 503, body: "down".into() }));
    let (engine, viewport) = engine(client);

    engine.tick().await;
    let before = viewport.snapshot();
    let outcome = engine.tick().await;

    assert!(matches!(outcome, TickOutcome::Failed(NetworkError::Status { status: 503, .. })));
    let after = viewport.snapshot();
    assert_eq!(before.zones, after.zones);
    assert_eq!(before.points, after.points);
    assert_eq!(after.layer_generation, 1);
    assert_eq!(engine.state(), SyncState::Idle);
    assert_eq!(engine.stats(), SyncStats { completed: 1, failed: 1, skipped: 0 });
}

#[tokio::test(start_paused = true)]
async fn overlapping_tick_is_skipped() {
    let client = Arc::new(MockGeoDataClient::new().with_fetch_delay(Duration::from_secs(3)));
    let (engine, _viewport) = engine(client.clone());

    let first = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.tick().await })
    };
    tokio::task::yield_now().await;
    assert_eq!(engine.state(), SyncState::Syncing);

    assert_eq!(engine.tick().await, TickOutcome::Skipped);
    assert!(matches!(first.await.unwrap(), TickOutcome::Synced { .. }));
    assert_eq!(client.fetch_calls(), 1);
    assert_eq!(engine.stats().skipped, 1);
}

// =============================================================================
// spawn
// =============================================================================

#[tokio::test(start_paused = true)]
async fn loop_syncs_immediately_then_every_interval() {
    let client = Arc::new(MockGeoDataClient::new());
    let (engine, _viewport) = engine(client.clone());
    let handle = engine.spawn();

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(client.fetch_calls(), 1);

    tokio::time::sleep(Duration::from_millis(5_000)).await;
    assert_eq!(client.fetch_calls(), 2);

    tokio::time::sleep(Duration::from_millis(10_000)).await;
    assert_eq!(client.fetch_calls(), 4);
    drop(handle);
}

#[tokio::test(start_paused = true)]
async fn slow_fetches_never_overlap() {
    let client = Arc::new(MockGeoDataClient::new().with_fetch_delay(Duration::from_secs(12)));
    let (engine, _viewport) = engine(client.clone());
    let _handle = engine.spawn();

    tokio::time::sleep(Duration::from_secs(40)).await;

    assert_eq!(client.max_concurrent_fetches(), 1);
    assert!(client.fetch_calls() >= 3);
    assert!(engine.stats().skipped >= 4);
}

#[tokio::test(start_paused = true)]
async fn cancelling_loop_stops_ticks_and_aborts_fetch() {
    let client = Arc::new(MockGeoDataClient::new().with_fetch_delay(Duration::from_secs(2)));
    let (engine, viewport) = engine(client.clone());
    let handle = engine.spawn();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(engine.state(), SyncState::Syncing);

    handle.cancel();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(client.fetch_calls(), 1);
    assert_eq!(engine.state(), SyncState::Idle);
    assert_eq!(viewport.snapshot().layer_generation, 0);
}
