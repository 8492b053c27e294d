//! Scripted collaborators shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::client::{GeoDataClient, NetworkError};
use crate::geo::{LatLng, MapData, MapPoint, PointVisual, ProtectionLevel, ReserveClassification, Zone};
use crate::geolocation::{Fix, GeolocationError, PositionOptions, PositionSource, WatchId, WatchSubscription};

// =============================================================================
// FIXTURES
// =============================================================================

#[must_use]
pub fn zone(id: &str, level: Option<ProtectionLevel>) -> Zone {
    let ring = vec![LatLng::new(26.5, 44.0), LatLng::new(27.0, 45.0), LatLng::new(26.0, 45.5), LatLng::new(25.5, 44.5)];
    Zone::from_ring(id, format!("zone {id}"), level, ring).expect("fixture ring is valid")
}

#[must_use]
pub fn point(id: &str, lat: f64, lng: f64) -> MapPoint {
    MapPoint {
        id: id.into(),
        position: LatLng::new(lat, lng),
        visual: PointVisual { color: "#22c55e".into(), radius: 6.0, popup: format!("point {id}") },
        inside_geofence: Some(true),
        zone_name: None,
        protection_level: None,
    }
}

#[must_use]
pub fn map_data(zones: Vec<Zone>, points: Vec<MapPoint>) -> MapData {
    MapData { zones, points }
}

#[must_use]
pub fn inside(zone_name: &str, level: ProtectionLevel) -> ReserveClassification {
    ReserveClassification { zone_name: Some(zone_name.into()), protection_level: Some(level), is_inside: true }
}

#[must_use]
pub fn outside() -> ReserveClassification {
    ReserveClassification { zone_name: None, protection_level: None, is_inside: false }
}

#[must_use]
pub fn fix(lat: f64, lng: f64) -> Fix {
    Fix { position: LatLng::new(lat, lng), accuracy_m: Some(5.0), captured_at: Instant::now() }
}

// =============================================================================
// MOCK CLIENT
// =============================================================================

/// Scripted backend. Unscripted fetches return empty data; unscripted
/// submissions fail with a request error.
#[derive(Default)]
pub struct MockGeoDataClient {
    map_data: Mutex<VecDeque<Result<MapData, NetworkError>>>,
    classifications: Mutex<VecDeque<Result<ReserveClassification, NetworkError>>>,
    fetch_delay: Option<Duration>,
    submit_delay: Option<Duration>,
    fetch_calls: AtomicUsize,
    submitted: Mutex<Vec<LatLng>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockGeoDataClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = Some(delay);
        self
    }

    pub fn push_map_data(&self, result: Result<MapData, NetworkError>) {
        self.map_data.lock().unwrap().push_back(result);
    }

    pub fn push_classification(&self, result: Result<ReserveClassification, NetworkError>) {
        self.classifications.lock().unwrap().push_back(result);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_fetches(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<LatLng> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl GeoDataClient for MockGeoDataClient {
    async fn fetch_map_data(&self) -> Result<MapData, NetworkError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.map_data.lock().unwrap().pop_front().unwrap_or_else(|| Ok(MapData::default()));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn submit_point(&self, position: LatLng) -> Result<ReserveClassification, NetworkError> {
        self.submitted.lock().unwrap().push(position);
        if let Some(delay) = self.submit_delay {
            tokio::time::sleep(delay).await;
        }
        self.classifications
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(NetworkError::Request("connection refused".into())))
    }
}

// =============================================================================
// MOCK POSITION SOURCE
// =============================================================================

/// Scripted device. Unscripted one-shot requests never resolve.
pub struct MockPositionSource {
    available: bool,
    current: Mutex<VecDeque<Result<Fix, GeolocationError>>>,
    watch_error: Mutex<Option<GeolocationError>>,
    watch_tx: Mutex<Option<mpsc::Sender<Result<Fix, GeolocationError>>>>,
    current_calls: AtomicUsize,
    watch_calls: AtomicUsize,
    cleared: Mutex<Vec<WatchId>>,
    next_id: AtomicU64,
}

impl MockPositionSource {
    #[must_use]
    pub fn new(available: bool) -> Self {
        Self {
            available,
            current: Mutex::new(VecDeque::new()),
            watch_error: Mutex::new(None),
            watch_tx: Mutex::new(None),
            current_calls: AtomicUsize::new(0),
            watch_calls: AtomicUsize::new(0),
            cleared: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn shared(available: bool) -> Arc<Self> {
        Arc::new(Self::new(available))
    }

    pub fn push_current(&self, result: Result<Fix, GeolocationError>) {
        self.current.lock().unwrap().push_back(result);
    }

    pub fn fail_watch_with(&self, error: GeolocationError) {
        *self.watch_error.lock().unwrap() = Some(error);
    }

    /// Deliver an update on the open watch. Returns `false` if none is open.
    pub async fn emit(&self, update: Result<Fix, GeolocationError>) -> bool {
        let tx = self.watch_tx.lock().unwrap().clone();
        match tx {
            Some(tx) => tx.send(update).await.is_ok(),
            None => false,
        }
    }

    pub fn current_calls(&self) -> usize {
        self.current_calls.load(Ordering::SeqCst)
    }

    pub fn watch_calls(&self) -> usize {
        self.watch_calls.load(Ordering::SeqCst)
    }

    pub fn cleared(&self) -> Vec<WatchId> {
        self.cleared.lock().unwrap().clone()
    }

    pub fn has_open_watch(&self) -> bool {
        self.watch_tx.lock().unwrap().is_some()
    }
}

#[async_trait::async_trait]
impl PositionSource for MockPositionSource {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn current_position(&self, _options: PositionOptions) -> Result<Fix, GeolocationError> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.current.lock().unwrap().pop_front();
        match scripted {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    fn watch_position(&self, _options: PositionOptions) -> Result<WatchSubscription, GeolocationError> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.watch_error.lock().unwrap().clone() {
            return Err(error);
        }
        let id = WatchId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, updates) = mpsc::channel(16);
        *self.watch_tx.lock().unwrap() = Some(tx);
        Ok(WatchSubscription { id, updates })
    }

    fn clear_watch(&self, id: WatchId) {
        self.cleared.lock().unwrap().push(id);
        self.watch_tx.lock().unwrap().take();
    }
}
