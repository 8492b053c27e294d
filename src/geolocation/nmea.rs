//! NMEA 0183 position source for serial GPS receivers.
//!
//! DESIGN
//! ======
//! A reader task consumes sentences line by line, keeps the latest valid fix
//! in a `tokio::sync::watch` channel, and marks the stream ended on EOF.
//! One-shot requests are served from that cache when it is younger than
//! `maximum_age`; otherwise they wait for the next fix. Each watch gets its
//! own forwarding task, keyed by `WatchId` so `clear_watch` can abort it.
//!
//! Only `GGA` and `RMC` sentences carry positions we use (any talker: `GP`,
//! `GN`, `GL`, ...). Void `RMC` and zero-quality `GGA` are ignored.

#[cfg(test)]
#[path = "nmea_test.rs"]
mod nmea_test;

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::source::{Fix, GeolocationError, PositionOptions, PositionSource, WatchId, WatchSubscription};
use crate::geo::LatLng;
use crate::task::TaskHandle;

/// Rough user-equivalent range error used to turn HDOP into meters.
const HDOP_TO_METERS: f64 = 5.0;
const WATCH_CHANNEL_CAPACITY: usize = 16;

// =============================================================================
// PARSING
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NmeaError {
    #[error("not an NMEA sentence")]
    NotASentence,
    #[error("checksum mismatch (expected {expected:02X}, computed {computed:02X})")]
    Checksum { expected: u8, computed: u8 },
    #[error("malformed {sentence} field: {field}")]
    Field { sentence: &'static str, field: &'static str },
}

/// Position extracted from one sentence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NmeaReading {
    pub position: LatLng,
    pub hdop: Option<f64>,
}

impl NmeaReading {
    #[must_use]
    pub fn accuracy_m(&self) -> Option<f64> {
        self.hdop.map(|h| h * HDOP_TO_METERS)
    }
}

/// Parse one NMEA line.
///
/// Returns `Ok(None)` for sentences that carry no usable fix (other sentence
/// types, void status, zero fix quality).
///
/// # Errors
///
/// Returns [`NmeaError`] for lines that are not sentences, fail the checksum,
/// or carry malformed coordinates.
pub fn parse_sentence(line: &str) -> Result<Option<NmeaReading>, NmeaError> {
    let line = line.trim();
    let body = line.strip_prefix('$').ok_or(NmeaError::NotASentence)?;

    let body = match body.split_once('*') {
        Some((payload, checksum)) => {
            let expected = u8::from_str_radix(checksum.trim(), 16).map_err(|_| NmeaError::NotASentence)?;
            let computed = payload.bytes().fold(0_u8, |acc, b| acc ^ b);
            if expected != computed {
                return Err(NmeaError::Checksum { expected, computed });
            }
            payload
        }
        None => body,
    };

    let fields: Vec<&str> = body.split(',').collect();
    let Some(kind) = fields[0].get(2..) else {
        return Err(NmeaError::NotASentence);
    };

    match kind {
        "GGA" => parse_gga(&fields),
        "RMC" => parse_rmc(&fields),
        _ => Ok(None),
    }
}

fn parse_gga(fields: &[&str]) -> Result<Option<NmeaReading>, NmeaError> {
    let field = |i: usize| fields.get(i).copied().unwrap_or("");
    let quality = field(6);
    if quality.is_empty() || quality == "0" {
        return Ok(None);
    }

    let lat = coordinate(field(2), field(3), 2).ok_or(NmeaError::Field { sentence: "GGA", field: "latitude" })?;
    let lng = coordinate(field(4), field(5), 3).ok_or(NmeaError::Field { sentence: "GGA", field: "longitude" })?;
    let hdop = field(8).parse::<f64>().ok().filter(|h| h.is_finite() && *h > 0.0);

    Ok(Some(NmeaReading { position: LatLng::new(lat, lng), hdop }))
}

fn parse_rmc(fields: &[&str]) -> Result<Option<NmeaReading>, NmeaError> {
    let field = |i: usize| fields.get(i).copied().unwrap_or("");
    if field(2) != "A" {
        return Ok(None);
    }

    let lat = coordinate(field(3), field(4), 2).ok_or(NmeaError::Field { sentence: "RMC", field: "latitude" })?;
    let lng = coordinate(field(5), field(6), 3).ok_or(NmeaError::Field { sentence: "RMC", field: "longitude" })?;

    Ok(Some(NmeaReading { position: LatLng::new(lat, lng), hdop: None }))
}

/// `ddmm.mmmm` / `dddmm.mmmm` plus hemisphere → signed decimal degrees.
fn coordinate(raw: &str, hemisphere: &str, degree_digits: usize) -> Option<f64> {
    if raw.len() <= degree_digits || !raw.is_char_boundary(degree_digits) {
        return None;
    }
    let (deg, min) = raw.split_at(degree_digits);
    let deg: f64 = deg.parse().ok()?;
    let min: f64 = min.parse().ok()?;
    if !(0.0..60.0).contains(&min) {
        return None;
    }

    let value = deg + min / 60.0;
    let limit = if degree_digits == 2 { 90.0 } else { 180.0 };
    if value > limit {
        return None;
    }

    match hemisphere {
        "N" | "E" => Some(value),
        "S" | "W" => Some(-value),
        _ => None,
    }
}

// =============================================================================
// SOURCE
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
struct StreamState {
    fix: Option<Fix>,
    ended: bool,
}

/// [`PositionSource`] fed by NMEA sentences.
pub struct NmeaPositionSource {
    state: Arc<watch::Sender<StreamState>>,
    reader: Mutex<Option<TaskHandle>>,
    watches: Mutex<HashMap<WatchId, TaskHandle>>,
    next_watch: AtomicU64,
}

impl NmeaPositionSource {
    /// A source with no reader attached; feed it with [`Self::ingest_line`].
    #[must_use]
    pub fn detached() -> Self {
        let (state, _) = watch::channel(StreamState::default());
        Self {
            state: Arc::new(state),
            reader: Mutex::new(None),
            watches: Mutex::new(HashMap::new()),
            next_watch: AtomicU64::new(1),
        }
    }

    /// Spawn a reader task over `reader` (serial port, file, pipe).
    #[must_use]
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let source = Self::detached();
        let state = source.state.clone();
        let task = TaskHandle::spawn("nmea-reader", async move {
            let mut lines = reader.lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        publish_line(&state, &line);
                    }
                    Ok(None) => {
                        info!("NMEA stream ended");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "NMEA stream read failed");
                        break;
                    }
                }
            }
            state.send_modify(|s| s.ended = true);
        });
        *source.reader.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        source
    }

    /// Open an NMEA device or file and start reading it.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the path cannot be opened.
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        info!(path = %path.display(), "reading NMEA fixes");
        Ok(Self::from_reader(BufReader::new(file)))
    }

    /// Parse `line` and publish it if it carries a fix.
    pub fn ingest_line(&self, line: &str) -> Option<Fix> {
        publish_line(&self.state, line)
    }

    /// Mark the stream as ended; pending one-shot requests fail as unavailable.
    pub fn end_stream(&self) {
        self.state.send_modify(|s| s.ended = true);
    }

    #[must_use]
    pub fn latest_fix(&self) -> Option<Fix> {
        self.state.borrow().fix
    }

    #[must_use]
    pub fn active_watches(&self) -> usize {
        self.watches.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn publish_line(state: &watch::Sender<StreamState>, line: &str) -> Option<Fix> {
    match parse_sentence(line) {
        Ok(Some(reading)) => {
            let fix = Fix { position: reading.position, accuracy_m: reading.accuracy_m(), captured_at: Instant::now() };
            state.send_modify(|s| s.fix = Some(fix));
            Some(fix)
        }
        Ok(None) => None,
        Err(e) => {
            debug!(error = %e, "ignoring NMEA line");
            None
        }
    }
}

#[async_trait::async_trait]
impl PositionSource for NmeaPositionSource {
    fn is_available(&self) -> bool {
        true
    }

    async fn current_position(&self, options: PositionOptions) -> Result<Fix, GeolocationError> {
        let mut rx = self.state.subscribe();
        loop {
            let current = *rx.borrow_and_update();
            if let Some(fix) = current.fix {
                if fix.is_fresh(Instant::now(), options.maximum_age) {
                    return Ok(fix);
                }
            }
            if current.ended {
                return Err(GeolocationError::PositionUnavailable);
            }
            if rx.changed().await.is_err() {
                return Err(GeolocationError::PositionUnavailable);
            }
        }
    }

    fn watch_position(&self, options: PositionOptions) -> Result<WatchSubscription, GeolocationError> {
        let id = WatchId(self.next_watch.fetch_add(1, Ordering::Relaxed));
        let (tx, updates) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
        let mut rx = self.state.subscribe();

        let task = TaskHandle::spawn("nmea-watch", async move {
            let initial = *rx.borrow_and_update();
            if let Some(fix) = initial.fix {
                if fix.is_fresh(Instant::now(), options.maximum_age) && tx.send(Ok(fix)).await.is_err() {
                    return;
                }
            }

            loop {
                let update = match tokio::time::timeout(options.timeout, rx.changed()).await {
                    Ok(Ok(())) => {
                        let current = *rx.borrow_and_update();
                        if current.ended {
                            let _ = tx.send(Err(GeolocationError::PositionUnavailable)).await;
                            return;
                        }
                        match current.fix {
                            Some(fix) => Ok(fix),
                            None => continue,
                        }
                    }
                    Ok(Err(_)) => return,
                    Err(_) => Err(GeolocationError::Timeout),
                };
                if tx.send(update).await.is_err() {
                    return;
                }
            }
        });

        self.watches.lock().unwrap_or_else(PoisonError::into_inner).insert(id, task);
        Ok(WatchSubscription { id, updates })
    }

    fn clear_watch(&self, id: WatchId) {
        // Dropping the handle aborts the forwarding task.
        self.watches.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);
    }
}
