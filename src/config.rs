//! Session configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/llm";
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_BANNER_MS: u64 = 2_000;
pub const DEFAULT_RIPPLE_MS: u64 = 1_500;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_VIEWPORT: ViewportSize = ViewportSize { width: 1024.0, height: 768.0 };

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request: Duration,
    pub connect: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

/// Timing knobs for the live map. All periods are wall-clock durations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapTiming {
    pub sync_interval: Duration,
    pub banner_duration: Duration,
    pub ripple_duration: Duration,
}

impl Default for MapTiming {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_millis(DEFAULT_SYNC_INTERVAL_MS),
            banner_duration: Duration::from_millis(DEFAULT_BANNER_MS),
            ripple_duration: Duration::from_millis(DEFAULT_RIPPLE_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldConfig {
    pub api_base_url: String,
    pub http: HttpTimeouts,
    pub timing: MapTiming,
    pub viewport: ViewportSize,
    /// Minimum movement (degrees) before a watch update repositions the self marker.
    pub move_threshold_deg: f64,
    /// NMEA stream to read fixes from; `None` means no location capability.
    pub gps_device: Option<PathBuf>,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            http: HttpTimeouts::default(),
            timing: MapTiming::default(),
            viewport: DEFAULT_VIEWPORT,
            move_threshold_deg: 0.0,
            gps_device: None,
        }
    }
}

impl FieldConfig {
    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `FIELDMAP_API_BASE_URL`: default `http://127.0.0.1:8000/llm`
    /// - `FIELDMAP_SYNC_INTERVAL_MS`: default 5000
    /// - `FIELDMAP_BANNER_MS`: default 2000
    /// - `FIELDMAP_RIPPLE_MS`: default 1500
    /// - `FIELDMAP_REQUEST_TIMEOUT_SECS`: default 30
    /// - `FIELDMAP_CONNECT_TIMEOUT_SECS`: default 10
    /// - `FIELDMAP_VIEWPORT`: `WIDTHxHEIGHT`, default `1024x768`
    /// - `FIELDMAP_MOVE_THRESHOLD_DEG`: default 0
    /// - `FIELDMAP_GPS_DEVICE`: path to an NMEA 0183 stream
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a malformed base URL or viewport.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = parse_base_url(
            std::env::var("FIELDMAP_API_BASE_URL")
                .ok()
                .as_deref()
                .unwrap_or(DEFAULT_API_BASE_URL),
        )?;

        let viewport = match std::env::var("FIELDMAP_VIEWPORT") {
            Ok(raw) => parse_viewport(&raw)?,
            Err(_) => DEFAULT_VIEWPORT,
        };

        let http = HttpTimeouts {
            request: Duration::from_secs(env_parse("FIELDMAP_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)),
            connect: Duration::from_secs(env_parse("FIELDMAP_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)),
        };

        let timing = MapTiming {
            sync_interval: Duration::from_millis(env_parse("FIELDMAP_SYNC_INTERVAL_MS", DEFAULT_SYNC_INTERVAL_MS).max(1)),
            banner_duration: Duration::from_millis(env_parse("FIELDMAP_BANNER_MS", DEFAULT_BANNER_MS)),
            ripple_duration: Duration::from_millis(env_parse("FIELDMAP_RIPPLE_MS", DEFAULT_RIPPLE_MS)),
        };

        let move_threshold_deg = env_parse("FIELDMAP_MOVE_THRESHOLD_DEG", 0.0_f64);
        let move_threshold_deg = if move_threshold_deg.is_finite() { move_threshold_deg.max(0.0) } else { 0.0 };

        let gps_device = std::env::var("FIELDMAP_GPS_DEVICE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self { api_base_url, http, timing, viewport, move_threshold_deg, gps_device })
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::Invalid {
            var: "FIELDMAP_API_BASE_URL",
            reason: format!("expected an http(s) URL, got '{raw}'"),
        });
    }
    Ok(trimmed.to_string())
}

fn parse_viewport(raw: &str) -> Result<ViewportSize, ConfigError> {
    let invalid = || ConfigError::Invalid {
        var: "FIELDMAP_VIEWPORT",
        reason: format!("expected WIDTHxHEIGHT, got '{raw}'"),
    };

    let (w, h) = raw.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
    let width: f64 = w.trim().parse().map_err(|_| invalid())?;
    let height: f64 = h.trim().parse().map_err(|_| invalid())?;
    if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
        return Err(invalid());
    }
    Ok(ViewportSize { width, height })
}
