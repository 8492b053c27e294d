//! Device position seam: options, fixes, errors and the `PositionSource` trait.
//!
//! The trait mirrors the shape of a platform geolocation API: a one-shot
//! request, a continuous subscription identified by a [`WatchId`], and an
//! explicit `clear_watch`. Hosts plug in whatever receiver they have; the
//! crate ships an NMEA reader and an "unavailable" source.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::ErrorCode;
use crate::geo::LatLng;

// =============================================================================
// OPTIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    /// Budget for acquiring a fix.
    pub timeout: Duration,
    /// Oldest cached fix that may be returned instead of a fresh one.
    pub maximum_age: Duration,
    pub high_accuracy: bool,
}

impl PositionOptions {
    /// Options for [`super::GeolocationTracker::locate`].
    pub const ONE_SHOT: Self = Self {
        timeout: Duration::from_secs(10),
        maximum_age: Duration::from_secs(60),
        high_accuracy: true,
    };

    /// Options for [`super::GeolocationTracker::watch`].
    pub const WATCH: Self = Self {
        timeout: Duration::from_secs(10),
        maximum_age: Duration::from_secs(30),
        high_accuracy: true,
    };
}

// =============================================================================
// FIX
// =============================================================================

/// A single position reading from a source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub position: LatLng,
    /// Estimated horizontal accuracy in meters, when the source reports one.
    pub accuracy_m: Option<f64>,
    pub captured_at: Instant,
}

impl Fix {
    #[must_use]
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.captured_at)
    }

    #[must_use]
    pub fn is_fresh(&self, now: Instant, maximum_age: Duration) -> bool {
        self.age(now) <= maximum_age
    }
}

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeolocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("position unavailable")]
    PositionUnavailable,

    #[error("position request timed out")]
    Timeout,

    #[error("location error: {0}")]
    Unknown(String),

    /// The host has no location capability at all.
    #[error("location capability unavailable")]
    CapabilityUnavailable,
}

impl ErrorCode for GeolocationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "E_PERMISSION_DENIED",
            Self::PositionUnavailable => "E_POSITION_UNAVAILABLE",
            Self::Timeout => "E_POSITION_TIMEOUT",
            Self::Unknown(_) => "E_POSITION_UNKNOWN",
            Self::CapabilityUnavailable => "E_CAPABILITY_UNAVAILABLE",
        }
    }

    fn user_message(&self) -> String {
        match self {
            Self::PermissionDenied => "Location permission was denied",
            Self::PositionUnavailable => "Your location is currently unavailable",
            Self::Timeout => "Locating you took too long",
            Self::Unknown(_) => "Could not determine your location",
            Self::CapabilityUnavailable => "This device does not support location",
        }
        .to_string()
    }
}

// =============================================================================
// SOURCE TRAIT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(pub u64);

/// An open position subscription. Updates stop once the source's side of the
/// channel is dropped or [`PositionSource::clear_watch`] is called.
#[derive(Debug)]
pub struct WatchSubscription {
    pub id: WatchId,
    pub updates: mpsc::Receiver<Result<Fix, GeolocationError>>,
}

#[async_trait::async_trait]
pub trait PositionSource: Send + Sync {
    /// Whether the host has any location capability. When `false` the
    /// tracker never calls the other methods.
    fn is_available(&self) -> bool;

    /// Resolve the current position once.
    ///
    /// # Errors
    ///
    /// Returns a [`GeolocationError`] describing why no fix was produced.
    async fn current_position(&self, options: PositionOptions) -> Result<Fix, GeolocationError>;

    /// Open a continuous subscription.
    ///
    /// # Errors
    ///
    /// Returns a [`GeolocationError`] if the subscription cannot be opened.
    fn watch_position(&self, options: PositionOptions) -> Result<WatchSubscription, GeolocationError>;

    /// Release a subscription opened by [`PositionSource::watch_position`].
    fn clear_watch(&self, id: WatchId);
}

/// Source for hosts without a location receiver.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailablePositionSource;

#[async_trait::async_trait]
impl PositionSource for UnavailablePositionSource {
    fn is_available(&self) -> bool {
        false
    }

    async fn current_position(&self, _options: PositionOptions) -> Result<Fix, GeolocationError> {
        Err(GeolocationError::CapabilityUnavailable)
    }

    fn watch_position(&self, _options: PositionOptions) -> Result<WatchSubscription, GeolocationError> {
        Err(GeolocationError::CapabilityUnavailable)
    }

    fn clear_watch(&self, _id: WatchId) {}
}
