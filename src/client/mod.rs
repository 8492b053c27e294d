//! Backend access for zones, points and geofence classification.
//!
//! DESIGN
//! ======
//! `GeoDataClient` is the only seam to the backend. It is pure
//! request/response: no caching, no retries, no state. Consumers
//! (`MapSyncEngine`, `PointSubmissionWorkflow`) hold it as
//! `Arc<dyn GeoDataClient>` so tests substitute a scripted mock.

pub mod http;
pub mod wire;

pub use http::HttpGeoDataClient;

use crate::error::ErrorCode;
use crate::geo::{LatLng, MapData, ReserveClassification};

// =============================================================================
// ERROR
// =============================================================================

/// Failure of a backend call. Never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// Transport failure: connection refused, DNS, timeout.
    #[error("request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("unexpected status {status}")]
    Status { status: u16, body: String },

    /// The response body did not match the expected shape.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),
}

impl ErrorCode for NetworkError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Request(_) => "E_NETWORK_REQUEST",
            Self::Status { .. } => "E_NETWORK_STATUS",
            Self::Parse(_) => "E_NETWORK_PARSE",
            Self::ClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn user_message(&self) -> String {
        "submission failed, verify the service is reachable".to_string()
    }
}

// =============================================================================
// CLIENT TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait GeoDataClient: Send + Sync {
    /// Fetch the current zone and point collections.
    ///
    /// # Errors
    ///
    /// Returns a [`NetworkError`] on transport failure, non-success status or
    /// a malformed body. Callers skip the cycle.
    async fn fetch_map_data(&self) -> Result<MapData, NetworkError>;

    /// Record a point and classify it against the protected zones.
    ///
    /// `position` must already be validated by the caller.
    ///
    /// # Errors
    ///
    /// Returns a [`NetworkError`] on any failure; no point is assumed saved.
    async fn submit_point(&self, position: LatLng) -> Result<ReserveClassification, NetworkError>;
}
