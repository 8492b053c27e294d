//! reqwest implementation of [`GeoDataClient`].
//!
//! Thin HTTP wrapper for `GET {base}/map-data` and `POST {base}/add-point`.
//! All parsing lives in [`super::wire`] for testability.

#[cfg(test)]
#[path = "http_test.rs"]
mod http_test;

use tracing::debug;

use super::wire::{AddPointRequest, parse_classification, parse_map_data};
use super::{GeoDataClient, NetworkError};
use crate::config::HttpTimeouts;
use crate::geo::{LatLng, MapData, ReserveClassification};

const MAP_DATA_PATH: &str = "/map-data";
const ADD_POINT_PATH: &str = "/add-point";

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpGeoDataClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpGeoDataClient {
    /// Build a client for the backend rooted at `base_url` (e.g. `http://host/llm`).
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeouts: HttpTimeouts) -> Result<Self, NetworkError> {
        let http = reqwest::Client::builder()
            .timeout(timeouts.request)
            .connect_timeout(timeouts.connect)
            .build()
            .map_err(|e| NetworkError::ClientBuild(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn read_body(response: reqwest::Response) -> Result<String, NetworkError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| NetworkError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(NetworkError::Status { status: status.as_u16(), body: text });
        }
        Ok(text)
    }
}

#[async_trait::async_trait]
impl GeoDataClient for HttpGeoDataClient {
    async fn fetch_map_data(&self) -> Result<MapData, NetworkError> {
        let url = format!("{}{MAP_DATA_PATH}", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| NetworkError::Request(e.to_string()))?;

        let body = Self::read_body(response).await?;
        let data = parse_map_data(&body)?;
        debug!(zones = data.zones.len(), points = data.points.len(), "map data fetched");
        Ok(data)
    }

    async fn submit_point(&self, position: LatLng) -> Result<ReserveClassification, NetworkError> {
        let url = format!("{}{ADD_POINT_PATH}", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&AddPointRequest { lat: position.lat, lng: position.lng })
            .send()
            .await
            .map_err(|e| NetworkError::Request(e.to_string()))?;

        let body = Self::read_body(response).await?;
        parse_classification(&body)
    }
}
