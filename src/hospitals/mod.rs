//! Hospital Locator: ordered chain of place-search providers.
//!
//! Providers are tried in priority order; the first one that returns at
//! least one hospital wins. Failures and empty answers fall through to the
//! next provider. Only exhaustion of the whole chain is reported.

pub mod google;
pub mod nominatim;
pub mod overpass;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::geo::{haversine_km, round_one_decimal, Coordinates};

pub use google::GooglePlacesProvider;
pub use nominatim::NominatimProvider;
pub use overpass::OverpassProvider;

pub const DEFAULT_SEARCH_RADIUS_M: u32 = 5000;

pub const OPEN_NOW: &str = "Open now";
pub const CLOSED: &str = "Closed";
pub const UNKNOWN_STATUS: &str = "Unknown status";

#[derive(Debug, thiserror::Error)]
pub enum LocatorError {
    #[error("{provider} request failed: {message}")]
    Http { provider: &'static str, message: String },

    #[error("{provider} returned status {status}")]
    Status { provider: &'static str, status: String },

    #[error("{provider} response parsing failed: {message}")]
    Parse { provider: &'static str, message: String },

    #[error("Failed to fetch nearby hospitals using all available methods")]
    Exhausted,
}

/// A medical facility near the query point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hospital {
    pub name: String,
    pub vicinity: String,
    pub lat: f64,
    pub lng: f64,
    /// Great-circle distance from the query point, one decimal place.
    pub distance_km: f64,
    pub open_status: String,
}

impl Hospital {
    /// Build a hospital entry, computing its distance from `origin`.
    pub fn located(
        origin: Coordinates,
        name: impl Into<String>,
        vicinity: impl Into<String>,
        lat: f64,
        lng: f64,
        open_status: &str,
    ) -> Self {
        let distance = haversine_km(origin, Coordinates::new(lat, lng));
        Self {
            name: name.into(),
            vicinity: vicinity.into(),
            lat,
            lng,
            distance_km: round_one_decimal(distance),
            open_status: open_status.to_string(),
        }
    }

    pub fn map_link(&self) -> String {
        crate::geo::map_link(self.lat, self.lng)
    }
}

/// Nearest first.
pub fn sort_by_distance(hospitals: &mut [Hospital]) {
    hospitals.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
}

/// A place-search backend.
#[async_trait]
pub trait PlaceSearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Hospitals around `origin`, sorted by distance. Empty is not an error.
    async fn search(&self, origin: Coordinates, radius_m: u32) -> Result<Vec<Hospital>, LocatorError>;
}

pub struct HospitalLocator {
    providers: Vec<Box<dyn PlaceSearchProvider>>,
}

impl HospitalLocator {
    pub fn new(providers: Vec<Box<dyn PlaceSearchProvider>>) -> Self {
        Self { providers }
    }

    /// Default public chain: Google Places (when a key is present), then
    /// Overpass, then Nominatim.
    pub fn with_default_chain(google_api_key: Option<&str>, timeout_secs: u64) -> Self {
        let mut providers: Vec<Box<dyn PlaceSearchProvider>> = Vec::new();
        if let Some(key) = google_api_key {
            providers.push(Box::new(GooglePlacesProvider::new(key, timeout_secs)));
        }
        providers.push(Box::new(OverpassProvider::new(timeout_secs)));
        providers.push(Box::new(NominatimProvider::new(timeout_secs)));
        Self::new(providers)
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub async fn find_nearby(
        &self,
        origin: Coordinates,
        radius_m: u32,
    ) -> Result<Vec<Hospital>, LocatorError> {
        for provider in &self.providers {
            match provider.search(origin, radius_m).await {
                Ok(hospitals) if !hospitals.is_empty() => {
                    tracing::info!(
                        provider = provider.name(),
                        count = hospitals.len(),
                        "Found nearby hospitals"
                    );
                    return Ok(hospitals);
                }
                Ok(_) => {
                    tracing::info!(provider = provider.name(), "No hospitals found, trying next provider");
                }
                Err(e) => {
                    tracing::warn!(provider = provider.name(), error = %e, "Place search failed, trying next provider");
                }
            }
        }
        Err(LocatorError::Exhausted)
    }
}

/// Provider answering with a fixed list, for tests and offline runs.
pub struct StaticPlaceProvider {
    hospitals: Vec<Hospital>,
    fail: bool,
}

impl StaticPlaceProvider {
    pub fn new(hospitals: Vec<Hospital>) -> Self {
        Self { hospitals, fail: false }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Always fails with an HTTP error.
    pub fn failing() -> Self {
        Self {
            hospitals: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl PlaceSearchProvider for StaticPlaceProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn search(&self, _origin: Coordinates, _radius_m: u32) -> Result<Vec<Hospital>, LocatorError> {
        if self.fail {
            return Err(LocatorError::Http {
                provider: "static",
                message: "unreachable".into(),
            });
        }
        let mut hospitals = self.hospitals.clone();
        sort_by_distance(&mut hospitals);
        Ok(hospitals)
    }
}
