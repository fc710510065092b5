use async_trait::async_trait;
use serde::Deserialize;

use super::{sort_by_distance, Hospital, LocatorError, PlaceSearchProvider, CLOSED, OPEN_NOW, UNKNOWN_STATUS};
use crate::geo::Coordinates;

const PROVIDER: &str = "google_places";
const NEARBY_SEARCH_URL: &str = "https://maps.googleapis.com/maps/api/place/nearbysearch/json";

/// Results kept from one nearby search.
const MAX_RESULTS: usize = 5;

/// Google Places nearby search, `type=hospital`.
pub struct GooglePlacesProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl GooglePlacesProvider {
    pub fn new(api_key: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_key: api_key.to_string(),
            base_url: NEARBY_SEARCH_URL.to_string(),
            client,
        }
    }
}

#[derive(Deserialize)]
struct NearbyResponse {
    status: String,
    #[serde(default)]
    results: Vec<Place>,
}

#[derive(Deserialize)]
struct Place {
    name: String,
    #[serde(default)]
    vicinity: String,
    geometry: Geometry,
    opening_hours: Option<OpeningHours>,
}

#[derive(Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct OpeningHours {
    open_now: Option<bool>,
}

/// Map a nearby-search body to hospitals: first five results, nearest first.
/// `ZERO_RESULTS` is an empty answer; any other non-`OK` status is an error.
pub fn parse_nearby_response(body: &str, origin: Coordinates) -> Result<Vec<Hospital>, LocatorError> {
    let parsed: NearbyResponse = serde_json::from_str(body).map_err(|e| LocatorError::Parse {
        provider: PROVIDER,
        message: e.to_string(),
    })?;

    match parsed.status.as_str() {
        "OK" => {}
        "ZERO_RESULTS" => return Ok(Vec::new()),
        _ => {
            return Err(LocatorError::Status {
                provider: PROVIDER,
                status: parsed.status,
            })
        }
    }

    let mut hospitals: Vec<Hospital> = parsed
        .results
        .into_iter()
        .take(MAX_RESULTS)
        .map(|place| {
            let open_status = match place.opening_hours.and_then(|h| h.open_now) {
                Some(true) => OPEN_NOW,
                Some(false) => CLOSED,
                None => UNKNOWN_STATUS,
            };
            let LatLng { lat, lng } = place.geometry.location;
            Hospital::located(origin, place.name, place.vicinity, lat, lng, open_status)
        })
        .collect();

    sort_by_distance(&mut hospitals);
    Ok(hospitals)
}

#[async_trait]
impl PlaceSearchProvider for GooglePlacesProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn search(&self, origin: Coordinates, radius_m: u32) -> Result<Vec<Hospital>, LocatorError> {
        let location = format!("{},{}", origin.latitude, origin.longitude);
        let radius = radius_m.to_string();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("location", location.as_str()),
                ("radius", radius.as_str()),
                ("type", "hospital"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| LocatorError::Http {
                provider: PROVIDER,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LocatorError::Status {
                provider: PROVIDER,
                status: status.as_u16().to_string(),
            });
        }

        let body = response.text().await.map_err(|e| LocatorError::Http {
            provider: PROVIDER,
            message: e.to_string(),
        })?;
        parse_nearby_response(&body, origin)
    }
}
