use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::{sort_by_distance, Hospital, LocatorError, PlaceSearchProvider, UNKNOWN_STATUS};
use crate::geo::{bounding_box, BoundingBox, Coordinates};

const PROVIDER: &str = "overpass";
const INTERPRETER_URL: &str = "https://overpass-api.de/api/interpreter";

/// OpenStreetMap Overpass query for `amenity=hospital` inside a bounding box.
pub struct OverpassProvider {
    url: String,
    client: reqwest::Client,
}

impl OverpassProvider {
    pub fn new(timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            url: INTERPRETER_URL.to_string(),
            client,
        }
    }
}

/// Overpass QL for hospital nodes, ways and relations in `bbox`.
pub fn build_query(bbox: &BoundingBox) -> String {
    let area = format!("{},{},{},{}", bbox.min_lat, bbox.min_lon, bbox.max_lat, bbox.max_lon);
    format!(
        "[out:json];\n(\n  node[\"amenity\"=\"hospital\"]({area});\n  way[\"amenity\"=\"hospital\"]({area});\n  relation[\"amenity\"=\"hospital\"]({area});\n);\nout center;"
    )
}

#[derive(Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<Element>,
}

#[derive(Deserialize)]
struct Element {
    #[serde(rename = "type")]
    kind: String,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<Center>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Deserialize)]
struct Center {
    lat: f64,
    lon: f64,
}

impl Element {
    /// Nodes carry their own position; ways and relations their center.
    fn position(&self) -> Option<(f64, f64)> {
        if self.kind == "node" {
            Some((self.lat?, self.lon?))
        } else {
            self.center.as_ref().map(|c| (c.lat, c.lon))
        }
    }
}

pub fn parse_response(body: &str, origin: Coordinates) -> Result<Vec<Hospital>, LocatorError> {
    let parsed: OverpassResponse = serde_json::from_str(body).map_err(|e| LocatorError::Parse {
        provider: PROVIDER,
        message: e.to_string(),
    })?;

    let mut hospitals: Vec<Hospital> = parsed
        .elements
        .into_iter()
        .filter_map(|element| {
            let (lat, lng) = element.position()?;
            let name = element
                .tags
                .get("name")
                .cloned()
                .unwrap_or_else(|| "Hospital".to_string());
            let vicinity = element
                .tags
                .get("address")
                .or_else(|| element.tags.get("addr:street"))
                .cloned()
                .unwrap_or_else(|| "Unknown location".to_string());
            Some(Hospital::located(origin, name, vicinity, lat, lng, UNKNOWN_STATUS))
        })
        .collect();

    sort_by_distance(&mut hospitals);
    Ok(hospitals)
}

#[async_trait]
impl PlaceSearchProvider for OverpassProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn search(&self, origin: Coordinates, radius_m: u32) -> Result<Vec<Hospital>, LocatorError> {
        let query = build_query(&bounding_box(origin, radius_m));

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(query)
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
        parse_response(&body, origin)
    }
}
