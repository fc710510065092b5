use std::collections::HashSet;

use async_trait::async_trait;
use serde::Deserialize;

use super::{sort_by_distance, Hospital, LocatorError, PlaceSearchProvider, UNKNOWN_STATUS};
use crate::geo::{bounding_box, Coordinates};

const PROVIDER: &str = "nominatim";
const SEARCH_URL: &str = "https://nominatim.openstreetmap.org/search";
const USER_AGENT: &str = "HealthMate-App/1.0";

/// Facilities tagged as hospitals that are not emergency care.
const EXCLUDED_TERMS: &[&str] = &["covid", "vaccination", "testing"];

/// Free-text Nominatim search bounded to the query area.
pub struct NominatimProvider {
    url: String,
    client: reqwest::Client,
}

impl NominatimProvider {
    pub fn new(timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            url: SEARCH_URL.to_string(),
            client,
        }
    }
}

#[derive(Deserialize)]
struct Place {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    class: String,
}

impl Place {
    fn is_hospital(&self) -> bool {
        let display = self.display_name.to_lowercase();
        let hospital_like = self.kind == "hospital" || self.class == "amenity" || display.contains("hospital");
        hospital_like && !EXCLUDED_TERMS.iter().any(|term| display.contains(term))
    }
}

/// Filter, name, dedupe (case-insensitive, first wins) and sort.
pub fn parse_response(body: &str, origin: Coordinates) -> Result<Vec<Hospital>, LocatorError> {
    let places: Vec<Place> = serde_json::from_str(body).map_err(|e| LocatorError::Parse {
        provider: PROVIDER,
        message: e.to_string(),
    })?;

    let mut seen = HashSet::new();
    let mut hospitals = Vec::new();
    for place in places.into_iter().filter(Place::is_hospital) {
        let (Ok(lat), Ok(lng)) = (place.lat.parse::<f64>(), place.lon.parse::<f64>()) else {
            continue;
        };
        let name = place
            .display_name
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        if !seen.insert(name.to_lowercase()) {
            continue;
        }
        hospitals.push(Hospital::located(origin, name, place.display_name, lat, lng, UNKNOWN_STATUS));
    }

    sort_by_distance(&mut hospitals);
    Ok(hospitals)
}

#[async_trait]
impl PlaceSearchProvider for NominatimProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn search(&self, origin: Coordinates, radius_m: u32) -> Result<Vec<Hospital>, LocatorError> {
        let bbox = bounding_box(origin, radius_m);
        // left,top,right,bottom
        let viewbox = format!("{},{},{},{}", bbox.min_lon, bbox.max_lat, bbox.max_lon, bbox.min_lat);

        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("format", "json"),
                ("limit", "30"),
                ("q", "hospital"),
                ("category", "healthcare"),
                ("viewbox", viewbox.as_str()),
                ("bounded", "1"),
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
        parse_response(&body, origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: Coordinates = Coordinates { latitude: 12.9716, longitude: 77.5946 };

    fn entry(name: &str, lat: &str, kind: &str, class: &str) -> String {
        format!(r#"{{"lat": "{lat}", "lon": "77.5946", "display_name": "{name}", "type": "{kind}", "class": "{class}"}}"#)
    }

    #[test]
    fn filters_names_and_sorts() {
        let body = format!(
            "[{}]",
            [
                entry("Manipal Hospital, Old Airport Road, Bengaluru", "12.99", "hospital", "amenity"),
                entry("Bowring Clinic, Shivajinagar", "12.98", "clinic", "amenity"),
                entry("City General Hospital, MG Road", "12.975", "building", "building"),
                entry("Central Mall, MG Road", "12.972", "mall", "shop"),
            ]
            .join(",")
        );

        let hospitals = parse_response(&body, ORIGIN).unwrap();
        let names: Vec<_> = hospitals.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["City General Hospital", "Bowring Clinic", "Manipal Hospital"]);
        assert_eq!(hospitals[0].vicinity, "City General Hospital, MG Road");
        assert_eq!(hospitals[0].open_status, UNKNOWN_STATUS);
    }

    #[test]
    fn excludes_testing_and_vaccination_sites() {
        let body = format!(
            "[{}]",
            [
                entry("COVID Testing Centre, Indiranagar", "12.98", "hospital", "amenity"),
                entry("Vaccination Hospital Camp, Jayanagar", "12.98", "hospital", "amenity"),
                entry("St. John's Hospital, Koramangala", "12.93", "hospital", "amenity"),
            ]
            .join(",")
        );

        let hospitals = parse_response(&body, ORIGIN).unwrap();
        assert_eq!(hospitals.len(), 1);
        assert_eq!(hospitals[0].name, "St. John's Hospital");
    }

    #[test]
    fn dedupes_by_case_insensitive_name() {
        let body = format!(
            "[{}]",
            [
                entry("Apollo Hospital, Bannerghatta Road", "12.90", "hospital", "amenity"),
                entry("APOLLO HOSPITAL, Jayanagar", "12.98", "hospital", "amenity"),
            ]
            .join(",")
        );

        let hospitals = parse_response(&body, ORIGIN).unwrap();
        assert_eq!(hospitals.len(), 1);
        assert_eq!(hospitals[0].vicinity, "Apollo Hospital, Bannerghatta Road");
    }

    #[test]
    fn skips_unparseable_coordinates() {
        let body = format!("[{}]", entry("Odd Hospital, Nowhere", "north", "hospital", "amenity"));
        assert!(parse_response(&body, ORIGIN).unwrap().is_empty());
    }
}
