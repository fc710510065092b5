//! Coordinates, great-circle distance, and map links.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Same radius in metres, for the bounding-box approximation.
const EARTH_RADIUS_M: f64 = 6371e3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn map_link(&self) -> String {
        map_link(self.latitude, self.longitude)
    }
}

/// Axis-aligned box around a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Haversine distance in kilometres.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Equirectangular approximation of a box of half-side `radius_m` around `center`.
pub fn bounding_box(center: Coordinates, radius_m: u32) -> BoundingBox {
    let lat_offset = (f64::from(radius_m) / EARTH_RADIUS_M).to_degrees();
    let lon_offset = lat_offset / center.latitude.to_radians().cos();
    BoundingBox {
        min_lat: center.latitude - lat_offset,
        max_lat: center.latitude + lat_offset,
        min_lon: center.longitude - lon_offset,
        max_lon: center.longitude + lon_offset,
    }
}

pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn map_link(latitude: f64, longitude: f64) -> String {
    format!("https://www.google.com/maps?q={latitude},{longitude}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELHI: Coordinates = Coordinates { latitude: 28.6139, longitude: 77.2090 };
    const MUMBAI: Coordinates = Coordinates { latitude: 19.0760, longitude: 72.8777 };

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(haversine_km(DELHI, DELHI), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let ab = haversine_km(DELHI, MUMBAI);
        let ba = haversine_km(MUMBAI, DELHI);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn matches_reference_values() {
        // Delhi ↔ Mumbai ≈ 1148 km great-circle.
        let d = haversine_km(DELHI, MUMBAI);
        assert!((d - 1148.1).abs() < 1.0, "got {d}");

        // One degree of latitude ≈ 111.19 km.
        let d = haversine_km(Coordinates::new(0.0, 0.0), Coordinates::new(1.0, 0.0));
        assert!((d - 111.19).abs() < 0.01, "got {d}");
    }

    #[test]
    fn bounding_box_contains_center_and_widens_longitude() {
        let bbox = bounding_box(DELHI, 5000);
        assert!(bbox.min_lat < DELHI.latitude && DELHI.latitude < bbox.max_lat);
        assert!(bbox.min_lon < DELHI.longitude && DELHI.longitude < bbox.max_lon);
        let lat_span = bbox.max_lat - bbox.min_lat;
        let lon_span = bbox.max_lon - bbox.min_lon;
        assert!(lon_span > lat_span);
        // 5 km ≈ 0.045° of latitude
        assert!((lat_span / 2.0 - 0.04497).abs() < 1e-4);
    }

    #[test]
    fn validity_checks_ranges() {
        assert!(DELHI.is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, -180.5).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn rounding_and_links() {
        assert_eq!(round_one_decimal(2.345), 2.3);
        assert_eq!(round_one_decimal(2.35001), 2.4);
        assert_eq!(map_link(12.5, 77.25), "https://www.google.com/maps?q=12.5,77.25");
    }
}
