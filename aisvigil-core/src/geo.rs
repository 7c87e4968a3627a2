//! Geographic positions and local-plane conversions
//!
//! Distances here use a local equirectangular approximation around the own
//! ship, which is accurate well beyond AIS reception range (< 100 km).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Conversion constants
pub const METERS_PER_DEGREE_LATITUDE: f64 = 60.0 * 1852.0; // 60 nautical miles
pub const NAUTICAL_MILE: f64 = 1852.0;
pub const KN_TO_MS: f64 = NAUTICAL_MILE / 3600.0;
pub const MS_TO_KN: f64 = 3600.0 / NAUTICAL_MILE;

/// Calculate meters per degree longitude at a given latitude
#[inline]
pub fn meters_per_degree_longitude(lat_deg: f64) -> f64 {
    METERS_PER_DEGREE_LATITUDE * lat_deg.to_radians().cos()
}

/// A geographic position expressed in degrees latitude and longitude.
/// Latitude is positive in the northern hemisphere, negative in the southern.
/// Longitude is positive in the eastern hemisphere, negative in the western.
/// The range for latitude is -90 to 90, and for longitude is -180 to 180.
/// Altitude is in meters above the WGS84 ellipsoid; zero for surface craft.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
}

impl GeoPosition {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        GeoPosition {
            latitude,
            longitude,
            altitude,
        }
    }

    /// Whether latitude and longitude are within their legal ranges.
    ///
    /// AIS payloads use out-of-range sentinels (lat 91, lon 181) for
    /// "position not available"; those fail this check.
    pub fn is_valid(&self) -> bool {
        self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// Offset of `other` relative to `self` in meters (east, north)
    pub fn local_offset_to(&self, other: &GeoPosition) -> (f64, f64) {
        let north = (other.latitude - self.latitude) * METERS_PER_DEGREE_LATITUDE;
        let east = (other.longitude - self.longitude) * meters_per_degree_longitude(self.latitude);
        (east, north)
    }

    /// Great-circle distance to another position in meters (local-plane approximation)
    pub fn distance_to(&self, other: &GeoPosition) -> f64 {
        let (east, north) = self.local_offset_to(other);
        (east * east + north * north).sqrt()
    }

    /// True bearing towards another position in degrees (0-360, north = 0)
    pub fn bearing_to(&self, other: &GeoPosition) -> f64 {
        let (east, north) = self.local_offset_to(other);
        let mut bearing = east.atan2(north).to_degrees();
        if bearing < 0.0 {
            bearing += 360.0;
        }
        bearing
    }
}

impl fmt::Display for GeoPosition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let ns = if self.latitude >= 0.0 { 'N' } else { 'S' };
        let ew = if self.longitude >= 0.0 { 'E' } else { 'W' };
        write!(
            f,
            "{:.4} {} {:.4} {}",
            self.latitude.abs(),
            ns,
            self.longitude.abs(),
            ew
        )
    }
}

/// Result of a CPA/TCPA calculation over a relative track
#[derive(Debug, Clone, Copy)]
pub struct CpaResult {
    /// Closest Point of Approach in meters
    pub cpa: f64,
    /// Time to Closest Point of Approach in seconds.
    /// Positive = future, negative = past.
    pub tcpa: f64,
}

/// Calculate CPA and TCPA from a relative position and relative velocity.
///
/// Uses the relative velocity method: with the own ship at the origin,
/// the time of minimum distance is `-(r . v) / |v|^2`.
///
/// # Arguments
///
/// * `rx`, `ry` - target position relative to own ship in meters (east, north)
/// * `rvx`, `rvy` - target velocity relative to own ship in m/s (east, north)
pub fn calculate_cpa_tcpa(rx: f64, ry: f64, rvx: f64, rvy: f64) -> CpaResult {
    let rv_dot = rx * rvx + ry * rvy;
    let v_sq = rvx * rvx + rvy * rvy;

    // Near-zero relative velocity: the distance never changes, so the CPA
    // is the current distance and the TCPA is now.
    if v_sq < 1e-6 {
        let cpa = (rx * rx + ry * ry).sqrt();
        return CpaResult { cpa, tcpa: 0.0 };
    }

    let tcpa = -rv_dot / v_sq;

    let cpa_x = rx + rvx * tcpa;
    let cpa_y = ry + rvy * tcpa;
    let cpa = (cpa_x * cpa_x + cpa_y * cpa_y).sqrt();

    CpaResult { cpa, tcpa }
}

/// Decompose course (degrees true) and speed (knots) into east/north m/s
pub fn velocity_components(course_deg: f64, speed_knots: f64) -> (f64, f64) {
    let speed_ms = speed_knots * KN_TO_MS;
    let course_rad = course_deg.to_radians();
    (speed_ms * course_rad.sin(), speed_ms * course_rad.cos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_validity() {
        assert!(GeoPosition::new(47.5, 9.5, 0.0).is_valid());
        assert!(GeoPosition::new(-90.0, 180.0, 0.0).is_valid());
        assert!(!GeoPosition::new(91.0, 9.5, 0.0).is_valid());
        assert!(!GeoPosition::new(47.5, 181.0, 0.0).is_valid());
    }

    #[test]
    fn test_position_display() {
        let pos = GeoPosition::new(47.5, 9.5, 0.0);
        assert_eq!(format!("{}", pos), "47.5000 N 9.5000 E");

        let pos = GeoPosition::new(-33.85, -151.2, 0.0);
        assert_eq!(format!("{}", pos), "33.8500 S 151.2000 W");
    }

    #[test]
    fn test_distance_one_minute_latitude() {
        // One minute of latitude is one nautical mile
        let a = GeoPosition::new(47.0, 9.0, 0.0);
        let b = GeoPosition::new(47.0 + 1.0 / 60.0, 9.0, 0.0);
        assert!((a.distance_to(&b) - NAUTICAL_MILE).abs() < 1.0);
    }

    #[test]
    fn test_bearing_cardinal() {
        let a = GeoPosition::new(47.0, 9.0, 0.0);
        let north = GeoPosition::new(47.1, 9.0, 0.0);
        let east = GeoPosition::new(47.0, 9.1, 0.0);
        let south = GeoPosition::new(46.9, 9.0, 0.0);

        assert!((a.bearing_to(&north) - 0.0).abs() < 0.1);
        assert!((a.bearing_to(&east) - 90.0).abs() < 0.1);
        assert!((a.bearing_to(&south) - 180.0).abs() < 0.1);
    }

    #[test]
    fn test_head_on_collision() {
        // Target 1000 m due north, closing at 15 m/s relative
        let result = calculate_cpa_tcpa(0.0, 1000.0, 0.0, -15.0);
        assert!((result.tcpa - 66.67).abs() < 1.0);
        assert!(result.cpa < 1.0);
    }

    #[test]
    fn test_parallel_course() {
        // Target abeam with zero relative velocity: CPA is the current distance
        let result = calculate_cpa_tcpa(500.0, 0.0, 0.0, 0.0);
        assert!((result.cpa - 500.0).abs() < 1.0);
        assert_eq!(result.tcpa, 0.0);
    }

    #[test]
    fn test_receding_target() {
        // Target ahead and opening: TCPA in the past
        let result = calculate_cpa_tcpa(0.0, 1000.0, 0.0, 10.0);
        assert!(result.tcpa <= 0.0);
    }

    #[test]
    fn test_velocity_components() {
        let (east, north) = velocity_components(90.0, 10.0);
        assert!((east - 10.0 * KN_TO_MS).abs() < 1e-9);
        assert!(north.abs() < 1e-9);
    }
}
