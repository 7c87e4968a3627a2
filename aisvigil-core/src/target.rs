//! The tracked-target data model
//!
//! Targets are a tagged union keyed by MMSI: ships, base stations, SAR
//! aircraft and aids to navigation. A target changes variant only by full
//! replacement in the store, never by mutation (see
//! [`crate::store::TargetStore`]).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::geo::{calculate_cpa_tcpa, velocity_components, GeoPosition};
use crate::messages::{Dimensions, NavigationStatus, NavigationalAidType, ShipType, TransceiverClass};
use crate::mmsi::Mmsi;

/// Divisor of the ITU-R M.1371 rate-of-turn encoding
pub const ROT_ENCODING_FACTOR: f64 = 4.733;

/// Convert the raw rate-of-turn sensor value to degrees per minute:
/// `v = raw / 4.733; rot = sign(v) * v^2`
pub fn rate_of_turn_from_raw(raw: i32) -> f64 {
    let v = raw as f64 / ROT_ENCODING_FACTOR;
    v.signum() * v * v
}

/// Inverse of [`rate_of_turn_from_raw`]:
/// `v = sign(rot) * sqrt(|rot|); raw = round(v * 4.733)`
pub fn rate_of_turn_to_raw(rot: f64) -> i32 {
    let v = rot.signum() * rot.abs().sqrt();
    (v * ROT_ENCODING_FACTOR).round() as i32
}

/// Parameters for own-track estimation and proximity surveillance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEstimationParameters {
    /// Own position data older than this renders GNSS "stale"
    pub maximum_position_age: Duration,
    /// Targets not seen for this long are excluded from surveillance
    pub target_lost_timeout: Duration,
    /// CPA below this raises a proximity warning, in meters
    pub warning_distance: f64,
    /// TCPA below this raises a proximity warning
    pub warning_time: Duration,
    /// Cadence of the surveillance loop
    pub ais_safety_check_interval: Duration,
    /// Broadcast a warning when own position is missing or stale
    pub warn_if_gnss_missing: bool,
}

impl Default for TrackEstimationParameters {
    fn default() -> Self {
        TrackEstimationParameters {
            maximum_position_age: Duration::from_secs(30),
            target_lost_timeout: Duration::from_secs(600),
            warning_distance: 500.0,
            warning_time: Duration::from_secs(600),
            ais_safety_check_interval: Duration::from_secs(5),
            warn_if_gnss_missing: true,
        }
    }
}

/// Collision geometry between two stations at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipRelativePosition {
    /// Observing station (normally the own ship)
    pub from: Mmsi,
    /// Observed target
    pub to: Mmsi,
    /// Current distance in meters
    pub distance: f64,
    /// Current true bearing from `from` to `to` in degrees
    pub bearing: f64,
    /// Estimated minimum future distance in meters
    pub closest_point_of_approach: Option<f64>,
    /// When the minimum distance is reached; in the past for opening tracks
    pub time_of_closest_point_of_approach: Option<DateTime<Utc>>,
}

impl ShipRelativePosition {
    /// Time remaining until the closest point of approach.
    /// Negative when the CPA already passed.
    pub fn time_to_closest_point_of_approach(
        &self,
        now: DateTime<Utc>,
    ) -> Option<ChronoDuration> {
        self.time_of_closest_point_of_approach
            .map(|t| t.signed_duration_since(now))
    }
}

/// A vessel carrying a Class A or Class B transponder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ship {
    pub mmsi: Mmsi,
    pub name: Option<String>,
    pub last_seen: DateTime<Utc>,
    pub position: Option<GeoPosition>,
    pub call_sign: Option<String>,
    pub destination: Option<String>,
    /// Meters
    pub draught: Option<f64>,
    pub imo_number: Option<u32>,
    pub ship_type: ShipType,
    pub transceiver_class: TransceiverClass,
    /// Degrees true
    pub course_over_ground: Option<f64>,
    /// Knots
    pub speed_over_ground: Option<f64>,
    /// Degrees true
    pub true_heading: Option<u16>,
    /// Degrees per minute, already converted from the wire encoding
    pub rate_of_turn: Option<f64>,
    pub navigation_status: NavigationStatus,
    pub estimated_time_of_arrival: Option<DateTime<Utc>>,
    pub dimensions: Dimensions,
    pub relative_position: Option<ShipRelativePosition>,
}

impl Ship {
    pub fn new(mmsi: Mmsi, last_seen: DateTime<Utc>) -> Self {
        Ship {
            mmsi,
            name: None,
            last_seen,
            position: None,
            call_sign: None,
            destination: None,
            draught: None,
            imo_number: None,
            ship_type: ShipType::default(),
            transceiver_class: TransceiverClass::default(),
            course_over_ground: None,
            speed_over_ground: None,
            true_heading: None,
            rate_of_turn: None,
            navigation_status: NavigationStatus::default(),
            estimated_time_of_arrival: None,
            dimensions: Dimensions::default(),
            relative_position: None,
        }
    }

    /// Compute the relative position and collision geometry from this ship
    /// to every target in `targets`.
    ///
    /// Targets without a position, and targets not seen within
    /// `params.target_lost_timeout`, are skipped. Targets without motion
    /// data are treated as stationary. The result is an estimate over
    /// straight-line tracks and is advisory only.
    pub fn relative_positions_to(
        &self,
        targets: &[AisTarget],
        now: DateTime<Utc>,
        params: &TrackEstimationParameters,
    ) -> Vec<ShipRelativePosition> {
        let own_position = match self.position {
            Some(p) => p,
            None => return Vec::new(),
        };
        let (own_vx, own_vy) = match (self.course_over_ground, self.speed_over_ground) {
            (Some(cog), Some(sog)) => velocity_components(cog, sog),
            _ => (0.0, 0.0),
        };
        let lost_after = ChronoDuration::from_std(params.target_lost_timeout)
            .unwrap_or_else(|_| ChronoDuration::days(3650));

        let mut result = Vec::new();
        for target in targets {
            if target.mmsi() == self.mmsi {
                continue;
            }
            let target_position = match target.position() {
                Some(p) => p,
                None => continue,
            };
            if now.signed_duration_since(target.last_seen()) > lost_after {
                continue;
            }

            let (east, north) = own_position.local_offset_to(&target_position);
            let distance = (east * east + north * north).sqrt();
            let mut bearing = east.atan2(north).to_degrees();
            if bearing < 0.0 {
                bearing += 360.0;
            }

            let (target_vx, target_vy) = match (
                target.course_over_ground(),
                target.speed_over_ground(),
            ) {
                (Some(cog), Some(sog)) => velocity_components(cog, sog),
                _ => (0.0, 0.0),
            };

            let cpa = calculate_cpa_tcpa(east, north, target_vx - own_vx, target_vy - own_vy);

            result.push(ShipRelativePosition {
                from: self.mmsi,
                to: target.mmsi(),
                distance,
                bearing,
                closest_point_of_approach: Some(cpa.cpa),
                time_of_closest_point_of_approach: Some(
                    now + ChronoDuration::milliseconds((cpa.tcpa * 1000.0) as i64),
                ),
            });
        }
        result
    }
}

/// A shore-side AIS base station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseStation {
    pub mmsi: Mmsi,
    pub last_seen: DateTime<Utc>,
    pub position: Option<GeoPosition>,
    pub relative_position: Option<ShipRelativePosition>,
}

impl BaseStation {
    pub fn new(mmsi: Mmsi, last_seen: DateTime<Utc>) -> Self {
        BaseStation {
            mmsi,
            last_seen,
            position: None,
            relative_position: None,
        }
    }
}

/// A search-and-rescue aircraft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SarAircraft {
    pub mmsi: Mmsi,
    pub name: Option<String>,
    pub last_seen: DateTime<Utc>,
    /// Altitude field is meaningful for aircraft
    pub position: Option<GeoPosition>,
    pub course_over_ground: Option<f64>,
    pub speed_over_ground: Option<f64>,
    /// Aircraft do not report a rate of turn; fixed at zero
    pub rate_of_turn: f64,
    pub relative_position: Option<ShipRelativePosition>,
}

impl SarAircraft {
    pub fn new(mmsi: Mmsi, last_seen: DateTime<Utc>) -> Self {
        SarAircraft {
            mmsi,
            name: None,
            last_seen,
            position: None,
            course_over_ground: None,
            speed_over_ground: None,
            rate_of_turn: 0.0,
            relative_position: None,
        }
    }
}

/// A physical or virtual aid to navigation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AidToNavigation {
    pub mmsi: Mmsi,
    pub name: Option<String>,
    pub last_seen: DateTime<Utc>,
    pub position: Option<GeoPosition>,
    pub dimensions: Dimensions,
    pub off_position: bool,
    pub virtual_aid: bool,
    pub navigational_aid_type: NavigationalAidType,
    pub relative_position: Option<ShipRelativePosition>,
}

impl AidToNavigation {
    pub fn new(mmsi: Mmsi, last_seen: DateTime<Utc>) -> Self {
        AidToNavigation {
            mmsi,
            name: None,
            last_seen,
            position: None,
            dimensions: Dimensions::default(),
            off_position: false,
            virtual_aid: false,
            navigational_aid_type: NavigationalAidType::default(),
            relative_position: None,
        }
    }
}

/// Any station the tracker can hold. The variant may change over the
/// lifetime of an MMSI (rare, but MMSIs do get reused across station
/// classes); the store handles that by replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "targetClass", rename_all = "camelCase")]
pub enum AisTarget {
    Ship(Ship),
    BaseStation(BaseStation),
    SarAircraft(SarAircraft),
    AidToNavigation(AidToNavigation),
}

impl AisTarget {
    pub fn mmsi(&self) -> Mmsi {
        match self {
            AisTarget::Ship(t) => t.mmsi,
            AisTarget::BaseStation(t) => t.mmsi,
            AisTarget::SarAircraft(t) => t.mmsi,
            AisTarget::AidToNavigation(t) => t.mmsi,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            AisTarget::Ship(t) => t.name.as_deref(),
            AisTarget::BaseStation(_) => None,
            AisTarget::SarAircraft(t) => t.name.as_deref(),
            AisTarget::AidToNavigation(t) => t.name.as_deref(),
        }
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        match self {
            AisTarget::Ship(t) => t.last_seen,
            AisTarget::BaseStation(t) => t.last_seen,
            AisTarget::SarAircraft(t) => t.last_seen,
            AisTarget::AidToNavigation(t) => t.last_seen,
        }
    }

    pub fn set_last_seen(&mut self, last_seen: DateTime<Utc>) {
        match self {
            AisTarget::Ship(t) => t.last_seen = last_seen,
            AisTarget::BaseStation(t) => t.last_seen = last_seen,
            AisTarget::SarAircraft(t) => t.last_seen = last_seen,
            AisTarget::AidToNavigation(t) => t.last_seen = last_seen,
        }
    }

    pub fn position(&self) -> Option<GeoPosition> {
        match self {
            AisTarget::Ship(t) => t.position,
            AisTarget::BaseStation(t) => t.position,
            AisTarget::SarAircraft(t) => t.position,
            AisTarget::AidToNavigation(t) => t.position,
        }
    }

    pub fn course_over_ground(&self) -> Option<f64> {
        match self {
            AisTarget::Ship(t) => t.course_over_ground,
            AisTarget::SarAircraft(t) => t.course_over_ground,
            _ => None,
        }
    }

    pub fn speed_over_ground(&self) -> Option<f64> {
        match self {
            AisTarget::Ship(t) => t.speed_over_ground,
            AisTarget::SarAircraft(t) => t.speed_over_ground,
            _ => None,
        }
    }

    pub fn relative_position(&self) -> Option<&ShipRelativePosition> {
        match self {
            AisTarget::Ship(t) => t.relative_position.as_ref(),
            AisTarget::BaseStation(t) => t.relative_position.as_ref(),
            AisTarget::SarAircraft(t) => t.relative_position.as_ref(),
            AisTarget::AidToNavigation(t) => t.relative_position.as_ref(),
        }
    }

    pub fn set_relative_position(&mut self, relative: Option<ShipRelativePosition>) {
        match self {
            AisTarget::Ship(t) => t.relative_position = relative,
            AisTarget::BaseStation(t) => t.relative_position = relative,
            AisTarget::SarAircraft(t) => t.relative_position = relative,
            AisTarget::AidToNavigation(t) => t.relative_position = relative,
        }
    }

    /// How long ago this target was last heard from.
    /// Negative when replayed timestamps run ahead of `now`.
    pub fn age(&self, now: DateTime<Utc>) -> ChronoDuration {
        now.signed_duration_since(self.last_seen())
    }

    /// Display name: the reported name, or the formatted MMSI
    pub fn display_name(&self) -> String {
        match self.name() {
            Some(name) => name.to_string(),
            None => self.mmsi().to_string(),
        }
    }
}
