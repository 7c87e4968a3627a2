//! Decoded AIS message model
//!
//! These are the messages the codec seam produces from AIVDM/AIVDO payloads
//! and consumes for outbound encoding. Fields are in engineering units
//! (degrees, knots, meters); the 6-bit wire representation and its sentinel
//! values are the codec's concern, except for the raw rate-of-turn sensor
//! value, which is carried unconverted because the ITU transform is applied
//! by the target database (see [`crate::target::rate_of_turn_from_raw`]).

use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::geo::GeoPosition;
use crate::mmsi::Mmsi;

/// Navigation status from Class A position reports (ITU-R M.1371 table 45)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Primitive, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationStatus {
    UnderWayUsingEngine = 0,
    AtAnchor = 1,
    NotUnderCommand = 2,
    RestrictedManeuverability = 3,
    ConstrainedByHerDraught = 4,
    Moored = 5,
    Aground = 6,
    EngagedInFishing = 7,
    UnderWaySailing = 8,
    ReservedHsc = 9,
    ReservedWig = 10,
    PowerDrivenVesselTowingAstern = 11,
    PowerDrivenVesselPushingAhead = 12,
    ReservedForFutureUse = 13,
    /// Active AIS-SART / MOB / EPIRB transmission; triggers warnings
    AisSartIsActive = 14,
    NotDefined = 15,
}

impl NavigationStatus {
    /// Map a raw wire value, falling back to `NotDefined`
    pub fn from_raw(value: u8) -> NavigationStatus {
        NavigationStatus::from_u8(value).unwrap_or(NavigationStatus::NotDefined)
    }
}

impl Default for NavigationStatus {
    fn default() -> Self {
        NavigationStatus::NotDefined
    }
}

/// Ship and cargo type (ITU-R M.1371 table 53), named values for the
/// first code of each category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Primitive, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShipType {
    NotAvailable = 0,
    WingInGround = 20,
    Fishing = 30,
    Towing = 31,
    TowingLong = 32,
    DredgingOrUnderwaterOps = 33,
    DivingOps = 34,
    MilitaryOps = 35,
    Sailing = 36,
    PleasureCraft = 37,
    HighSpeedCraft = 40,
    PilotVessel = 50,
    SearchAndRescueVessel = 51,
    Tug = 52,
    PortTender = 53,
    AntiPollutionEquipment = 54,
    LawEnforcement = 55,
    MedicalTransport = 58,
    Passenger = 60,
    Cargo = 70,
    Tanker = 80,
    OtherType = 90,
}

impl ShipType {
    /// Map a raw wire value; unnamed codes collapse to the first code of
    /// their decade (71 "cargo, hazardous A" is still a cargo vessel).
    pub fn from_raw(value: u8) -> ShipType {
        if let Some(exact) = ShipType::from_u8(value) {
            return exact;
        }
        ShipType::from_u8((value / 10) * 10).unwrap_or(ShipType::NotAvailable)
    }
}

impl Default for ShipType {
    fn default() -> Self {
        ShipType::NotAvailable
    }
}

/// Aid-to-navigation type (ITU-R M.1371 table 74), abbreviated to the
/// structural classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Primitive, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationalAidType {
    NotSpecified = 0,
    ReferencePoint = 1,
    Racon = 2,
    FixedStructureOffShore = 3,
    EmergencyWreckMarkingBuoy = 4,
    LightWithoutSectors = 5,
    LightWithSectors = 6,
    LeadingLightFront = 7,
    LeadingLightRear = 8,
    BeaconCardinalNorth = 9,
    BeaconCardinalEast = 10,
    BeaconCardinalSouth = 11,
    BeaconCardinalWest = 12,
    BeaconPortHand = 13,
    BeaconStarboardHand = 14,
    CardinalMarkNorth = 20,
    CardinalMarkEast = 21,
    CardinalMarkSouth = 22,
    CardinalMarkWest = 23,
    PortHandMark = 24,
    StarboardHandMark = 25,
    IsolatedDanger = 28,
    SafeWater = 29,
    SpecialMark = 30,
    LightVesselOrLanbyOrRigs = 31,
}

impl NavigationalAidType {
    pub fn from_raw(value: u8) -> NavigationalAidType {
        NavigationalAidType::from_u8(value).unwrap_or(NavigationalAidType::NotSpecified)
    }
}

impl Default for NavigationalAidType {
    fn default() -> Self {
        NavigationalAidType::NotSpecified
    }
}

/// AIS transceiver equipment class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransceiverClass {
    /// SOLAS-grade transponder
    A,
    /// Recreational / carry-on transponder
    B,
    Unknown,
}

impl Default for TransceiverClass {
    fn default() -> Self {
        TransceiverClass::Unknown
    }
}

/// Which of the three Class A position report message types carried the
/// payload (they share field semantics)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PositionReportType {
    /// Message 1
    Scheduled,
    /// Message 2
    Assigned,
    /// Message 3, response to interrogation
    Response,
}

/// Station dimensions relative to the reported position reference point,
/// in meters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimensions {
    pub to_bow: f64,
    pub to_stern: f64,
    pub to_port: f64,
    pub to_starboard: f64,
}

impl Dimensions {
    pub fn new(to_bow: f64, to_stern: f64, to_port: f64, to_starboard: f64) -> Self {
        Dimensions {
            to_bow,
            to_stern,
            to_port,
            to_starboard,
        }
    }

    pub fn length(&self) -> f64 {
        self.to_bow + self.to_stern
    }

    pub fn beam(&self) -> f64 {
        self.to_port + self.to_starboard
    }
}

/// Class A position report (messages 1, 2 and 3)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionReport {
    pub report_type: PositionReportType,
    pub mmsi: Mmsi,
    pub navigation_status: NavigationStatus,
    /// Raw sensor value from the wire, -126..=126; `None` when unavailable.
    /// See [`crate::target::rate_of_turn_from_raw`] for the conversion.
    pub rate_of_turn: Option<i32>,
    /// Knots
    pub speed_over_ground: Option<f64>,
    pub position: GeoPosition,
    /// Degrees true
    pub course_over_ground: Option<f64>,
    /// Degrees true
    pub true_heading: Option<u16>,
}

/// Static data report part A (message 24A)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticDataReportPartA {
    pub mmsi: Mmsi,
    pub ship_name: String,
}

/// Static data report part B (message 24B)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticDataReportPartB {
    pub mmsi: Mmsi,
    pub call_sign: String,
    pub ship_type: ShipType,
    pub dimensions: Dimensions,
}

/// Static and voyage related data (message 5)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticAndVoyageRelatedData {
    pub mmsi: Mmsi,
    pub imo_number: Option<u32>,
    pub call_sign: String,
    pub ship_name: String,
    pub ship_type: ShipType,
    pub dimensions: Dimensions,
    /// ETA month 1-12, 0 = not available
    pub eta_month: u32,
    /// ETA day of month 1-31, 0 = not available
    pub eta_day: u32,
    /// ETA hour 0-23, 24 = not available
    pub eta_hour: u32,
    /// ETA minute 0-59, 60 = not available
    pub eta_minute: u32,
    /// Meters
    pub draught: Option<f64>,
    pub destination: String,
}

/// Standard Class B CS position report (message 18)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardClassBCsPositionReport {
    pub mmsi: Mmsi,
    pub position: GeoPosition,
    pub speed_over_ground: Option<f64>,
    pub course_over_ground: Option<f64>,
    pub true_heading: Option<u16>,
}

/// Extended Class B CS position report (message 19)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedClassBCsPositionReport {
    pub mmsi: Mmsi,
    pub position: GeoPosition,
    pub speed_over_ground: Option<f64>,
    pub course_over_ground: Option<f64>,
    pub true_heading: Option<u16>,
    pub ship_name: String,
    pub ship_type: ShipType,
    pub dimensions: Dimensions,
}

/// Base station report (message 4)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseStationReport {
    pub mmsi: Mmsi,
    pub position: GeoPosition,
}

/// Standard SAR aircraft position report (message 9)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardSarAircraftPositionReport {
    pub mmsi: Mmsi,
    /// Altitude is meaningful here, in meters
    pub position: GeoPosition,
    pub speed_over_ground: Option<f64>,
    pub course_over_ground: Option<f64>,
}

/// Aid-to-navigation report (message 21)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AidToNavigationReport {
    pub mmsi: Mmsi,
    pub position: GeoPosition,
    pub name: String,
    /// Overflow of the 20-character name field
    pub name_extension: String,
    pub dimensions: Dimensions,
    /// The aid has drifted off its charted position
    pub off_position: bool,
    /// Transmitted on behalf of an aid that carries no transponder
    pub virtual_aid: bool,
    pub navigational_aid_type: NavigationalAidType,
}

/// Addressed safety related message (message 12)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressedSafetyRelatedMessage {
    pub mmsi: Mmsi,
    pub destination_mmsi: Mmsi,
    pub text: String,
}

/// Safety related broadcast message (message 14)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyRelatedBroadcastMessage {
    pub mmsi: Mmsi,
    pub text: String,
}

/// A message type the codec decoded but the tracker has no use for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnknownMessage {
    pub mmsi: Mmsi,
    pub message_type: u8,
}

/// Every decoded AIS payload the codec seam can hand to the manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AisMessage {
    PositionReportClassA(PositionReport),
    StaticDataReportPartA(StaticDataReportPartA),
    StaticDataReportPartB(StaticDataReportPartB),
    StaticAndVoyageRelatedData(StaticAndVoyageRelatedData),
    StandardClassBCsPositionReport(StandardClassBCsPositionReport),
    ExtendedClassBCsPositionReport(ExtendedClassBCsPositionReport),
    BaseStationReport(BaseStationReport),
    StandardSarAircraftPositionReport(StandardSarAircraftPositionReport),
    AidToNavigationReport(AidToNavigationReport),
    AddressedSafetyRelatedMessage(AddressedSafetyRelatedMessage),
    SafetyRelatedBroadcastMessage(SafetyRelatedBroadcastMessage),
    /// Message 15; consumed silently
    Interrogation { mmsi: Mmsi },
    /// Message 20; consumed silently
    DataLinkManagement { mmsi: Mmsi },
    Unknown(UnknownMessage),
}

impl AisMessage {
    /// The MMSI of the transmitting station
    pub fn source_mmsi(&self) -> Mmsi {
        match self {
            AisMessage::PositionReportClassA(m) => m.mmsi,
            AisMessage::StaticDataReportPartA(m) => m.mmsi,
            AisMessage::StaticDataReportPartB(m) => m.mmsi,
            AisMessage::StaticAndVoyageRelatedData(m) => m.mmsi,
            AisMessage::StandardClassBCsPositionReport(m) => m.mmsi,
            AisMessage::ExtendedClassBCsPositionReport(m) => m.mmsi,
            AisMessage::BaseStationReport(m) => m.mmsi,
            AisMessage::StandardSarAircraftPositionReport(m) => m.mmsi,
            AisMessage::AidToNavigationReport(m) => m.mmsi,
            AisMessage::AddressedSafetyRelatedMessage(m) => m.mmsi,
            AisMessage::SafetyRelatedBroadcastMessage(m) => m.mmsi,
            AisMessage::Interrogation { mmsi } => *mmsi,
            AisMessage::DataLinkManagement { mmsi } => *mmsi,
            AisMessage::Unknown(m) => m.mmsi,
        }
    }
}
