//! MMSI identities and their classification
//!
//! A Maritime Mobile Service Identity is a 9-digit number whose leading
//! digits encode what kind of station transmits it (ITU-R M.585-8). The
//! emergency transmitter ranges (AIS-SART, MOB, EPIRB) drive automatic
//! warning broadcasts in the manager.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A Maritime Mobile Service Identity (30-bit station identifier)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mmsi(pub u32);

/// Station class derived from the MMSI digit prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MmsiType {
    /// Ordinary ship station (leading digit 2-7)
    Ship,
    /// Group ship station (leading digit 0, single zero)
    Group,
    /// Coast station (leading digits 00)
    CoastStation,
    /// SAR aircraft (111MIDxxx)
    SarAircraft,
    /// Handheld VHF with DSC (8MIDxxxxx)
    DiversRadio,
    /// Aid to navigation (99MIDxxxx)
    AidToNavigation,
    /// Auxiliary craft associated with a parent ship (98MIDxxxx)
    Auxiliary,
    /// AIS search-and-rescue transmitter (970xxxxxx)
    AisSart,
    /// Man-overboard device (972xxxxxx)
    Mob,
    /// EPIRB with AIS transmitter (974xxxxxx)
    Epirb,
    /// Anything that fits no known range
    Unknown,
}

impl MmsiType {
    /// True for the transmitter classes that must raise an automatic warning
    /// when they appear in the target stream.
    pub fn is_emergency_beacon(&self) -> bool {
        matches!(self, MmsiType::AisSart | MmsiType::Mob | MmsiType::Epirb)
    }

    /// Label used in warning broadcast texts. All three emergency classes
    /// are SART-family transmitters and share the "AIS SART" prefix.
    pub fn beacon_label(&self) -> &'static str {
        match self {
            MmsiType::AisSart => "AIS SART",
            MmsiType::Mob => "AIS SART (MOB)",
            MmsiType::Epirb => "AIS SART (EPIRB)",
            _ => "AIS",
        }
    }
}

impl Mmsi {
    pub fn new(value: u32) -> Self {
        Mmsi(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Classify this MMSI by its digit prefix
    pub fn mmsi_type(&self) -> MmsiType {
        if self.0 > 999_999_999 {
            return MmsiType::Unknown;
        }
        let digits = format!("{:09}", self.0);
        match &digits[0..3] {
            "111" => return MmsiType::SarAircraft,
            "970" => return MmsiType::AisSart,
            "972" => return MmsiType::Mob,
            "974" => return MmsiType::Epirb,
            _ => {}
        }
        match &digits[0..2] {
            "00" => return MmsiType::CoastStation,
            "98" => return MmsiType::Auxiliary,
            "99" => return MmsiType::AidToNavigation,
            _ => {}
        }
        match digits.as_bytes()[0] {
            b'0' => MmsiType::Group,
            b'1' => MmsiType::Unknown,
            b'8' => MmsiType::DiversRadio,
            b'9' => MmsiType::Unknown,
            _ => MmsiType::Ship,
        }
    }
}

impl fmt::Display for Mmsi {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:09}", self.0)
    }
}

impl From<u32> for Mmsi {
    fn from(value: u32) -> Self {
        Mmsi(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_nine_digits() {
        assert_eq!(Mmsi(2442000).to_string(), "002442000");
        assert_eq!(Mmsi(244670123).to_string(), "244670123");
    }

    #[test]
    fn test_classification() {
        assert_eq!(Mmsi(244670123).mmsi_type(), MmsiType::Ship);
        assert_eq!(Mmsi(2442000).mmsi_type(), MmsiType::CoastStation);
        assert_eq!(Mmsi(111232506).mmsi_type(), MmsiType::SarAircraft);
        assert_eq!(Mmsi(970123456).mmsi_type(), MmsiType::AisSart);
        assert_eq!(Mmsi(972000001).mmsi_type(), MmsiType::Mob);
        assert_eq!(Mmsi(974111222).mmsi_type(), MmsiType::Epirb);
        assert_eq!(Mmsi(992351000).mmsi_type(), MmsiType::AidToNavigation);
        assert_eq!(Mmsi(982351000).mmsi_type(), MmsiType::Auxiliary);
    }

    #[test]
    fn test_emergency_beacons() {
        assert!(Mmsi(970123456).mmsi_type().is_emergency_beacon());
        assert!(Mmsi(972000001).mmsi_type().is_emergency_beacon());
        assert!(Mmsi(974111222).mmsi_type().is_emergency_beacon());
        assert!(!Mmsi(244670123).mmsi_type().is_emergency_beacon());
    }

    #[test]
    fn test_beacon_labels_share_sart_prefix() {
        for mmsi in [970123456u32, 972000001, 974111222] {
            let label = Mmsi(mmsi).mmsi_type().beacon_label();
            assert!(label.starts_with("AIS SART"), "label was {}", label);
        }
    }
}
