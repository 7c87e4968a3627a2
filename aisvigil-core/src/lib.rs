//! Aisvigil Core - Platform-independent AIS tracking logic
//!
//! This crate contains the pure logic of the AIS target tracker: NMEA
//! sentence framing, the decoded AIS message model, the target database,
//! collision geometry (CPA/TCPA) and the warning ledger. It performs no
//! I/O and spawns no threads; the runtime lives in `aisvigil-tracker`.
//!
//! # Seams
//!
//! Two collaborators plug in behind traits:
//!
//! - [`codec::AisCodec`] - the 6-bit AIVDM/AIVDO payload codec
//! - [`codec::PositionProvider`] - the own-ship position source
//!
//! # Example
//!
//! ```rust
//! use aisvigil_core::nmea::NmeaSentence;
//! use chrono::Utc;
//!
//! let sentence = NmeaSentence::parse(
//!     "!AIVDM,1,1,,A,13u?etPv2;0n:dDPwUM1U1Cb069D,0*24",
//!     Utc::now(),
//! )
//! .unwrap();
//! assert!(sentence.is_ais_payload());
//! ```

pub mod clock;
pub mod codec;
pub mod error;
pub mod geo;
pub mod messages;
pub mod mmsi;
pub mod nmea;
pub mod store;
pub mod target;
pub mod warnings;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{AisCodec, GeneratedSentencesId, OwnPositionFix, PositionProvider};
pub use error::ParseError;
pub use geo::GeoPosition;
pub use messages::AisMessage;
pub use mmsi::{Mmsi, MmsiType};
pub use store::TargetStore;
pub use target::{AisTarget, Ship, ShipRelativePosition, TrackEstimationParameters};
pub use warnings::{WarningLedger, WARNING_REPEAT_TIMEOUT};
