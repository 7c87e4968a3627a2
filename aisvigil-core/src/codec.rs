//! External collaborator seams
//!
//! The 6-bit AIS payload armor and the position filter behind the sentence
//! cache are not this crate's concern; they plug in behind these traits.
//! The traits are deliberately small and poll-free: the tracker calls them
//! synchronously on whatever thread is ingesting sentences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::geo::GeoPosition;
use crate::messages::AisMessage;
use crate::nmea::NmeaSentence;

/// Which NMEA identifier internally generated sentences carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GeneratedSentencesId {
    /// `!AIVDM` - data as if received from another station
    Vdm,
    /// `!AIVDO` - data from the own transceiver
    Vdo,
}

impl GeneratedSentencesId {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratedSentencesId::Vdm => "VDM",
            GeneratedSentencesId::Vdo => "VDO",
        }
    }
}

impl Default for GeneratedSentencesId {
    fn default() -> Self {
        GeneratedSentencesId::Vdo
    }
}

/// The AIS payload codec.
///
/// Implementations own multi-part VDM/VDO assembly: `parse` may buffer a
/// fragment and return `None` until the final fragment arrives.
pub trait AisCodec: Send + Sync {
    /// Decode the AIS payload carried by a sentence.
    ///
    /// Returns `None` for non-AIS sentences, incomplete multi-part groups,
    /// and payloads the codec cannot make sense of.
    fn parse(&self, sentence: &NmeaSentence) -> Option<AisMessage>;

    /// Encode a message into one or more sentences carrying `id`.
    fn encode(
        &self,
        message: &AisMessage,
        id: GeneratedSentencesId,
    ) -> Result<Vec<NmeaSentence>, ParseError>;
}

/// Own-ship kinematics as last reported by the navigation source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnPositionFix {
    pub position: GeoPosition,
    /// Degrees true
    pub course_over_ground: Option<f64>,
    /// Knots
    pub speed_over_ground: Option<f64>,
    /// Degrees true
    pub heading: Option<f64>,
    /// Timestamp of the newest sentence contributing to this fix
    pub message_time: DateTime<Utc>,
}

/// Supplies the own ship's current position and motion vector.
///
/// The tracker's sentence cache is the stock implementation; anything that
/// can answer "where am I and how fast" fits here.
pub trait PositionProvider: Send + Sync {
    /// The current fix, or `None` when no position is known at all.
    /// Staleness is judged by the caller against `message_time`.
    fn try_get_current_position(&self, now: DateTime<Utc>) -> Option<OwnPositionFix>;
}
