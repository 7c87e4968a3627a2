//! NMEA-0183 sentence framing
//!
//! Splits raw `$GPRMC,...*hh` / `!AIVDM,...*hh` lines into talker, sentence
//! id and fields, with checksum verification. The AIS payload armor inside
//! VDM/VDO sentences is NOT decoded here; that is the codec seam's concern
//! (see [`crate::codec::AisCodec`]).

pub mod decode;

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::ParseError;

/// Three-letter NMEA sentence formatter code ("RMC", "ZDA", "VDM", ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SentenceId(pub [u8; 3]);

impl SentenceId {
    /// Recommended minimum navigation data
    pub const RMC: SentenceId = SentenceId(*b"RMC");
    /// Global positioning fix data
    pub const GGA: SentenceId = SentenceId(*b"GGA");
    /// Course and speed over ground
    pub const VTG: SentenceId = SentenceId(*b"VTG");
    /// True heading
    pub const HDT: SentenceId = SentenceId(*b"HDT");
    /// Time and date ("TimeDate"), the replay time reference
    pub const ZDA: SentenceId = SentenceId(*b"ZDA");
    /// AIS payload received from another station
    pub const VDM: SentenceId = SentenceId(*b"VDM");
    /// AIS payload from own transceiver
    pub const VDO: SentenceId = SentenceId(*b"VDO");

    pub fn as_str(&self) -> &str {
        // Constructed from ASCII only
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl fmt::Display for SentenceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A framed NMEA-0183 sentence.
///
/// The timestamp is not part of the wire format; it is assigned by whoever
/// framed the sentence (wall clock on a live link, the recorded time during
/// log replay) and carried alongside so downstream consumers can reason
/// about data age.
#[derive(Debug, Clone, PartialEq)]
pub struct NmeaSentence {
    /// Two-letter talker id ("GP", "AI", ...)
    pub talker: String,
    /// Three-letter sentence formatter
    pub id: SentenceId,
    /// Data fields, excluding the address token
    pub fields: Vec<String>,
    /// When this sentence was produced or recorded
    pub timestamp: DateTime<Utc>,
    /// The original line, without line terminator
    pub raw: String,
}

/// XOR checksum over the sentence body (between `$`/`!` and `*`)
pub fn checksum(body: &str) -> u8 {
    body.bytes().fold(0u8, |sum, b| sum ^ b)
}

impl NmeaSentence {
    /// Frame a raw line into a sentence, validating the checksum when present.
    pub fn parse(line: &str, timestamp: DateTime<Utc>) -> Result<NmeaSentence, ParseError> {
        let line = line.trim();
        if line.len() < 7 {
            return Err(ParseError::TooShort(line.to_string()));
        }
        if !line.starts_with('$') && !line.starts_with('!') {
            return Err(ParseError::MalformedSentence(line.to_string()));
        }

        let body = &line[1..];
        let body = match body.rsplit_once('*') {
            Some((data, sum)) => {
                let expected = u8::from_str_radix(sum.trim(), 16)
                    .map_err(|_| ParseError::MalformedSentence(line.to_string()))?;
                let actual = checksum(data);
                if expected != actual {
                    return Err(ParseError::ChecksumMismatch { expected, actual });
                }
                data
            }
            None => body,
        };

        let mut parts = body.split(',');
        let address = parts.next().unwrap_or("");
        if address.len() < 5 || !address.is_ascii() {
            return Err(ParseError::MalformedSentence(line.to_string()));
        }
        let talker = address[..2].to_string();
        let id_bytes = address[address.len() - 3..].as_bytes();
        let id = SentenceId([id_bytes[0], id_bytes[1], id_bytes[2]]);

        Ok(NmeaSentence {
            talker,
            id,
            fields: parts.map(str::to_string).collect(),
            timestamp,
            raw: line.to_string(),
        })
    }

    /// Build a sentence from parts, computing the checksum.
    ///
    /// `delimiter` is `'$'` for conventional sentences and `'!'` for
    /// encapsulated ones (VDM/VDO).
    pub fn assemble(
        delimiter: char,
        talker: &str,
        id: SentenceId,
        fields: &[&str],
        timestamp: DateTime<Utc>,
    ) -> NmeaSentence {
        let mut body = format!("{}{}", talker, id);
        for field in fields {
            body.push(',');
            body.push_str(field);
        }
        let raw = format!("{}{}*{:02X}", delimiter, body, checksum(&body));
        NmeaSentence {
            talker: talker.to_string(),
            id,
            fields: fields.iter().map(|f| f.to_string()).collect(),
            timestamp,
            raw,
        }
    }

    /// A data field by index; missing fields read as empty (NMEA convention)
    pub fn field(&self, index: usize) -> &str {
        self.fields.get(index).map(String::as_str).unwrap_or("")
    }

    /// Whether this sentence carries an AIS payload (AIVDM/AIVDO)
    pub fn is_ais_payload(&self) -> bool {
        self.id == SentenceId::VDM || self.id == SentenceId::VDO
    }
}

impl fmt::Display for NmeaSentence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
