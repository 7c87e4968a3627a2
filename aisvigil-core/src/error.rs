//! Error types for sentence-level parsing and encoding

use thiserror::Error;

/// Errors that can occur when framing NMEA sentences or driving the codec seam
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Line is too short to be a sentence at all
    #[error("Sentence too short: '{0}'")]
    TooShort(String),

    /// Line does not follow the `$TTSSS,...*hh` / `!TTSSS,...*hh` shape
    #[error("Malformed sentence: {0}")]
    MalformedSentence(String),

    /// Checksum trailer present but does not match the sentence body
    #[error("Checksum mismatch: expected {expected:02X}, got {actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// A field could not be interpreted (bad number, bad coordinate, bad time)
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// The sentence is well-formed but is not the type the decoder expects
    #[error("Unexpected sentence type: expected {expected}, got {actual}")]
    WrongSentenceType { expected: &'static str, actual: String },

    /// The codec could not express a message as sentences
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    /// End of data: the stream behind the parser is exhausted or closed.
    /// Replay sources treat this as a completion signal, not a failure.
    #[error("Port closed")]
    PortClosed,
}

impl ParseError {
    pub(crate) fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        ParseError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
