//! Codec error type.

use std::fmt;

/// Errors from encoding or decoding a punk payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// The type name does not match any punk type.
    InvalidType,

    /// The background name is not in the background table.
    InvalidBackground,

    /// An attribute name or index is not in the type's attribute table.
    UnknownAttribute,

    /// An attribute bit index exceeds 31 and cannot fit the 32-bit bitmap.
    AttributeIndexOutOfRange,

    /// The attribute count does not equal the bitmap's popcount.
    CountMismatch,

    /// The payload is not exactly six bytes.
    InvalidLength(usize),

    /// The decoded type tag is outside the type table.
    InvalidTypeIndex(u8),

    /// The decoded background index is outside the background table.
    InvalidBackgroundIndex(u8),

    /// The payload does not hash to the expected punk id.
    IdMismatch,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidType => write!(f, "unknown punk type"),
            Self::InvalidBackground => write!(f, "unknown background"),
            Self::UnknownAttribute => write!(f, "attribute not in the type's table"),
            Self::AttributeIndexOutOfRange => write!(f, "attribute index exceeds 31"),
            Self::CountMismatch => write!(f, "attribute count does not match bitmap"),
            Self::InvalidLength(n) => write!(f, "payload must be 6 bytes, got {n}"),
            Self::InvalidTypeIndex(t) => write!(f, "type tag {t} out of range"),
            Self::InvalidBackgroundIndex(b) => write!(f, "background index {b} out of range"),
            Self::IdMismatch => write!(f, "payload does not hash to the expected punk id"),
        }
    }
}

impl std::error::Error for CodecError {}
