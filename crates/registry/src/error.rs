//! Registry error types.

use std::fmt;

/// Errors from registry operations.
///
/// Storage-level failures (connection, constraint machinery) are folded
/// into [`RegistryError::Storage`]; domain outcomes the state machine
/// depends on get their own variants so callers can branch without string
/// matching.
#[derive(Debug)]
pub enum RegistryError {
    /// The punk or listing does not exist.
    NotFound,

    /// The punk id is already recorded.
    DuplicatePunk,

    /// A non-terminal listing already exists for this punk.
    ListingExists,

    /// The supply cap would be exceeded.
    SupplyCapReached,

    /// The listing is not in the state the operation requires.
    WrongState {
        /// State the listing is actually in.
        actual: &'static str,
        /// State the operation requires.
        required: &'static str,
    },

    /// A payment has already been recorded for this listing.
    PaymentAlreadyRecorded,

    /// Ownership conflict during wallet registration.
    OwnershipConflict,

    /// The underlying SQLite store failed.
    Storage(rusqlite::Error),

    /// Encoding or decoding a stored value failed.
    Serialization(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "punk or listing not found"),
            Self::DuplicatePunk => write!(f, "punk id already recorded"),
            Self::ListingExists => write!(f, "a non-terminal listing already exists"),
            Self::SupplyCapReached => write!(f, "supply cap reached"),
            Self::WrongState { actual, required } => {
                write!(f, "listing is {actual}, operation requires {required}")
            }
            Self::PaymentAlreadyRecorded => write!(f, "payment already recorded"),
            Self::OwnershipConflict => write!(f, "ownership conflict"),
            Self::Storage(e) => write!(f, "storage error: {e}"),
            Self::Serialization(detail) => write!(f, "serialization error: {detail}"),
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for RegistryError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e)
    }
}
