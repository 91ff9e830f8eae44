//! Escrow error taxonomy.
//!
//! These are the surface-visible error kinds: the HTTP layer maps them
//! one-to-one onto status codes, so the variants follow the request
//! outcome, not the failing subsystem.

use std::fmt;

use registry::RegistryError;

/// Errors from escrow operations.
#[derive(Debug)]
pub enum EscrowError {
    /// Malformed payload: bad address, bad key hex, wrong byte count.
    InvalidArgument(String),

    /// Unknown punk or listing.
    NotFound,

    /// Duplicate listing, duplicate punk, or ownership conflict.
    Conflict(String),

    /// Caller is not the seller/owner.
    Forbidden,

    /// Wrong state: already sold, not deposited, payment already made,
    /// or a concurrent operation holds the punk.
    PreconditionFailed(String),

    /// The claimed deposit outpoint is absent or carries the wrong amount.
    DepositUnverified(String),

    /// Escrow or buyer balance below the requirement.
    InsufficientFunds,

    /// The Ark operator or wallet RPC failed; retryable upstream.
    UpstreamFailure(String),

    /// Anything else.
    Internal(String),
}

impl fmt::Display for EscrowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(detail) => write!(f, "invalid argument: {detail}"),
            Self::NotFound => write!(f, "punk or listing not found"),
            Self::Conflict(detail) => write!(f, "conflict: {detail}"),
            Self::Forbidden => write!(f, "caller is not authorised"),
            Self::PreconditionFailed(detail) => write!(f, "precondition failed: {detail}"),
            Self::DepositUnverified(detail) => write!(f, "deposit unverified: {detail}"),
            Self::InsufficientFunds => write!(f, "insufficient funds"),
            Self::UpstreamFailure(detail) => write!(f, "upstream failure: {detail}"),
            Self::Internal(detail) => write!(f, "internal error: {detail}"),
        }
    }
}

impl std::error::Error for EscrowError {}

impl From<RegistryError> for EscrowError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound => Self::NotFound,
            RegistryError::DuplicatePunk => Self::Conflict("punk already recorded".into()),
            RegistryError::ListingExists => {
                Self::Conflict("a non-terminal listing already exists".into())
            }
            RegistryError::OwnershipConflict => Self::Conflict("ownership conflict".into()),
            RegistryError::SupplyCapReached => {
                Self::PreconditionFailed("supply cap reached".into())
            }
            RegistryError::WrongState { actual, required } => {
                Self::PreconditionFailed(format!("listing is {actual}, requires {required}"))
            }
            RegistryError::PaymentAlreadyRecorded => {
                Self::PreconditionFailed("payment already recorded".into())
            }
            RegistryError::Storage(e) => Self::Internal(format!("storage: {e}")),
            RegistryError::Serialization(detail) => Self::Internal(detail),
        }
    }
}
