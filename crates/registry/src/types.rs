//! Registry row types and enums.

use serde::{Deserialize, Serialize};

use punks_core::PunkId;

// ---------------------------------------------------------------------------
// Punks
// ---------------------------------------------------------------------------

/// A row in the `punks` table: the canonical ownership record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PunkRecord {
    /// Punk identity.
    pub punk_id: PunkId,
    /// Current owner's Ark address (or legacy pubkey form for imported rows).
    pub owner_address: String,
    /// Canonical six-byte payload, when known.
    pub compressed: Option<[u8; 6]>,
    /// Server attestation over `SHA-256(punk_id)`, hex. `None` for legacy
    /// imports that predate the signature scheme.
    pub server_signature: Option<String>,
    /// Mint timestamp (seconds since epoch).
    pub minted_at: i64,
    /// Last update timestamp.
    pub updated_at: i64,
}

/// A row in the `ownership_history` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipEvent {
    /// Punk identity.
    pub punk_id: PunkId,
    /// Previous owner; `None` for the mint event.
    pub from_address: Option<String>,
    /// New owner.
    pub to_address: String,
    /// Event timestamp.
    pub timestamp: i64,
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// Marketplace listing states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    /// Created, punk not yet deposited.
    Pending,
    /// Punk VTXO verified inside the escrow wallet.
    Deposited,
    /// Terminal: sold.
    Sold,
    /// Terminal: cancelled.
    Cancelled,
}

impl ListingStatus {
    /// Stable storage form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Deposited => "deposited",
            Self::Sold => "sold",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses the storage form.
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "deposited" => Some(Self::Deposited),
            "sold" => Some(Self::Sold),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether this state admits no further transitions.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Sold | Self::Cancelled)
    }
}

/// A row in the `listings` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRecord {
    /// Punk identity (primary key -- at most one listing row per punk).
    pub punk_id: PunkId,
    /// Seller's Ark address (payout destination).
    pub seller_address: String,
    /// Seller's x-only pubkey, hex.
    pub seller_pubkey: String,
    /// Asking price in sats.
    pub price_sats: u64,
    /// Listing state.
    pub status: ListingStatus,
    /// Escrow deposit address.
    pub escrow_address: String,
    /// Outpoint of the deposited punk VTXO (set on deposit; volatile).
    pub punk_vtxo_outpoint: Option<String>,
    /// Six-byte payload supplied by the seller, hex.
    pub compressed_metadata: Option<String>,
    /// Transition timestamps.
    pub created_at: i64,
    pub deposited_at: Option<i64>,
    pub sold_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    /// Sale-side fields.
    pub buyer_address: Option<String>,
    pub buyer_pubkey: Option<String>,
    pub payment_txid: Option<String>,
    pub deposit_return_txid: Option<String>,
}

// ---------------------------------------------------------------------------
// Sales
// ---------------------------------------------------------------------------

/// A completed sale, appended at the ownership commit point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleRecord {
    /// Row id.
    pub id: i64,
    /// Punk identity.
    pub punk_id: PunkId,
    /// Sale price in sats.
    pub price_sats: u64,
    /// Seller address.
    pub seller: String,
    /// Buyer address.
    pub buyer: String,
    /// Sale timestamp.
    pub sold_at: i64,
    /// Payment txid once the payment leg lands (or a failure sentinel).
    pub payment_txid: Option<String>,
}

/// Aggregate marketplace statistics over all sales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesStats {
    /// Number of completed sales.
    pub count: u64,
    /// Lowest sale price.
    pub floor_sats: u64,
    /// Highest sale price.
    pub high_sats: u64,
    /// Total volume.
    pub volume_sats: u64,
    /// Mean sale price (integer division).
    pub average_sats: u64,
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

/// Privileged actions recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    ListCreated,
    DepositConfirmed,
    SaleCompleted,
    PaymentFailed,
    ListingCancelled,
    RefundFailed,
}

impl AuditAction {
    /// Stable storage form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ListCreated => "LIST_CREATED",
            Self::DepositConfirmed => "DEPOSIT_CONFIRMED",
            Self::SaleCompleted => "SALE_COMPLETED",
            Self::PaymentFailed => "PAYMENT_FAILED",
            Self::ListingCancelled => "LISTING_CANCELLED",
            Self::RefundFailed => "REFUND_FAILED",
        }
    }
}

/// Outcome recorded with each audit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Success,
    Failed,
    Pending,
}

impl AuditStatus {
    /// Stable storage form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Pending => "PENDING",
        }
    }
}

/// An audit log row.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    /// Row id.
    pub id: i64,
    /// Event timestamp.
    pub timestamp: i64,
    /// Action name (`LIST_CREATED`, ...).
    pub action: String,
    /// Subject punk, if any.
    pub punk_id: Option<String>,
    /// Seller address, if relevant.
    pub seller: Option<String>,
    /// Buyer address, if relevant.
    pub buyer: Option<String>,
    /// Amount moved, sats.
    pub amount_sats: Option<u64>,
    /// Wallet txid, if a send happened.
    pub txid: Option<String>,
    /// `SUCCESS`, `FAILED`, or `PENDING`.
    pub status: String,
    /// Error text for failures.
    pub error: Option<String>,
    /// Free-form JSON details.
    pub details_json: Option<String>,
}

// ---------------------------------------------------------------------------
// Wallet registration
// ---------------------------------------------------------------------------

/// One punk submitted by a wallet at registration time.
#[derive(Debug, Clone)]
pub struct WalletPunk {
    /// Punk identity.
    pub punk_id: PunkId,
    /// Claimed mint timestamp, if the wallet kept one.
    pub mint_date: Option<i64>,
    /// Six-byte payload, if the wallet kept it.
    pub compressed: Option<[u8; 6]>,
}

/// Per-punk outcome of a wallet registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "action")]
pub enum RegisterOutcome {
    /// New row inserted and attested.
    Inserted { punk_id: String },
    /// Known row under the same owner; timestamps/payload refreshed.
    Refreshed { punk_id: String },
    /// Known row under a declared alternate address; migrated with history.
    Migrated { punk_id: String, from: String },
    /// Known row under a different owner; left untouched for adjudication.
    Conflict { punk_id: String, current_owner: String },
    /// Rejected (supply cap).
    Rejected { punk_id: String, reason: String },
}

/// Summary of a wallet registration request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSummary {
    pub inserted: u32,
    pub refreshed: u32,
    pub migrated: u32,
    pub conflicts: u32,
    pub rejected: u32,
}
