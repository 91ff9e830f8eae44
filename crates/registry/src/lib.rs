//! Canonical punk ownership registry.
//!
//! A single SQLite store holds the `punk_id -> owner` mapping plus the
//! append-only ownership history, marketplace listings, completed sales,
//! and the audit log. All mutating operations run inside one transaction
//! per request; the connection sits behind a mutex so there is exactly one
//! writer (SQLite WAL keeps readers unblocked).
//!
//! # Supply and attestation
//!
//! Inserting a punk enforces the global supply cap and produces a server
//! Schnorr attestation over `SHA-256(punk_id)` stored alongside the row.
//! Rows without a signature exist only via the legacy import path; the
//! boot-time whitelist marks those official.
//!
//! # Identity
//!
//! Punk identity is the [`PunkId`]; VTXO outpoints stored on listings are
//! verification hints that go stale at every Ark refresh round and are
//! never used to look anything up after the deposit is confirmed.

mod audit;
mod error;
mod listings;
mod punks;
mod schema;
mod types;

pub use audit::AuditRecord;
pub use error::RegistryError;
pub use types::{
    AuditAction, AuditEntry, AuditStatus, ListingRecord, ListingStatus, OwnershipEvent,
    PunkRecord, RegisterOutcome, RegisterSummary, SaleRecord, SalesStats, WalletPunk,
};

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::Connection;

use punks_core::PunkId;
use signer::ServerSigner;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Handle to the registry store.
///
/// Cheap to share (`Arc` it); all methods take `&self`.
pub struct Registry {
    conn: Mutex<Connection>,
    signer: Arc<dyn ServerSigner>,
    max_total_punks: u32,
    legacy_whitelist: HashSet<PunkId>,
}

impl Registry {
    /// Opens (or creates) the registry at `path`.
    pub fn open(
        path: impl AsRef<Path>,
        signer: Arc<dyn ServerSigner>,
        max_total_punks: u32,
        legacy_whitelist: &[PunkId],
    ) -> Result<Self, RegistryError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, signer, max_total_punks, legacy_whitelist)
    }

    /// Opens an in-memory registry (tests, dry runs).
    pub fn open_in_memory(
        signer: Arc<dyn ServerSigner>,
        max_total_punks: u32,
        legacy_whitelist: &[PunkId],
    ) -> Result<Self, RegistryError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, signer, max_total_punks, legacy_whitelist)
    }

    fn with_connection(
        conn: Connection,
        signer: Arc<dyn ServerSigner>,
        max_total_punks: u32,
        legacy_whitelist: &[PunkId],
    ) -> Result<Self, RegistryError> {
        schema::initialize(&conn)?;
        let registry = Self {
            conn: Mutex::new(conn),
            signer,
            max_total_punks,
            legacy_whitelist: legacy_whitelist.iter().copied().collect(),
        };

        // Boot self-check: a store already over the cap means the cap was
        // lowered under existing rows or the store was tampered with.
        // Refuse to serve from it rather than enforce the cap only for
        // future inserts.
        let total = registry.punk_count()?;
        if total > max_total_punks {
            tracing::error!(total, max_total_punks, "registry exceeds the supply cap");
            return Err(RegistryError::SupplyCapReached);
        }

        tracing::info!(
            max_total_punks,
            whitelist = registry.legacy_whitelist.len(),
            total,
            "registry opened"
        );
        Ok(registry)
    }

    /// The supply cap this registry enforces.
    pub fn max_total_punks(&self) -> u32 {
        self.max_total_punks
    }

    /// The attestation authority's public key.
    pub fn server_pubkey(&self) -> signer::ServerPubkey {
        self.signer.server_pubkey()
    }

    // -----------------------------------------------------------------------
    // Internals shared by the operation modules
    // -----------------------------------------------------------------------

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    pub(crate) fn signer(&self) -> &dyn ServerSigner {
        &*self.signer
    }

    pub(crate) fn is_whitelisted(&self, punk_id: &PunkId) -> bool {
        self.legacy_whitelist.contains(punk_id)
    }
}

/// Seconds since the Unix epoch.
pub(crate) fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
