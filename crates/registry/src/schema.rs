//! Registry schema.
//!
//! Five tables: `punks` (canonical ownership), `ownership_history`
//! (append-only), `listings` (one row per punk, primary-key enforced),
//! `sales` (append-only), and `audit_log` (append-only).
//!
//! `listings.punk_id` being the primary key gives "at most one listing per
//! punk" structurally; a new listing after a terminal one replaces the row.

use rusqlite::Connection;

use crate::error::RegistryError;

/// Complete schema, idempotent.
const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS punks (
    punk_id          TEXT PRIMARY KEY,
    owner_address    TEXT NOT NULL,
    compressed       TEXT,
    server_signature TEXT,
    minted_at        INTEGER NOT NULL,
    updated_at       INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_punks_owner ON punks(owner_address);

CREATE TABLE IF NOT EXISTS ownership_history (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    punk_id   TEXT NOT NULL REFERENCES punks(punk_id),
    from_addr TEXT,
    to_addr   TEXT NOT NULL,
    ts        INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_history_punk ON ownership_history(punk_id);

CREATE TABLE IF NOT EXISTS listings (
    punk_id             TEXT PRIMARY KEY REFERENCES punks(punk_id),
    seller_address      TEXT NOT NULL,
    seller_pubkey       TEXT NOT NULL,
    price_sats          INTEGER NOT NULL,
    status              TEXT NOT NULL CHECK (status IN ('pending','deposited','sold','cancelled')),
    escrow_address      TEXT NOT NULL,
    punk_vtxo_outpoint  TEXT,
    compressed_metadata TEXT,
    created_at          INTEGER NOT NULL,
    deposited_at        INTEGER,
    sold_at             INTEGER,
    cancelled_at        INTEGER,
    buyer_address       TEXT,
    buyer_pubkey        TEXT,
    payment_txid        TEXT,
    deposit_return_txid TEXT
);

CREATE INDEX IF NOT EXISTS idx_listings_status ON listings(status);

CREATE TABLE IF NOT EXISTS sales (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    punk_id      TEXT NOT NULL,
    price_sats   INTEGER NOT NULL,
    seller       TEXT NOT NULL,
    buyer        TEXT NOT NULL,
    sold_at      INTEGER NOT NULL,
    payment_txid TEXT
);

CREATE INDEX IF NOT EXISTS idx_sales_punk ON sales(punk_id);

CREATE TABLE IF NOT EXISTS audit_log (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp    INTEGER NOT NULL,
    action       TEXT NOT NULL,
    punk_id      TEXT,
    seller       TEXT,
    buyer        TEXT,
    amount_sats  INTEGER,
    txid         TEXT,
    status       TEXT NOT NULL CHECK (status IN ('SUCCESS','FAILED','PENDING')),
    error        TEXT,
    details_json TEXT
);

CREATE INDEX IF NOT EXISTS idx_audit_action ON audit_log(action);
"#;

/// Applies pragmas and creates tables.
///
/// WAL keeps readers unblocked behind the single writer; `foreign_keys`
/// must be set per connection in SQLite, so it lives here rather than in
/// the schema's one-time DDL.
pub fn initialize(conn: &Connection) -> Result<(), RegistryError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
