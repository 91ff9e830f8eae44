//! Marketplace listings, the atomic sale commit, and the sales feed.

use rusqlite::{OptionalExtension, Row, params};

use punks_core::PunkId;

use crate::error::RegistryError;
use crate::punks::{insert_history_tx, parse_punk_id};
use crate::types::{ListingRecord, ListingStatus, SaleRecord, SalesStats};
use crate::{Registry, now};

impl Registry {
    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Fetches the listing row for a punk (any status).
    pub fn get_listing(&self, punk_id: &PunkId) -> Result<Option<ListingRecord>, RegistryError> {
        let conn = self.lock();
        let record = conn
            .query_row(
                &format!("SELECT {LISTING_COLUMNS} FROM listings WHERE punk_id = ?1"),
                params![punk_id.to_hex()],
                listing_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// All non-terminal listings, newest first.
    pub fn active_listings(&self) -> Result<Vec<ListingRecord>, RegistryError> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings
             WHERE status IN ('pending','deposited')
             ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map([], listing_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // -----------------------------------------------------------------------
    // Lifecycle writes
    // -----------------------------------------------------------------------

    /// Opens a listing in `pending`.
    ///
    /// A terminal row for the same punk is replaced; a non-terminal one is
    /// a conflict (at most one live listing per punk).
    pub fn create_listing(
        &self,
        punk_id: &PunkId,
        seller_address: &str,
        seller_pubkey: &str,
        price_sats: u64,
        escrow_address: &str,
        compressed_metadata: Option<&str>,
    ) -> Result<ListingRecord, RegistryError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT status FROM listings WHERE punk_id = ?1",
                params![punk_id.to_hex()],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(status) = existing {
            let status = ListingStatus::from_str_opt(&status)
                .ok_or_else(|| RegistryError::Serialization(format!("listing status {status}")))?;
            if !status.is_terminal() {
                return Err(RegistryError::ListingExists);
            }
        }

        let ts = now();
        tx.execute(
            "INSERT OR REPLACE INTO listings
                 (punk_id, seller_address, seller_pubkey, price_sats, status,
                  escrow_address, punk_vtxo_outpoint, compressed_metadata,
                  created_at, deposited_at, sold_at, cancelled_at,
                  buyer_address, buyer_pubkey, payment_txid, deposit_return_txid)
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5, NULL, ?6,
                     ?7, NULL, NULL, NULL, NULL, NULL, NULL, NULL)",
            params![
                punk_id.to_hex(),
                seller_address,
                seller_pubkey,
                price_sats,
                escrow_address,
                compressed_metadata,
                ts
            ],
        )?;
        tx.commit()?;
        drop(conn);

        tracing::info!(punk_id = %punk_id, price_sats, "listing created");
        self.get_listing(punk_id)?.ok_or(RegistryError::NotFound)
    }

    /// Transitions `pending -> deposited` after on-wallet verification,
    /// recording the punk VTXO outpoint hint.
    pub fn mark_deposited(
        &self,
        punk_id: &PunkId,
        punk_vtxo_outpoint: &str,
    ) -> Result<(), RegistryError> {
        let conn = self.lock();
        let updated = conn.execute(
            "UPDATE listings
             SET status = 'deposited', punk_vtxo_outpoint = ?2, deposited_at = ?3
             WHERE punk_id = ?1 AND status = 'pending'",
            params![punk_id.to_hex(), punk_vtxo_outpoint, now()],
        )?;
        if updated == 0 {
            return Err(self.wrong_state_error(&conn, punk_id, "pending"));
        }
        Ok(())
    }

    /// Marks a listing cancelled, optionally recording the reserve refund.
    ///
    /// Legal from `pending` (no refund) and from `deposited` (refund txid
    /// already obtained by the caller -- the refund precedes this write so
    /// a failed refund never strands the row in `cancelled`).
    pub fn mark_cancelled(
        &self,
        punk_id: &PunkId,
        deposit_return_txid: Option<&str>,
    ) -> Result<(), RegistryError> {
        let conn = self.lock();
        let updated = conn.execute(
            "UPDATE listings
             SET status = 'cancelled', cancelled_at = ?2,
                 deposit_return_txid = COALESCE(?3, deposit_return_txid)
             WHERE punk_id = ?1 AND status IN ('pending','deposited')",
            params![punk_id.to_hex(), now(), deposit_return_txid],
        )?;
        if updated == 0 {
            return Err(self.wrong_state_error(&conn, punk_id, "pending or deposited"));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sale commit
    // -----------------------------------------------------------------------

    /// The ownership commit point of a sale, in one transaction:
    ///
    /// 1. `owner(punk_id) := buyer`
    /// 2. history row `(seller -> buyer)`
    /// 3. listing gains buyer fields, `sold_at`, `status = 'sold'`
    /// 4. a `sales` row is appended
    ///
    /// Preconditions checked inside the same transaction: listing is
    /// `deposited` and no payment recorded yet. Concurrent committers
    /// therefore serialise on the store -- exactly one wins, the rest see
    /// [`RegistryError::WrongState`].
    pub fn commit_sale(
        &self,
        punk_id: &PunkId,
        buyer_address: &str,
        buyer_pubkey: &str,
    ) -> Result<ListingRecord, RegistryError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let listing = tx
            .query_row(
                &format!("SELECT {LISTING_COLUMNS} FROM listings WHERE punk_id = ?1"),
                params![punk_id.to_hex()],
                listing_from_row,
            )
            .optional()?
            .ok_or(RegistryError::NotFound)?;

        if listing.payment_txid.is_some() {
            return Err(RegistryError::PaymentAlreadyRecorded);
        }
        if listing.status != ListingStatus::Deposited {
            return Err(RegistryError::WrongState {
                actual: listing.status.as_str(),
                required: "deposited",
            });
        }

        let ts = now();

        let updated = tx.execute(
            "UPDATE punks SET owner_address = ?2, updated_at = ?3 WHERE punk_id = ?1",
            params![punk_id.to_hex(), buyer_address, ts],
        )?;
        if updated == 0 {
            return Err(RegistryError::NotFound);
        }

        insert_history_tx(&tx, punk_id, Some(&listing.seller_address), buyer_address, ts)?;

        tx.execute(
            "UPDATE listings
             SET status = 'sold', buyer_address = ?2, buyer_pubkey = ?3, sold_at = ?4
             WHERE punk_id = ?1",
            params![punk_id.to_hex(), buyer_address, buyer_pubkey, ts],
        )?;

        tx.execute(
            "INSERT INTO sales (punk_id, price_sats, seller, buyer, sold_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                punk_id.to_hex(),
                listing.price_sats,
                listing.seller_address,
                buyer_address,
                ts
            ],
        )?;

        tx.commit()?;
        drop(conn);

        tracing::info!(
            punk_id = %punk_id,
            seller = listing.seller_address,
            buyer = buyer_address,
            price_sats = listing.price_sats,
            "sale committed"
        );
        self.get_listing(punk_id)?.ok_or(RegistryError::NotFound)
    }

    /// Records the payment leg's txid (or its failure sentinel) on the
    /// listing and the matching sales row.
    pub fn set_payment_txid(&self, punk_id: &PunkId, txid: &str) -> Result<(), RegistryError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let updated = tx.execute(
            "UPDATE listings SET payment_txid = ?2
             WHERE punk_id = ?1 AND status = 'sold' AND payment_txid IS NULL",
            params![punk_id.to_hex(), txid],
        )?;
        if updated == 0 {
            return Err(RegistryError::PaymentAlreadyRecorded);
        }
        tx.execute(
            "UPDATE sales SET payment_txid = ?2
             WHERE punk_id = ?1 AND payment_txid IS NULL",
            params![punk_id.to_hex(), txid],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Records the reserve-return txid on a sold listing.
    pub fn set_deposit_return_txid(
        &self,
        punk_id: &PunkId,
        txid: &str,
    ) -> Result<(), RegistryError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE listings SET deposit_return_txid = ?2 WHERE punk_id = ?1",
            params![punk_id.to_hex(), txid],
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sales feed
    // -----------------------------------------------------------------------

    /// All completed sales, newest first.
    pub fn all_sales(&self) -> Result<Vec<SaleRecord>, RegistryError> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, punk_id, price_sats, seller, buyer, sold_at, payment_txid
             FROM sales ORDER BY sold_at DESC, id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            let id_hex: String = row.get(1)?;
            Ok((
                row.get::<_, i64>(0)?,
                id_hex,
                row.get::<_, u64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })?;

        let mut sales = Vec::new();
        for row in rows {
            let (id, id_hex, price_sats, seller, buyer, sold_at, payment_txid) = row?;
            sales.push(SaleRecord {
                id,
                punk_id: parse_punk_id(&id_hex)?,
                price_sats,
                seller,
                buyer,
                sold_at,
                payment_txid,
            });
        }
        Ok(sales)
    }

    /// Aggregate marketplace statistics.
    pub fn sales_stats(&self) -> Result<SalesStats, RegistryError> {
        let conn = self.lock();
        let stats = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(MIN(price_sats), 0),
                    COALESCE(MAX(price_sats), 0),
                    COALESCE(SUM(price_sats), 0)
             FROM sales",
            [],
            |row| {
                let count: u64 = row.get(0)?;
                let floor_sats: u64 = row.get(1)?;
                let high_sats: u64 = row.get(2)?;
                let volume_sats: u64 = row.get(3)?;
                Ok(SalesStats {
                    count,
                    floor_sats,
                    high_sats,
                    volume_sats,
                    average_sats: if count > 0 { volume_sats / count } else { 0 },
                })
            },
        )?;
        Ok(stats)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Distinguishes "no listing" from "wrong state" after a guarded
    /// UPDATE matched nothing.
    fn wrong_state_error(
        &self,
        conn: &rusqlite::Connection,
        punk_id: &PunkId,
        required: &'static str,
    ) -> RegistryError {
        let actual: Option<String> = conn
            .query_row(
                "SELECT status FROM listings WHERE punk_id = ?1",
                params![punk_id.to_hex()],
                |row| row.get(0),
            )
            .optional()
            .ok()
            .flatten();
        match actual {
            None => RegistryError::NotFound,
            Some(status) => RegistryError::WrongState {
                actual: ListingStatus::from_str_opt(&status)
                    .map(|s| s.as_str())
                    .unwrap_or("unknown"),
                required,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

const LISTING_COLUMNS: &str = "punk_id, seller_address, seller_pubkey, price_sats, status, \
     escrow_address, punk_vtxo_outpoint, compressed_metadata, created_at, \
     deposited_at, sold_at, cancelled_at, buyer_address, buyer_pubkey, \
     payment_txid, deposit_return_txid";

fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<ListingRecord> {
    let id_hex: String = row.get(0)?;
    let punk_id = PunkId::from_hex(&id_hex).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let status_str: String = row.get(4)?;
    let status = ListingStatus::from_str_opt(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown listing status {status_str}").into(),
        )
    })?;

    Ok(ListingRecord {
        punk_id,
        seller_address: row.get(1)?,
        seller_pubkey: row.get(2)?,
        price_sats: row.get(3)?,
        status,
        escrow_address: row.get(5)?,
        punk_vtxo_outpoint: row.get(6)?,
        compressed_metadata: row.get(7)?,
        created_at: row.get(8)?,
        deposited_at: row.get(9)?,
        sold_at: row.get(10)?,
        cancelled_at: row.get(11)?,
        buyer_address: row.get(12)?,
        buyer_pubkey: row.get(13)?,
        payment_txid: row.get(14)?,
        deposit_return_txid: row.get(15)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
