//! Punk rows, ownership history, supply, and wallet registration.

use rusqlite::{OptionalExtension, Row, Transaction, params};

use punks_core::PunkId;
use signer::verify_attestation;

use crate::error::RegistryError;
use crate::types::{
    OwnershipEvent, PunkRecord, RegisterOutcome, RegisterSummary, WalletPunk,
};
use crate::{Registry, now};

impl Registry {
    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Fetches a punk row.
    pub fn get_punk(&self, punk_id: &PunkId) -> Result<Option<PunkRecord>, RegistryError> {
        let conn = self.lock();
        let record = conn
            .query_row(
                "SELECT punk_id, owner_address, compressed, server_signature,
                        minted_at, updated_at
                 FROM punks WHERE punk_id = ?1",
                params![punk_id.to_hex()],
                punk_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Current owner of a punk, if recorded.
    pub fn owner_of(&self, punk_id: &PunkId) -> Result<Option<String>, RegistryError> {
        let conn = self.lock();
        let owner = conn
            .query_row(
                "SELECT owner_address FROM punks WHERE punk_id = ?1",
                params![punk_id.to_hex()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(owner)
    }

    /// All punk rows, newest first.
    pub fn all_punks(&self) -> Result<Vec<PunkRecord>, RegistryError> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT punk_id, owner_address, compressed, server_signature,
                    minted_at, updated_at
             FROM punks ORDER BY minted_at DESC",
        )?;
        let rows = stmt.query_map([], punk_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Punks owned by an address.
    pub fn punks_by_owner(&self, address: &str) -> Result<Vec<PunkRecord>, RegistryError> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT punk_id, owner_address, compressed, server_signature,
                    minted_at, updated_at
             FROM punks WHERE owner_address = ?1 ORDER BY minted_at DESC",
        )?;
        let rows = stmt.query_map(params![address], punk_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Total punks recorded.
    pub fn punk_count(&self) -> Result<u32, RegistryError> {
        let conn = self.lock();
        let count: u32 = conn.query_row("SELECT COUNT(*) FROM punks", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Ownership history of a punk, oldest first.
    pub fn history_of(&self, punk_id: &PunkId) -> Result<Vec<OwnershipEvent>, RegistryError> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT punk_id, from_addr, to_addr, ts
             FROM ownership_history WHERE punk_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![punk_id.to_hex()], |row| {
            let id_hex: String = row.get(0)?;
            Ok((id_hex, row.get(1)?, row.get(2)?, row.get(3)?))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id_hex, from_address, to_address, timestamp) = row?;
            events.push(OwnershipEvent {
                punk_id: parse_punk_id(&id_hex)?,
                from_address,
                to_address,
                timestamp,
            });
        }
        Ok(events)
    }

    /// Whether the punk is official: a valid server attestation, or a row
    /// in the legacy whitelist.
    pub fn is_official(&self, punk_id: &PunkId) -> Result<bool, RegistryError> {
        if self.is_whitelisted(punk_id) {
            return Ok(true);
        }
        let Some(record) = self.get_punk(punk_id)? else {
            return Ok(false);
        };
        let Some(sig_hex) = record.server_signature else {
            return Ok(false);
        };
        let Ok(sig) = signer::signature_from_hex(&sig_hex) else {
            return Ok(false);
        };
        Ok(verify_attestation(
            &self.signer().server_pubkey(),
            punk_id,
            &sig,
        ))
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Records a freshly minted punk: supply check, insert, attestation,
    /// mint history row. One transaction.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::SupplyCapReached`] at the cap
    /// - [`RegistryError::DuplicatePunk`] if the id exists
    pub fn record_punk(
        &self,
        punk_id: &PunkId,
        owner_address: &str,
        compressed: Option<[u8; 6]>,
        minted_at: Option<i64>,
    ) -> Result<(), RegistryError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        self.insert_punk_tx(&tx, punk_id, owner_address, compressed, minted_at)?;
        tx.commit()?;
        tracing::info!(punk_id = %punk_id, owner = owner_address, "punk recorded");
        Ok(())
    }

    /// Boot-time legacy import: inserts a row without an attestation.
    ///
    /// Counts against the supply cap like any other punk. Idempotent --
    /// an existing row is left untouched.
    pub fn import_legacy(
        &self,
        punk_id: &PunkId,
        owner_address: &str,
    ) -> Result<(), RegistryError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let exists: bool = tx
            .query_row(
                "SELECT 1 FROM punks WHERE punk_id = ?1",
                params![punk_id.to_hex()],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if exists {
            return Ok(());
        }

        self.check_supply_tx(&tx)?;
        let ts = now();
        tx.execute(
            "INSERT INTO punks (punk_id, owner_address, compressed, server_signature,
                                minted_at, updated_at)
             VALUES (?1, ?2, NULL, NULL, ?3, ?3)",
            params![punk_id.to_hex(), owner_address, ts],
        )?;
        insert_history_tx(&tx, punk_id, None, owner_address, ts)?;
        tx.commit()?;
        Ok(())
    }

    /// Registers a wallet's locally known punks.
    ///
    /// Per punk: unknown ids are inserted and attested; ids already under
    /// this address are refreshed; ids under a declared alternate address
    /// migrate here with a history row; anything else is surfaced as a
    /// conflict and left untouched. The whole request is one transaction.
    pub fn register_wallet(
        &self,
        address: &str,
        alternate_addresses: &[String],
        punks: &[WalletPunk],
    ) -> Result<(RegisterSummary, Vec<RegisterOutcome>), RegistryError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let mut summary = RegisterSummary::default();
        let mut results = Vec::with_capacity(punks.len());

        for punk in punks {
            let id_hex = punk.punk_id.to_hex();
            let current: Option<String> = tx
                .query_row(
                    "SELECT owner_address FROM punks WHERE punk_id = ?1",
                    params![id_hex],
                    |row| row.get(0),
                )
                .optional()?;

            let outcome = match current {
                None => {
                    match self.insert_punk_tx(
                        &tx,
                        &punk.punk_id,
                        address,
                        punk.compressed,
                        punk.mint_date,
                    ) {
                        Ok(()) => {
                            summary.inserted += 1;
                            RegisterOutcome::Inserted { punk_id: id_hex }
                        }
                        Err(RegistryError::SupplyCapReached) => {
                            summary.rejected += 1;
                            RegisterOutcome::Rejected {
                                punk_id: id_hex,
                                reason: "supply cap reached".to_owned(),
                            }
                        }
                        Err(e) => return Err(e),
                    }
                }
                Some(owner) if owner == address => {
                    let compressed_hex = punk.compressed.map(hex::encode);
                    tx.execute(
                        "UPDATE punks
                         SET updated_at = ?2,
                             compressed = COALESCE(compressed, ?3)
                         WHERE punk_id = ?1",
                        params![id_hex, now(), compressed_hex],
                    )?;
                    summary.refreshed += 1;
                    RegisterOutcome::Refreshed { punk_id: id_hex }
                }
                Some(owner) if alternate_addresses.contains(&owner) => {
                    let ts = now();
                    tx.execute(
                        "UPDATE punks SET owner_address = ?2, updated_at = ?3
                         WHERE punk_id = ?1",
                        params![id_hex, address, ts],
                    )?;
                    insert_history_tx(&tx, &punk.punk_id, Some(&owner), address, ts)?;
                    summary.migrated += 1;
                    RegisterOutcome::Migrated {
                        punk_id: id_hex,
                        from: owner,
                    }
                }
                Some(owner) => {
                    // Do not overwrite -- an operator adjudicates.
                    summary.conflicts += 1;
                    RegisterOutcome::Conflict {
                        punk_id: id_hex,
                        current_owner: owner,
                    }
                }
            };
            results.push(outcome);
        }

        tx.commit()?;
        tracing::info!(
            address,
            inserted = summary.inserted,
            refreshed = summary.refreshed,
            migrated = summary.migrated,
            conflicts = summary.conflicts,
            "wallet registered"
        );
        Ok((summary, results))
    }

    /// Finds legacy rows authored by a minter pubkey.
    ///
    /// Legacy imports stored the raw pubkey hex where Ark addresses live
    /// now. Rows still under the pubkey form are available for the wallet
    /// to reclaim through the standard register path; rows that already
    /// migrated away from it are reported as claimed.
    pub fn recover_by_minter(
        &self,
        minter_pubkey_hex: &str,
    ) -> Result<(Vec<PunkRecord>, Vec<PunkRecord>), RegistryError> {
        let available = self.punks_by_owner(minter_pubkey_hex)?;

        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT DISTINCT p.punk_id, p.owner_address, p.compressed,
                    p.server_signature, p.minted_at, p.updated_at
             FROM punks p
             JOIN ownership_history h ON h.punk_id = p.punk_id
             WHERE h.from_addr = ?1 AND p.owner_address != ?1",
        )?;
        let rows = stmt.query_map(params![minter_pubkey_hex], punk_from_row)?;
        let claimed = rows.collect::<Result<Vec<_>, _>>()?;

        Ok((available, claimed))
    }

    // -----------------------------------------------------------------------
    // Transaction helpers
    // -----------------------------------------------------------------------

    /// Inserts a punk row with attestation and mint history. Caller owns
    /// the transaction.
    fn insert_punk_tx(
        &self,
        tx: &Transaction<'_>,
        punk_id: &PunkId,
        owner_address: &str,
        compressed: Option<[u8; 6]>,
        minted_at: Option<i64>,
    ) -> Result<(), RegistryError> {
        self.check_supply_tx(tx)?;

        let ts = now();
        let minted = minted_at.unwrap_or(ts);
        let signature = hex::encode(self.signer().sign_attestation(punk_id).serialize());
        let compressed_hex = compressed.map(hex::encode);

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO punks
                 (punk_id, owner_address, compressed, server_signature, minted_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                punk_id.to_hex(),
                owner_address,
                compressed_hex,
                signature,
                minted,
                ts
            ],
        )?;
        if inserted == 0 {
            return Err(RegistryError::DuplicatePunk);
        }

        insert_history_tx(tx, punk_id, None, owner_address, ts)?;
        Ok(())
    }

    /// Rejects the insert when the cap is already met.
    fn check_supply_tx(&self, tx: &Transaction<'_>) -> Result<(), RegistryError> {
        let count: u32 = tx.query_row("SELECT COUNT(*) FROM punks", [], |row| row.get(0))?;
        if count >= self.max_total_punks() {
            return Err(RegistryError::SupplyCapReached);
        }
        Ok(())
    }
}

/// Appends an ownership history row. Caller owns the transaction.
pub(crate) fn insert_history_tx(
    tx: &Transaction<'_>,
    punk_id: &PunkId,
    from_address: Option<&str>,
    to_address: &str,
    ts: i64,
) -> Result<(), RegistryError> {
    tx.execute(
        "INSERT INTO ownership_history (punk_id, from_addr, to_addr, ts)
         VALUES (?1, ?2, ?3, ?4)",
        params![punk_id.to_hex(), from_address, to_address, ts],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

pub(crate) fn parse_punk_id(hex_str: &str) -> Result<PunkId, RegistryError> {
    PunkId::from_hex(hex_str)
        .map_err(|e| RegistryError::Serialization(format!("stored punk id: {e}")))
}

fn punk_from_row(row: &Row<'_>) -> rusqlite::Result<PunkRecord> {
    let id_hex: String = row.get(0)?;
    let compressed_hex: Option<String> = row.get(2)?;

    let punk_id = PunkId::from_hex(&id_hex).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let compressed = match compressed_hex {
        Some(h) => {
            let bytes = hex::decode(&h).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;
            let fixed: [u8; 6] = bytes.try_into().map_err(|_| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    "compressed payload is not 6 bytes".into(),
                )
            })?;
            Some(fixed)
        }
        None => None,
    };

    Ok(PunkRecord {
        punk_id,
        owner_address: row.get(1)?,
        compressed,
        server_signature: row.get(3)?,
        minted_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use signer::{SchnorrServerSigner, ServerSigner};

    use super::*;

    fn test_registry(cap: u32) -> Registry {
        let signer = Arc::new(SchnorrServerSigner::from_secret_bytes(&[0x42; 32]).unwrap());
        Registry::open_in_memory(signer, cap, &[]).unwrap()
    }

    fn pid(byte: u8) -> PunkId {
        PunkId::from_bytes([byte; 32])
    }

    #[test]
    fn record_and_read_back() {
        let registry = test_registry(10);
        registry
            .record_punk(&pid(1), "ark1seller", Some([1, 2, 3, 4, 5, 6]), None)
            .unwrap();

        let record = registry.get_punk(&pid(1)).unwrap().unwrap();
        assert_eq!(record.owner_address, "ark1seller");
        assert_eq!(record.compressed, Some([1, 2, 3, 4, 5, 6]));
        assert!(record.server_signature.is_some());

        let history = registry.history_of(&pid(1)).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_address, None);
        assert_eq!(history[0].to_address, "ark1seller");
    }

    #[test]
    fn duplicate_insert_rejected() {
        let registry = test_registry(10);
        registry.record_punk(&pid(1), "a", None, None).unwrap();
        assert!(matches!(
            registry.record_punk(&pid(1), "b", None, None),
            Err(RegistryError::DuplicatePunk)
        ));
        // Owner unchanged.
        assert_eq!(registry.owner_of(&pid(1)).unwrap().unwrap(), "a");
    }

    #[test]
    fn supply_cap_enforced() {
        // The row count never exceeds the cap.
        let registry = test_registry(2);
        registry.record_punk(&pid(1), "a", None, None).unwrap();
        registry.record_punk(&pid(2), "a", None, None).unwrap();
        assert!(matches!(
            registry.record_punk(&pid(3), "a", None, None),
            Err(RegistryError::SupplyCapReached)
        ));
        assert_eq!(registry.punk_count().unwrap(), 2);
    }

    #[test]
    fn recorded_punk_is_official() {
        let registry = test_registry(10);
        registry.record_punk(&pid(1), "a", None, None).unwrap();
        assert!(registry.is_official(&pid(1)).unwrap());
        assert!(!registry.is_official(&pid(9)).unwrap());
    }

    #[test]
    fn legacy_import_official_only_via_whitelist() {
        let signer = Arc::new(SchnorrServerSigner::from_secret_bytes(&[0x42; 32]).unwrap());
        let registry = Registry::open_in_memory(signer, 10, &[pid(7)]).unwrap();

        registry.import_legacy(&pid(7), "legacy-pubkey").unwrap();
        registry.import_legacy(&pid(8), "legacy-pubkey").unwrap();

        assert!(registry.is_official(&pid(7)).unwrap(), "whitelisted");
        assert!(!registry.is_official(&pid(8)).unwrap(), "unsigned, not listed");

        // Idempotent.
        registry.import_legacy(&pid(7), "other").unwrap();
        assert_eq!(registry.owner_of(&pid(7)).unwrap().unwrap(), "legacy-pubkey");
    }

    #[test]
    fn register_wallet_inserts_and_refreshes() {
        // First contact inserts; the second call is a refresh, not a re-mint.
        let registry = test_registry(10);
        let punks = vec![WalletPunk {
            punk_id: pid(1),
            mint_date: None,
            compressed: Some([6, 5, 4, 3, 2, 1]),
        }];

        let (summary, results) = registry.register_wallet("ark1a", &[], &punks).unwrap();
        assert_eq!(summary.inserted, 1);
        assert!(matches!(&results[0], RegisterOutcome::Inserted { .. }));

        let (summary, results) = registry.register_wallet("ark1a", &[], &punks).unwrap();
        assert_eq!(summary.refreshed, 1);
        assert!(matches!(&results[0], RegisterOutcome::Refreshed { .. }));

        // No second history row from the refresh.
        assert_eq!(registry.history_of(&pid(1)).unwrap().len(), 1);
    }

    #[test]
    fn register_wallet_migrates_alternates() {
        let registry = test_registry(10);
        registry.record_punk(&pid(1), "ark1old", None, None).unwrap();

        let punks = vec![WalletPunk {
            punk_id: pid(1),
            mint_date: None,
            compressed: None,
        }];
        let (summary, results) = registry
            .register_wallet("ark1new", &["ark1old".to_owned()], &punks)
            .unwrap();

        assert_eq!(summary.migrated, 1);
        assert!(matches!(&results[0], RegisterOutcome::Migrated { from, .. } if from == "ark1old"));
        assert_eq!(registry.owner_of(&pid(1)).unwrap().unwrap(), "ark1new");
        assert_eq!(registry.history_of(&pid(1)).unwrap().len(), 2);
    }

    #[test]
    fn register_wallet_surfaces_conflicts() {
        let registry = test_registry(10);
        registry.record_punk(&pid(1), "ark1other", None, None).unwrap();

        let punks = vec![WalletPunk {
            punk_id: pid(1),
            mint_date: None,
            compressed: None,
        }];
        let (summary, results) = registry.register_wallet("ark1me", &[], &punks).unwrap();

        assert_eq!(summary.conflicts, 1);
        assert!(matches!(
            &results[0],
            RegisterOutcome::Conflict { current_owner, .. } if current_owner == "ark1other"
        ));
        // Not overwritten.
        assert_eq!(registry.owner_of(&pid(1)).unwrap().unwrap(), "ark1other");
    }

    #[test]
    fn recovery_splits_available_and_claimed() {
        let registry = test_registry(10);
        let minter = "02aabbcc";

        registry.import_legacy(&pid(1), minter).unwrap();
        registry.import_legacy(&pid(2), minter).unwrap();

        // Punk 2 migrates to a proper address.
        let punks = vec![WalletPunk {
            punk_id: pid(2),
            mint_date: None,
            compressed: None,
        }];
        registry
            .register_wallet("ark1wallet", &[minter.to_owned()], &punks)
            .unwrap();

        let (available, claimed) = registry.recover_by_minter(minter).unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].punk_id, pid(1));
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].punk_id, pid(2));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("punks.db");
        let signer: Arc<dyn ServerSigner> =
            Arc::new(SchnorrServerSigner::from_secret_bytes(&[0x42; 32]).unwrap());

        {
            let registry = Registry::open(&path, Arc::clone(&signer), 10, &[]).unwrap();
            registry.record_punk(&pid(1), "ark1a", None, None).unwrap();
        }

        let reopened = Registry::open(&path, signer, 10, &[]).unwrap();
        assert_eq!(reopened.owner_of(&pid(1)).unwrap().unwrap(), "ark1a");
        assert_eq!(reopened.history_of(&pid(1)).unwrap().len(), 1);
        assert!(reopened.is_official(&pid(1)).unwrap());
    }

    #[test]
    fn reopen_below_existing_rows_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("punks.db");
        let signer: Arc<dyn ServerSigner> =
            Arc::new(SchnorrServerSigner::from_secret_bytes(&[0x42; 32]).unwrap());

        {
            let registry = Registry::open(&path, Arc::clone(&signer), 10, &[]).unwrap();
            registry.record_punk(&pid(1), "a", None, None).unwrap();
            registry.record_punk(&pid(2), "a", None, None).unwrap();
        }

        // Two rows exist; a cap of 1 fails the boot self-check.
        assert!(matches!(
            Registry::open(&path, Arc::clone(&signer), 1, &[]),
            Err(RegistryError::SupplyCapReached)
        ));
        // A cap equal to the row count is exactly full, not over.
        assert!(Registry::open(&path, signer, 2, &[]).is_ok());
    }

    #[test]
    fn punks_by_owner_filters() {
        let registry = test_registry(10);
        registry.record_punk(&pid(1), "a", None, None).unwrap();
        registry.record_punk(&pid(2), "b", None, None).unwrap();
        registry.record_punk(&pid(3), "a", None, None).unwrap();

        assert_eq!(registry.punks_by_owner("a").unwrap().len(), 2);
        assert_eq!(registry.punks_by_owner("b").unwrap().len(), 1);
        assert_eq!(registry.punks_by_owner("c").unwrap().len(), 0);
    }
}
