//! Append-only audit log.
//!
//! One row per privileged action. Rows are prepared in memory by the
//! caller ([`AuditRecord`]) and written in a single INSERT so the audit
//! path never holds the store longer than one statement.

use rusqlite::params;
use serde_json::Value;

use punks_core::PunkId;

use crate::error::RegistryError;
use crate::types::{AuditAction, AuditEntry, AuditStatus};
use crate::{Registry, now};

/// A prepared audit row.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub action: AuditAction,
    pub status: AuditStatus,
    pub punk_id: Option<PunkId>,
    pub seller: Option<String>,
    pub buyer: Option<String>,
    pub amount_sats: Option<u64>,
    pub txid: Option<String>,
    pub error: Option<String>,
    pub details: Option<Value>,
}

impl AuditRecord {
    /// A success row for an action on a punk.
    pub fn success(action: AuditAction, punk_id: &PunkId) -> Self {
        Self {
            action,
            status: AuditStatus::Success,
            punk_id: Some(*punk_id),
            seller: None,
            buyer: None,
            amount_sats: None,
            txid: None,
            error: None,
            details: None,
        }
    }

    /// A failure row carrying the error text.
    pub fn failure(action: AuditAction, punk_id: &PunkId, error: impl Into<String>) -> Self {
        Self {
            status: AuditStatus::Failed,
            error: Some(error.into()),
            ..Self::success(action, punk_id)
        }
    }

    pub fn seller(mut self, seller: impl Into<String>) -> Self {
        self.seller = Some(seller.into());
        self
    }

    pub fn buyer(mut self, buyer: impl Into<String>) -> Self {
        self.buyer = Some(buyer.into());
        self
    }

    pub fn amount(mut self, sats: u64) -> Self {
        self.amount_sats = Some(sats);
        self
    }

    pub fn txid(mut self, txid: impl Into<String>) -> Self {
        self.txid = Some(txid.into());
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl Registry {
    /// Appends an audit row.
    pub fn write_audit(&self, record: AuditRecord) -> Result<(), RegistryError> {
        let details_json = match &record.details {
            Some(v) => Some(
                serde_json::to_string(v)
                    .map_err(|e| RegistryError::Serialization(e.to_string()))?,
            ),
            None => None,
        };

        let conn = self.lock();
        conn.execute(
            "INSERT INTO audit_log
                 (timestamp, action, punk_id, seller, buyer, amount_sats, txid,
                  status, error, details_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                now(),
                record.action.as_str(),
                record.punk_id.map(|id| id.to_hex()),
                record.seller,
                record.buyer,
                record.amount_sats,
                record.txid,
                record.status.as_str(),
                record.error,
                details_json
            ],
        )?;
        Ok(())
    }

    /// Most recent audit rows, newest first.
    pub fn recent_audit(&self, limit: u32) -> Result<Vec<AuditEntry>, RegistryError> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, timestamp, action, punk_id, seller, buyer, amount_sats,
                    txid, status, error, details_json
             FROM audit_log ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(AuditEntry {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                action: row.get(2)?,
                punk_id: row.get(3)?,
                seller: row.get(4)?,
                buyer: row.get(5)?,
                amount_sats: row.get(6)?,
                txid: row.get(7)?,
                status: row.get(8)?,
                error: row.get(9)?,
                details_json: row.get(10)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
