//! The escrow engine: marketplace state machine and atomic swap.
//!
//! # Flow
//!
//! ```text
//!      (nil)
//!         | list
//!         v
//!      pending --(seller deposit, verified)--> deposited
//!         |                                        |
//!         | cancel                                 +- cancel -> cancelled (+ reserve refund)
//!         v                                        |
//!     cancelled                                    | execute (buyer paid)
//!                                                  v
//!                                               sold
//! ```
//!
//! # Execute ordering (lock-then-pay)
//!
//! 1. Per-punk lock taken; a concurrent operation is rejected outright.
//! 2. Preconditions checked (deposited, no payment yet, escrow balance
//!    covers the price) -- all before any wallet send.
//! 3. The ownership commit runs as one registry transaction: owner flips
//!    to the buyer, history and sales rows append, the listing turns
//!    `sold`. From here the buyer owns the punk.
//! 4. Payment leg: `price - fee` to the seller. A failure here leaves the
//!    punk sold, writes the `PAYMENT_FAILED: ...` sentinel where the txid
//!    would go, and surfaces as an upstream error -- the punk is never
//!    double-owned, and the failure is auditable and manually retryable.
//! 5. Reserve leg: the deposit reserve returns to the seller.
//!
//! Escrow wallet sends are serialised behind one async mutex (concurrent
//! VTXO spends from one wallet leave stale preconfirmed outputs) and carry
//! a hard deadline; a timed-out send is never retried in-request.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use config::constants::{MIN_RESERVE_CLAIM_SATS, SEND_DEADLINE_MS};
use punks_core::{Network, PunkId, VtxoOutpoint, parse_xonly_hex};
use registry::{
    AuditAction, AuditRecord, AuditStatus, ListingRecord, ListingStatus, Registry,
};

use crate::ark::ArkClient;
use crate::error::EscrowError;
use crate::locks::PunkLocks;

// ---------------------------------------------------------------------------
// Configuration and result types
// ---------------------------------------------------------------------------

/// Engine configuration, fixed at boot.
#[derive(Debug, Clone)]
pub struct EscrowConfig {
    /// Target network (informational; addresses are opaque strings here).
    pub network: Network,
    /// The escrow wallet's Ark address (deposit destination).
    pub escrow_address: String,
    /// Reserve per punk VTXO, sats.
    pub reserve_sats: u64,
    /// Marketplace fee percentage (0 disables the fee).
    pub fee_percent: u64,
}

/// Request to open a listing.
#[derive(Debug, Clone)]
pub struct ListRequest {
    pub punk_id: PunkId,
    pub seller_pubkey: String,
    pub seller_address: String,
    pub price_sats: u64,
    pub compressed_metadata: Option<String>,
}

/// Buyer identification for quote and execute.
#[derive(Debug, Clone)]
pub struct BuyRequest {
    pub punk_id: PunkId,
    pub buyer_pubkey: String,
    pub buyer_address: String,
    /// Optional payment txid reported by the buyer's wallet. Recorded in
    /// audit details; payment acceptance itself is balance-based.
    pub payment_txid: Option<String>,
}

/// Quote returned to a prospective buyer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyQuote {
    pub punk_id: PunkId,
    pub price_sats: u64,
    pub escrow_address: String,
}

/// Outcome of a completed execute.
#[derive(Debug, Clone)]
pub struct ExecuteResult {
    /// The listing row after all legs ran.
    pub listing: ListingRecord,
    /// Payment-leg txid.
    pub payment_txid: String,
    /// Reserve-return txid; `None` when that leg failed (audited).
    pub deposit_return_txid: Option<String>,
    /// Fee withheld.
    pub fee_sats: u64,
    /// Amount paid to the seller.
    pub payout_sats: u64,
}

/// Static escrow facts for clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowInfo {
    pub escrow_address: String,
    pub server_pubkey: String,
    pub reserve_sats: u64,
    pub fee_percent: u64,
}

/// Outcome of a reserve-claim repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveClaimResult {
    /// Sats paid out (0 when no deficit).
    pub paid_sats: u64,
    /// Send txid when a payout happened.
    pub txid: Option<String>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

struct EngineInner<A> {
    config: EscrowConfig,
    registry: Arc<Registry>,
    ark: A,
    locks: PunkLocks,
    /// Serialises escrow wallet sends (one VTXO spend at a time).
    send_gate: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
}

/// The escrow engine. `Clone`-able (wraps an `Arc`); share across tasks.
pub struct EscrowEngine<A> {
    inner: Arc<EngineInner<A>>,
}

impl<A> Clone for EscrowEngine<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: ArkClient> EscrowEngine<A> {
    /// Creates an engine over a registry and an Ark wallet.
    pub fn new(
        config: EscrowConfig,
        registry: Arc<Registry>,
        ark: A,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                config,
                registry,
                ark,
                locks: PunkLocks::new(),
                send_gate: tokio::sync::Mutex::new(()),
                cancel,
            }),
        }
    }

    /// The registry this engine writes through.
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// The network this deployment targets.
    pub fn network(&self) -> Network {
        self.inner.config.network
    }

    /// Static escrow facts.
    pub fn info(&self) -> EscrowInfo {
        EscrowInfo {
            escrow_address: self.inner.config.escrow_address.clone(),
            server_pubkey: hex::encode(self.inner.registry.server_pubkey().serialize()),
            reserve_sats: self.inner.config.reserve_sats,
            fee_percent: self.inner.config.fee_percent,
        }
    }

    // -----------------------------------------------------------------------
    // list
    // -----------------------------------------------------------------------

    /// Opens a listing in `pending`.
    pub async fn create_listing(&self, req: ListRequest) -> Result<ListingRecord, EscrowError> {
        self.check_open()?;
        validate_pubkey(&req.seller_pubkey, "sellerPubkey")?;
        validate_address(&req.seller_address, "sellerArkAddress")?;
        if req.price_sats == 0 {
            return Err(EscrowError::InvalidArgument("price must be positive".into()));
        }

        let _guard = self.lock_punk(&req.punk_id)?;

        let owner = self
            .inner
            .registry
            .owner_of(&req.punk_id)?
            .ok_or(EscrowError::NotFound)?;
        if owner != req.seller_address {
            return Err(EscrowError::Forbidden);
        }

        let listing = self
            .inner
            .registry
            .create_listing(
                &req.punk_id,
                &req.seller_address,
                &req.seller_pubkey,
                req.price_sats,
                &self.inner.config.escrow_address,
                req.compressed_metadata.as_deref(),
            )
            .inspect_err(|e| {
                self.audit_failure(AuditAction::ListCreated, &req.punk_id, e);
            })?;

        self.write_audit(
            AuditRecord::success(AuditAction::ListCreated, &req.punk_id)
                .seller(&req.seller_address)
                .amount(req.price_sats),
        );
        Ok(listing)
    }

    // -----------------------------------------------------------------------
    // deposit verification
    // -----------------------------------------------------------------------

    /// Confirms the seller's punk deposit after verifying, against live
    /// wallet state, that a VTXO of exactly the reserve value sits at the
    /// claimed outpoint inside the escrow wallet.
    pub async fn confirm_deposit(
        &self,
        punk_id: &PunkId,
        outpoint_text: &str,
    ) -> Result<ListingRecord, EscrowError> {
        self.check_open()?;
        let outpoint = VtxoOutpoint::parse(outpoint_text)
            .map_err(|e| EscrowError::InvalidArgument(format!("punkVtxoOutpoint: {e}")))?;

        let _guard = self.lock_punk(punk_id)?;

        let listing = self
            .inner
            .registry
            .get_listing(punk_id)?
            .ok_or(EscrowError::NotFound)?;
        if listing.status != ListingStatus::Pending {
            return Err(EscrowError::PreconditionFailed(format!(
                "listing is {}, requires pending",
                listing.status.as_str()
            )));
        }

        if let Err(e) = self.verify_reserve_vtxo(&outpoint).await {
            self.audit_failure(AuditAction::DepositConfirmed, punk_id, &e);
            return Err(e);
        }

        self.inner
            .registry
            .mark_deposited(punk_id, &outpoint.to_string())
            .inspect_err(|e| {
                self.audit_failure(AuditAction::DepositConfirmed, punk_id, e);
            })?;

        self.write_audit(
            AuditRecord::success(AuditAction::DepositConfirmed, punk_id)
                .seller(&listing.seller_address)
                .amount(self.inner.config.reserve_sats)
                .txid(outpoint.to_string()),
        );

        self.inner
            .registry
            .get_listing(punk_id)?
            .ok_or(EscrowError::NotFound)
    }

    /// Looks for an unspent VTXO matching the outpoint with exactly the
    /// reserve value. Equality, not at-least: a mis-sized deposit is a
    /// seller-side mistake better caught now than at sale time.
    async fn verify_reserve_vtxo(&self, outpoint: &VtxoOutpoint) -> Result<(), EscrowError> {
        let vtxos = self
            .inner
            .ark
            .get_vtxos()
            .await
            .map_err(|e| EscrowError::UpstreamFailure(e.to_string()))?;

        let found = vtxos
            .iter()
            .find(|v| !v.is_spent && v.outpoint == *outpoint)
            .ok_or_else(|| {
                EscrowError::DepositUnverified(format!(
                    "outpoint {outpoint} not found in escrow wallet"
                ))
            })?;

        if found.amount != self.inner.config.reserve_sats {
            return Err(EscrowError::DepositUnverified(format!(
                "expected {} sats at {outpoint}, found {}",
                self.inner.config.reserve_sats, found.amount
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // buy quote
    // -----------------------------------------------------------------------

    /// Quotes a buyer the price and payment address for a deposited
    /// listing.
    pub async fn quote_buy(&self, req: &BuyRequest) -> Result<BuyQuote, EscrowError> {
        self.check_open()?;
        validate_pubkey(&req.buyer_pubkey, "buyerPubkey")?;
        validate_address(&req.buyer_address, "buyerArkAddress")?;

        let listing = self
            .inner
            .registry
            .get_listing(&req.punk_id)?
            .ok_or(EscrowError::NotFound)?;
        if listing.status != ListingStatus::Deposited {
            return Err(EscrowError::PreconditionFailed(format!(
                "listing is {}, requires deposited",
                listing.status.as_str()
            )));
        }

        Ok(BuyQuote {
            punk_id: req.punk_id,
            price_sats: listing.price_sats,
            escrow_address: self.inner.config.escrow_address.clone(),
        })
    }

    // -----------------------------------------------------------------------
    // execute
    // -----------------------------------------------------------------------

    /// Runs the atomic swap for a paid-up buyer. See the module docs for
    /// the ordering discipline.
    pub async fn execute(&self, req: BuyRequest) -> Result<ExecuteResult, EscrowError> {
        self.check_open()?;
        validate_pubkey(&req.buyer_pubkey, "buyerPubkey")?;
        validate_address(&req.buyer_address, "buyerArkAddress")?;

        let _guard = self.lock_punk(&req.punk_id)?;

        // Preconditions, all before any wallet send.
        let listing = self
            .inner
            .registry
            .get_listing(&req.punk_id)?
            .ok_or(EscrowError::NotFound)?;
        if listing.payment_txid.is_some() {
            return Err(EscrowError::PreconditionFailed(
                "payment already recorded".into(),
            ));
        }
        if listing.status != ListingStatus::Deposited {
            return Err(EscrowError::PreconditionFailed(format!(
                "listing is {}, requires deposited",
                listing.status.as_str()
            )));
        }

        let price = listing.price_sats;
        let balance = self
            .inner
            .ark
            .get_balance()
            .await
            .map_err(|e| EscrowError::UpstreamFailure(e.to_string()))?;
        if balance < price {
            return Err(EscrowError::InsufficientFunds);
        }

        // Commit point: from here the buyer owns the punk.
        let committed = self
            .inner
            .registry
            .commit_sale(&req.punk_id, &req.buyer_address, &req.buyer_pubkey)
            .inspect_err(|e| {
                self.audit_failure(AuditAction::SaleCompleted, &req.punk_id, e);
            })?;

        let fee_sats = price * self.inner.config.fee_percent / 100;
        let payout_sats = price - fee_sats;
        let seller = committed.seller_address.clone();

        // Payment leg.
        let payment_txid = match self.send_bounded(&seller, payout_sats).await {
            Ok(txid) => {
                if let Err(e) = self.inner.registry.set_payment_txid(&req.punk_id, &txid) {
                    tracing::error!(punk_id = %req.punk_id, %e, "payment txid not recorded");
                }
                self.write_audit(
                    AuditRecord::success(AuditAction::SaleCompleted, &req.punk_id)
                        .seller(&seller)
                        .buyer(&req.buyer_address)
                        .amount(payout_sats)
                        .txid(&txid)
                        .details(serde_json::json!({
                            "leg": "payment",
                            "feeSats": fee_sats,
                            "buyerReportedTxid": req.payment_txid,
                        })),
                );
                txid
            }
            Err(e) => {
                // The punk has moved; never roll back. Record the sentinel
                // so the failure is visible and retryable by an operator.
                let sentinel = format!("PAYMENT_FAILED: {e}");
                if let Err(werr) = self
                    .inner
                    .registry
                    .set_payment_txid(&req.punk_id, &sentinel)
                {
                    tracing::error!(punk_id = %req.punk_id, %werr, "failure sentinel not recorded");
                }
                self.write_audit(
                    AuditRecord::failure(AuditAction::PaymentFailed, &req.punk_id, e.to_string())
                        .seller(&seller)
                        .buyer(&req.buyer_address)
                        .amount(payout_sats),
                );
                tracing::error!(punk_id = %req.punk_id, %e, "payment leg failed after commit");
                return Err(e);
            }
        };

        // Reserve leg.
        let reserve = self.inner.config.reserve_sats;
        let deposit_return_txid = match self.send_bounded(&seller, reserve).await {
            Ok(txid) => {
                if let Err(e) = self
                    .inner
                    .registry
                    .set_deposit_return_txid(&req.punk_id, &txid)
                {
                    tracing::error!(punk_id = %req.punk_id, %e, "reserve txid not recorded");
                }
                self.write_audit(
                    AuditRecord::success(AuditAction::SaleCompleted, &req.punk_id)
                        .seller(&seller)
                        .amount(reserve)
                        .txid(&txid)
                        .details(serde_json::json!({ "leg": "reserveReturn" })),
                );
                Some(txid)
            }
            Err(e) => {
                self.write_audit(
                    AuditRecord::failure(AuditAction::RefundFailed, &req.punk_id, e.to_string())
                        .seller(&seller)
                        .amount(reserve),
                );
                tracing::warn!(punk_id = %req.punk_id, %e, "reserve return failed; claimable later");
                None
            }
        };

        let listing = self
            .inner
            .registry
            .get_listing(&req.punk_id)?
            .ok_or(EscrowError::NotFound)?;

        Ok(ExecuteResult {
            listing,
            payment_txid,
            deposit_return_txid,
            fee_sats,
            payout_sats,
        })
    }

    // -----------------------------------------------------------------------
    // cancel
    // -----------------------------------------------------------------------

    /// Cancels a listing. From `deposited` the reserve refund must land
    /// before the row flips -- a failed refund leaves the listing
    /// `deposited` so an operator can retry; the seller's funds are held,
    /// not lost.
    pub async fn cancel(
        &self,
        punk_id: &PunkId,
        seller_address: &str,
    ) -> Result<ListingRecord, EscrowError> {
        self.check_open()?;
        let _guard = self.lock_punk(punk_id)?;

        let listing = self
            .inner
            .registry
            .get_listing(punk_id)?
            .ok_or(EscrowError::NotFound)?;
        if listing.seller_address != seller_address {
            return Err(EscrowError::Forbidden);
        }

        match listing.status {
            ListingStatus::Pending => {
                self.inner
                    .registry
                    .mark_cancelled(punk_id, None)
                    .inspect_err(|e| {
                        self.audit_failure(AuditAction::ListingCancelled, punk_id, e);
                    })?;
                self.write_audit(
                    AuditRecord::success(AuditAction::ListingCancelled, punk_id)
                        .seller(seller_address),
                );
            }
            ListingStatus::Deposited => {
                let reserve = self.inner.config.reserve_sats;
                match self.send_bounded(seller_address, reserve).await {
                    Ok(txid) => {
                        // The refund landed; a row that fails to flip here
                        // is an audited inconsistency, not lost money.
                        self.inner
                            .registry
                            .mark_cancelled(punk_id, Some(&txid))
                            .inspect_err(|e| {
                                self.audit_failure(AuditAction::ListingCancelled, punk_id, e);
                            })?;
                        self.write_audit(
                            AuditRecord::success(AuditAction::ListingCancelled, punk_id)
                                .seller(seller_address)
                                .amount(reserve)
                                .txid(&txid),
                        );
                    }
                    Err(e) => {
                        self.write_audit(
                            AuditRecord::failure(
                                AuditAction::RefundFailed,
                                punk_id,
                                e.to_string(),
                            )
                            .seller(seller_address)
                            .amount(reserve),
                        );
                        return Err(e);
                    }
                }
            }
            status => {
                return Err(EscrowError::PreconditionFailed(format!(
                    "listing is already {}",
                    status.as_str()
                )));
            }
        }

        self.inner
            .registry
            .get_listing(punk_id)?
            .ok_or(EscrowError::NotFound)
    }

    // -----------------------------------------------------------------------
    // reserve claim (operational repair)
    // -----------------------------------------------------------------------

    /// Pays out missing reserve sats to a wallet whose punk holdings imply
    /// more reserve than it reports holding. Idempotent: once the wallet
    /// is whole the deficit is zero and nothing is sent.
    pub async fn reserve_claim(
        &self,
        wallet_address: &str,
        reported_balance_sats: u64,
    ) -> Result<ReserveClaimResult, EscrowError> {
        self.check_open()?;
        validate_address(wallet_address, "walletAddress")?;

        let punk_count = self.inner.registry.punks_by_owner(wallet_address)?.len() as u64;
        let expected = punk_count * self.inner.config.reserve_sats;
        let deficit = expected.saturating_sub(reported_balance_sats);

        if deficit < MIN_RESERVE_CLAIM_SATS {
            return Ok(ReserveClaimResult {
                paid_sats: 0,
                txid: None,
            });
        }

        let escrow_balance = self
            .inner
            .ark
            .get_balance()
            .await
            .map_err(|e| EscrowError::UpstreamFailure(e.to_string()))?;
        let payable = deficit.min(escrow_balance);
        if payable < MIN_RESERVE_CLAIM_SATS {
            return Err(EscrowError::InsufficientFunds);
        }

        let txid = match self.send_bounded(wallet_address, payable).await {
            Ok(txid) => txid,
            Err(e) => {
                // Reserve claims are per-wallet, not per-punk.
                self.write_audit(AuditRecord {
                    action: AuditAction::RefundFailed,
                    status: AuditStatus::Failed,
                    punk_id: None,
                    seller: Some(wallet_address.to_owned()),
                    buyer: None,
                    amount_sats: Some(payable),
                    txid: None,
                    error: Some(e.to_string()),
                    details: None,
                });
                return Err(e);
            }
        };
        tracing::info!(
            wallet = wallet_address,
            paid_sats = payable,
            %txid,
            "reserve claim paid"
        );

        Ok(ReserveClaimResult {
            paid_sats: payable,
            txid: Some(txid),
        })
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Takes the per-punk lock, rejecting concurrent operations outright.
    fn lock_punk(&self, punk_id: &PunkId) -> Result<crate::locks::PunkGuard, EscrowError> {
        self.inner.locks.try_acquire(punk_id).ok_or_else(|| {
            EscrowError::PreconditionFailed("concurrent operation in progress for this punk".into())
        })
    }

    fn check_open(&self) -> Result<(), EscrowError> {
        if self.inner.cancel.is_cancelled() {
            return Err(EscrowError::PreconditionFailed("server shutting down".into()));
        }
        Ok(())
    }

    /// One escrow wallet send: serialised and bounded by the deadline.
    /// A timeout is a failure of unknown outcome -- never retried here.
    async fn send_bounded(&self, address: &str, sats: u64) -> Result<String, EscrowError> {
        let _gate = self.inner.send_gate.lock().await;
        match tokio::time::timeout(
            Duration::from_millis(SEND_DEADLINE_MS),
            self.inner.ark.send(address, sats),
        )
        .await
        {
            Ok(Ok(txid)) => Ok(txid),
            Ok(Err(e)) => Err(EscrowError::UpstreamFailure(e.to_string())),
            Err(_) => Err(EscrowError::UpstreamFailure(
                "send deadline exceeded".into(),
            )),
        }
    }

    /// Best-effort audit write; an audit failure is logged, never fatal.
    fn write_audit(&self, record: AuditRecord) {
        if let Err(e) = self.inner.registry.write_audit(record) {
            tracing::warn!(%e, "audit write failed");
        }
    }

    fn audit_failure(&self, action: AuditAction, punk_id: &PunkId, error: &dyn std::fmt::Display) {
        self.write_audit(AuditRecord::failure(action, punk_id, error.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn validate_pubkey(hex_str: &str, field: &str) -> Result<(), EscrowError> {
    parse_xonly_hex(hex_str)
        .map(|_| ())
        .ok_or_else(|| EscrowError::InvalidArgument(format!("{field} must be 64 hex chars")))
}

fn validate_address(address: &str, field: &str) -> Result<(), EscrowError> {
    if address.is_empty() {
        return Err(EscrowError::InvalidArgument(format!("{field} is empty")));
    }
    Ok(())
}
