//! End-to-end escrow flow tests against an in-memory wallet and registry.
//!
//! Covers the marketplace scenarios: list/cancel, deposit verification,
//! the happy-path sale, payment failure after the ownership commit,
//! refund failure during cancel, and concurrent execution.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use escrow::{
    BuyRequest, EscrowConfig, EscrowEngine, EscrowError, ListRequest, MemoryArkClient,
};
use punks_core::{Network, PunkId, VtxoOutpoint};
use registry::{ListingStatus, Registry};
use signer::SchnorrServerSigner;

const RESERVE: u64 = 10_000;
const PRICE: u64 = 10_000;

const SELLER: &str = "tark1seller";
const BUYER: &str = "tark1buyer";
const ESCROW: &str = "tark1escrow";

fn pid(byte: u8) -> PunkId {
    PunkId::from_bytes([byte; 32])
}

fn outpoint(byte: u8) -> VtxoOutpoint {
    VtxoOutpoint::new(&format!("{byte:02x}").repeat(32), 0).unwrap()
}

fn pubkey_hex(byte: u8) -> String {
    format!("{byte:02x}").repeat(32)
}

struct Harness {
    engine: EscrowEngine<MemoryArkClient>,
    registry: Arc<Registry>,
    ark: MemoryArkClient,
}

fn harness(fee_percent: u64) -> Harness {
    let server_signer = Arc::new(SchnorrServerSigner::from_secret_bytes(&[0x42; 32]).unwrap());
    let registry = Arc::new(Registry::open_in_memory(server_signer, 2016, &[]).unwrap());
    let ark = MemoryArkClient::new();

    let engine = EscrowEngine::new(
        EscrowConfig {
            network: Network::Regtest,
            escrow_address: ESCROW.to_owned(),
            reserve_sats: RESERVE,
            fee_percent,
        },
        Arc::clone(&registry),
        ark.clone(),
        CancellationToken::new(),
    );

    Harness {
        engine,
        registry,
        ark,
    }
}

fn list_request(punk: u8, price: u64) -> ListRequest {
    ListRequest {
        punk_id: pid(punk),
        seller_pubkey: pubkey_hex(0xaa),
        seller_address: SELLER.to_owned(),
        price_sats: price,
        compressed_metadata: None,
    }
}

fn buy_request(punk: u8) -> BuyRequest {
    BuyRequest {
        punk_id: pid(punk),
        buyer_pubkey: pubkey_hex(0xbb),
        buyer_address: BUYER.to_owned(),
        payment_txid: None,
    }
}

/// Records a punk for the seller and opens a listing.
async fn listed(h: &Harness, punk: u8, price: u64) {
    h.registry.record_punk(&pid(punk), SELLER, None, None).unwrap();
    h.engine.create_listing(list_request(punk, price)).await.unwrap();
}

/// Takes a listing all the way to `deposited`.
async fn deposited(h: &Harness, punk: u8, price: u64) {
    listed(h, punk, price).await;
    h.ark.add_vtxo(outpoint(punk), RESERVE);
    h.engine
        .confirm_deposit(&pid(punk), &outpoint(punk).to_string())
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Listing and cancel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_then_cancel_pending_triggers_no_refund() {
    let h = harness(0);
    listed(&h, 1, 5_000).await;

    let listing = h.registry.get_listing(&pid(1)).unwrap().unwrap();
    assert_eq!(listing.status, ListingStatus::Pending);
    assert_eq!(listing.price_sats, 5_000);
    assert_eq!(listing.escrow_address, ESCROW);

    let cancelled = h.engine.cancel(&pid(1), SELLER).await.unwrap();
    assert_eq!(cancelled.status, ListingStatus::Cancelled);

    // Pending cancel moves no funds.
    assert!(h.ark.sent().is_empty());

    let audit = h.registry.recent_audit(10).unwrap();
    assert!(audit.iter().any(|r| r.action == "LIST_CREATED"));
    assert!(audit.iter().any(|r| r.action == "LISTING_CANCELLED"));
}

#[tokio::test]
async fn listing_requires_ownership() {
    let h = harness(0);
    h.registry.record_punk(&pid(1), "tark1other", None, None).unwrap();

    let err = h.engine.create_listing(list_request(1, 5_000)).await.unwrap_err();
    assert!(matches!(err, EscrowError::Forbidden));
}

#[tokio::test]
async fn listing_unknown_punk_is_not_found() {
    let h = harness(0);
    let err = h.engine.create_listing(list_request(9, 5_000)).await.unwrap_err();
    assert!(matches!(err, EscrowError::NotFound));
}

#[tokio::test]
async fn duplicate_listing_is_conflict() {
    let h = harness(0);
    listed(&h, 1, 5_000).await;

    let err = h.engine.create_listing(list_request(1, 6_000)).await.unwrap_err();
    assert!(matches!(err, EscrowError::Conflict(_)));
}

#[tokio::test]
async fn cancel_by_non_seller_is_forbidden() {
    let h = harness(0);
    listed(&h, 1, 5_000).await;

    let err = h.engine.cancel(&pid(1), "tark1stranger").await.unwrap_err();
    assert!(matches!(err, EscrowError::Forbidden));
}

// ---------------------------------------------------------------------------
// Deposit verification
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exact_reserve_deposit_confirms() {
    let h = harness(0);
    listed(&h, 1, PRICE).await;
    h.ark.add_vtxo(outpoint(1), RESERVE);

    let listing = h
        .engine
        .confirm_deposit(&pid(1), &outpoint(1).to_string())
        .await
        .unwrap();
    assert_eq!(listing.status, ListingStatus::Deposited);
    assert_eq!(
        listing.punk_vtxo_outpoint.as_deref(),
        Some(outpoint(1).to_string().as_str())
    );

    let audit = h.registry.recent_audit(5).unwrap();
    let confirmed = audit.iter().find(|r| r.action == "DEPOSIT_CONFIRMED").unwrap();
    assert_eq!(confirmed.status, "SUCCESS");
    assert_eq!(confirmed.txid.as_deref(), Some(outpoint(1).to_string().as_str()));
}

#[tokio::test]
async fn wrong_amount_deposit_is_rejected() {
    let h = harness(0);
    listed(&h, 1, PRICE).await;
    h.ark.add_vtxo(outpoint(1), 9_000);

    let err = h
        .engine
        .confirm_deposit(&pid(1), &outpoint(1).to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, EscrowError::DepositUnverified(_)));

    // Status unchanged; the failure is audited.
    let listing = h.registry.get_listing(&pid(1)).unwrap().unwrap();
    assert_eq!(listing.status, ListingStatus::Pending);

    let audit = h.registry.recent_audit(5).unwrap();
    let failed = audit.iter().find(|r| r.action == "DEPOSIT_CONFIRMED").unwrap();
    assert_eq!(failed.status, "FAILED");
}

#[tokio::test]
async fn missing_outpoint_is_rejected() {
    let h = harness(0);
    listed(&h, 1, PRICE).await;

    let err = h
        .engine
        .confirm_deposit(&pid(1), &outpoint(7).to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, EscrowError::DepositUnverified(_)));
}

#[tokio::test]
async fn malformed_outpoint_is_invalid_argument() {
    let h = harness(0);
    listed(&h, 1, PRICE).await;

    let err = h.engine.confirm_deposit(&pid(1), "not-an-outpoint").await.unwrap_err();
    assert!(matches!(err, EscrowError::InvalidArgument(_)));
}

// ---------------------------------------------------------------------------
// Buy quote
// ---------------------------------------------------------------------------

#[tokio::test]
async fn quote_requires_deposited() {
    let h = harness(0);
    listed(&h, 1, PRICE).await;

    let err = h.engine.quote_buy(&buy_request(1)).await.unwrap_err();
    assert!(matches!(err, EscrowError::PreconditionFailed(_)));

    h.ark.add_vtxo(outpoint(1), RESERVE);
    h.engine
        .confirm_deposit(&pid(1), &outpoint(1).to_string())
        .await
        .unwrap();

    let quote = h.engine.quote_buy(&buy_request(1)).await.unwrap();
    assert_eq!(quote.price_sats, PRICE);
    assert_eq!(quote.escrow_address, ESCROW);
}

// ---------------------------------------------------------------------------
// Execute
// ---------------------------------------------------------------------------

#[tokio::test]
async fn execute_happy_path() {
    let h = harness(0);
    deposited(&h, 1, PRICE).await;
    h.ark.set_balance(PRICE); // buyer's payment arrived

    let result = h.engine.execute(buy_request(1)).await.unwrap();

    // Ownership moved at the commit point.
    assert_eq!(h.registry.owner_of(&pid(1)).unwrap().unwrap(), BUYER);
    assert_eq!(result.listing.status, ListingStatus::Sold);
    assert_eq!(result.payout_sats, PRICE);
    assert_eq!(result.fee_sats, 0);
    assert!(result.deposit_return_txid.is_some());

    // Seller got the full price and the reserve, in that order.
    assert_eq!(
        h.ark.sent(),
        vec![(SELLER.to_owned(), PRICE), (SELLER.to_owned(), RESERVE)]
    );

    // Sales row appended, two SUCCESS audit rows for the sale legs.
    assert_eq!(h.registry.all_sales().unwrap().len(), 1);
    let audit = h.registry.recent_audit(10).unwrap();
    let sale_rows: Vec<_> = audit
        .iter()
        .filter(|r| r.action == "SALE_COMPLETED" && r.status == "SUCCESS")
        .collect();
    assert_eq!(sale_rows.len(), 2);

    // History records seller -> buyer.
    let history = h.registry.history_of(&pid(1)).unwrap();
    assert_eq!(history.last().unwrap().from_address.as_deref(), Some(SELLER));
    assert_eq!(history.last().unwrap().to_address, BUYER);
}

#[tokio::test]
async fn execute_with_one_percent_fee() {
    let h = harness(1);
    deposited(&h, 1, PRICE).await;
    h.ark.set_balance(PRICE);

    let result = h.engine.execute(buy_request(1)).await.unwrap();
    assert_eq!(result.fee_sats, 100);
    assert_eq!(result.payout_sats, 9_900);
    assert_eq!(h.ark.sent()[0], (SELLER.to_owned(), 9_900));
}

#[tokio::test]
async fn execute_requires_escrow_balance() {
    let h = harness(0);
    deposited(&h, 1, PRICE).await;
    h.ark.set_balance(PRICE - 1);

    let err = h.engine.execute(buy_request(1)).await.unwrap_err();
    assert!(matches!(err, EscrowError::InsufficientFunds));

    // Nothing committed, nothing sent.
    assert_eq!(h.registry.owner_of(&pid(1)).unwrap().unwrap(), SELLER);
    assert!(h.ark.sent().is_empty());
}

#[tokio::test]
async fn execute_payment_failure_keeps_punk_sold() {
    // The commit precedes the payment: a failed payment never un-sells.
    let h = harness(0);
    deposited(&h, 1, PRICE).await;
    h.ark.set_balance(PRICE);
    h.ark.fail_sends(true);

    let err = h.engine.execute(buy_request(1)).await.unwrap_err();
    assert!(matches!(err, EscrowError::UpstreamFailure(_)));

    // The punk moved; the failure is a sentinel, not a rollback.
    assert_eq!(h.registry.owner_of(&pid(1)).unwrap().unwrap(), BUYER);
    let listing = h.registry.get_listing(&pid(1)).unwrap().unwrap();
    assert_eq!(listing.status, ListingStatus::Sold);
    assert!(
        listing
            .payment_txid
            .as_deref()
            .unwrap()
            .starts_with("PAYMENT_FAILED"),
    );

    let audit = h.registry.recent_audit(10).unwrap();
    let failed: Vec<_> = audit.iter().filter(|r| r.status == "FAILED").collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].action, "PAYMENT_FAILED");

    // A retry is refused: the payment was already attempted.
    h.ark.fail_sends(false);
    let err = h.engine.execute(buy_request(1)).await.unwrap_err();
    assert!(matches!(err, EscrowError::PreconditionFailed(_)));
}

#[tokio::test]
async fn execute_unknown_listing_is_not_found() {
    let h = harness(0);
    let err = h.engine.execute(buy_request(9)).await.unwrap_err();
    assert!(matches!(err, EscrowError::NotFound));
}

#[tokio::test]
async fn concurrent_executes_produce_one_sale() {
    // Two racing buyers: exactly one sale.
    let h = harness(0);
    deposited(&h, 1, PRICE).await;
    h.ark.set_balance(PRICE * 2);

    let first = h.engine.clone();
    let second = h.engine.clone();
    let (a, b) = tokio::join!(first.execute(buy_request(1)), second.execute(buy_request(1)));

    let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1, "exactly one execute must win");

    for result in [a, b] {
        if let Err(e) = result {
            assert!(matches!(e, EscrowError::PreconditionFailed(_)), "loser saw {e}");
        }
    }

    // One sale, one payment+reserve pair.
    assert_eq!(h.registry.all_sales().unwrap().len(), 1);
    assert_eq!(h.ark.sent().len(), 2);
}

// ---------------------------------------------------------------------------
// Cancel with refund
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_deposited_refunds_reserve() {
    let h = harness(0);
    deposited(&h, 1, PRICE).await;
    h.ark.set_balance(RESERVE);

    let cancelled = h.engine.cancel(&pid(1), SELLER).await.unwrap();
    assert_eq!(cancelled.status, ListingStatus::Cancelled);
    assert!(cancelled.deposit_return_txid.is_some());
    assert_eq!(h.ark.sent(), vec![(SELLER.to_owned(), RESERVE)]);
}

#[tokio::test]
async fn failed_refund_leaves_listing_deposited() {
    let h = harness(0);
    deposited(&h, 1, PRICE).await;
    h.ark.fail_sends(true);

    let err = h.engine.cancel(&pid(1), SELLER).await.unwrap_err();
    assert!(matches!(err, EscrowError::UpstreamFailure(_)));

    let listing = h.registry.get_listing(&pid(1)).unwrap().unwrap();
    assert_eq!(listing.status, ListingStatus::Deposited, "funds held, not lost");

    let audit = h.registry.recent_audit(5).unwrap();
    assert!(audit.iter().any(|r| r.action == "REFUND_FAILED" && r.status == "FAILED"));

    // The operator retries once the wallet recovers.
    h.ark.fail_sends(false);
    let cancelled = h.engine.cancel(&pid(1), SELLER).await.unwrap();
    assert_eq!(cancelled.status, ListingStatus::Cancelled);
}

#[tokio::test]
async fn cancel_after_terminal_is_precondition_failed() {
    let h = harness(0);
    listed(&h, 1, PRICE).await;
    h.engine.cancel(&pid(1), SELLER).await.unwrap();

    let err = h.engine.cancel(&pid(1), SELLER).await.unwrap_err();
    assert!(matches!(err, EscrowError::PreconditionFailed(_)));
}

// ---------------------------------------------------------------------------
// Reserve claim
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reserve_claim_pays_the_deficit() {
    let h = harness(0);
    h.registry.record_punk(&pid(1), "tark1wallet", None, None).unwrap();
    h.registry.record_punk(&pid(2), "tark1wallet", None, None).unwrap();
    h.ark.set_balance(100_000);

    // Two punks imply 20 000 sats reserve; the wallet reports 5 000.
    let result = h.engine.reserve_claim("tark1wallet", 5_000).await.unwrap();
    assert_eq!(result.paid_sats, 15_000);
    assert!(result.txid.is_some());

    // Whole again: a second claim is a no-op.
    let again = h.engine.reserve_claim("tark1wallet", 20_000).await.unwrap();
    assert_eq!(again.paid_sats, 0);
    assert!(again.txid.is_none());
}

#[tokio::test]
async fn reserve_claim_below_threshold_is_noop() {
    let h = harness(0);
    h.registry.record_punk(&pid(1), "tark1wallet", None, None).unwrap();

    // Deficit of 500 sats is under the 1 000 sat minimum.
    let result = h.engine.reserve_claim("tark1wallet", 9_500).await.unwrap();
    assert_eq!(result.paid_sats, 0);
}

#[tokio::test]
async fn reserve_claim_bounded_by_escrow_balance() {
    let h = harness(0);
    h.registry.record_punk(&pid(1), "tark1wallet", None, None).unwrap();
    h.ark.set_balance(0);

    let err = h.engine.reserve_claim("tark1wallet", 0).await.unwrap_err();
    assert!(matches!(err, EscrowError::InsufficientFunds));
}

// ---------------------------------------------------------------------------
// Info
// ---------------------------------------------------------------------------

#[tokio::test]
async fn escrow_info_is_static() {
    let h = harness(1);
    let info = h.engine.info();
    assert_eq!(info.escrow_address, ESCROW);
    assert_eq!(info.reserve_sats, RESERVE);
    assert_eq!(info.fee_percent, 1);
    assert_eq!(info.server_pubkey.len(), 64);
}
