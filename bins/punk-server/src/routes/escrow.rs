//! Escrow marketplace routes.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use escrow::{BuyRequest, ListRequest};
use registry::ListingRecord;

use crate::error::ApiError;
use crate::routes::wallet::parse_punk_id;
use crate::state::SharedState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Wire form of a listing row.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDto {
    pub punk_id: String,
    pub seller_address: String,
    pub seller_pubkey: String,
    pub price_sats: u64,
    pub status: String,
    pub escrow_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub punk_vtxo_outpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_metadata: Option<String>,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposited_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sold_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_txid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit_return_txid: Option<String>,
}

impl From<ListingRecord> for ListingDto {
    fn from(record: ListingRecord) -> Self {
        Self {
            punk_id: record.punk_id.to_hex(),
            seller_address: record.seller_address,
            seller_pubkey: record.seller_pubkey,
            price_sats: record.price_sats,
            status: record.status.as_str().to_owned(),
            escrow_address: record.escrow_address,
            punk_vtxo_outpoint: record.punk_vtxo_outpoint,
            compressed_metadata: record.compressed_metadata,
            created_at: record.created_at,
            deposited_at: record.deposited_at,
            sold_at: record.sold_at,
            cancelled_at: record.cancelled_at,
            buyer_address: record.buyer_address,
            payment_txid: record.payment_txid,
            deposit_return_txid: record.deposit_return_txid,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingRequest {
    pub punk_id: String,
    pub seller_pubkey: String,
    pub seller_ark_address: String,
    pub price: u64,
    pub compressed_metadata: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutpointRequest {
    pub punk_id: String,
    pub punk_vtxo_outpoint: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyBody {
    pub punk_id: String,
    pub buyer_pubkey: String,
    pub buyer_ark_address: String,
    /// Optional payment txid reported by the buyer's wallet.
    pub payment_txid: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub punk_id: String,
    pub seller_address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveClaimRequest {
    pub wallet_address: String,
    pub wallet_balance_sats: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EscrowInfoDto {
    pub escrow_address: String,
    pub server_pubkey: String,
    pub reserve_sats: u64,
    pub fee_percent: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyQuoteDto {
    pub punk_id: String,
    pub price_sats: u64,
    pub escrow_address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteDto {
    pub listing: ListingDto,
    pub payment_txid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit_return_txid: Option<String>,
    pub fee_sats: u64,
    pub payout_sats: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveClaimDto {
    pub paid_sats: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
}

impl BuyBody {
    fn into_request(self) -> Result<BuyRequest, ApiError> {
        Ok(BuyRequest {
            punk_id: parse_punk_id(&self.punk_id)?,
            buyer_pubkey: self.buyer_pubkey,
            buyer_address: self.buyer_ark_address,
            payment_txid: self.payment_txid,
        })
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `POST /api/escrow/list`
pub async fn create_listing(
    State(state): State<SharedState>,
    Json(body): Json<CreateListingRequest>,
) -> Result<Json<ListingDto>, ApiError> {
    let listing = state
        .engine
        .create_listing(ListRequest {
            punk_id: parse_punk_id(&body.punk_id)?,
            seller_pubkey: body.seller_pubkey,
            seller_address: body.seller_ark_address,
            price_sats: body.price,
            compressed_metadata: body.compressed_metadata,
        })
        .await?;
    Ok(Json(listing.into()))
}

/// `GET /api/escrow/info`
pub async fn info(State(state): State<SharedState>) -> Json<EscrowInfoDto> {
    let info = state.engine.info();
    Json(EscrowInfoDto {
        escrow_address: info.escrow_address,
        server_pubkey: info.server_pubkey,
        reserve_sats: info.reserve_sats,
        fee_percent: info.fee_percent,
    })
}

/// `GET /api/escrow/listings`
pub async fn active_listings(
    State(state): State<SharedState>,
) -> Result<Json<Vec<ListingDto>>, ApiError> {
    let listings = state.registry.active_listings()?;
    Ok(Json(listings.into_iter().map(ListingDto::from).collect()))
}

/// `POST /api/escrow/update-outpoint`
pub async fn update_outpoint(
    State(state): State<SharedState>,
    Json(body): Json<UpdateOutpointRequest>,
) -> Result<Json<ListingDto>, ApiError> {
    let punk_id = parse_punk_id(&body.punk_id)?;
    let listing = state
        .engine
        .confirm_deposit(&punk_id, &body.punk_vtxo_outpoint)
        .await?;
    Ok(Json(listing.into()))
}

/// `POST /api/escrow/buy`
pub async fn buy_quote(
    State(state): State<SharedState>,
    Json(body): Json<BuyBody>,
) -> Result<Json<BuyQuoteDto>, ApiError> {
    let quote = state.engine.quote_buy(&body.into_request()?).await?;
    Ok(Json(BuyQuoteDto {
        punk_id: quote.punk_id.to_hex(),
        price_sats: quote.price_sats,
        escrow_address: quote.escrow_address,
    }))
}

/// `POST /api/escrow/execute`
pub async fn execute(
    State(state): State<SharedState>,
    Json(body): Json<BuyBody>,
) -> Result<Json<ExecuteDto>, ApiError> {
    let result = state.engine.execute(body.into_request()?).await?;
    Ok(Json(ExecuteDto {
        listing: result.listing.into(),
        payment_txid: result.payment_txid,
        deposit_return_txid: result.deposit_return_txid,
        fee_sats: result.fee_sats,
        payout_sats: result.payout_sats,
    }))
}

/// `POST /api/escrow/cancel`
pub async fn cancel(
    State(state): State<SharedState>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<ListingDto>, ApiError> {
    let punk_id = parse_punk_id(&body.punk_id)?;
    let listing = state.engine.cancel(&punk_id, &body.seller_address).await?;
    Ok(Json(listing.into()))
}

/// `POST /api/escrow/reserve-claim`
pub async fn reserve_claim(
    State(state): State<SharedState>,
    Json(body): Json<ReserveClaimRequest>,
) -> Result<Json<ReserveClaimDto>, ApiError> {
    let result = state
        .engine
        .reserve_claim(&body.wallet_address, body.wallet_balance_sats)
        .await?;
    Ok(Json(ReserveClaimDto {
        paid_sats: result.paid_sats,
        txid: result.txid,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_body_parses_and_validates() {
        let json = format!(
            r#"{{"punkId":"{}","buyerPubkey":"{}","buyerArkAddress":"tark1buyer"}}"#,
            "ab".repeat(32),
            "cd".repeat(32),
        );
        let body: BuyBody = serde_json::from_str(&json).unwrap();
        let req = body.into_request().unwrap();
        assert_eq!(req.buyer_address, "tark1buyer");
        assert!(req.payment_txid.is_none());

        let bad: BuyBody = serde_json::from_str(
            r#"{"punkId":"xy","buyerPubkey":"k","buyerArkAddress":"a"}"#,
        )
        .unwrap();
        assert!(bad.into_request().is_err());
    }

    #[test]
    fn listing_dto_omits_empty_fields() {
        use punks_core::PunkId;
        use registry::ListingStatus;

        let dto: ListingDto = ListingRecord {
            punk_id: PunkId::from_bytes([1; 32]),
            seller_address: "s".into(),
            seller_pubkey: "pk".into(),
            price_sats: 5_000,
            status: ListingStatus::Pending,
            escrow_address: "e".into(),
            punk_vtxo_outpoint: None,
            compressed_metadata: None,
            created_at: 1,
            deposited_at: None,
            sold_at: None,
            cancelled_at: None,
            buyer_address: None,
            buyer_pubkey: None,
            payment_txid: None,
            deposit_return_txid: None,
        }
        .into();

        let json = serde_json::to_string(&dto).unwrap();
        assert!(json.contains(r#""status":"pending""#));
        assert!(!json.contains("punkVtxoOutpoint"));
        assert!(!json.contains("paymentTxid"));
    }
}
