//! Wallet routes: status, registration, legacy recovery.

use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use punks_core::PunkId;
use registry::{RegisterOutcome, RegisterSummary, WalletPunk};

use crate::error::ApiError;
use crate::routes::punks::{PunkDto, punk_to_dto};
use crate::state::SharedState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub address: String,
    pub is_registered: bool,
    pub punk_count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub address: String,
    /// Declared alternate address of the same wallet (e.g. its on-chain
    /// form); punks recorded under it migrate to `address`.
    pub bitcoin_address: Option<String>,
    pub punks: Vec<RegisterPunkDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPunkDto {
    pub punk_id: String,
    /// Claimed mint time, seconds since epoch.
    pub mint_date: Option<i64>,
    /// Six-byte payload, 12 hex chars.
    pub compressed_metadata: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub summary: RegisterSummary,
    pub results: Vec<RegisterOutcome>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoverRequest {
    pub minter_pubkey: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoverResponse {
    pub available: Vec<PunkDto>,
    pub claimed: Vec<PunkDto>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /api/wallet/status?address=...`
pub async fn status(
    State(state): State<SharedState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    let punk_count = state.registry.punks_by_owner(&query.address)?.len();
    Ok(Json(StatusResponse {
        address: query.address,
        is_registered: punk_count > 0,
        punk_count,
    }))
}

/// `POST /api/wallet/register`
pub async fn register(
    State(state): State<SharedState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    if body.address.is_empty() {
        return Err(ApiError::invalid("address is empty"));
    }

    let mut punks = Vec::with_capacity(body.punks.len());
    for dto in &body.punks {
        punks.push(WalletPunk {
            punk_id: parse_punk_id(&dto.punk_id)?,
            mint_date: dto.mint_date,
            compressed: parse_compressed(dto.compressed_metadata.as_deref())?,
        });
    }

    let alternates: Vec<String> = body.bitcoin_address.clone().into_iter().collect();
    let (summary, results) = state
        .registry
        .register_wallet(&body.address, &alternates, &punks)?;

    Ok(Json(RegisterResponse { summary, results }))
}

/// `POST /api/wallet/recover`
pub async fn recover(
    State(state): State<SharedState>,
    Json(body): Json<RecoverRequest>,
) -> Result<Json<RecoverResponse>, ApiError> {
    if body.minter_pubkey.is_empty() {
        return Err(ApiError::invalid("minterPubkey is empty"));
    }

    let (available, claimed) = state.registry.recover_by_minter(&body.minter_pubkey)?;
    Ok(Json(RecoverResponse {
        available: available
            .into_iter()
            .map(|r| punk_to_dto(&state, r))
            .collect(),
        claimed: claimed
            .into_iter()
            .map(|r| punk_to_dto(&state, r))
            .collect(),
    }))
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

pub(crate) fn parse_punk_id(hex_str: &str) -> Result<PunkId, ApiError> {
    PunkId::from_hex(hex_str).map_err(|e| ApiError::invalid(format!("punkId: {e}")))
}

fn parse_compressed(hex_str: Option<&str>) -> Result<Option<[u8; 6]>, ApiError> {
    let Some(hex_str) = hex_str else {
        return Ok(None);
    };
    let bytes = hex::decode(hex_str)
        .map_err(|_| ApiError::invalid("compressedMetadata is not hex"))?;
    let fixed: [u8; 6] = bytes
        .try_into()
        .map_err(|_| ApiError::invalid("compressedMetadata must be 6 bytes"))?;
    Ok(Some(fixed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_parses_camel_case() {
        let json = r#"{
            "address": "tark1wallet",
            "bitcoinAddress": "bc1punk",
            "punks": [
                {"punkId": "ab", "mintDate": 1700000000, "compressedMetadata": "6c0700000003"}
            ]
        }"#;
        let req: RegisterRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.address, "tark1wallet");
        assert_eq!(req.bitcoin_address.as_deref(), Some("bc1punk"));
        assert_eq!(req.punks[0].mint_date, Some(1_700_000_000));
    }

    #[test]
    fn compressed_metadata_must_be_six_bytes() {
        assert!(parse_compressed(Some("6c0700000003")).unwrap().is_some());
        assert!(parse_compressed(None).unwrap().is_none());
        assert!(parse_compressed(Some("6c07")).is_err());
        assert!(parse_compressed(Some("zz0700000003")).is_err());
    }

    #[test]
    fn punk_id_must_be_32_bytes() {
        assert!(parse_punk_id(&"ab".repeat(32)).is_ok());
        assert!(parse_punk_id("ab").is_err());
    }
}
