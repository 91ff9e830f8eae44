//! Registry read routes: punks, supply, health.

use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use registry::PunkRecord;

use crate::error::ApiError;
use crate::state::SharedState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Wire form of a registry punk row.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PunkDto {
    pub punk_id: String,
    pub owner_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_metadata: Option<String>,
    /// Traits decoded from the six-byte payload, when it is present and
    /// consistent with the punk id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traits: Option<TraitsDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_signature: Option<String>,
    pub official: bool,
    pub minted_at: i64,
    pub updated_at: i64,
}

/// Decoded visual traits.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraitsDto {
    #[serde(rename = "type")]
    pub punk_type: &'static str,
    pub background: &'static str,
    pub attributes: Vec<&'static str>,
}

pub(crate) fn punk_to_dto(state: &SharedState, record: PunkRecord) -> PunkDto {
    let official = state
        .registry
        .is_official(&record.punk_id)
        .unwrap_or(false);
    let traits = record.compressed.and_then(|payload| {
        codec::decode_verified(&payload, &record.punk_id)
            .ok()
            .map(|m| TraitsDto {
                punk_type: m.punk_type().name(),
                background: m.background_name(),
                attributes: m.attribute_names(),
            })
    });
    PunkDto {
        punk_id: record.punk_id.to_hex(),
        owner_address: record.owner_address,
        compressed_metadata: record.compressed.map(hex::encode),
        traits,
        server_signature: record.server_signature,
        official,
        minted_at: record.minted_at,
        updated_at: record.updated_at,
    }
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressQuery {
    /// Owner x-only pubkey, 64 hex chars.
    pub owner_pubkey: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressResponse {
    pub address: String,
    pub owner_pubkey: String,
    pub server_pubkey: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyResponse {
    pub total_minted: u32,
    pub max_punks: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub total_minted: u32,
    pub max_punks: u32,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`
pub async fn health(State(state): State<SharedState>) -> Result<Json<HealthResponse>, ApiError> {
    Ok(Json(HealthResponse {
        status: "ok",
        total_minted: state.registry.punk_count()?,
        max_punks: state.registry.max_total_punks(),
    }))
}

/// `GET /api/punks`
pub async fn all_punks(State(state): State<SharedState>) -> Result<Json<Vec<PunkDto>>, ApiError> {
    let rows = state.registry.all_punks()?;
    Ok(Json(
        rows.into_iter().map(|r| punk_to_dto(&state, r)).collect(),
    ))
}

/// `GET /api/punks/owner?address=...`
pub async fn punks_by_owner(
    State(state): State<SharedState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<PunkDto>>, ApiError> {
    let rows = state.registry.punks_by_owner(&query.address)?;
    Ok(Json(
        rows.into_iter().map(|r| punk_to_dto(&state, r)).collect(),
    ))
}

/// `GET /api/supply`
pub async fn supply(State(state): State<SharedState>) -> Result<Json<SupplyResponse>, ApiError> {
    Ok(Json(SupplyResponse {
        total_minted: state.registry.punk_count()?,
        max_punks: state.registry.max_total_punks(),
    }))
}

/// `GET /api/punks/address?ownerPubkey=...`
///
/// Derives the Taproot address a punk owned by this key sits at. Pure
/// function of `(owner, server)` -- wallets call it to know where their
/// punk VTXO must live before minting or after a transfer.
pub async fn punk_address(
    State(state): State<SharedState>,
    Query(query): Query<AddressQuery>,
) -> Result<Json<AddressResponse>, ApiError> {
    let owner_bytes = punks_core::parse_xonly_hex(&query.owner_pubkey)
        .ok_or_else(|| ApiError::invalid("ownerPubkey must be 64 hex chars"))?;
    let owner = signer::ServerPubkey::from_slice(&owner_bytes)
        .map_err(|_| ApiError::invalid("ownerPubkey is not a valid x-only key"))?;

    let server = state.registry.server_pubkey();
    let address = script::punk_address(state.engine.network(), &owner, &server)
        .map_err(|e| ApiError::invalid(e.to_string()))?;

    Ok(Json(AddressResponse {
        address: address.encode(),
        owner_pubkey: query.owner_pubkey,
        server_pubkey: hex::encode(server.serialize()),
    }))
}
