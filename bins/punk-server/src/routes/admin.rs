//! Admin routes, password-gated.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use registry::AuditEntry;

use crate::error::ApiError;
use crate::state::SharedState;

/// Header carrying the admin password.
const ADMIN_PASSWORD_HEADER: &str = "x-admin-password";

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    /// Max rows to return (default 100).
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditDto {
    pub id: i64,
    pub timestamp: i64,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub punk_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_sats: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<AuditEntry> for AuditDto {
    fn from(entry: AuditEntry) -> Self {
        let details = entry
            .details_json
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());
        Self {
            id: entry.id,
            timestamp: entry.timestamp,
            action: entry.action,
            punk_id: entry.punk_id,
            seller: entry.seller,
            buyer: entry.buyer,
            amount_sats: entry.amount_sats,
            txid: entry.txid,
            status: entry.status,
            error: entry.error,
            details,
        }
    }
}

/// `GET /api/admin/audit`
///
/// Requires the configured password in the `x-admin-password` header.
/// With no password configured the route is disabled outright.
pub async fn audit(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditDto>>, ApiError> {
    let Some(expected) = state.admin_password.as_deref() else {
        return Err(ApiError::forbidden());
    };
    let supplied = headers
        .get(ADMIN_PASSWORD_HEADER)
        .and_then(|v| v.to_str().ok());
    if supplied != Some(expected) {
        return Err(ApiError::forbidden());
    }

    let limit = query.limit.unwrap_or(100).min(1_000);
    let rows = state.registry.recent_audit(limit)?;
    Ok(Json(rows.into_iter().map(AuditDto::from).collect()))
}
