//! Marketplace feed: completed sales plus aggregate stats.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use registry::{SaleRecord, SalesStats};

use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDto {
    pub punk_id: String,
    pub price_sats: u64,
    pub seller: String,
    pub buyer: String,
    pub sold_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_txid: Option<String>,
}

impl From<SaleRecord> for SaleDto {
    fn from(record: SaleRecord) -> Self {
        Self {
            punk_id: record.punk_id.to_hex(),
            price_sats: record.price_sats,
            seller: record.seller,
            buyer: record.buyer,
            sold_at: record.sold_at,
            payment_txid: record.payment_txid,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesResponse {
    pub sales: Vec<SaleDto>,
    pub stats: SalesStats,
}

/// `GET /api/marketplace/sales`
pub async fn sales(State(state): State<SharedState>) -> Result<Json<SalesResponse>, ApiError> {
    let sales = state.registry.all_sales()?;
    let stats = state.registry.sales_stats()?;
    Ok(Json(SalesResponse {
        sales: sales.into_iter().map(SaleDto::from).collect(),
        stats,
    }))
}
