//! HTTP routes.

pub mod admin;
pub mod escrow;
pub mod marketplace;
pub mod punks;
pub mod wallet;

use axum::Router;
use axum::routing::{get, post};

use crate::state::SharedState;

/// Assembles the full router.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(punks::health))
        .route("/api/wallet/status", get(wallet::status))
        .route("/api/wallet/register", post(wallet::register))
        .route("/api/wallet/recover", post(wallet::recover))
        .route("/api/punks", get(punks::all_punks))
        .route("/api/punks/owner", get(punks::punks_by_owner))
        .route("/api/punks/address", get(punks::punk_address))
        .route("/api/supply", get(punks::supply))
        .route("/api/escrow/list", post(escrow::create_listing))
        .route("/api/escrow/info", get(escrow::info))
        .route("/api/escrow/listings", get(escrow::active_listings))
        .route("/api/escrow/update-outpoint", post(escrow::update_outpoint))
        .route("/api/escrow/buy", post(escrow::buy_quote))
        .route("/api/escrow/execute", post(escrow::execute))
        .route("/api/escrow/cancel", post(escrow::cancel))
        .route("/api/escrow/reserve-claim", post(escrow::reserve_claim))
        .route("/api/marketplace/sales", get(marketplace::sales))
        .route("/api/admin/audit", get(admin::audit))
        .with_state(state)
}
