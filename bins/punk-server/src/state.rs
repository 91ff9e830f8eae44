//! Shared application state.

use std::sync::Arc;

use escrow::{EscrowEngine, RestArkClient};
use registry::Registry;

/// State held by the API handlers.
///
/// Wrapped in an [`Arc`] and passed to handlers via axum's `State`
/// extractor.
pub struct AppState {
    /// Escrow engine (owns the Ark wallet client).
    pub engine: EscrowEngine<RestArkClient>,
    /// Registry handle for read paths that bypass the engine.
    pub registry: Arc<Registry>,
    /// Password for the admin audit route; `None` disables it.
    pub admin_password: Option<String>,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
