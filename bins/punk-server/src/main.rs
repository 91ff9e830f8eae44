//! Punk server binary.
//!
//! Boots the registry, the escrow engine, and the HTTP surface:
//!
//! 1. Reads [`ServerConfig`] from the environment
//! 2. Initialises the server signing authority (never rotated at runtime)
//! 3. Opens the SQLite registry with the legacy whitelist
//! 4. Connects the escrow wallet client to the Ark operator
//! 5. Serves the API with graceful shutdown on ctrl-c
//!
//! ```bash
//! SERVER_PRIVATE_KEY=<64 hex> NETWORK=mutinynet RUST_LOG=info punk-server
//! ```

mod error;
mod routes;
mod state;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use config::{ServerConfig, constants};
use escrow::{EscrowConfig, EscrowEngine, RestArkClient};
use punks_core::{PunkId, encode_ark_address};
use registry::Registry;
use signer::{SchnorrServerSigner, ServerSigner};
use state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = run().await {
        tracing::error!(%e, "fatal error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    // -----------------------------------------------------------------------
    // Configuration and signing authority
    // -----------------------------------------------------------------------

    let config = ServerConfig::from_env().map_err(|e| e.to_string())?;
    tracing::info!(network = %config.network, "punk-server starting");

    let server_signer = Arc::new(
        SchnorrServerSigner::from_secret_hex(&config.server_private_key)
            .map_err(|e| format!("SERVER_PRIVATE_KEY: {e}"))?,
    );
    let server_pubkey = server_signer.server_pubkey();
    tracing::info!(
        server_pubkey = hex::encode(server_pubkey.serialize()),
        "signing authority ready"
    );

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    let whitelist = parse_whitelist(constants::LEGACY_WHITELIST)?;
    if let Some(parent) = std::path::Path::new(&config.database_path).parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("create {}: {e}", parent.display()))?;
    }
    let registry = Arc::new(
        Registry::open(
            &config.database_path,
            server_signer,
            config.max_total_punks,
            &whitelist,
        )
        .map_err(|e| format!("open registry: {e}"))?,
    );

    // -----------------------------------------------------------------------
    // Escrow wallet and engine
    // -----------------------------------------------------------------------

    // Without a pre-derived escrow address the escrow wallet sits at the
    // server key's own key-path address.
    let escrow_address = config.escrow_wallet_address.clone().unwrap_or_else(|| {
        encode_ark_address(config.network, &server_pubkey.serialize())
    });
    tracing::info!(%escrow_address, ark_server = config.ark_server_url, "escrow wallet");

    let mut ark = RestArkClient::new(&config.ark_server_url, &escrow_address);
    if let Some(key) = &config.escrow_wallet_private_key {
        ark = ark.with_wallet_key(key);
    }

    let cancel = CancellationToken::new();
    let engine = EscrowEngine::new(
        EscrowConfig {
            network: config.network,
            escrow_address,
            reserve_sats: config.reserve_sats,
            fee_percent: config.fee_percent,
        },
        Arc::clone(&registry),
        ark,
        cancel.clone(),
    );

    // -----------------------------------------------------------------------
    // HTTP surface
    // -----------------------------------------------------------------------

    let app_state = Arc::new(AppState {
        engine,
        registry,
        admin_password: config.admin_password.clone(),
    });
    let app = routes::build_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| format!("bind {}: {e}", config.listen_addr))?;
    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await
        .map_err(|e| format!("server error: {e}"))?;

    tracing::info!("punk-server stopped");
    Ok(())
}

/// Parses the compiled-in whitelist, failing boot on a malformed entry.
fn parse_whitelist(entries: &[&str]) -> Result<Vec<PunkId>, String> {
    entries
        .iter()
        .map(|s| PunkId::from_hex(s).map_err(|e| format!("legacy whitelist entry {s}: {e}")))
        .collect()
}

/// Resolves on ctrl-c; flips the cancellation token so in-flight engine
/// operations refuse new work while axum drains connections.
async fn shutdown_signal(cancel: CancellationToken) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiled_whitelist_parses() {
        let parsed = parse_whitelist(constants::LEGACY_WHITELIST).unwrap();
        assert_eq!(parsed.len(), constants::LEGACY_WHITELIST.len());
    }
}
