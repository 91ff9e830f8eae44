//! Punk server configuration.
//!
//! This crate provides:
//!
//! - [`NetworkProfile`] -- static per-network operator endpoints
//! - [`ServerConfig`] -- deployment configuration sourced from environment
//!   variables at boot
//! - [`constants`] -- protocol-level parameters (supply cap, reserve, fees,
//!   deadlines)
//!
//! Profiles are compile-time constant (`&'static str`); the env-sourced
//! config is read once at startup and then immutable. The escrow signing
//! key in particular is never rotated at runtime -- changing it requires a
//! restart.

pub mod constants;

use std::env;
use std::fmt;

use punks_core::Network;

// ---------------------------------------------------------------------------
// NetworkProfile
// ---------------------------------------------------------------------------

/// Static endpoints for one network.
///
/// `Copy` -- just pointers to static data.
#[derive(Debug, Clone, Copy)]
pub struct NetworkProfile {
    /// The network this profile is for.
    pub network: Network,
    /// Ark operator base URL.
    pub ark_server_url: &'static str,
    /// Esplora block explorer base URL.
    pub esplora_url: &'static str,
}

impl NetworkProfile {
    /// Get the profile for a specific network.
    pub const fn for_network(network: Network) -> Self {
        match network {
            Network::Mainnet => Self::MAINNET,
            Network::Mutinynet => Self::MUTINYNET,
            Network::Regtest => Self::REGTEST,
        }
    }

    /// Production mainnet profile.
    pub const MAINNET: Self = Self {
        network: Network::Mainnet,
        ark_server_url: "https://ark.arkadeos.com",
        esplora_url: "https://blockstream.info/api",
    };

    /// Mutinynet signet profile (public test deployment).
    pub const MUTINYNET: Self = Self {
        network: Network::Mutinynet,
        ark_server_url: "https://mutinynet.arkade.sh",
        esplora_url: "https://mutinynet.com/api",
    };

    /// Local regtest profile.
    pub const REGTEST: Self = Self {
        network: Network::Regtest,
        ark_server_url: "http://localhost:7070",
        esplora_url: "http://localhost:3000",
    };
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Deployment configuration, sourced from the environment at boot.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Target network.
    pub network: Network,
    /// Ark operator base URL (profile default unless overridden).
    pub ark_server_url: String,
    /// Esplora base URL (profile default unless overridden).
    pub esplora_url: String,
    /// The escrow wallet's Ark address, if pre-derived.
    pub escrow_wallet_address: Option<String>,
    /// Escrow wallet signing key, 64 hex chars.
    pub escrow_wallet_private_key: Option<String>,
    /// Server authority signing key, 64 hex chars. Required.
    pub server_private_key: String,
    /// Password protecting the admin audit route. `None` disables it.
    pub admin_password: Option<String>,
    /// Supply cap.
    pub max_total_punks: u32,
    /// Reserve per punk VTXO, sats.
    pub reserve_sats: u64,
    /// Marketplace fee percentage.
    pub fee_percent: u64,
    /// HTTP listen address.
    pub listen_addr: String,
    /// Registry database path.
    pub database_path: String,
}

impl ServerConfig {
    /// Reads configuration from the environment.
    ///
    /// Recognised variables: `NETWORK`, `ARK_SERVER_URL`, `ESPLORA_URL`,
    /// `ESCROW_WALLET_ADDRESS`, `ESCROW_WALLET_PRIVATE_KEY`,
    /// `SERVER_PRIVATE_KEY`, `ADMIN_PASSWORD`, `MAX_TOTAL_PUNKS`,
    /// `RESERVE_SATS`, `FEE_PERCENT`, `LISTEN_ADDR`, `DATABASE_PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVar`] for an absent `SERVER_PRIVATE_KEY`
    /// and [`ConfigError::InvalidVar`] for unparseable values (unknown
    /// network name, non-hex keys, non-numeric limits).
    pub fn from_env() -> Result<Self, ConfigError> {
        let network = match env::var("NETWORK") {
            Ok(name) => Network::from_name(&name).ok_or(ConfigError::InvalidVar {
                name: "NETWORK",
                detail: "expected mainnet, mutinynet, or regtest",
            })?,
            Err(_) => Network::Mutinynet,
        };
        let profile = NetworkProfile::for_network(network);

        let server_private_key =
            env::var("SERVER_PRIVATE_KEY").map_err(|_| ConfigError::MissingVar("SERVER_PRIVATE_KEY"))?;
        validate_key_hex("SERVER_PRIVATE_KEY", &server_private_key)?;

        let escrow_wallet_private_key = env::var("ESCROW_WALLET_PRIVATE_KEY").ok();
        if let Some(ref key) = escrow_wallet_private_key {
            validate_key_hex("ESCROW_WALLET_PRIVATE_KEY", key)?;
        }

        Ok(Self {
            network,
            ark_server_url: env::var("ARK_SERVER_URL")
                .unwrap_or_else(|_| profile.ark_server_url.to_owned()),
            esplora_url: env::var("ESPLORA_URL")
                .unwrap_or_else(|_| profile.esplora_url.to_owned()),
            escrow_wallet_address: env::var("ESCROW_WALLET_ADDRESS").ok(),
            escrow_wallet_private_key,
            server_private_key,
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            max_total_punks: parse_var("MAX_TOTAL_PUNKS", constants::DEFAULT_MAX_TOTAL_PUNKS)?,
            reserve_sats: parse_var("RESERVE_SATS", constants::DEFAULT_RESERVE_SATS)?,
            fee_percent: parse_var("FEE_PERCENT", constants::DEFAULT_FEE_PERCENT)?,
            listen_addr: env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| constants::DEFAULT_LISTEN_ADDR.to_owned()),
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| constants::DEFAULT_DATABASE_PATH.to_owned()),
        })
    }
}

/// Parses a numeric env var, falling back to a default when unset.
fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidVar {
            name,
            detail: "expected an unsigned integer",
        }),
        Err(_) => Ok(default),
    }
}

/// Checks a signing key env value is 64 hex chars.
fn validate_key_hex(name: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.len() != 64 || hex::decode(value).is_err() {
        return Err(ConfigError::InvalidVar {
            name,
            detail: "expected 64 hex chars (32-byte key)",
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors from reading configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is absent.
    MissingVar(&'static str),
    /// A variable is present but unparseable.
    InvalidVar {
        /// Variable name.
        name: &'static str,
        /// What was expected.
        detail: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVar(name) => write!(f, "missing required env var {name}"),
            Self::InvalidVar { name, detail } => write!(f, "invalid env var {name}: {detail}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
