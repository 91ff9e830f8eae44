//! Protocol-level constants.
//!
//! These define protocol parameters for supply, reserves, and operational
//! bounds. Deployment-specific values (URLs, keys) live in
//! [`ServerConfig`](crate::ServerConfig) instead.

/// Hard cap on the number of punks that can ever be recorded.
pub const DEFAULT_MAX_TOTAL_PUNKS: u32 = 2016;

/// Reserve carried by every punk VTXO, in satoshis.
pub const DEFAULT_RESERVE_SATS: u64 = 10_000;

/// Marketplace fee percentage applied at sale time.
pub const DEFAULT_FEE_PERCENT: u64 = 0;

/// Minimum payout per wallet for the reserve-claim repair operation.
///
/// Claims below this are noise relative to Ark dust limits and are skipped.
pub const MIN_RESERVE_CLAIM_SATS: u64 = 1_000;

/// Hard deadline on outbound escrow wallet sends, in milliseconds.
///
/// A send that exceeds this is treated as failed and never retried inside
/// the request (retrying a possibly-landed send risks a double spend).
pub const SEND_DEADLINE_MS: u64 = 30_000;

/// Default HTTP listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3080";

/// Default registry database path.
pub const DEFAULT_DATABASE_PATH: &str = "./data/punks.db";

/// Boot-time whitelist of pre-signature punk ids considered official.
///
/// These rows predate the attestation scheme; they are official despite
/// carrying no server signature. The list is frozen -- additions would
/// mint official punks by fiat.
pub const LEGACY_WHITELIST: &[&str] = &[
    "b5939746f8b2e4f466a218f6cd6846c844365d4a4e1b2919ba27b90c47ed0f12",
    "1de36481d31f71e812b7480e9f8e2c2c8ba8c9f08f08a22f5ce4d3a5eb7aa102",
    "7a4ae2dbf0ea1a7b3e0f61c2bc8fe4d92c7e7e37cbf0ae55f366c4c8aab39d55",
    "43d11346a5a53fd2b0f14cbb258b9fbb2c2e2b6e8566e89e34af17e9a5b01c3e",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelist_entries_are_punk_ids() {
        for entry in LEGACY_WHITELIST {
            assert_eq!(entry.len(), 64, "{entry} is not a 32-byte hex id");
            assert!(entry.bytes().all(|b| b.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn fee_and_reserve_defaults() {
        assert_eq!(DEFAULT_FEE_PERCENT, 0);
        assert_eq!(DEFAULT_RESERVE_SATS, 10_000);
        assert_eq!(DEFAULT_MAX_TOTAL_PUNKS, 2016);
    }
}
