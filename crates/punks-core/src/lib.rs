//! Core types and utilities for the Ark Punks protocol.
//!
//! This crate provides foundational types used across the workspace:
//!
//! - [`Network`] -- Ark network identifier (Mainnet, Mutinynet, Regtest)
//! - [`PunkId`] -- 32-byte punk identifier (SHA-256 of the canonical payload)
//! - [`VtxoOutpoint`] -- `txid:vout` reference to a virtual UTXO
//! - [`ArkAddress`] -- Bech32m-encoded Taproot output key address

pub mod ark_address;

pub use ark_address::{ArkAddress, ArkAddressError, decode_ark_address, encode_ark_address};

use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Ark network identifier.
///
/// Determines the human-readable prefix (HRP) used in Ark addresses and
/// which operator endpoints the server communicates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    /// Bitcoin mainnet.
    Mainnet,

    /// Mutinynet signet (public test deployment).
    Mutinynet,

    /// Local regtest.
    Regtest,
}

impl Network {
    /// Parses a network from its configuration name.
    ///
    /// Accepted values: `mainnet`, `mutinynet`, `regtest`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "mainnet" => Some(Self::Mainnet),
            "mutinynet" => Some(Self::Mutinynet),
            "regtest" => Some(Self::Regtest),
            _ => None,
        }
    }

    /// The configuration name of this network.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Mutinynet => "mutinynet",
            Self::Regtest => "regtest",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// PunkId
// ---------------------------------------------------------------------------

/// Permanent identity of a punk: SHA-256 over the canonical six-byte payload.
///
/// Stable across VTXO refreshes and ownership transfers. Rendered as 64
/// lowercase hex characters everywhere a punk is referenced externally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PunkId(pub [u8; 32]);

impl PunkId {
    /// Wraps a 32-byte digest.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw digest bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parses a punk id from 64 hex characters.
    pub fn from_hex(s: &str) -> Result<Self, PunkIdError> {
        if s.len() != 64 {
            return Err(PunkIdError::BadLength(s.len()));
        }
        let bytes = hex::decode(s).map_err(|_| PunkIdError::BadHex)?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }

    /// Returns the lowercase hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Hex displays allocate nothing beyond the formatter's buffer.
impl fmt::Display for PunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for PunkId {
    type Err = PunkIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Errors from parsing a [`PunkId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PunkIdError {
    /// Input was not 64 characters.
    BadLength(usize),
    /// Input contained non-hex characters.
    BadHex,
}

impl fmt::Display for PunkIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadLength(n) => write!(f, "punk id must be 64 hex chars, got {n}"),
            Self::BadHex => write!(f, "punk id contains non-hex characters"),
        }
    }
}

impl std::error::Error for PunkIdError {}

// ---------------------------------------------------------------------------
// VtxoOutpoint
// ---------------------------------------------------------------------------

/// Reference to a virtual UTXO: transaction id plus output index.
///
/// The text form is `txid:vout` with the txid as 64 lowercase hex chars.
/// Outpoints are volatile -- Ark refresh rounds rewrite them for still
/// unspent VTXOs -- so they serve only as a verification hint at deposit
/// time. Punk identity is always the [`PunkId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VtxoOutpoint {
    /// Hex-encoded transaction id (64 chars, lowercase).
    pub txid: String,
    /// Output index.
    pub vout: u32,
}

impl VtxoOutpoint {
    /// Builds an outpoint from its parts, normalising the txid to lowercase.
    pub fn new(txid: &str, vout: u32) -> Result<Self, OutpointError> {
        if txid.len() != 64 || !txid.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(OutpointError::BadTxid);
        }
        Ok(Self {
            txid: txid.to_ascii_lowercase(),
            vout,
        })
    }

    /// Parses the `txid:vout` text form.
    pub fn parse(s: &str) -> Result<Self, OutpointError> {
        let (txid, vout) = s.rsplit_once(':').ok_or(OutpointError::MissingSeparator)?;
        let vout: u32 = vout.parse().map_err(|_| OutpointError::BadVout)?;
        Self::new(txid, vout)
    }
}

impl fmt::Display for VtxoOutpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

impl FromStr for VtxoOutpoint {
    type Err = OutpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Errors from parsing a [`VtxoOutpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutpointError {
    /// No `:` separator in the text form.
    MissingSeparator,
    /// The txid part is not 64 hex characters.
    BadTxid,
    /// The vout part is not a u32.
    BadVout,
}

impl fmt::Display for OutpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSeparator => write!(f, "outpoint must be txid:vout"),
            Self::BadTxid => write!(f, "outpoint txid must be 64 hex chars"),
            Self::BadVout => write!(f, "outpoint vout is not a valid u32"),
        }
    }
}

impl std::error::Error for OutpointError {}

// ---------------------------------------------------------------------------
// X-only pubkey parsing
// ---------------------------------------------------------------------------

/// Decodes a 32-byte x-only public key from 64 hex characters.
///
/// Returns `None` on wrong length or non-hex input. Curve validity is
/// checked where the key is actually used (script construction, signature
/// verification); this helper only handles the wire form.
pub fn parse_xonly_hex(s: &str) -> Option<[u8; 32]> {
    if s.len() != 64 {
        return None;
    }
    let bytes = hex::decode(s).ok()?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Some(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_names_round_trip() {
        for network in [Network::Mainnet, Network::Mutinynet, Network::Regtest] {
            assert_eq!(Network::from_name(network.name()), Some(network));
        }
        assert_eq!(Network::from_name("signet"), None);
    }

    #[test]
    fn punk_id_hex_round_trip() {
        let id = PunkId::from_bytes([0xab; 32]);
        let hex_str = id.to_hex();
        assert_eq!(hex_str.len(), 64);
        assert_eq!(PunkId::from_hex(&hex_str).unwrap(), id);
        assert_eq!(id.to_string(), hex_str);
    }

    #[test]
    fn punk_id_rejects_bad_input() {
        assert_eq!(PunkId::from_hex("abcd"), Err(PunkIdError::BadLength(4)));
        let bad = "zz".repeat(32);
        assert_eq!(PunkId::from_hex(&bad), Err(PunkIdError::BadHex));
    }

    #[test]
    fn outpoint_text_round_trip() {
        let txid = "aa".repeat(32);
        let op = VtxoOutpoint::new(&txid, 7).unwrap();
        let text = op.to_string();
        assert_eq!(text, format!("{txid}:7"));
        assert_eq!(VtxoOutpoint::parse(&text).unwrap(), op);
    }

    #[test]
    fn outpoint_normalises_case() {
        let txid_upper = "AB".repeat(32);
        let op = VtxoOutpoint::new(&txid_upper, 0).unwrap();
        assert_eq!(op.txid, "ab".repeat(32));
    }

    #[test]
    fn outpoint_rejects_malformed() {
        assert_eq!(
            VtxoOutpoint::parse("deadbeef"),
            Err(OutpointError::MissingSeparator)
        );
        assert_eq!(
            VtxoOutpoint::parse("deadbeef:0"),
            Err(OutpointError::BadTxid)
        );
        let txid = "aa".repeat(32);
        assert_eq!(
            VtxoOutpoint::parse(&format!("{txid}:x")),
            Err(OutpointError::BadVout)
        );
    }

    #[test]
    fn parse_xonly_hex_checks_length() {
        assert!(parse_xonly_hex(&"ab".repeat(32)).is_some());
        assert!(parse_xonly_hex("abcd").is_none());
        assert!(parse_xonly_hex(&"zz".repeat(32)).is_none());
    }
}
