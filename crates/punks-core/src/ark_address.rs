//! Ark Address Encoding and Decoding
//!
//! Ark addresses are human-readable identifiers for Taproot outputs on the
//! Ark virtual layer, using Bech32m encoding.
//!
//! # Format
//!
//! An Ark address consists of:
//! - A human-readable part (HRP) that identifies the network
//! - A separator (`1`)
//! - The Bech32m-encoded 32-byte tweaked Taproot output key
//! - A 6-character checksum
//!
//! # Network Prefixes
//!
//! | Network   | HRP    | Example |
//! |-----------|--------|---------|
//! | Mainnet   | `ark`  | `ark1...` |
//! | Mutinynet | `tark` | `tark1...` |
//! | Regtest   | `tark` | `tark1...` |
//!
//! Mutinynet and regtest share the test prefix; the server never mixes
//! networks within one deployment, so the prefix only has to distinguish
//! production keys from test keys.
//!
//! # Example
//!
//! ```rust
//! use punks_core::{ArkAddress, Network};
//!
//! let output_key = [0x55u8; 32];
//! let address = ArkAddress::from_output_key(Network::Mainnet, output_key);
//!
//! let encoded = address.encode();
//! let parsed = ArkAddress::parse(&encoded).unwrap();
//! assert_eq!(parsed.network(), Network::Mainnet);
//! assert_eq!(parsed.output_key(), &output_key);
//! ```

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use bech32::primitives::decode::CheckedHrpstring;
use bech32::{Bech32m, Hrp};

use crate::Network;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Length of a tweaked Taproot output key.
const OUTPUT_KEY_LEN: usize = 32;

/// Human-readable part for mainnet Ark addresses.
pub const HRP_MAINNET: &str = "ark";

/// Human-readable part for test-network Ark addresses.
pub const HRP_TEST: &str = "tark";

// ---------------------------------------------------------------------------
// ArkAddress
// ---------------------------------------------------------------------------

/// An Ark address containing a network and a Taproot output key.
///
/// The output key is the tweaked key of the punk's Taproot output (or of a
/// plain payment output); the address is therefore a pure function of the
/// script tree and internal key that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArkAddress {
    /// The network this address belongs to.
    network: Network,
    /// The 32-byte tweaked Taproot output key.
    output_key: [u8; 32],
}

impl ArkAddress {
    /// Creates a new Ark address from a network and Taproot output key.
    pub fn from_output_key(network: Network, output_key: [u8; 32]) -> Self {
        Self {
            network,
            output_key,
        }
    }

    /// Returns the network this address belongs to.
    pub fn network(&self) -> Network {
        self.network
    }

    /// Returns the Taproot output key as a 32-byte array.
    pub fn output_key(&self) -> &[u8; 32] {
        &self.output_key
    }

    /// Returns the output key as a lowercase hex string.
    pub fn output_key_hex(&self) -> String {
        hex::encode(self.output_key)
    }

    /// Returns the human-readable part (HRP) for this address's network.
    pub fn hrp(&self) -> &'static str {
        match self.network {
            Network::Mainnet => HRP_MAINNET,
            Network::Mutinynet | Network::Regtest => HRP_TEST,
        }
    }

    /// Encodes this address as a Bech32m string.
    ///
    /// Allocates a `String`. For zero-alloc writing, use the [`Display`]
    /// impl directly (e.g. `write!(buf, "{address}")`).
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parses an Ark address from a Bech32m string.
    ///
    /// Test HRPs (`tark`) parse as [`Network::Mutinynet`]; a caller on
    /// regtest treats the two interchangeably.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The string is not valid Bech32m
    /// - The HRP doesn't match a known network
    /// - The payload is not exactly 32 bytes
    pub fn parse(s: &str) -> Result<Self, ArkAddressError> {
        // Bech32m is case-insensitive. Avoid heap allocation when already
        // lowercase (the common path -- our encoder produces lowercase).
        let normalized: Cow<'_, str> = if s.bytes().any(|b| b.is_ascii_uppercase()) {
            Cow::Owned(s.to_lowercase())
        } else {
            Cow::Borrowed(s)
        };

        let checked = CheckedHrpstring::new::<Bech32m>(&normalized)
            .map_err(|e| ArkAddressError::Bech32(e.to_string()))?;

        let network = match checked.hrp().as_str() {
            HRP_MAINNET => Network::Mainnet,
            HRP_TEST => Network::Mutinynet,
            other => return Err(ArkAddressError::UnknownNetwork(other.to_string())),
        };

        // Decode the payload into a stack buffer -- zero alloc.
        let mut buf = [0u8; OUTPUT_KEY_LEN];
        let mut len = 0;
        for byte in checked.byte_iter() {
            if len >= OUTPUT_KEY_LEN {
                return Err(ArkAddressError::BadPayload);
            }
            buf[len] = byte;
            len += 1;
        }

        if len != OUTPUT_KEY_LEN {
            return Err(ArkAddressError::BadPayload);
        }

        Ok(Self {
            network,
            output_key: buf,
        })
    }
}

/// Zero-alloc: writes the Bech32m encoding directly to the formatter.
impl fmt::Display for ArkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hrp = Hrp::parse(self.hrp()).expect("HRP constant is valid");
        bech32::encode_lower_to_fmt::<Bech32m, _>(f, hrp, &self.output_key)
            .map_err(|_| fmt::Error)
    }
}

impl FromStr for ArkAddress {
    type Err = ArkAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors that can occur when parsing Ark addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArkAddressError {
    /// Bech32m decoding failed.
    Bech32(String),

    /// The HRP does not match any known Ark network.
    UnknownNetwork(String),

    /// The payload is missing or has the wrong size.
    BadPayload,
}

impl fmt::Display for ArkAddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bech32(e) => write!(f, "bech32 error: {e}"),
            Self::UnknownNetwork(hrp) => write!(f, "unknown network prefix: {hrp}"),
            Self::BadPayload => write!(f, "payload must be a 32-byte output key"),
        }
    }
}

impl std::error::Error for ArkAddressError {}

// ---------------------------------------------------------------------------
// Convenience functions
// ---------------------------------------------------------------------------

/// Encodes a Taproot output key as an Ark address string.
pub fn encode_ark_address(network: Network, output_key: &[u8; 32]) -> String {
    ArkAddress::from_output_key(network, *output_key).encode()
}

/// Decodes an Ark address string into its components.
pub fn decode_ark_address(address: &str) -> Result<(Network, [u8; 32]), ArkAddressError> {
    let addr = ArkAddress::parse(address)?;
    Ok((addr.network, addr.output_key))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
