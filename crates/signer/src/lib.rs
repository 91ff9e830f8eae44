//! Server authority signing for punk attestations.
//!
//! This crate provides:
//!
//! - [`ServerSigner`] trait -- the signing seam the registry and escrow use
//! - [`SchnorrServerSigner`] -- concrete implementation over a process-wide
//!   secp256k1 keypair
//! - [`attestation_digest`] / [`verify_attestation`] -- the attestation
//!   message construction and its verification
//!
//! # Design
//!
//! An "official" punk is a registry row carrying a valid server Schnorr
//! signature over `SHA-256(punk_id_bytes)`. The signing key is initialised
//! once at boot from configuration and never rotated at runtime; rotating
//! it requires a restart. Components never touch the key directly -- they
//! hold a [`ServerSigner`] so tests can substitute a different keypair and
//! deployments can move the key behind an HSM without touching callers.

use std::fmt;

use bitcoin::hashes::{Hash, sha256};
use bitcoin::secp256k1::schnorr::Signature;
use bitcoin::secp256k1::{All, Keypair, Message, Secp256k1, SecretKey, XOnlyPublicKey};

use punks_core::PunkId;

// Re-exported so dependents can name the key type without a direct
// `bitcoin` dependency.
pub use bitcoin::secp256k1::XOnlyPublicKey as ServerPubkey;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors from signer construction or use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    /// The secret key hex is not 64 characters of hex.
    BadSecretHex,
    /// The bytes are not a valid secp256k1 secret key.
    InvalidSecretKey,
    /// A stored signature failed to parse.
    MalformedSignature,
}

impl fmt::Display for SignerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadSecretHex => write!(f, "secret key must be 64 hex chars"),
            Self::InvalidSecretKey => write!(f, "bytes are not a valid secret key"),
            Self::MalformedSignature => write!(f, "signature bytes are malformed"),
        }
    }
}

impl std::error::Error for SignerError {}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Signing capability of the punk authority.
pub trait ServerSigner: Send + Sync {
    /// The server's x-only public key (constant per deployment).
    fn server_pubkey(&self) -> XOnlyPublicKey;

    /// Produces the official-punk attestation: a Schnorr signature over
    /// `SHA-256(punk_id_bytes)`.
    fn sign_attestation(&self, punk_id: &PunkId) -> Signature;
}

// ---------------------------------------------------------------------------
// Attestation message
// ---------------------------------------------------------------------------

/// The attestation message: `SHA-256` over the raw punk id bytes.
pub fn attestation_digest(punk_id: &PunkId) -> Message {
    let digest = sha256::Hash::hash(punk_id.as_bytes());
    Message::from_digest(digest.to_byte_array())
}

/// Verifies an official-punk attestation against the server key.
pub fn verify_attestation(
    server_pubkey: &XOnlyPublicKey,
    punk_id: &PunkId,
    signature: &Signature,
) -> bool {
    let secp = Secp256k1::verification_only();
    secp.verify_schnorr(signature, &attestation_digest(punk_id), server_pubkey)
        .is_ok()
}

/// Parses a stored hex signature (128 chars) back into a [`Signature`].
pub fn signature_from_hex(s: &str) -> Result<Signature, SignerError> {
    let bytes = hex::decode(s).map_err(|_| SignerError::MalformedSignature)?;
    Signature::from_slice(&bytes).map_err(|_| SignerError::MalformedSignature)
}

// ---------------------------------------------------------------------------
// SchnorrServerSigner
// ---------------------------------------------------------------------------

/// Keypair-backed server signer.
pub struct SchnorrServerSigner {
    secp: Secp256k1<All>,
    keypair: Keypair,
}

impl SchnorrServerSigner {
    /// Builds a signer from a 32-byte secret key.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, SignerError> {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(bytes).map_err(|_| SignerError::InvalidSecretKey)?;
        let keypair = Keypair::from_secret_key(&secp, &sk);
        Ok(Self { secp, keypair })
    }

    /// Builds a signer from 64 hex characters (the configuration form).
    pub fn from_secret_hex(hex_str: &str) -> Result<Self, SignerError> {
        if hex_str.len() != 64 {
            return Err(SignerError::BadSecretHex);
        }
        let bytes = hex::decode(hex_str).map_err(|_| SignerError::BadSecretHex)?;
        let mut fixed = [0u8; 32];
        fixed.copy_from_slice(&bytes);
        Self::from_secret_bytes(&fixed)
    }
}

impl fmt::Debug for SchnorrServerSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material.
        f.debug_struct("SchnorrServerSigner")
            .field("server_pubkey", &self.server_pubkey())
            .finish()
    }
}

impl ServerSigner for SchnorrServerSigner {
    fn server_pubkey(&self) -> XOnlyPublicKey {
        self.keypair.x_only_public_key().0
    }

    fn sign_attestation(&self, punk_id: &PunkId) -> Signature {
        self.secp
            .sign_schnorr_no_aux_rand(&attestation_digest(punk_id), &self.keypair)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_signer() -> SchnorrServerSigner {
        SchnorrServerSigner::from_secret_bytes(&[0x42; 32]).unwrap()
    }

    #[test]
    fn attestation_verifies() {
        // VerifySchnorr(server, SHA-256(punk_id), sig) must hold.
        let signer = test_signer();
        let punk_id = PunkId::from_bytes([0xab; 32]);

        let sig = signer.sign_attestation(&punk_id);
        assert!(verify_attestation(&signer.server_pubkey(), &punk_id, &sig));
    }

    #[test]
    fn attestation_binds_the_punk() {
        let signer = test_signer();
        let sig = signer.sign_attestation(&PunkId::from_bytes([0x01; 32]));

        let other = PunkId::from_bytes([0x02; 32]);
        assert!(!verify_attestation(&signer.server_pubkey(), &other, &sig));
    }

    #[test]
    fn attestation_binds_the_key() {
        let signer = test_signer();
        let punk_id = PunkId::from_bytes([0x03; 32]);
        let sig = signer.sign_attestation(&punk_id);

        let other = SchnorrServerSigner::from_secret_bytes(&[0x43; 32]).unwrap();
        assert!(!verify_attestation(&other.server_pubkey(), &punk_id, &sig));
    }

    #[test]
    fn signature_hex_round_trip() {
        let signer = test_signer();
        let punk_id = PunkId::from_bytes([0x04; 32]);
        let sig = signer.sign_attestation(&punk_id);

        let hex_form = hex::encode(sig.serialize());
        assert_eq!(hex_form.len(), 128);
        let parsed = signature_from_hex(&hex_form).unwrap();
        assert_eq!(parsed, sig);
    }

    #[test]
    fn signing_is_deterministic() {
        // No aux randomness: the same punk always yields the same bytes,
        // so registry rows stay stable across re-attestation.
        let signer = test_signer();
        let punk_id = PunkId::from_bytes([0x05; 32]);
        assert_eq!(
            signer.sign_attestation(&punk_id),
            signer.sign_attestation(&punk_id)
        );
    }

    #[test]
    fn from_secret_hex_validates() {
        assert_eq!(
            SchnorrServerSigner::from_secret_hex("abcd").unwrap_err(),
            SignerError::BadSecretHex
        );
        // All-zero bytes are not a valid secret key.
        assert_eq!(
            SchnorrServerSigner::from_secret_hex(&"00".repeat(32)).unwrap_err(),
            SignerError::InvalidSecretKey
        );
        assert!(SchnorrServerSigner::from_secret_hex(&"42".repeat(32)).is_ok());
    }
}
