//! Taproot leaf construction and address derivation.
//!
//! The tap tree is fixed: transfer at depth 1, buy and list at depth 2.
//! With the leaf scripts determined by `(owner, server)` alone, the tweaked
//! output key -- and therefore the address -- is a deterministic function
//! of the two keys.

use bitcoin::ScriptBuf;
use bitcoin::opcodes::all::{OP_CHECKSIG, OP_CHECKSIGVERIFY};
use bitcoin::script::Builder;
use bitcoin::secp256k1::{Secp256k1, Verification};
use bitcoin::taproot::{ControlBlock, LeafVersion, TaprootBuilder, TaprootSpendInfo};
use bitcoin::XOnlyPublicKey;

use punks_core::{ArkAddress, Network};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// The NUMS point used as the Taproot internal key.
///
/// `lift_x(SHA-256(G))` -- nobody knows a discrete log for it, so the
/// key-path spend is provably unusable and every spend must reveal a leaf.
pub const UNSPENDABLE_INTERNAL_KEY: [u8; 32] = [
    0x50, 0x92, 0x9b, 0x74, 0xc1, 0xa0, 0x49, 0x54, 0xb7, 0x8b, 0x4b, 0x60, 0x35, 0xe9, 0x7a,
    0x5e, 0x07, 0x8a, 0x5a, 0x0f, 0x28, 0xec, 0x96, 0xd5, 0x47, 0xbf, 0xee, 0x9a, 0xce, 0x80,
    0x3a, 0xc0,
];

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors from script construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptError {
    /// A 32-byte key is not a valid x-only public key.
    InvalidKey,
    /// Tap tree assembly failed (cannot happen with the fixed shape;
    /// surfaced rather than unwrapped).
    TreeBuildFailed,
}

impl core::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidKey => write!(f, "invalid x-only public key"),
            Self::TreeBuildFailed => write!(f, "taproot tree construction failed"),
        }
    }
}

impl std::error::Error for ScriptError {}

// ---------------------------------------------------------------------------
// Leaves
// ---------------------------------------------------------------------------

/// The three spending paths of a punk VTXO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpendLeaf {
    /// Owner-authorised transfer to a new owner.
    Transfer,
    /// Server-only path backing the atomic-swap policy.
    Buy,
    /// Owner-authorised listing-price update.
    List,
}

impl SpendLeaf {
    /// Builds this leaf's script for the given keys.
    pub fn script(&self, owner: &XOnlyPublicKey, server: &XOnlyPublicKey) -> ScriptBuf {
        match self {
            // Owner-required paths demand the owner signature plus the
            // server co-signature.
            Self::Transfer | Self::List => Builder::new()
                .push_x_only_key(owner)
                .push_opcode(OP_CHECKSIGVERIFY)
                .push_x_only_key(server)
                .push_opcode(OP_CHECKSIG)
                .into_script(),
            // Buyer and seller coherence is enforced by the escrow policy,
            // not in-script, so the buy path is server-only.
            Self::Buy => Builder::new()
                .push_x_only_key(server)
                .push_opcode(OP_CHECKSIG)
                .into_script(),
        }
    }
}

// ---------------------------------------------------------------------------
// Spend info
// ---------------------------------------------------------------------------

/// Assembled Taproot spend data for one punk output.
pub struct PunkSpendInfo {
    spend_info: TaprootSpendInfo,
    owner: XOnlyPublicKey,
    server: XOnlyPublicKey,
}

impl PunkSpendInfo {
    /// Builds the fixed tap tree `[transfer@1, buy@2, list@2]` over the
    /// unspendable internal key.
    pub fn new<C: Verification>(
        secp: &Secp256k1<C>,
        owner: &XOnlyPublicKey,
        server: &XOnlyPublicKey,
    ) -> Result<Self, ScriptError> {
        let builder = TaprootBuilder::new()
            .add_leaf(1, SpendLeaf::Transfer.script(owner, server))
            .and_then(|b| b.add_leaf(2, SpendLeaf::Buy.script(owner, server)))
            .and_then(|b| b.add_leaf(2, SpendLeaf::List.script(owner, server)))
            .map_err(|_| ScriptError::TreeBuildFailed)?;

        let internal = XOnlyPublicKey::from_slice(&UNSPENDABLE_INTERNAL_KEY)
            .map_err(|_| ScriptError::InvalidKey)?;

        let spend_info = builder
            .finalize(secp, internal)
            .map_err(|_| ScriptError::TreeBuildFailed)?;

        Ok(Self {
            spend_info,
            owner: *owner,
            server: *server,
        })
    }

    /// The tweaked output key.
    pub fn output_key(&self) -> XOnlyPublicKey {
        self.spend_info.output_key().to_x_only_public_key()
    }

    /// The P2TR script pubkey for this punk output.
    pub fn script_pubkey(&self) -> ScriptBuf {
        ScriptBuf::new_p2tr_tweaked(self.spend_info.output_key())
    }

    /// The control block for spending via the given leaf.
    ///
    /// Leaf version is `0xc0` (tapscript).
    pub fn control_block(&self, leaf: SpendLeaf) -> Option<ControlBlock> {
        let script = leaf.script(&self.owner, &self.server);
        self.spend_info
            .control_block(&(script, LeafVersion::TapScript))
    }
}

// ---------------------------------------------------------------------------
// Derivation helpers
// ---------------------------------------------------------------------------

/// Derives the tweaked output key for `(owner, server)`.
pub fn punk_output_key(
    owner: &XOnlyPublicKey,
    server: &XOnlyPublicKey,
) -> Result<XOnlyPublicKey, ScriptError> {
    let secp = Secp256k1::verification_only();
    Ok(PunkSpendInfo::new(&secp, owner, server)?.output_key())
}

/// Derives the P2TR script pubkey for `(owner, server)`.
pub fn punk_script_pubkey(
    owner: &XOnlyPublicKey,
    server: &XOnlyPublicKey,
) -> Result<ScriptBuf, ScriptError> {
    let secp = Secp256k1::verification_only();
    Ok(PunkSpendInfo::new(&secp, owner, server)?.script_pubkey())
}

/// Derives the Ark address for `(owner, server)` on a network.
pub fn punk_address(
    network: Network,
    owner: &XOnlyPublicKey,
    server: &XOnlyPublicKey,
) -> Result<ArkAddress, ScriptError> {
    let key = punk_output_key(owner, server)?;
    Ok(ArkAddress::from_output_key(network, key.serialize()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> XOnlyPublicKey {
        // Points derived from small scalars are valid test keys.
        let secp = Secp256k1::new();
        let sk = bitcoin::secp256k1::SecretKey::from_slice(&[byte; 32]).unwrap();
        sk.x_only_public_key(&secp).0
    }

    #[test]
    fn owner_leaves_embed_both_keys() {
        let owner = key(0x11);
        let server = key(0x22);

        for leaf in [SpendLeaf::Transfer, SpendLeaf::List] {
            let script = leaf.script(&owner, &server);
            let bytes = script.as_bytes();
            // <owner:32> CHECKSIGVERIFY <server:32> CHECKSIG = 68 bytes.
            assert_eq!(bytes.len(), 68);
            assert_eq!(&bytes[1..33], &owner.serialize());
            assert_eq!(bytes[33], OP_CHECKSIGVERIFY.to_u8());
            assert_eq!(&bytes[35..67], &server.serialize());
            assert_eq!(bytes[67], OP_CHECKSIG.to_u8());
        }
    }

    #[test]
    fn buy_leaf_is_server_only() {
        let script = SpendLeaf::Buy.script(&key(0x11), &key(0x22));
        let bytes = script.as_bytes();
        assert_eq!(bytes.len(), 34);
        assert_eq!(&bytes[1..33], &key(0x22).serialize());
        assert_eq!(bytes[33], OP_CHECKSIG.to_u8());
    }

    #[test]
    fn address_is_deterministic() {
        // The address is a pure function of the two keys.
        let owner = key(0x33);
        let server = key(0x44);

        let a = punk_address(Network::Mainnet, &owner, &server).unwrap();
        let b = punk_address(Network::Mainnet, &owner, &server).unwrap();
        assert_eq!(a, b);
        assert!(a.encode().starts_with("ark1"));
    }

    #[test]
    fn address_changes_with_either_key() {
        let owner = key(0x33);
        let server = key(0x44);
        let base = punk_output_key(&owner, &server).unwrap();

        assert_ne!(base, punk_output_key(&key(0x55), &server).unwrap());
        assert_ne!(base, punk_output_key(&owner, &key(0x55)).unwrap());
        // Keys are not interchangeable between roles.
        assert_ne!(base, punk_output_key(&server, &owner).unwrap());
    }

    #[test]
    fn all_leaves_have_control_blocks() {
        let secp = Secp256k1::new();
        let info = PunkSpendInfo::new(&secp, &key(0x66), &key(0x77)).unwrap();

        for leaf in [SpendLeaf::Transfer, SpendLeaf::Buy, SpendLeaf::List] {
            let cb = info.control_block(leaf).expect("leaf must be in the tree");
            assert_eq!(cb.leaf_version, LeafVersion::TapScript);
            assert!(cb.verify_taproot_commitment(
                &secp,
                info.output_key(),
                &leaf.script(&key(0x66), &key(0x77)),
            ));
        }
    }

    #[test]
    fn script_pubkey_is_p2tr() {
        let spk = punk_script_pubkey(&key(0x88), &key(0x99)).unwrap();
        assert!(spk.is_p2tr());
    }

    #[test]
    fn internal_key_is_the_published_nums_point() {
        // Regression guard: the constant must parse as a valid x coordinate
        // and match the published bytes.
        let k = XOnlyPublicKey::from_slice(&UNSPENDABLE_INTERNAL_KEY).unwrap();
        assert_eq!(k.serialize(), UNSPENDABLE_INTERNAL_KEY);
        assert_eq!(UNSPENDABLE_INTERNAL_KEY[0], 0x50);
        assert_eq!(UNSPENDABLE_INTERNAL_KEY[31], 0xc0);
    }
}
