//! Virtual transaction templates for punk state transitions.
//!
//! Templates build the Ark-layer virtual transactions that realise mint,
//! transfer, list/delist, and the on-chain tapscript buy. Inputs are VTXO
//! outpoints, outputs are new VTXOs; total value is conserved (the Ark
//! layer accounts for fees at settlement, not here).
//!
//! The escrow-mediated buy is the production path and needs no template:
//! the seller deposits the punk VTXO to the escrow address and the escrow
//! issues two plain sends. The tapscript buy template remains available
//! for direct three-party spends.

use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
    XOnlyPublicKey,
};

use punks_core::VtxoOutpoint;

use crate::leaves::{self, ScriptError, SpendLeaf};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors from template construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateError {
    /// Funding VTXOs do not cover the required amount.
    InsufficientFunds,
    /// The punk VTXO carries no listing price.
    NotListed,
    /// An outpoint txid is not valid hex.
    BadOutpoint,
    /// Key or tree construction failed.
    Script(ScriptError),
}

impl core::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InsufficientFunds => write!(f, "insufficient funding value"),
            Self::NotListed => write!(f, "punk is not listed"),
            Self::BadOutpoint => write!(f, "malformed vtxo outpoint"),
            Self::Script(e) => write!(f, "script construction failed: {e}"),
        }
    }
}

impl std::error::Error for TemplateError {}

impl From<ScriptError> for TemplateError {
    fn from(e: ScriptError) -> Self {
        Self::Script(e)
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A plain funding VTXO available for selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingVtxo {
    /// Where the VTXO currently lives.
    pub outpoint: VtxoOutpoint,
    /// Value in satoshis.
    pub amount: u64,
}

/// Punk-level state carried by a punk VTXO output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PunkVtxoState {
    /// Current holder.
    pub owner: XOnlyPublicKey,
    /// Listing price in sats; `0` means not listed.
    pub listing_price: u64,
}

/// A built mint transaction with its selection result.
#[derive(Debug, Clone)]
pub struct MintTemplate {
    /// The virtual transaction: funding inputs, punk output, change output.
    pub tx: Transaction,
    /// Funding VTXOs consumed, in selection order.
    pub selected: Vec<FundingVtxo>,
    /// Change returned to the minter (may be zero).
    pub change_sats: u64,
}

/// A built punk-spending transaction.
#[derive(Debug, Clone)]
pub struct SpendTemplate {
    /// The virtual transaction.
    pub tx: Transaction,
    /// Which leaf the punk input spends through.
    pub spend_leaf: SpendLeaf,
    /// Punk state carried by the new punk output.
    pub new_state: PunkVtxoState,
}

// ---------------------------------------------------------------------------
// Funding selection
// ---------------------------------------------------------------------------

/// Greedy smallest-first selection of funding VTXOs covering `target` sats.
///
/// Spending small VTXOs first keeps the wallet's set compact across
/// refresh rounds. Returns the selection and its total, or `None` if the
/// wallet cannot cover the target.
pub fn select_funding(available: &[FundingVtxo], target: u64) -> Option<(Vec<FundingVtxo>, u64)> {
    let mut sorted: Vec<FundingVtxo> = available.to_vec();
    sorted.sort_by_key(|v| v.amount);

    let mut selected = Vec::new();
    let mut total = 0u64;
    for vtxo in sorted {
        if total >= target {
            break;
        }
        total += vtxo.amount;
        selected.push(vtxo);
    }

    (total >= target).then_some((selected, total))
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Ark virtual transactions are v3 (TRUC) like their on-chain settlements.
const VTX_VERSION: Version = Version(3);

/// Builds a mint: funding inputs, one punk VTXO at `(owner, server)` worth
/// `reserve` sats, change back to the owner's key path.
///
/// # Errors
///
/// Returns [`TemplateError::InsufficientFunds`] when the funding set cannot
/// cover the reserve.
pub fn create_mint_tx(
    funding: &[FundingVtxo],
    owner: &XOnlyPublicKey,
    server: &XOnlyPublicKey,
    reserve: u64,
) -> Result<MintTemplate, TemplateError> {
    let (selected, total) =
        select_funding(funding, reserve).ok_or(TemplateError::InsufficientFunds)?;

    let mut inputs = Vec::with_capacity(selected.len());
    for vtxo in &selected {
        inputs.push(vtxo_input(&vtxo.outpoint)?);
    }

    let punk_spk = leaves::punk_script_pubkey(owner, server)?;
    let change_sats = total - reserve;

    let mut output = vec![TxOut {
        value: Amount::from_sat(reserve),
        script_pubkey: punk_spk,
    }];
    if change_sats > 0 {
        output.push(TxOut {
            value: Amount::from_sat(change_sats),
            script_pubkey: key_path_spk(owner),
        });
    }

    Ok(MintTemplate {
        tx: Transaction {
            version: VTX_VERSION,
            lock_time: LockTime::ZERO,
            input: inputs,
            output,
        },
        selected,
        change_sats,
    })
}

/// Builds a transfer: spends the punk VTXO via the transfer leaf and
/// recreates it at `(new_owner, server)` with the listing cleared.
pub fn create_transfer_tx(
    punk_outpoint: &VtxoOutpoint,
    punk_value: u64,
    new_owner: &XOnlyPublicKey,
    server: &XOnlyPublicKey,
) -> Result<SpendTemplate, TemplateError> {
    let new_spk = leaves::punk_script_pubkey(new_owner, server)?;

    Ok(SpendTemplate {
        tx: Transaction {
            version: VTX_VERSION,
            lock_time: LockTime::ZERO,
            input: vec![vtxo_input(punk_outpoint)?],
            output: vec![TxOut {
                value: Amount::from_sat(punk_value),
                script_pubkey: new_spk,
            }],
        },
        spend_leaf: SpendLeaf::Transfer,
        new_state: PunkVtxoState {
            owner: *new_owner,
            listing_price: 0,
        },
    })
}

/// Builds a list (price > 0) or delist (price = 0): spends via the list
/// leaf and recreates the punk at the same `(owner, server)` address with
/// the updated listing price.
pub fn create_list_tx(
    punk_outpoint: &VtxoOutpoint,
    punk_value: u64,
    owner: &XOnlyPublicKey,
    server: &XOnlyPublicKey,
    price_sats: u64,
) -> Result<SpendTemplate, TemplateError> {
    let spk = leaves::punk_script_pubkey(owner, server)?;

    Ok(SpendTemplate {
        tx: Transaction {
            version: VTX_VERSION,
            lock_time: LockTime::ZERO,
            input: vec![vtxo_input(punk_outpoint)?],
            output: vec![TxOut {
                value: Amount::from_sat(punk_value),
                script_pubkey: spk,
            }],
        },
        spend_leaf: SpendLeaf::List,
        new_state: PunkVtxoState {
            owner: *owner,
            listing_price: price_sats,
        },
    })
}

/// Builds the on-chain tapscript buy: spends the listed punk via the buy
/// leaf together with buyer funding, pays the seller the listing price,
/// and recreates the punk at `(buyer, server)` delisted.
///
/// Output order: punk, seller payment, buyer change (if any).
///
/// # Errors
///
/// - [`TemplateError::NotListed`] when the punk carries no listing price
/// - [`TemplateError::InsufficientFunds`] when buyer funding is below the
///   price
pub fn create_buy_tx(
    punk_outpoint: &VtxoOutpoint,
    punk_value: u64,
    punk_state: &PunkVtxoState,
    buyer_funding: &[FundingVtxo],
    buyer: &XOnlyPublicKey,
    server: &XOnlyPublicKey,
) -> Result<SpendTemplate, TemplateError> {
    if punk_state.listing_price == 0 {
        return Err(TemplateError::NotListed);
    }
    let price = punk_state.listing_price;

    let (selected, total) =
        select_funding(buyer_funding, price).ok_or(TemplateError::InsufficientFunds)?;

    let mut input = vec![vtxo_input(punk_outpoint)?];
    for vtxo in &selected {
        input.push(vtxo_input(&vtxo.outpoint)?);
    }

    let mut output = vec![
        TxOut {
            value: Amount::from_sat(punk_value),
            script_pubkey: leaves::punk_script_pubkey(buyer, server)?,
        },
        TxOut {
            value: Amount::from_sat(price),
            script_pubkey: key_path_spk(&punk_state.owner),
        },
    ];
    let change = total - price;
    if change > 0 {
        output.push(TxOut {
            value: Amount::from_sat(change),
            script_pubkey: key_path_spk(buyer),
        });
    }

    Ok(SpendTemplate {
        tx: Transaction {
            version: VTX_VERSION,
            lock_time: LockTime::ZERO,
            input,
            output,
        },
        spend_leaf: SpendLeaf::Buy,
        new_state: PunkVtxoState {
            owner: *buyer,
            listing_price: 0,
        },
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Converts a text outpoint into a transaction input.
fn vtxo_input(outpoint: &VtxoOutpoint) -> Result<TxIn, TemplateError> {
    let txid = Txid::from_str(&outpoint.txid).map_err(|_| TemplateError::BadOutpoint)?;
    Ok(TxIn {
        previous_output: OutPoint::new(txid, outpoint.vout),
        script_sig: ScriptBuf::new(),
        sequence: Sequence::MAX,
        witness: Witness::default(),
    })
}

/// Key-path P2TR script for plain value outputs (change, payments).
fn key_path_spk(key: &XOnlyPublicKey) -> ScriptBuf {
    let secp = bitcoin::secp256k1::Secp256k1::verification_only();
    ScriptBuf::new_p2tr(&secp, *key, None)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
