//! Taproot script model and transaction templates for punk VTXOs.
//!
//! Every punk VTXO sits at a Taproot output whose internal key is provably
//! unspendable (a NUMS point), forcing all spends through one of three
//! script leaves:
//!
//! - **transfer** -- `<owner> CHECKSIGVERIFY <server> CHECKSIG`
//! - **buy** -- `<server> CHECKSIG`
//! - **list** -- `<owner> CHECKSIGVERIFY <server> CHECKSIG`
//!
//! The derived address is a pure function of `(owner, server)`; see
//! [`leaves`]. The [`templates`] module builds the virtual transactions
//! that realise each punk state transition over VTXO inputs and outputs.

pub mod leaves;
pub mod templates;

pub use leaves::{
    PunkSpendInfo, ScriptError, SpendLeaf, UNSPENDABLE_INTERNAL_KEY, punk_address,
    punk_output_key, punk_script_pubkey,
};
pub use templates::{
    FundingVtxo, MintTemplate, PunkVtxoState, SpendTemplate, TemplateError, create_buy_tx,
    create_list_tx, create_mint_tx, create_transfer_tx, select_funding,
};
