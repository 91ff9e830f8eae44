//! Escrow state machine and atomic swap for the punk marketplace.
//!
//! The engine arbitrates the marketplace flow between seller and buyer
//! wallets with the server-controlled escrow wallet in the middle:
//!
//! 1. The seller opens a listing (`pending`), then sends the punk VTXO to
//!    the escrow address. The server verifies the deposit against live
//!    wallet state before moving to `deposited`.
//! 2. The buyer pays the listing price into the escrow wallet and asks for
//!    execution. The engine commits ownership to the buyer in one registry
//!    transaction, then pays the seller `price - fee` and returns the
//!    reserve -- commit-ownership-before-pay, so the buyer can never lose
//!    funds without gaining the punk.
//! 3. Either side of the escrow can cancel before the sale; a `deposited`
//!    cancel refunds the reserve first and only then flips the row.
//!
//! The Ark layer is opaque behind [`ArkClient`]; see [`engine`] for the
//! ordering discipline and [`locks`] for the per-punk serialisation rule.

pub mod ark;
pub mod engine;
pub mod locks;

mod error;

pub use ark::{ArkClient, ArkClientError, MemoryArkClient, RestArkClient, Vtxo};
pub use engine::{
    BuyQuote, BuyRequest, EscrowConfig, EscrowEngine, EscrowInfo, ExecuteResult, ListRequest,
    ReserveClaimResult,
};
pub use error::EscrowError;
pub use locks::{PunkGuard, PunkLocks};
