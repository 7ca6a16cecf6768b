//! rtv-testkit
//!
//! Deterministic in-memory collaborators for the strategy core. One
//! [`SimWorld`] serves every collaborator seam over a shared token ledger, so
//! a lock, a redemption, or a reserve deposit moves the same balances the
//! engine later reads back. No randomness, no IO outside snapshot loading.

mod snapshot;
mod world;

pub use snapshot::{
    AssetSpec, BalanceSpec, CollateralSpec, DepositSpec, InstrumentSpec, ReserveSpec, WorldSnapshot,
};
pub use world::{LockedOffer, SimWorld};

use rtv_schemas::{Address, B256};

/// Deterministic test address.
pub fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

/// Deterministic caller-side offer id hash.
pub fn id_hash(byte: u8) -> B256 {
    B256::repeat_byte(byte)
}
