//! rtv-schemas
//!
//! Shared records and the collaborator seams the strategy core talks through.
//! Nothing here holds state; concrete collaborators live in `rtv-testkit`
//! (in-memory) or in whatever host embeds the engine.

mod collaborators;
mod records;

pub use alloy_primitives::{Address, B256, U256};
pub use collaborators::{
    AuctionHouse, Clock, CollateralManager, Collaborators, DiscountRateOracle, EligibilityOracle,
    ExternalError, ExternalResult, OfferLocker, RepoServicer, Service, TokenLedger, YieldReserve,
};
pub use records::{
    derive_offer_id, AuctionInfo, CollateralRatio, InstrumentTerms, OfferSubmission,
};

/// 256-bit offer identifier as recorded by an offer locker.
pub type OfferId = B256;

/// Unix seconds.
pub type Timestamp = u64;
