//! Collaborator seams.
//!
//! Every external system the engine consults is a trait taking `&self`; the
//! engine is single-threaded and serializes calls, so implementations that
//! need to mutate (a token ledger, an offer locker) use interior mutability.
//! A failed call returns [`ExternalError`] and the engine treats the whole
//! enclosing operation as never having happened.

use std::fmt;
use std::rc::Rc;

use alloy_primitives::{Address, U256};
use rtv_valuation::Rate;

use crate::{AuctionInfo, CollateralRatio, InstrumentTerms, OfferId, OfferSubmission, Timestamp};

/// Which collaborator a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Service {
    Eligibility,
    Collateral,
    Rates,
    Auctions,
    OfferLocker,
    Servicer,
    Tokens,
    Reserve,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Service::Eligibility => "eligibility",
            Service::Collateral => "collateral",
            Service::Rates => "rates",
            Service::Auctions => "auctions",
            Service::OfferLocker => "offer_locker",
            Service::Servicer => "servicer",
            Service::Tokens => "tokens",
            Service::Reserve => "reserve",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExternalError {
    #[error("{service} call reverted: {reason}")]
    Reverted { service: Service, reason: String },
    #[error("{service} does not know {address}")]
    Unknown { service: Service, address: Address },
    #[error("no valid discount rate for {0}")]
    NoValidRate(Address),
}

impl ExternalError {
    pub fn reverted(service: Service, reason: impl Into<String>) -> Self {
        ExternalError::Reverted {
            service,
            reason: reason.into(),
        }
    }
}

pub type ExternalResult<T> = Result<T, ExternalError>;

/// Controller-side registry of deployed instruments and auctions.
pub trait EligibilityOracle {
    fn is_recognized(&self, address: Address) -> ExternalResult<bool>;
    fn instrument_terms(&self, instrument: Address) -> ExternalResult<InstrumentTerms>;
}

pub trait CollateralManager {
    /// Every collateral token the manager accepts, with its live maintenance ratio.
    fn collateral_ratios(&self, manager: Address) -> ExternalResult<Vec<CollateralRatio>>;
}

pub trait DiscountRateOracle {
    fn discount_rate(&self, instrument: Address) -> ExternalResult<Rate>;
}

pub trait AuctionHouse {
    fn auction(&self, auction: Address) -> ExternalResult<AuctionInfo>;
}

pub trait OfferLocker {
    fn locked_amount(&self, locker: Address, offer_id: OfferId) -> ExternalResult<U256>;
    /// Locks (or re-locks at a new amount) each submission. Returns the offer
    /// ids in submission order.
    fn lock(&self, locker: Address, offers: &[OfferSubmission]) -> ExternalResult<Vec<OfferId>>;
    fn unlock(&self, locker: Address, offer_ids: &[OfferId]) -> ExternalResult<()>;
}

pub trait RepoServicer {
    /// Burns `amount` native units held by `redeemer` for base asset.
    fn redeem(&self, servicer: Address, redeemer: Address, amount: U256) -> ExternalResult<()>;
}

pub trait TokenLedger {
    fn balance_of(&self, token: Address, owner: Address) -> ExternalResult<U256>;
    fn transfer(&self, token: Address, from: Address, to: Address, amount: U256)
        -> ExternalResult<()>;
}

/// External vault holding idle base asset.
pub trait YieldReserve {
    fn deposit(&self, owner: Address, assets: U256) -> ExternalResult<()>;
    /// Shares that must be burned to withdraw `assets`.
    fn shares_for(&self, assets: U256) -> ExternalResult<U256>;
    /// Burns `shares` and returns the base asset paid out.
    fn withdraw_shares(&self, owner: Address, shares: U256) -> ExternalResult<U256>;
    fn balance_in_base_asset(&self, owner: Address) -> ExternalResult<U256>;
}

pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Bundle of collaborator handles passed through the engine and registries.
#[derive(Clone)]
pub struct Collaborators {
    pub eligibility: Rc<dyn EligibilityOracle>,
    pub collateral: Rc<dyn CollateralManager>,
    pub rates: Rc<dyn DiscountRateOracle>,
    pub auctions: Rc<dyn AuctionHouse>,
    pub lockers: Rc<dyn OfferLocker>,
    pub servicer: Rc<dyn RepoServicer>,
    pub tokens: Rc<dyn TokenLedger>,
    pub reserve: Rc<dyn YieldReserve>,
    pub clock: Rc<dyn Clock>,
}

impl Collaborators {
    /// Every seam served by one object.
    pub fn from_single<W>(world: Rc<W>) -> Self
    where
        W: EligibilityOracle
            + CollateralManager
            + DiscountRateOracle
            + AuctionHouse
            + OfferLocker
            + RepoServicer
            + TokenLedger
            + YieldReserve
            + Clock
            + 'static,
    {
        Self {
            eligibility: world.clone(),
            collateral: world.clone(),
            rates: world.clone(),
            auctions: world.clone(),
            lockers: world.clone(),
            servicer: world.clone(),
            tokens: world.clone(),
            reserve: world.clone(),
            clock: world,
        }
    }

    pub fn with_rates(mut self, rates: Rc<dyn DiscountRateOracle>) -> Self {
        self.rates = rates;
        self
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
