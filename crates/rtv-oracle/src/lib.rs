//! rtv-oracle
//!
//! Discount rates derived from auction clearing history.
//!
//! Each instrument belongs to an auction group whose clearing results are
//! listed oldest first. The rate in force is the newest clearing rate not
//! marked invalid. A result that cleared less than [`REOPENING_WINDOW_SECS`]
//! ago is a re-opening still settling and is passed over in favour of the one
//! before it.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use rtv_schemas::{Address, Clock, DiscountRateOracle, ExternalError, ExternalResult, Timestamp};
use rtv_valuation::Rate;
use tracing::info;

/// Age below which the newest of several results is skipped.
pub const REOPENING_WINDOW_SECS: u64 = 30 * 60;

/// One auction's clearing result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuctionClearing {
    pub auction: Address,
    pub clearing_rate: Rate,
    pub cleared_at: Timestamp,
}

pub trait AuctionResultSource {
    /// Clearing results for `instrument`'s auction group, oldest first.
    fn clearing_history(&self, instrument: Address) -> ExternalResult<Vec<AuctionClearing>>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateError {
    #[error("no valid clearing rate for {0}")]
    NoValidRate(Address),
    #[error("{0} may not change rate validity")]
    Unauthorized(Address),
    #[error(transparent)]
    Source(#[from] ExternalError),
}

impl From<RateError> for ExternalError {
    fn from(e: RateError) -> Self {
        match e {
            RateError::NoValidRate(instrument) => ExternalError::NoValidRate(instrument),
            RateError::Source(inner) => inner,
            RateError::Unauthorized(caller) => {
                ExternalError::reverted(rtv_schemas::Service::Rates, format!("unauthorized {caller}"))
            }
        }
    }
}

/// Newest valid rate in `history`.
///
/// The scan runs over a half-open index range from the top down, so it ends
/// at index zero without stepping below it.
pub fn select_rate(
    instrument: Address,
    history: &[AuctionClearing],
    now: Timestamp,
    is_invalid: impl Fn(&AuctionClearing) -> bool,
) -> Result<Rate, RateError> {
    let Some(latest) = history.last() else {
        return Err(RateError::NoValidRate(instrument));
    };
    let reopening =
        history.len() > 1 && now.saturating_sub(latest.cleared_at) < REOPENING_WINDOW_SECS;
    let end = if reopening { history.len() - 1 } else { history.len() };

    history[..end]
        .iter()
        .rev()
        .find(|c| !is_invalid(c))
        .map(|c| c.clearing_rate)
        .ok_or(RateError::NoValidRate(instrument))
}

/// [`DiscountRateOracle`] over an [`AuctionResultSource`].
pub struct AuctionHistoryRateAdapter<S> {
    source: S,
    clock: Rc<dyn Clock>,
    manager: Address,
    invalid: RefCell<BTreeSet<(Address, Address)>>,
}

impl<S: AuctionResultSource> AuctionHistoryRateAdapter<S> {
    pub fn new(source: S, clock: Rc<dyn Clock>, manager: Address) -> Self {
        Self {
            source,
            clock,
            manager,
            invalid: RefCell::new(BTreeSet::new()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mark (or clear) one auction's clearing rate as unusable for `instrument`.
    pub fn set_rate_invalidity(
        &self,
        caller: Address,
        instrument: Address,
        auction: Address,
        invalid: bool,
    ) -> Result<(), RateError> {
        if caller != self.manager {
            return Err(RateError::Unauthorized(caller));
        }
        let mut set = self.invalid.borrow_mut();
        if invalid {
            set.insert((instrument, auction));
        } else {
            set.remove(&(instrument, auction));
        }
        info!(%instrument, %auction, invalid, "rate invalidity updated");
        Ok(())
    }

    pub fn is_rate_invalid(&self, instrument: Address, auction: Address) -> bool {
        self.invalid.borrow().contains(&(instrument, auction))
    }

    pub fn latest_valid_rate(&self, instrument: Address) -> Result<Rate, RateError> {
        let history = self.source.clearing_history(instrument)?;
        select_rate(instrument, &history, self.clock.now(), |c| {
            self.is_rate_invalid(instrument, c.auction)
        })
    }
}

impl<S: AuctionResultSource> DiscountRateOracle for AuctionHistoryRateAdapter<S> {
    fn discount_rate(&self, instrument: Address) -> ExternalResult<Rate> {
        Ok(self.latest_valid_rate(instrument)?)
    }
}

/// Clearing history held in memory, appended as auctions clear.
#[derive(Debug, Default)]
pub struct InMemoryClearingHistory {
    results: RefCell<HashMap<Address, Vec<AuctionClearing>>>,
}

impl InMemoryClearingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, instrument: Address, clearing: AuctionClearing) {
        self.results
            .borrow_mut()
            .entry(instrument)
            .or_default()
            .push(clearing);
    }
}

impl AuctionResultSource for InMemoryClearingHistory {
    fn clearing_history(&self, instrument: Address) -> ExternalResult<Vec<AuctionClearing>> {
        Ok(self
            .results
            .borrow()
            .get(&instrument)
            .cloned()
            .unwrap_or_default())
    }
}
