//! Pending-offer registry: live auction offers in ascending auction-address
//! order.
//!
//! An entry is created on first submission, overwritten in place on edit, and
//! removed by [`PendingOfferRegistry::remove_completed`] once its auction has
//! completed, its lock has gone to zero, or the auction was cancelled for
//! withdrawal.

use std::collections::{HashMap, HashSet};

use rtv_schemas::{Address, OfferId, U256};
use rtv_valuation::{present_value, weighted_time_to_maturity};
use tracing::debug;

use crate::chain::{Chain, Visit};
use crate::error::RegistryError;
use crate::repo::RepoTokenRegistry;
use crate::{checked_add, CumulativeData, RegistryContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingOffer {
    pub instrument: Address,
    /// Committed amount, base precision.
    pub amount: U256,
    pub auction: Address,
    pub offer_locker: Address,
}

/// Replace one offer's amount for a what-if aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferWhatIf {
    pub offer_id: OfferId,
    pub instrument: Address,
    pub amount: U256,
}

/// Outcome of one [`PendingOfferRegistry::remove_completed`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletedSweepReport {
    /// Auction completed; the instrument is now a holding.
    pub settled: Vec<OfferId>,
    /// Locked amount dropped to zero outside the engine.
    pub cancelled: Vec<OfferId>,
    /// Auction cancelled for withdrawal; unlocked here.
    pub withdrawn: Vec<OfferId>,
    /// Instruments now tracked by the repo-token registry.
    pub absorbed: Vec<Address>,
}

impl CompletedSweepReport {
    pub fn removed(&self) -> usize {
        self.settled.len() + self.cancelled.len() + self.withdrawn.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PendingOfferRegistry {
    chain: Chain<OfferId>,
    offers: HashMap<OfferId, PendingOffer>,
}

impl PendingOfferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn contains(&self, offer_id: &OfferId) -> bool {
        self.chain.contains(offer_id)
    }

    pub fn get(&self, offer_id: &OfferId) -> Option<&PendingOffer> {
        self.offers.get(offer_id)
    }

    /// Outstanding offer ids in chain order.
    pub fn pending_offers(&self) -> Vec<OfferId> {
        self.chain.keys()
    }

    pub fn chain(&self) -> &Chain<OfferId> {
        &self.chain
    }

    /// Insert a new offer, or overwrite an existing one in place.
    ///
    /// Returns `true` if the id was new. New ids are placed before the first
    /// entry whose auction address is greater than or equal to theirs.
    pub fn insert_pending(
        &mut self,
        ctx: &RegistryContext<'_>,
        offer_id: OfferId,
        offer: PendingOffer,
    ) -> Result<bool, RegistryError> {
        if offer_id.is_zero() {
            return Err(RegistryError::NullKey);
        }
        if ctx.ext.auctions.auction(offer.auction)?.completed {
            return Err(RegistryError::AuctionCompleted(offer.auction));
        }

        if let Some(existing) = self.offers.get_mut(&offer_id) {
            *existing = offer;
            debug!(%offer_id, amount = %offer.amount, "pending offer overwritten");
            return Ok(false);
        }

        let offers = &self.offers;
        self.chain.insert_sorted_by::<RegistryError>(offer_id, |existing| {
            Ok(offers
                .get(existing)
                .is_some_and(|o| offer.auction <= o.auction))
        })?;
        self.offers.insert(offer_id, offer);
        debug!(%offer_id, auction = %offer.auction, amount = %offer.amount, "pending offer inserted");
        Ok(true)
    }

    pub fn update_amount(&mut self, offer_id: &OfferId, amount: U256) -> Result<(), RegistryError> {
        match self.offers.get_mut(offer_id) {
            Some(o) => {
                o.amount = amount;
                Ok(())
            }
            None => Err(RegistryError::UnknownOffer(*offer_id)),
        }
    }

    /// Drop every settled, externally cancelled, or withdrawn offer in one pass.
    ///
    /// Instruments of settled auctions are tracked in `repo` afterwards, once
    /// each, even if they matured before this sweep ran.
    pub fn remove_completed(
        &mut self,
        ctx: &RegistryContext<'_>,
        repo: &mut RepoTokenRegistry,
    ) -> Result<CompletedSweepReport, RegistryError> {
        let mut report = CompletedSweepReport::default();
        let mut to_absorb: Vec<Address> = Vec::new();
        let offers = &mut self.offers;

        self.chain.sweep::<RegistryError>(|offer_id| {
            let Some(offer) = offers.get(offer_id).copied() else {
                return Ok(Visit::Remove);
            };
            let locked = ctx.ext.lockers.locked_amount(offer.offer_locker, *offer_id)?;
            let auction = ctx.ext.auctions.auction(offer.auction)?;

            if auction.completed {
                report.settled.push(*offer_id);
                if !to_absorb.contains(&offer.instrument) {
                    to_absorb.push(offer.instrument);
                }
            } else if locked.is_zero() {
                // Nothing left to return; the locker may no longer know the id.
                report.cancelled.push(*offer_id);
            } else if auction.cancelled_for_withdrawal {
                ctx.ext.lockers.unlock(offer.offer_locker, &[*offer_id])?;
                report.withdrawn.push(*offer_id);
            } else {
                return Ok(Visit::Keep);
            }

            offers.remove(offer_id);
            Ok(Visit::Remove)
        })?;

        for instrument in to_absorb {
            repo.insert_settled(ctx, instrument)?;
            report.absorbed.push(instrument);
        }

        if report.removed() > 0 {
            debug!(
                settled = report.settled.len(),
                cancelled = report.cancelled.len(),
                withdrawn = report.withdrawn.len(),
                "completed offers removed"
            );
        }
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Valuation
    // -----------------------------------------------------------------------

    /// Value of a settled auction's instrument that the repo registry has not
    /// picked up yet: the holder's balance discounted at the oracle rate.
    fn unabsorbed_value(ctx: &RegistryContext<'_>, instrument: Address) -> Result<U256, RegistryError> {
        let face = RepoTokenRegistry::normalized_balance(ctx, instrument, U256::ZERO)?;
        if face.is_zero() {
            return Ok(U256::ZERO);
        }
        let maturity = ctx.ext.eligibility.instrument_terms(instrument)?.maturity;
        let rate = ctx.ext.rates.discount_rate(instrument)?;
        Ok(present_value(face, ctx.base_precision, maturity, rate, ctx.now)?)
    }

    /// Σ value of pending offers on `filter`'s instrument, or all offers.
    ///
    /// Offers are worth their locked amount, except offers whose auction has
    /// completed into an instrument the repo registry does not track yet:
    /// those count that instrument's discounted balance, once per instrument.
    pub fn present_value(
        &self,
        ctx: &RegistryContext<'_>,
        repo: &RepoTokenRegistry,
        filter: Option<Address>,
    ) -> Result<U256, RegistryError> {
        let mut total = U256::ZERO;
        let mut seen: HashSet<Address> = HashSet::new();

        for offer_id in self.chain.iter() {
            let Some(offer) = self.offers.get(offer_id) else {
                continue;
            };
            if filter.is_some_and(|f| f != offer.instrument) {
                continue;
            }

            let completed = ctx.ext.auctions.auction(offer.auction)?.completed;
            let value = if completed && !repo.contains(&offer.instrument) {
                if !seen.insert(offer.instrument) {
                    continue;
                }
                Self::unabsorbed_value(ctx, offer.instrument)?
            } else {
                ctx.ext.lockers.locked_amount(offer.offer_locker, *offer_id)?
            };
            total = checked_add(total, value, "pending.present_value")?;
        }
        Ok(total)
    }

    /// Σ (amount × time-to-maturity) and Σ amount over pending offers, using
    /// the same per-instrument rule as [`Self::present_value`].
    ///
    /// `what_if` replaces the locked amount of one offer id.
    pub fn cumulative_offer_data(
        &self,
        ctx: &RegistryContext<'_>,
        repo: &RepoTokenRegistry,
        what_if: Option<OfferWhatIf>,
    ) -> Result<CumulativeData, RegistryError> {
        let mut out = CumulativeData::default();
        let mut seen: HashSet<Address> = HashSet::new();

        for offer_id in self.chain.iter() {
            let Some(offer) = self.offers.get(offer_id) else {
                continue;
            };

            let maturity = ctx.ext.eligibility.instrument_terms(offer.instrument)?.maturity;
            let amount = match what_if {
                Some(w) if w.offer_id == *offer_id => {
                    out.found = true;
                    w.amount
                }
                _ => {
                    let completed = ctx.ext.auctions.auction(offer.auction)?.completed;
                    if completed && !repo.contains(&offer.instrument) {
                        if !seen.insert(offer.instrument) {
                            continue;
                        }
                        RepoTokenRegistry::normalized_balance(ctx, offer.instrument, U256::ZERO)?
                    } else {
                        ctx.ext.lockers.locked_amount(offer.offer_locker, *offer_id)?
                    }
                }
            };

            if amount.is_zero() {
                continue;
            }
            let weighted = weighted_time_to_maturity(maturity, amount, ctx.now)?;
            out.accumulate(amount, weighted)?;
        }
        Ok(out)
    }
}
