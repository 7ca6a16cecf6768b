//! State-changing entry points: auction offers, instrument purchases, and
//! liquidity sweeps.

use rtv_registry::{PendingOffer, RegistryContext};
use rtv_schemas::{derive_offer_id, Address, OfferId, OfferSubmission, B256, U256};
use tracing::{debug, info};

use crate::{Access, Hypothetical, Strategy, StrategyError, SweepReport};

impl Strategy {
    // -----------------------------------------------------------------------
    // Liquidity
    // -----------------------------------------------------------------------

    /// Move base asset between direct holdings and the reserve so that
    /// `required` is held directly. Surplus is deposited; a shortfall is
    /// withdrawn by whole shares, so the result may exceed `required`.
    pub(crate) fn rebalance_liquidity(
        &self,
        ctx: &RegistryContext<'_>,
        required: U256,
    ) -> Result<(), StrategyError> {
        let direct = ctx.ext.tokens.balance_of(ctx.base_asset, ctx.holder)?;
        if direct > required {
            let surplus = direct - required;
            ctx.ext.reserve.deposit(ctx.holder, surplus)?;
            debug!(%surplus, "deposited to reserve");
        } else if direct < required {
            let shortfall = required - direct;
            let shares = ctx.ext.reserve.shares_for(shortfall)?;
            if !shares.is_zero() {
                let assets = ctx.ext.reserve.withdraw_shares(ctx.holder, shares)?;
                debug!(%shortfall, %shares, %assets, "withdrew from reserve");
            }
        }
        Ok(())
    }

    /// Drop completed offers (absorbing their instruments), then redeem
    /// matured holdings.
    fn reconcile(&mut self, ctx: &RegistryContext<'_>) -> Result<SweepReport, StrategyError> {
        let completed = self.pending.remove_completed(ctx, &mut self.repo_tokens)?;
        let matured = self.repo_tokens.remove_and_redeem_matured(ctx)?;
        Ok(SweepReport { completed, matured })
    }

    fn sweep_inner(
        &mut self,
        ctx: &RegistryContext<'_>,
        required: U256,
    ) -> Result<SweepReport, StrategyError> {
        let report = self.reconcile(ctx)?;
        self.rebalance_liquidity(ctx, required)?;
        info!(
            settled = report.completed.settled.len(),
            redeemed = report.matured.redeemed.len(),
            %required,
            "swept and rebalanced"
        );
        Ok(report)
    }

    /// Reconcile both registries and leave exactly `required` base asset held
    /// directly, the rest in the reserve.
    pub fn sweep_and_rebalance(
        &mut self,
        caller: Address,
        required: U256,
    ) -> Result<SweepReport, StrategyError> {
        self.guarded(caller, Access::Management, |s, ctx| s.sweep_inner(ctx, required))
    }

    /// Settlement hook: any caller may trigger a full sweep once an auction
    /// closes.
    pub fn auction_closed(&mut self, caller: Address) -> Result<SweepReport, StrategyError> {
        self.guarded(caller, Access::Anyone, |s, ctx| s.sweep_inner(ctx, U256::ZERO))
    }

    // -----------------------------------------------------------------------
    // Auction offers
    // -----------------------------------------------------------------------

    /// Place a new offer of `amount` base units in `auction`, or re-size the
    /// strategy's existing offer with the same `id_hash`.
    ///
    /// Growing an offer is checked against concentration, available
    /// liquidity, the reserve ratio and the maturity threshold; shrinking one
    /// only against the maturity threshold. Returns the locker's offer id.
    pub fn submit_or_edit_offer(
        &mut self,
        caller: Address,
        auction: Address,
        instrument: Address,
        id_hash: B256,
        price_hash: B256,
        amount: U256,
    ) -> Result<OfferId, StrategyError> {
        self.guarded(caller, Access::Management, |s, ctx| {
            if amount.is_zero() {
                return Err(StrategyError::ZeroAmount);
            }
            if !ctx.ext.eligibility.is_recognized(auction)? {
                return Err(StrategyError::InvalidAuction(auction));
            }
            let info = ctx.ext.auctions.auction(auction)?;
            if info.instrument != instrument {
                return Err(StrategyError::InstrumentMismatch {
                    auction,
                    expected: info.instrument,
                    actual: instrument,
                });
            }
            if info.completed || !info.is_open(ctx.now) {
                return Err(StrategyError::AuctionNotOpen(auction));
            }
            s.repo_tokens.validate_repo_token(ctx, instrument)?;

            s.reconcile(ctx)?;

            let offer_id = derive_offer_id(id_hash, ctx.holder, info.offer_locker);
            let current = s.pending.get(&offer_id).map_or(U256::ZERO, |o| o.amount);

            let liquid = s.liquid_balance_at(ctx)?;
            let liquid_after = if amount > current {
                let debit = amount - current;
                s.validate_concentration(ctx, instrument, debit, debit)?;
                s.require_liquidity(ctx, debit)?;
                s.validate_reserve(ctx, debit, debit)?;
                liquid - debit
            } else {
                liquid.saturating_add(current - amount)
            };
            s.validate_weighted_maturity(
                ctx,
                Hypothetical::Offer {
                    offer_id,
                    instrument,
                    amount,
                },
                liquid_after,
            )?;

            if amount > current {
                s.rebalance_liquidity(ctx, amount - current)?;
            }

            let submission = OfferSubmission {
                id: if current.is_zero() { id_hash } else { offer_id },
                offeror: ctx.holder,
                price_hash,
                amount,
                purchase_asset: ctx.base_asset,
            };
            let ids = ctx.ext.lockers.lock(info.offer_locker, &[submission])?;
            let Some(locked_id) = ids.first().copied() else {
                return Err(StrategyError::NoOfferIdsReturned);
            };

            s.pending.insert_pending(
                ctx,
                locked_id,
                PendingOffer {
                    instrument,
                    amount,
                    auction,
                    offer_locker: info.offer_locker,
                },
            )?;

            if amount < current {
                s.rebalance_liquidity(ctx, U256::ZERO)?;
            }

            info!(%auction, %instrument, offer_id = %locked_id, %current, %amount, "offer locked");
            Ok(locked_id)
        })
    }

    /// Withdraw `offer_ids` from `auction`'s locker and sweep the refunded
    /// liquidity into the reserve.
    pub fn delete_offers(
        &mut self,
        caller: Address,
        auction: Address,
        offer_ids: &[OfferId],
    ) -> Result<SweepReport, StrategyError> {
        self.guarded(caller, Access::Management, |s, ctx| {
            if !ctx.ext.eligibility.is_recognized(auction)? {
                return Err(StrategyError::InvalidAuction(auction));
            }
            let info = ctx.ext.auctions.auction(auction)?;
            ctx.ext.lockers.unlock(info.offer_locker, offer_ids)?;
            info!(%auction, count = offer_ids.len(), "offers unlocked");
            s.sweep_inner(ctx, U256::ZERO)
        })
    }

    // -----------------------------------------------------------------------
    // Purchases
    // -----------------------------------------------------------------------

    /// Buy `amount` native units of `instrument` from `caller`, paying the
    /// present value at the oracle rate plus markup. Returns the proceeds paid.
    pub fn sell_repo_token(
        &mut self,
        caller: Address,
        instrument: Address,
        amount: U256,
    ) -> Result<U256, StrategyError> {
        self.guarded(caller, Access::Anyone, |s, ctx| {
            if amount.is_zero() {
                return Err(StrategyError::ZeroAmount);
            }
            if s.is_blacklisted(&instrument) {
                return Err(StrategyError::Blacklisted(instrument));
            }

            let record = s.repo_tokens.validate_and_insert(ctx, instrument)?;
            s.reconcile(ctx)?;

            let rate = record
                .discount_rate
                .saturating_add(s.params.discount_rate_markup);
            let (face, proceeds) = s.price_at(ctx, instrument, rate, amount)?;
            if proceeds.is_zero() {
                return Err(StrategyError::ZeroAmount);
            }

            let liquid = s.require_liquidity(ctx, proceeds)?;
            s.validate_concentration(ctx, instrument, face, proceeds)?;
            s.validate_weighted_maturity(
                ctx,
                Hypothetical::Purchase { instrument, amount },
                liquid - proceeds,
            )?;
            s.validate_reserve(ctx, proceeds, face)?;

            s.rebalance_liquidity(ctx, proceeds)?;
            ctx.ext.tokens.transfer(instrument, caller, ctx.holder, amount)?;
            ctx.ext.tokens.transfer(ctx.base_asset, ctx.holder, caller, proceeds)?;

            info!(seller = %caller, %instrument, %amount, %face, %proceeds, %rate, "instrument purchased");
            Ok(proceeds)
        })
    }
}
