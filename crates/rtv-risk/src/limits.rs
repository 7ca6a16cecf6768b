//! Portfolio valuation and the three pre-trade limits.
//!
//! Every check is evaluated against the portfolio as it would look after the
//! trade: `delta` is value entering the portfolio at face, `liquid_removed`
//! is liquidity leaving it.

use rtv_registry::{OfferWhatIf, RegistryContext};
use rtv_schemas::{Address, U256};
use rtv_valuation::{normalized_amount, present_value, weighted_time_to_maturity, Rate, ValuationError};
use tracing::debug;

use crate::{Hypothetical, SimulationResult, Strategy, StrategyError};

fn add(a: U256, b: U256, op: &'static str) -> Result<U256, StrategyError> {
    a.checked_add(b)
        .ok_or(StrategyError::Valuation(ValuationError::Overflow { op }))
}

fn ratio(numerator: U256, denominator: U256, op: &'static str) -> Result<Rate, StrategyError> {
    Rate::ratio(numerator, denominator).ok_or(StrategyError::Valuation(ValuationError::Overflow { op }))
}

fn to_secs(v: U256) -> u64 {
    u64::try_from(v).unwrap_or(u64::MAX)
}

impl Strategy {
    // -----------------------------------------------------------------------
    // Valuation (context-bound)
    // -----------------------------------------------------------------------

    /// Base asset held directly plus the reserve position valued in base.
    pub(crate) fn liquid_balance_at(&self, ctx: &RegistryContext<'_>) -> Result<U256, StrategyError> {
        let direct = ctx.ext.tokens.balance_of(ctx.base_asset, ctx.holder)?;
        let reserve = ctx.ext.reserve.balance_in_base_asset(ctx.holder)?;
        add(direct, reserve, "liquid_balance")
    }

    pub(crate) fn total_asset_value_at(&self, ctx: &RegistryContext<'_>) -> Result<U256, StrategyError> {
        let liquid = self.liquid_balance_at(ctx)?;
        let repo = self.repo_tokens.present_value(ctx, None)?;
        let pending = self.pending.present_value(ctx, &self.repo_tokens, None)?;
        add(add(liquid, repo, "total_asset_value")?, pending, "total_asset_value")
    }

    pub(crate) fn holding_value_at(
        &self,
        ctx: &RegistryContext<'_>,
        instrument: Address,
    ) -> Result<U256, StrategyError> {
        let repo = self.repo_tokens.present_value(ctx, Some(instrument))?;
        let pending = self.pending.present_value(ctx, &self.repo_tokens, Some(instrument))?;
        add(repo, pending, "holding_value")
    }

    /// `(holding + delta) / (total + delta - liquid_removed)`; zero with no
    /// instrument or an empty portfolio.
    pub(crate) fn concentration_ratio_at(
        &self,
        ctx: &RegistryContext<'_>,
        instrument: Option<Address>,
        delta: U256,
        liquid_removed: U256,
    ) -> Result<Rate, StrategyError> {
        let Some(instrument) = instrument else {
            return Ok(Rate::ZERO);
        };
        let holding = self.holding_value_at(ctx, instrument)?;
        let total = add(self.total_asset_value_at(ctx)?, delta, "concentration.total")?
            .saturating_sub(liquid_removed);
        ratio(add(holding, delta, "concentration.holding")?, total, "concentration")
    }

    /// Liquid share of total asset value after moving `liquid_removed` out of
    /// liquidity and `value_added` into the portfolio.
    pub(crate) fn liquid_reserve_ratio_at(
        &self,
        ctx: &RegistryContext<'_>,
        liquid_removed: U256,
        value_added: U256,
    ) -> Result<Rate, StrategyError> {
        let liquid = self.liquid_balance_at(ctx)?.saturating_sub(liquid_removed);
        let total = add(self.total_asset_value_at(ctx)?, value_added, "reserve.total")?
            .saturating_sub(liquid_removed);
        ratio(liquid, total, "reserve_ratio")
    }

    /// Amount-weighted seconds to maturity over holdings, pending offers and
    /// `hypo`, with `liquid` counted at zero time.
    pub(crate) fn weighted_maturity_at(
        &self,
        ctx: &RegistryContext<'_>,
        hypo: Hypothetical,
        liquid: U256,
    ) -> Result<u64, StrategyError> {
        let (purchase, what_if) = match hypo {
            Hypothetical::None => (None, None),
            Hypothetical::Purchase { instrument, amount } => (Some((instrument, amount)), None),
            Hypothetical::Offer {
                offer_id,
                instrument,
                amount,
            } => (
                None,
                Some(OfferWhatIf {
                    offer_id,
                    instrument,
                    amount,
                }),
            ),
        };

        let repo = self.repo_tokens.cumulative_data(ctx, purchase)?;
        let offers = self.pending.cumulative_offer_data(ctx, &self.repo_tokens, what_if)?;
        let mut weighted = add(repo.weighted_time, offers.weighted_time, "weighted_maturity")?;
        let mut amount = add(repo.amount, offers.amount, "weighted_maturity")?;

        // Exposure the registries do not track yet.
        let extra = match hypo {
            Hypothetical::Purchase { instrument, amount } if !repo.found => {
                let terms = ctx.ext.eligibility.instrument_terms(instrument)?;
                let face = normalized_amount(&terms.units(), amount, ctx.base_precision)?;
                Some((terms.maturity, face))
            }
            Hypothetical::Offer {
                instrument, amount, ..
            } if !offers.found => {
                let terms = ctx.ext.eligibility.instrument_terms(instrument)?;
                Some((terms.maturity, amount))
            }
            _ => None,
        };
        if let Some((maturity, face)) = extra {
            if maturity > ctx.now {
                let term = weighted_time_to_maturity(maturity, face, ctx.now)?;
                weighted = add(weighted, term, "weighted_maturity")?;
                amount = add(amount, face, "weighted_maturity")?;
            }
        }

        let denominator = add(amount, liquid, "weighted_maturity")?;
        if denominator.is_zero() {
            return Ok(0);
        }
        Ok(to_secs(weighted / denominator))
    }

    // -----------------------------------------------------------------------
    // Limit checks
    // -----------------------------------------------------------------------

    pub(crate) fn validate_concentration(
        &self,
        ctx: &RegistryContext<'_>,
        instrument: Address,
        delta: U256,
        liquid_removed: U256,
    ) -> Result<(), StrategyError> {
        let ratio = self.concentration_ratio_at(ctx, Some(instrument), delta, liquid_removed)?;
        let limit = self.params.concentration_limit;
        debug!(%instrument, %ratio, %limit, "concentration check");
        if ratio > limit {
            return Err(StrategyError::ConcentrationTooHigh {
                instrument,
                ratio,
                limit,
            });
        }
        Ok(())
    }

    pub(crate) fn validate_weighted_maturity(
        &self,
        ctx: &RegistryContext<'_>,
        hypo: Hypothetical,
        liquid_after: U256,
    ) -> Result<(), StrategyError> {
        let weighted = self.weighted_maturity_at(ctx, hypo, liquid_after)?;
        let threshold = self.params.time_to_maturity_threshold;
        debug!(weighted, threshold, "weighted maturity check");
        if weighted > threshold {
            return Err(StrategyError::MaturityThresholdExceeded { weighted, threshold });
        }
        Ok(())
    }

    pub(crate) fn validate_reserve(
        &self,
        ctx: &RegistryContext<'_>,
        liquid_removed: U256,
        value_added: U256,
    ) -> Result<(), StrategyError> {
        let ratio = self.liquid_reserve_ratio_at(ctx, liquid_removed, value_added)?;
        let required = self.params.required_reserve_ratio;
        debug!(%ratio, %required, "reserve check");
        if ratio < required {
            return Err(StrategyError::LiquidityBelowReserve { ratio, required });
        }
        Ok(())
    }

    pub(crate) fn require_liquidity(
        &self,
        ctx: &RegistryContext<'_>,
        required: U256,
    ) -> Result<U256, StrategyError> {
        let available = self.liquid_balance_at(ctx)?;
        if available < required {
            return Err(StrategyError::InsufficientLiquidity { required, available });
        }
        Ok(available)
    }

    /// Base-asset face and purchase price of `amount` native units of a
    /// tracked `instrument`, discounted at `rate`.
    pub(crate) fn price_at(
        &self,
        ctx: &RegistryContext<'_>,
        instrument: Address,
        rate: Rate,
        amount: U256,
    ) -> Result<(U256, U256), StrategyError> {
        let terms = ctx.ext.eligibility.instrument_terms(instrument)?;
        let face = normalized_amount(&terms.units(), amount, ctx.base_precision)?;
        let pv = present_value(face, ctx.base_precision, terms.maturity, rate, ctx.now)?;
        Ok((face, pv))
    }

    // -----------------------------------------------------------------------
    // Read-only queries
    // -----------------------------------------------------------------------

    pub fn total_liquid_balance(&self) -> Result<U256, StrategyError> {
        let ctx = self.context(&self.ext, self.ext.now());
        self.liquid_balance_at(&ctx)
    }

    /// Liquid balance plus the present value of holdings and pending offers.
    pub fn total_asset_value(&self) -> Result<U256, StrategyError> {
        let ctx = self.context(&self.ext, self.ext.now());
        self.total_asset_value_at(&ctx)
    }

    pub fn liquid_reserve_ratio(&self) -> Result<Rate, StrategyError> {
        let ctx = self.context(&self.ext, self.ext.now());
        self.liquid_reserve_ratio_at(&ctx, U256::ZERO, U256::ZERO)
    }

    /// Present value of everything held or offered on `instrument`.
    pub fn instrument_holding_value(&self, instrument: Address) -> Result<U256, StrategyError> {
        let ctx = self.context(&self.ext, self.ext.now());
        self.holding_value_at(&ctx, instrument)
    }

    /// Present value of `amount` native units of `instrument` at `rate`.
    pub fn calculate_instrument_present_value(
        &self,
        instrument: Address,
        rate: Rate,
        amount: U256,
    ) -> Result<U256, StrategyError> {
        let ctx = self.context(&self.ext, self.ext.now());
        Ok(self.price_at(&ctx, instrument, rate, amount)?.1)
    }

    /// Weighted seconds to maturity if `amount` native units of `instrument`
    /// were added, with `liquid` counted at zero time.
    pub fn calculate_weighted_maturity(
        &self,
        instrument: Option<Address>,
        amount: U256,
        liquid: U256,
    ) -> Result<u64, StrategyError> {
        let ctx = self.context(&self.ext, self.ext.now());
        let hypo = match instrument {
            Some(instrument) => Hypothetical::Purchase { instrument, amount },
            None => Hypothetical::None,
        };
        self.weighted_maturity_at(&ctx, hypo, liquid)
    }

    /// Post-trade metrics for buying `amount` native units of `instrument`
    /// at the marked-up oracle rate, or for the current portfolio with `None`.
    ///
    /// Nothing is inserted or transferred.
    pub fn simulate_transaction(
        &self,
        instrument: Option<Address>,
        amount: U256,
    ) -> Result<SimulationResult, StrategyError> {
        let ctx = self.context(&self.ext, self.ext.now());
        let liquid = self.liquid_balance_at(&ctx)?;

        let (face, proceeds) = match instrument {
            Some(instrument) => {
                self.repo_tokens.validate_repo_token(&ctx, instrument)?;
                let rate = ctx
                    .ext
                    .rates
                    .discount_rate(instrument)?
                    .saturating_add(self.params.discount_rate_markup);
                self.price_at(&ctx, instrument, rate, amount)?
            }
            None => (U256::ZERO, U256::ZERO),
        };

        let liquid_after = liquid.saturating_sub(proceeds);
        let hypo = match instrument {
            Some(instrument) => Hypothetical::Purchase { instrument, amount },
            None => Hypothetical::None,
        };

        Ok(SimulationResult {
            weighted_maturity: self.weighted_maturity_at(&ctx, hypo, liquid_after)?,
            concentration_ratio: self.concentration_ratio_at(&ctx, instrument, face, proceeds)?,
            liquidity_ratio: self.liquid_reserve_ratio_at(&ctx, proceeds, face)?,
            proceeds,
        })
    }
}
