//! Repo-token registry: held instruments in ascending maturity order.
//!
//! An instrument is tracked once it has passed validation and had a discount
//! rate fetched for it. It leaves only through the matured sweep.

use std::collections::HashMap;

use rtv_schemas::{Address, InstrumentTerms, U256};
use rtv_valuation::{normalized_amount, present_value, weighted_time_to_maturity, Rate};
use tracing::{debug, warn};

use crate::chain::{Chain, Visit};
use crate::error::{IneligibleReason, RegistryError};
use crate::{checked_add, CumulativeData, RegistryContext};

/// Cached per-instrument state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepoTokenRecord {
    pub discount_rate: Rate,
    pub maturity: u64,
    pub servicer: Address,
}

/// Outcome of one matured-instrument sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaturedSweepReport {
    /// Redeemed with the servicer and removed.
    pub redeemed: Vec<Address>,
    /// Zero balance at maturity, removed without a redemption call.
    pub emptied: Vec<Address>,
    /// Redemption reverted; left in place for the next sweep.
    pub failed: Vec<Address>,
}

impl MaturedSweepReport {
    pub fn removed(&self) -> usize {
        self.redeemed.len() + self.emptied.len()
    }

    pub fn is_noop(&self) -> bool {
        self.redeemed.is_empty() && self.emptied.is_empty() && self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RepoTokenRegistry {
    chain: Chain<Address>,
    records: HashMap<Address, RepoTokenRecord>,
    collateral_token_params: HashMap<Address, Rate>,
}

impl RepoTokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn contains(&self, instrument: &Address) -> bool {
        self.chain.contains(instrument)
    }

    pub fn record(&self, instrument: &Address) -> Option<&RepoTokenRecord> {
        self.records.get(instrument)
    }

    /// Cached rate; `None` means the instrument is not tracked.
    pub fn discount_rate(&self, instrument: &Address) -> Option<Rate> {
        self.records.get(instrument).map(|r| r.discount_rate)
    }

    /// Tracked instruments, earliest maturity first.
    pub fn holdings(&self) -> Vec<Address> {
        self.chain.keys()
    }

    pub fn chain(&self) -> &Chain<Address> {
        &self.chain
    }

    /// Minimum maintenance ratio accepted for `token`. Zero unsets it.
    pub fn set_collateral_token_param(&mut self, token: Address, min_ratio: Rate) {
        if min_ratio.is_zero() {
            self.collateral_token_params.remove(&token);
        } else {
            self.collateral_token_params.insert(token, min_ratio);
        }
    }

    pub fn collateral_token_param(&self, token: &Address) -> Option<Rate> {
        self.collateral_token_params.get(token).copied()
    }

    // -----------------------------------------------------------------------
    // Validation / insertion
    // -----------------------------------------------------------------------

    /// Eligibility check with no mutation. Returns the instrument's terms.
    pub fn validate_repo_token(
        &self,
        ctx: &RegistryContext<'_>,
        instrument: Address,
    ) -> Result<InstrumentTerms, RegistryError> {
        let ext = ctx.ext;
        if instrument.is_zero() || !ext.eligibility.is_recognized(instrument)? {
            return Err(RegistryError::ineligible(instrument, IneligibleReason::NotRecognized));
        }

        let terms = ext.eligibility.instrument_terms(instrument)?;
        if terms.purchase_asset != ctx.base_asset {
            return Err(RegistryError::ineligible(
                instrument,
                IneligibleReason::WrongPurchaseAsset {
                    expected: ctx.base_asset,
                    actual: terms.purchase_asset,
                },
            ));
        }
        if terms.is_matured(ctx.now) {
            return Err(RegistryError::ineligible(
                instrument,
                IneligibleReason::Matured {
                    maturity: terms.maturity,
                },
            ));
        }

        for c in ext.collateral.collateral_ratios(terms.collateral_manager)? {
            let Some(minimum) = self.collateral_token_param(&c.token) else {
                return Err(RegistryError::ineligible(
                    instrument,
                    IneligibleReason::CollateralUnconfigured { token: c.token },
                ));
            };
            if c.maintenance_ratio < minimum {
                return Err(RegistryError::ineligible(
                    instrument,
                    IneligibleReason::CollateralBelowMinimum {
                        token: c.token,
                        ratio: c.maintenance_ratio,
                        minimum,
                    },
                ));
            }
        }
        Ok(terms)
    }

    /// Validate and start tracking `instrument`, or refresh its cached rate if
    /// it is already tracked. Returns the record in effect afterwards.
    pub fn validate_and_insert(
        &mut self,
        ctx: &RegistryContext<'_>,
        instrument: Address,
    ) -> Result<RepoTokenRecord, RegistryError> {
        if let Some(cached) = self.records.get(&instrument).copied() {
            if cached.maturity <= ctx.now {
                return Err(RegistryError::ineligible(
                    instrument,
                    IneligibleReason::Matured {
                        maturity: cached.maturity,
                    },
                ));
            }
            return Ok(self.refresh_rate(ctx, instrument, cached));
        }

        let terms = self.validate_repo_token(ctx, instrument)?;
        let discount_rate = ctx.ext.rates.discount_rate(instrument)?;
        self.track(instrument, &terms, discount_rate)
    }

    /// Track the instrument a completed auction delivered.
    ///
    /// Unmatured instruments go through [`Self::validate_and_insert`]. A matured
    /// one is tracked as-is so the next matured sweep redeems it; its cached
    /// rate is irrelevant since matured holdings are valued at face.
    pub fn insert_settled(
        &mut self,
        ctx: &RegistryContext<'_>,
        instrument: Address,
    ) -> Result<RepoTokenRecord, RegistryError> {
        if let Some(cached) = self.records.get(&instrument).copied() {
            if cached.maturity <= ctx.now {
                return Ok(cached);
            }
            return Ok(self.refresh_rate(ctx, instrument, cached));
        }

        let terms = ctx.ext.eligibility.instrument_terms(instrument)?;
        if !terms.is_matured(ctx.now) {
            return self.validate_and_insert(ctx, instrument);
        }
        let discount_rate = match ctx.ext.rates.discount_rate(instrument) {
            Ok(rate) => rate,
            Err(e) => {
                debug!(%instrument, error = %e, "no rate for matured settlement");
                Rate::ZERO
            }
        };
        warn!(%instrument, maturity = terms.maturity, "settled instrument already matured");
        self.track(instrument, &terms, discount_rate)
    }

    // An oracle that cannot answer leaves the cached rate in force.
    fn refresh_rate(
        &mut self,
        ctx: &RegistryContext<'_>,
        instrument: Address,
        cached: RepoTokenRecord,
    ) -> RepoTokenRecord {
        match ctx.ext.rates.discount_rate(instrument) {
            Ok(rate) if !rate.is_zero() && rate != cached.discount_rate => {
                debug!(%instrument, old = %cached.discount_rate, new = %rate, "discount rate refreshed");
                let rec = RepoTokenRecord {
                    discount_rate: rate,
                    ..cached
                };
                self.records.insert(instrument, rec);
                rec
            }
            Ok(_) => cached,
            Err(e) => {
                debug!(%instrument, error = %e, "oracle unavailable; keeping cached rate");
                cached
            }
        }
    }

    fn track(
        &mut self,
        instrument: Address,
        terms: &InstrumentTerms,
        discount_rate: Rate,
    ) -> Result<RepoTokenRecord, RegistryError> {
        let record = RepoTokenRecord {
            discount_rate,
            maturity: terms.maturity,
            servicer: terms.servicer,
        };
        let records = &self.records;
        self.chain
            .insert_sorted_by::<RegistryError>(instrument, |existing| {
                Ok(records
                    .get(existing)
                    .is_some_and(|r| terms.maturity <= r.maturity))
            })?;
        self.records.insert(instrument, record);
        debug!(%instrument, maturity = terms.maturity, rate = %discount_rate, "instrument tracked");
        Ok(record)
    }

    // -----------------------------------------------------------------------
    // Valuation
    // -----------------------------------------------------------------------

    /// Base-precision face value of the holder's balance of `instrument`.
    pub fn normalized_balance(
        ctx: &RegistryContext<'_>,
        instrument: Address,
        extra_native: U256,
    ) -> Result<U256, RegistryError> {
        let balance = ctx.ext.tokens.balance_of(instrument, ctx.holder)?;
        let raw = checked_add(balance, extra_native, "repo.balance")?;
        if raw.is_zero() {
            return Ok(U256::ZERO);
        }
        let terms = ctx.ext.eligibility.instrument_terms(instrument)?;
        Ok(normalized_amount(&terms.units(), raw, ctx.base_precision)?)
    }

    /// Σ present value over tracked instruments, or just `filter` if given.
    pub fn present_value(
        &self,
        ctx: &RegistryContext<'_>,
        filter: Option<Address>,
    ) -> Result<U256, RegistryError> {
        let mut total = U256::ZERO;
        for instrument in self.chain.iter() {
            if filter.is_some_and(|f| f != *instrument) {
                continue;
            }
            let Some(rec) = self.records.get(instrument) else {
                continue;
            };
            let face = Self::normalized_balance(ctx, *instrument, U256::ZERO)?;
            if face.is_zero() {
                continue;
            }
            let pv = present_value(
                face,
                ctx.base_precision,
                rec.maturity,
                rec.discount_rate,
                ctx.now,
            )?;
            total = checked_add(total, pv, "repo.present_value")?;
        }
        Ok(total)
    }

    /// Σ (amount × time-to-maturity) and Σ amount over unmatured holdings.
    ///
    /// `purchase` adds a hypothetical native-unit amount to one instrument's
    /// balance; `found` reports whether that instrument is tracked.
    pub fn cumulative_data(
        &self,
        ctx: &RegistryContext<'_>,
        purchase: Option<(Address, U256)>,
    ) -> Result<CumulativeData, RegistryError> {
        let mut out = CumulativeData::default();
        for instrument in self.chain.iter() {
            let Some(rec) = self.records.get(instrument) else {
                continue;
            };
            let extra = match purchase {
                Some((target, amount)) if target == *instrument => {
                    out.found = true;
                    amount
                }
                _ => U256::ZERO,
            };
            if rec.maturity <= ctx.now {
                continue;
            }
            let amount = Self::normalized_balance(ctx, *instrument, extra)?;
            if amount.is_zero() {
                continue;
            }
            let weighted = weighted_time_to_maturity(rec.maturity, amount, ctx.now)?;
            out.accumulate(amount, weighted)?;
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Matured sweep
    // -----------------------------------------------------------------------

    /// Redeem and drop every matured instrument.
    ///
    /// Walks from the earliest maturity and stops at the first instrument still
    /// running. A reverted redemption leaves only that instrument in place.
    pub fn remove_and_redeem_matured(
        &mut self,
        ctx: &RegistryContext<'_>,
    ) -> Result<MaturedSweepReport, RegistryError> {
        let mut report = MaturedSweepReport::default();
        let records = &mut self.records;

        self.chain.sweep::<RegistryError>(|instrument| {
            let Some(rec) = records.get(instrument).copied() else {
                return Ok(Visit::Remove);
            };
            if rec.maturity > ctx.now {
                return Ok(Visit::Stop);
            }

            let balance = ctx.ext.tokens.balance_of(*instrument, ctx.holder)?;
            if balance.is_zero() {
                records.remove(instrument);
                report.emptied.push(*instrument);
                return Ok(Visit::Remove);
            }

            match ctx.ext.servicer.redeem(rec.servicer, ctx.holder, balance) {
                Ok(()) => {
                    records.remove(instrument);
                    report.redeemed.push(*instrument);
                    Ok(Visit::Remove)
                }
                Err(e) => {
                    warn!(%instrument, error = %e, "matured redemption failed; skipping");
                    report.failed.push(*instrument);
                    Ok(Visit::Keep)
                }
            }
        })?;

        if !report.is_noop() {
            debug!(
                redeemed = report.redeemed.len(),
                emptied = report.emptied.len(),
                failed = report.failed.len(),
                "matured sweep"
            );
        }
        Ok(report)
    }
}
