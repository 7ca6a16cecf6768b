//! Present value and precision normalization.
//!
//! All amounts are `U256`. Every multiplication is checked; an overflow is
//! reported as [`ValuationError::Overflow`] naming the step that failed.

use alloy_primitives::U256;

use crate::{Rate, MAX_DECIMALS, RATE_PRECISION, SECONDS_PER_YEAR};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValuationError {
    #[error("arithmetic overflow in {op}")]
    Overflow { op: &'static str },
    #[error("unsupported decimal count {0}")]
    UnsupportedDecimals(u8),
}

/// How one unit of an instrument converts into base-asset face value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeUnits {
    pub decimals: u8,
    /// Base-asset face per whole instrument unit, 1e18 scale.
    pub redemption_value: Rate,
    /// Zero when the servicer reports no shortfall.
    pub redemption_haircut: Rate,
}

impl NativeUnits {
    /// Instrument redeemable 1:1 for the base asset with no shortfall.
    pub fn par(decimals: u8) -> Self {
        Self {
            decimals,
            redemption_value: Rate::ONE,
            redemption_haircut: Rate::ZERO,
        }
    }
}

/// `10^decimals`.
pub fn precision(decimals: u8) -> Result<U256, ValuationError> {
    if decimals > MAX_DECIMALS {
        return Err(ValuationError::UnsupportedDecimals(decimals));
    }
    U256::from(10u64)
        .checked_pow(U256::from(decimals))
        .ok_or(ValuationError::Overflow { op: "precision" })
}

fn mul(a: U256, b: U256, op: &'static str) -> Result<U256, ValuationError> {
    a.checked_mul(b).ok_or(ValuationError::Overflow { op })
}

/// Rescale `raw` native instrument units into base-asset face at `base_precision`.
pub fn normalized_amount(
    units: &NativeUnits,
    raw: U256,
    base_precision: U256,
) -> Result<U256, ValuationError> {
    let native_precision = precision(units.decimals)?;

    let face = mul(raw, units.redemption_value.raw(), "normalize.redemption")?;
    let scaled = mul(face, base_precision, "normalize.precision")?;
    let denominator = mul(native_precision, RATE_PRECISION, "normalize.denominator")?;
    let amount = scaled / denominator;

    if units.redemption_haircut.is_zero() {
        return Ok(amount);
    }
    Ok(mul(amount, units.redemption_haircut.raw(), "normalize.haircut")? / RATE_PRECISION)
}

/// Seconds from `now` until `maturity`, zero once matured.
#[inline]
pub fn time_to_maturity(maturity: u64, now: u64) -> u64 {
    maturity.saturating_sub(now)
}

/// `amount × seconds-to-maturity`, the numerator term of a weighted maturity.
pub fn weighted_time_to_maturity(
    maturity: u64,
    amount: U256,
    now: u64,
) -> Result<U256, ValuationError> {
    mul(
        U256::from(time_to_maturity(maturity, now)),
        amount,
        "weighted_time_to_maturity",
    )
}

/// Simple-interest discount of `face` to `now`:
/// `face / (1 + rate × ttm / year)`, never above `face`.
///
/// The year fraction is truncated at `base_precision`, so a coarse base
/// precision rounds the discount down rather than up.
pub fn present_value(
    face: U256,
    base_precision: U256,
    maturity: u64,
    rate: Rate,
    now: u64,
) -> Result<U256, ValuationError> {
    if now >= maturity || face.is_zero() || base_precision.is_zero() {
        return Ok(face);
    }

    let ttm = U256::from(maturity - now);
    let year_fraction = mul(ttm, base_precision, "present_value.year_fraction")?
        / U256::from(SECONDS_PER_YEAR);
    let interest = mul(rate.raw(), year_fraction, "present_value.interest")? / RATE_PRECISION;
    let denominator = base_precision
        .checked_add(interest)
        .ok_or(ValuationError::Overflow {
            op: "present_value.denominator",
        })?;

    let pv = mul(face, base_precision, "present_value.face")? / denominator;
    Ok(pv.min(face))
}
