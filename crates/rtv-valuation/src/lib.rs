//! rtv-valuation
//!
//! Present-value and precision helpers for fixed-maturity instruments.
//! - 1e18 fixed-point `Rate` (discount rates, ratios, fractions)
//! - Native-unit → base-precision normalization
//! - Simple-interest discounting over a 365-day year
//!
//! Pure deterministic logic: no IO, no clock. Callers pass `now`.

mod fixedpoint;
mod present_value;

pub use fixedpoint::{Rate, RateParseError};
pub use present_value::{
    normalized_amount, precision, present_value, time_to_maturity, weighted_time_to_maturity,
    NativeUnits, ValuationError,
};

use alloy_primitives::U256;

/// Fixed-point scale for rates and ratios (1e18 = 100%).
pub const RATE_PRECISION: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Seconds in the 365-day year used for discounting.
pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

/// Largest decimal count accepted for an instrument or the base asset.
pub const MAX_DECIMALS: u8 = 36;
