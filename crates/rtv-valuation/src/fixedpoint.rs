//! 1e18 fixed-point rate type.
//!
//! Discount rates, collateral ratios, concentration limits and reserve ratios
//! all share one scale: `Rate::ONE` is 100%. Wrapping the raw `U256` keeps
//! those values from being mixed with base-asset amounts by accident; there is
//! no `From<U256>` impl, construction goes through [`Rate::new`].

use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::RATE_PRECISION;

/// Annualized rate or dimensionless fraction at 1e18 scale.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Rate(U256);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateParseError {
    #[error("empty rate string")]
    Empty,
    #[error("invalid rate digits in '{0}'")]
    InvalidDigits(String),
    #[error("rate '{0}' has more than 18 fractional digits")]
    TooPrecise(String),
    #[error("rate '{0}' overflows 256 bits")]
    Overflow(String),
}

impl Rate {
    pub const ZERO: Rate = Rate(U256::ZERO);
    pub const ONE: Rate = Rate(RATE_PRECISION);

    #[inline]
    pub const fn new(raw: U256) -> Self {
        Rate(raw)
    }

    #[inline]
    pub const fn raw(self) -> U256 {
        self.0
    }

    /// Whole basis points (1 bp = 0.01%).
    pub fn from_bps(bps: u64) -> Self {
        Rate(U256::from(bps) * U256::from(100_000_000_000_000u64))
    }

    /// Parse a plain decimal such as `"0.05"` or `"1.2"`.
    pub fn from_decimal_str(s: &str) -> Result<Self, RateParseError> {
        let t = s.trim();
        if t.is_empty() {
            return Err(RateParseError::Empty);
        }
        let (int_part, frac_part) = match t.split_once('.') {
            Some((i, f)) => (i, f),
            None => (t, ""),
        };
        let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
        if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part)
        {
            return Err(RateParseError::InvalidDigits(t.to_string()));
        }
        if frac_part.len() > 18 {
            return Err(RateParseError::TooPrecise(t.to_string()));
        }

        let int_val = if int_part.is_empty() {
            U256::ZERO
        } else {
            U256::from_str_radix(int_part, 10)
                .map_err(|_| RateParseError::Overflow(t.to_string()))?
        };
        let frac_val = if frac_part.is_empty() {
            U256::ZERO
        } else {
            let padded = format!("{frac_part:0<18}");
            U256::from_str_radix(&padded, 10)
                .map_err(|_| RateParseError::InvalidDigits(t.to_string()))?
        };

        int_val
            .checked_mul(RATE_PRECISION)
            .and_then(|v| v.checked_add(frac_val))
            .map(Rate)
            .ok_or_else(|| RateParseError::Overflow(t.to_string()))
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn saturating_add(self, rhs: Rate) -> Rate {
        Rate(self.0.saturating_add(rhs.0))
    }

    /// `numerator / denominator` as a 1e18 fraction. Zero denominator yields zero.
    pub fn ratio(numerator: U256, denominator: U256) -> Option<Rate> {
        if denominator.is_zero() {
            return Some(Rate::ZERO);
        }
        numerator
            .checked_mul(RATE_PRECISION)
            .map(|n| Rate(n / denominator))
    }
}

impl FromStr for Rate {
    type Err = RateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rate::from_decimal_str(s)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let int_part = self.0 / RATE_PRECISION;
        let frac = (self.0 % RATE_PRECISION).to_string();
        let frac = format!("{frac:0>18}");
        let trimmed = frac.trim_end_matches('0');
        if trimmed.is_empty() {
            write!(f, "{int_part}")
        } else {
            write!(f, "{int_part}.{trimmed}")
        }
    }
}
