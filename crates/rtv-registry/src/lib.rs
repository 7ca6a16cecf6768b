//! rtv-registry
//!
//! The two ordered registries the strategy values and risk-checks:
//! - [`RepoTokenRegistry`]: held instruments, ascending maturity
//! - [`PendingOfferRegistry`]: live auction offers, ascending auction address
//!
//! Both sit on [`Chain`], an arena-backed linked ordering. Registries own no
//! collaborators; every call receives a [`RegistryContext`].

mod chain;
mod error;
mod pending;
mod repo;

pub use chain::{Chain, ChainViolation, Iter, Visit};
pub use error::{IneligibleReason, RegistryError};
pub use pending::{CompletedSweepReport, OfferWhatIf, PendingOffer, PendingOfferRegistry};
pub use repo::{MaturedSweepReport, RepoTokenRecord, RepoTokenRegistry};

use rtv_schemas::{Address, Collaborators, Timestamp, U256};

/// Everything a registry call needs from its owner for one top-level call.
#[derive(Debug, Clone, Copy)]
pub struct RegistryContext<'a> {
    pub ext: &'a Collaborators,
    /// Account whose balances and offers are being tracked.
    pub holder: Address,
    pub base_asset: Address,
    pub base_precision: U256,
    pub now: Timestamp,
}

/// Running totals behind a weighted time-to-maturity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CumulativeData {
    /// Σ amount × seconds-to-maturity.
    pub weighted_time: U256,
    /// Σ amount, base precision.
    pub amount: U256,
    /// Whether the what-if subject was already tracked.
    pub found: bool,
}

impl CumulativeData {
    pub(crate) fn accumulate(&mut self, amount: U256, weighted: U256) -> Result<(), RegistryError> {
        self.amount = checked_add(self.amount, amount, "cumulative.amount")?;
        self.weighted_time = checked_add(self.weighted_time, weighted, "cumulative.weighted_time")?;
        Ok(())
    }
}

pub(crate) fn checked_add(a: U256, b: U256, op: &'static str) -> Result<U256, RegistryError> {
    a.checked_add(b)
        .ok_or(RegistryError::Valuation(rtv_valuation::ValuationError::Overflow { op }))
}
