use rtv_registry::{CompletedSweepReport, IneligibleReason, MaturedSweepReport, RegistryError};
use rtv_schemas::{Address, ExternalError, OfferId, U256};
use rtv_valuation::{Rate, ValuationError};

/// Who may invoke an entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Only the management address.
    Management,
    /// Any caller meeting the economic checks.
    Anyone,
}

/// Re-entrancy guard state.
///
/// `&mut self` already rules out re-entry from safe code. The state matters
/// when a call unwinds: the engine stays `InProgress` and refuses further
/// calls instead of running on registries left mid-update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CallState {
    #[default]
    Idle,
    InProgress,
}

/// Fixed addresses and precision of one strategy instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StrategyIdentity {
    /// The strategy's own account; holds balances and offers.
    pub address: Address,
    pub management: Address,
    pub base_asset: Address,
    /// `10^base_decimals`.
    pub base_precision: U256,
}

/// Exposure to add to the portfolio before computing a weighted maturity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hypothetical {
    None,
    /// Buy `amount` native units of `instrument`.
    Purchase { instrument: Address, amount: U256 },
    /// Hold offer `offer_id` at `amount` (base precision).
    Offer {
        offer_id: OfferId,
        instrument: Address,
        amount: U256,
    },
}

/// Post-trade metrics from [`crate::Strategy::simulate_transaction`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimulationResult {
    /// Seconds.
    pub weighted_maturity: u64,
    pub concentration_ratio: Rate,
    pub liquidity_ratio: Rate,
    /// What the strategy would pay for the simulated purchase.
    pub proceeds: U256,
}

/// What one sweep removed from each registry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub completed: CompletedSweepReport,
    pub matured: MaturedSweepReport,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StrategyError {
    // guard
    #[error("{caller} is not authorized")]
    Unauthorized { caller: Address },
    #[error("re-entrant call rejected")]
    Reentrant,
    #[error("strategy is paused")]
    Paused,

    // validation
    #[error("zero amount")]
    ZeroAmount,
    #[error("auction {0} is not recognized")]
    InvalidAuction(Address),
    #[error("auction {auction} clears {expected}, not {actual}")]
    InstrumentMismatch {
        auction: Address,
        expected: Address,
        actual: Address,
    },
    #[error("auction {0} is not open")]
    AuctionNotOpen(Address),
    #[error("instrument {0} is blacklisted")]
    Blacklisted(Address),
    #[error("instrument {instrument} is ineligible: {reason}")]
    IneligibleInstrument {
        instrument: Address,
        reason: IneligibleReason,
    },
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    // limit breach
    #[error("concentration of {instrument} would be {ratio}, limit {limit}")]
    ConcentrationTooHigh {
        instrument: Address,
        ratio: Rate,
        limit: Rate,
    },
    #[error("weighted maturity would be {weighted}s, threshold {threshold}s")]
    MaturityThresholdExceeded { weighted: u64, threshold: u64 },
    #[error("liquid reserve ratio would be {ratio}, required {required}")]
    LiquidityBelowReserve { ratio: Rate, required: Rate },
    #[error("requires {required} liquid, {available} available")]
    InsufficientLiquidity { required: U256, available: U256 },

    // external
    #[error("offer locker returned no offer ids")]
    NoOfferIdsReturned,
    #[error(transparent)]
    External(ExternalError),
    #[error(transparent)]
    Registry(RegistryError),
    #[error(transparent)]
    Valuation(#[from] ValuationError),
}

impl From<ExternalError> for StrategyError {
    fn from(e: ExternalError) -> Self {
        StrategyError::External(e)
    }
}

impl From<RegistryError> for StrategyError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::IneligibleInstrument { instrument, reason } => {
                StrategyError::IneligibleInstrument { instrument, reason }
            }
            RegistryError::External(inner) => StrategyError::External(inner),
            RegistryError::Valuation(inner) => StrategyError::Valuation(inner),
            other => StrategyError::Registry(other),
        }
    }
}
