use rtv_schemas::{Address, ExternalError, OfferId, Timestamp};
use rtv_valuation::{Rate, ValuationError};

/// Why an instrument failed eligibility.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IneligibleReason {
    #[error("not recognized by the eligibility oracle")]
    NotRecognized,
    #[error("purchase asset {actual} is not the base asset {expected}")]
    WrongPurchaseAsset { expected: Address, actual: Address },
    #[error("matured at {maturity}")]
    Matured { maturity: Timestamp },
    #[error("collateral token {token} has no configured minimum ratio")]
    CollateralUnconfigured { token: Address },
    #[error("collateral token {token} maintenance ratio {ratio} below minimum {minimum}")]
    CollateralBelowMinimum {
        token: Address,
        ratio: Rate,
        minimum: Rate,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("instrument {instrument} is ineligible: {reason}")]
    IneligibleInstrument {
        instrument: Address,
        reason: IneligibleReason,
    },
    #[error("null key")]
    NullKey,
    #[error("auction {0} already completed")]
    AuctionCompleted(Address),
    #[error("unknown offer {0}")]
    UnknownOffer(OfferId),
    #[error(transparent)]
    External(#[from] ExternalError),
    #[error(transparent)]
    Valuation(#[from] ValuationError),
}

impl RegistryError {
    pub(crate) fn ineligible(instrument: Address, reason: IneligibleReason) -> Self {
        RegistryError::IneligibleInstrument { instrument, reason }
    }
}
