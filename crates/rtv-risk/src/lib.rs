//! rtv-risk
//!
//! Risk and rebalancing engine for the term vault strategy.
//!
//! Goals:
//! - Price every state change against the post-trade portfolio
//! - Enforce concentration, reserve-ratio, and weighted-maturity limits
//! - Keep registries consistent: a rejected call leaves them untouched
//!
//! Collaborators (oracles, auctions, lockers, ledger, reserve) are reached only
//! through the seams in `rtv-schemas`, so the engine runs unchanged against the
//! in-memory world in `rtv-testkit`.

mod actions;
mod engine;
mod limits;
mod types;

pub use engine::Strategy;
pub use rtv_config::RiskParameters;
pub use types::{
    Access, CallState, Hypothetical, SimulationResult, StrategyError, StrategyIdentity,
    SweepReport,
};
