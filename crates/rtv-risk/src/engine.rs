use std::collections::HashSet;

use rtv_config::{RiskParameters, StrategyConfig};
use rtv_registry::{PendingOfferRegistry, RegistryContext, RepoTokenRegistry};
use rtv_schemas::{Address, Collaborators, OfferId, Timestamp};
use rtv_valuation::{precision, Rate};
use tracing::{info, warn};

use crate::{Access, CallState, StrategyError, StrategyIdentity};

/// The strategy's registries, limits, and guard state.
///
/// Every state-changing entry point runs inside [`Strategy::guarded`]: one call
/// at a time, role and pause checks first, and both registries restored if the
/// call fails. Collaborator side effects are not rolled back here; the host is
/// expected to discard them along with the failed call.
pub struct Strategy {
    pub(crate) id: StrategyIdentity,
    pub(crate) params: RiskParameters,
    pub(crate) repo_tokens: RepoTokenRegistry,
    pub(crate) pending: PendingOfferRegistry,
    pub(crate) blacklist: HashSet<Address>,
    pub(crate) paused: bool,
    pub(crate) call_state: CallState,
    pub(crate) ext: Collaborators,
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategy")
            .field("id", &self.id)
            .field("params", &self.params)
            .field("holdings", &self.repo_tokens.len())
            .field("pending", &self.pending.len())
            .field("paused", &self.paused)
            .finish()
    }
}

impl Strategy {
    pub fn new(id: StrategyIdentity, params: RiskParameters, ext: Collaborators) -> Self {
        Self {
            id,
            params,
            repo_tokens: RepoTokenRegistry::new(),
            pending: PendingOfferRegistry::new(),
            blacklist: HashSet::new(),
            paused: false,
            call_state: CallState::Idle,
            ext,
        }
    }

    /// Build from a parsed config: identity, limits, collateral minimums, and
    /// blacklist.
    pub fn from_config(cfg: &StrategyConfig, ext: Collaborators) -> Result<Self, StrategyError> {
        let id = StrategyIdentity {
            address: cfg.identity,
            management: cfg.management,
            base_asset: cfg.base_asset,
            base_precision: precision(cfg.base_decimals)?,
        };
        let mut s = Self::new(id, cfg.risk, ext);
        for (token, ratio) in &cfg.collateral_min_ratios {
            s.repo_tokens.set_collateral_token_param(*token, *ratio);
        }
        s.blacklist.extend(cfg.repo_token_blacklist.iter().copied());
        Ok(s)
    }

    pub fn identity(&self) -> &StrategyIdentity {
        &self.id
    }

    pub fn params(&self) -> &RiskParameters {
        &self.params
    }

    pub fn repo_tokens(&self) -> &RepoTokenRegistry {
        &self.repo_tokens
    }

    pub fn pending(&self) -> &PendingOfferRegistry {
        &self.pending
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.ext
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_blacklisted(&self, instrument: &Address) -> bool {
        self.blacklist.contains(instrument)
    }

    /// Held instruments, earliest maturity first.
    pub fn holdings(&self) -> Vec<Address> {
        self.repo_tokens.holdings()
    }

    /// Pending offer ids, ascending auction address.
    pub fn pending_offers(&self) -> Vec<OfferId> {
        self.pending.pending_offers()
    }

    // -----------------------------------------------------------------------
    // Guard
    // -----------------------------------------------------------------------

    pub(crate) fn context<'a>(&self, ext: &'a Collaborators, now: Timestamp) -> RegistryContext<'a> {
        RegistryContext {
            ext,
            holder: self.id.address,
            base_asset: self.id.base_asset,
            base_precision: self.id.base_precision,
            now,
        }
    }

    fn check_access(&self, caller: Address, access: Access) -> Result<(), StrategyError> {
        if self.call_state == CallState::InProgress {
            return Err(StrategyError::Reentrant);
        }
        if access == Access::Management && caller != self.id.management {
            return Err(StrategyError::Unauthorized { caller });
        }
        Ok(())
    }

    /// Run `f` as one atomic state-changing call.
    ///
    /// Order of checks: re-entrancy, role, pause. The clock is read once and
    /// shared by everything `f` does.
    pub(crate) fn guarded<T>(
        &mut self,
        caller: Address,
        access: Access,
        f: impl FnOnce(&mut Self, &RegistryContext<'_>) -> Result<T, StrategyError>,
    ) -> Result<T, StrategyError> {
        self.check_access(caller, access)?;
        if self.paused {
            return Err(StrategyError::Paused);
        }

        let ext = self.ext.clone();
        let ctx = self.context(&ext, ext.now());
        let snapshot = (self.repo_tokens.clone(), self.pending.clone());

        self.call_state = CallState::InProgress;
        let out = f(self, &ctx);
        self.call_state = CallState::Idle;

        if let Err(e) = &out {
            warn!(%caller, error = %e, "call rejected; registries restored");
            (self.repo_tokens, self.pending) = snapshot;
        }
        out
    }

    /// Management-only mutation that stays available while paused.
    fn admin(
        &mut self,
        caller: Address,
        f: impl FnOnce(&mut Self) -> Result<(), StrategyError>,
    ) -> Result<(), StrategyError> {
        self.check_access(caller, Access::Management)?;
        f(self)
    }

    // -----------------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------------

    pub fn pause(&mut self, caller: Address) -> Result<(), StrategyError> {
        self.admin(caller, |s| {
            s.paused = true;
            info!("strategy paused");
            Ok(())
        })
    }

    pub fn unpause(&mut self, caller: Address) -> Result<(), StrategyError> {
        self.admin(caller, |s| {
            s.paused = false;
            info!("strategy unpaused");
            Ok(())
        })
    }

    pub fn set_time_to_maturity_threshold(
        &mut self,
        caller: Address,
        secs: u64,
    ) -> Result<(), StrategyError> {
        self.admin(caller, |s| {
            info!(old = s.params.time_to_maturity_threshold, new = secs, "maturity threshold set");
            s.params.time_to_maturity_threshold = secs;
            Ok(())
        })
    }

    pub fn set_required_reserve_ratio(&mut self, caller: Address, ratio: Rate) -> Result<(), StrategyError> {
        self.admin(caller, |s| {
            check_fraction("required_reserve_ratio", ratio)?;
            info!(old = %s.params.required_reserve_ratio, new = %ratio, "reserve ratio set");
            s.params.required_reserve_ratio = ratio;
            Ok(())
        })
    }

    pub fn set_concentration_limit(&mut self, caller: Address, limit: Rate) -> Result<(), StrategyError> {
        self.admin(caller, |s| {
            check_fraction("concentration_limit", limit)?;
            info!(old = %s.params.concentration_limit, new = %limit, "concentration limit set");
            s.params.concentration_limit = limit;
            Ok(())
        })
    }

    pub fn set_discount_rate_markup(&mut self, caller: Address, markup: Rate) -> Result<(), StrategyError> {
        self.admin(caller, |s| {
            info!(old = %s.params.discount_rate_markup, new = %markup, "discount markup set");
            s.params.discount_rate_markup = markup;
            Ok(())
        })
    }

    /// Minimum maintenance ratio for a collateral token. Zero removes it.
    pub fn set_collateral_token_param(
        &mut self,
        caller: Address,
        token: Address,
        min_ratio: Rate,
    ) -> Result<(), StrategyError> {
        self.admin(caller, |s| {
            s.repo_tokens.set_collateral_token_param(token, min_ratio);
            info!(%token, min_ratio = %min_ratio, "collateral minimum set");
            Ok(())
        })
    }

    pub fn set_repo_token_blacklist(
        &mut self,
        caller: Address,
        instrument: Address,
        blacklisted: bool,
    ) -> Result<(), StrategyError> {
        self.admin(caller, |s| {
            if blacklisted {
                s.blacklist.insert(instrument);
            } else {
                s.blacklist.remove(&instrument);
            }
            info!(%instrument, blacklisted, "blacklist updated");
            Ok(())
        })
    }
}

fn check_fraction(name: &'static str, value: Rate) -> Result<(), StrategyError> {
    if value > Rate::ONE {
        return Err(StrategyError::InvalidParameter {
            name,
            reason: format!("{value} exceeds 1.0"),
        });
    }
    Ok(())
}
