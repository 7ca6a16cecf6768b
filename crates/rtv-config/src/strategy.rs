use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use rtv_schemas::{Address, U256};
use rtv_valuation::{precision, Rate};
use serde_json::Value;

/// Limits the engine checks before every state-changing action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskParameters {
    /// Ceiling on portfolio weighted time-to-maturity, seconds.
    pub time_to_maturity_threshold: u64,
    /// Minimum liquid share of total asset value.
    pub required_reserve_ratio: Rate,
    /// Maximum share of total asset value in one instrument.
    pub concentration_limit: Rate,
    /// Added to the oracle rate when pricing an instrument the strategy buys.
    pub discount_rate_markup: Rate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyConfig {
    pub identity: Address,
    pub management: Address,
    pub base_asset: Address,
    pub base_decimals: u8,
    pub risk: RiskParameters,
    pub collateral_min_ratios: BTreeMap<Address, Rate>,
    pub repo_token_blacklist: Vec<Address>,
}

impl StrategyConfig {
    /// Build from canonical config JSON (produced by `load_layered_yaml*`).
    ///
    /// Required: everything under `/strategy` and `/risk`.
    /// Optional: `/collateral/min_ratios`, `/repo_token_blacklist`.
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        let identity = address_at(cfg, "/strategy/identity")?;
        let management = address_at(cfg, "/strategy/management")?;
        let base_asset = address_at(cfg, "/strategy/base_asset")?;

        let base_decimals = cfg
            .pointer("/strategy/base_decimals")
            .and_then(Value::as_u64)
            .context("config missing strategy.base_decimals (integer)")?;
        if base_decimals > 18 {
            bail!("strategy.base_decimals must be <= 18 (got {base_decimals})");
        }
        let base_decimals = base_decimals as u8;

        let time_to_maturity_threshold = cfg
            .pointer("/risk/time_to_maturity_threshold_secs")
            .and_then(Value::as_u64)
            .context("config missing risk.time_to_maturity_threshold_secs (integer)")?;

        let required_reserve_ratio = fraction_at(cfg, "/risk/required_reserve_ratio")?;
        let concentration_limit = fraction_at(cfg, "/risk/concentration_limit")?;
        let discount_rate_markup = rate_at(cfg, "/risk/discount_rate_markup")?;

        let mut collateral_min_ratios = BTreeMap::new();
        if let Some(v) = cfg.pointer("/collateral/min_ratios") {
            let map = v
                .as_object()
                .context("collateral.min_ratios must be a map of token address -> ratio")?;
            for (token, ratio) in map {
                let token = parse_address(token)
                    .with_context(|| format!("collateral.min_ratios key '{token}'"))?;
                let ratio = parse_rate(ratio)
                    .with_context(|| format!("collateral.min_ratios.{token}"))?;
                collateral_min_ratios.insert(token, ratio);
            }
        }

        let mut repo_token_blacklist = Vec::new();
        if let Some(v) = cfg.pointer("/repo_token_blacklist") {
            let arr = v
                .as_array()
                .context("repo_token_blacklist must be a list of addresses")?;
            for (i, item) in arr.iter().enumerate() {
                let s = item
                    .as_str()
                    .with_context(|| format!("repo_token_blacklist[{i}] must be a string"))?;
                repo_token_blacklist
                    .push(parse_address(s).with_context(|| format!("repo_token_blacklist[{i}]"))?);
            }
        }

        Ok(Self {
            identity,
            management,
            base_asset,
            base_decimals,
            risk: RiskParameters {
                time_to_maturity_threshold,
                required_reserve_ratio,
                concentration_limit,
                discount_rate_markup,
            },
            collateral_min_ratios,
            repo_token_blacklist,
        })
    }

    /// `10^base_decimals`.
    pub fn base_precision(&self) -> Result<U256> {
        precision(self.base_decimals).map_err(|e| anyhow!("base precision: {e}"))
    }
}

fn parse_address(s: &str) -> Result<Address> {
    Address::from_str(s.trim()).map_err(|e| anyhow!("invalid address '{s}': {e}"))
}

fn address_at(cfg: &Value, ptr: &str) -> Result<Address> {
    let s = cfg
        .pointer(ptr)
        .and_then(Value::as_str)
        .with_context(|| format!("config missing {ptr} (0x address)"))?;
    parse_address(s).with_context(|| format!("at {ptr}"))
}

/// Decimal string or plain number.
fn parse_rate(v: &Value) -> Result<Rate> {
    let s = match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => bail!("expected a decimal, got {other}"),
    };
    Rate::from_decimal_str(&s).map_err(|e| anyhow!("{e}"))
}

fn rate_at(cfg: &Value, ptr: &str) -> Result<Rate> {
    let v = cfg
        .pointer(ptr)
        .with_context(|| format!("config missing {ptr}"))?;
    parse_rate(v).with_context(|| format!("at {ptr}"))
}

fn fraction_at(cfg: &Value, ptr: &str) -> Result<Rate> {
    let r = rate_at(cfg, ptr)?;
    if r > Rate::ONE {
        bail!("{ptr} must be a fraction <= 1.0 (got {r})");
    }
    Ok(r)
}
