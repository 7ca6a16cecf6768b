//! Command handlers for the rtv CLI.
//!
//! Output is `key=value` lines on stdout so scripts can grep it; logs go to
//! stderr.

#[cfg(feature = "testkit")]
pub mod simulate;

use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rtv_config::{report_unused_keys, StrategyConfig, UnusedKeyPolicy};
use rtv_schemas::{Address, U256};
use rtv_valuation::{precision, present_value, time_to_maturity, Rate};

pub fn config_hash(paths: &[String]) -> Result<()> {
    let loaded = load(paths)?;
    println!("config_hash={}", loaded.config_hash);
    println!("{}", loaded.canonical_json);
    Ok(())
}

/// Parse the merged config as a strategy config and report keys nothing reads.
pub fn config_check(paths: &[String], strict: bool) -> Result<()> {
    let loaded = load(paths)?;
    let policy = if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(&loaded.config_json, policy)?;
    for leaf in &report.unused_leaf_pointers {
        tracing::warn!(pointer = %leaf, "unused config key");
    }

    let cfg = StrategyConfig::from_config_json(&loaded.config_json)?;
    println!("config_hash={}", loaded.config_hash);
    println!("identity={}", cfg.identity);
    println!("management={}", cfg.management);
    println!("base_asset={}", cfg.base_asset);
    println!("base_decimals={}", cfg.base_decimals);
    println!("time_to_maturity_threshold_secs={}", cfg.risk.time_to_maturity_threshold);
    println!("required_reserve_ratio={}", cfg.risk.required_reserve_ratio);
    println!("concentration_limit={}", cfg.risk.concentration_limit);
    println!("discount_rate_markup={}", cfg.risk.discount_rate_markup);
    println!("collateral_tokens={}", cfg.collateral_min_ratios.len());
    println!("blacklisted={}", cfg.repo_token_blacklist.len());
    println!("unused_keys={}", report.unused_leaf_pointers.len());
    Ok(())
}

/// Discount `face` base units to `now` (default: wall clock).
pub fn pv(face: &str, decimals: u8, maturity: u64, rate: &str, now: Option<u64>) -> Result<()> {
    let face = parse_amount(face)?;
    let rate = Rate::from_str(rate).map_err(|e| anyhow!("--rate: {e}"))?;
    let now = match now {
        Some(n) => n,
        None => u64::try_from(Utc::now().timestamp()).context("clock before 1970")?,
    };
    let bp = precision(decimals)?;
    let value = present_value(face, bp, maturity, rate, now)?;

    println!("present_value={value}");
    println!("time_to_maturity_secs={}", time_to_maturity(maturity, now));
    println!("maturity_utc={}", utc(maturity));
    println!("now_utc={}", utc(now));
    Ok(())
}

fn load(paths: &[String]) -> Result<rtv_config::LoadedConfig> {
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    rtv_config::load_layered_yaml(&refs)
}

pub(crate) fn parse_amount(s: &str) -> Result<U256> {
    U256::from_str(s.trim()).map_err(|e| anyhow!("invalid amount '{s}': {e}"))
}

#[cfg_attr(not(feature = "testkit"), allow(dead_code))]
pub(crate) fn parse_address(s: &str) -> Result<Address> {
    Address::from_str(s.trim()).map_err(|e| anyhow!("invalid address '{s}': {e}"))
}

fn utc(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
        .map(|d| d.to_rfc3339())
        .unwrap_or_else(|| "out_of_range".to_string())
}
