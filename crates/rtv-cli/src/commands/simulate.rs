use anyhow::{anyhow, Result};
use rtv_config::StrategyConfig;
use rtv_risk::Strategy;
use rtv_testkit::WorldSnapshot;
use serde_json::json;

use super::{parse_address, parse_amount};

/// Load a config and a world snapshot, then print portfolio metrics and, with
/// `instrument`, the post-trade metrics of buying `amount` native units.
///
/// With `seller`, the purchase is also executed against the in-memory world.
pub fn run(
    config_paths: &[String],
    world_path: &str,
    instrument: Option<&str>,
    amount: &str,
    seller: Option<&str>,
) -> Result<()> {
    let refs: Vec<&str> = config_paths.iter().map(String::as_str).collect();
    let loaded = rtv_config::load_layered_yaml(&refs)?;
    let cfg = StrategyConfig::from_config_json(&loaded.config_json)?;

    let world = WorldSnapshot::load(world_path)?.build()?;
    let mut strategy = Strategy::from_config(&cfg, world.collaborators())?;

    let instrument = instrument.map(parse_address).transpose()?;
    let amount = parse_amount(amount)?;

    let sim = strategy.simulate_transaction(instrument, amount)?;
    let mut out = json!({
        "config_hash": loaded.config_hash,
        "now": world.time(),
        "total_liquid_balance": strategy.total_liquid_balance()?.to_string(),
        "total_asset_value": strategy.total_asset_value()?.to_string(),
        "liquid_reserve_ratio": strategy.liquid_reserve_ratio()?.to_string(),
        "simulation": {
            "weighted_maturity_secs": sim.weighted_maturity,
            "concentration_ratio": sim.concentration_ratio.to_string(),
            "liquidity_ratio": sim.liquidity_ratio.to_string(),
            "proceeds": sim.proceeds.to_string(),
        },
    });

    if let Some(seller) = seller {
        let seller = parse_address(seller)?;
        let instrument = instrument.ok_or_else(|| anyhow!("--seller requires --instrument"))?;
        let proceeds = strategy.sell_repo_token(seller, instrument, amount)?;
        out["sale"] = json!({
            "seller": seller.to_string(),
            "proceeds": proceeds.to_string(),
            "holdings": strategy.holdings().iter().map(|a| a.to_string()).collect::<Vec<_>>(),
            "total_asset_value": strategy.total_asset_value()?.to_string(),
        });
    }

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
