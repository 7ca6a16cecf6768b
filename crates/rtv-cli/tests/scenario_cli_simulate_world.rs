#![cfg(feature = "testkit")]

use assert_cmd::Command;
use std::fs;

const CONFIG: &str = r#"
strategy:
  identity: "0x5757575757575757575757575757575757575757"
  management: "0x4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d"
  base_asset: "0xbabababababababababababababababababababa"
  base_decimals: 6
risk:
  time_to_maturity_threshold_secs: 31536000
  required_reserve_ratio: "0.1"
  concentration_limit: "0.5"
  discount_rate_markup: "0"
collateral:
  min_ratios:
    "0xc0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0": "1.2"
"#;

// Strategy holds 1000 USDC in the reserve; a seller holds 100 units of a
// 30-day instrument priced at 5%.
const WORLD: &str = r#"{
    "now": 0,
    "assets": [{ "address": "0xbabababababababababababababababababababa", "decimals": 6 }],
    "balances": [{
        "token": "0x1111111111111111111111111111111111111111",
        "owner": "0x5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e",
        "amount": "100000000"
    }],
    "instruments": [{
        "address": "0x1111111111111111111111111111111111111111",
        "maturity": 2592000,
        "purchase_asset": "0xbabababababababababababababababababababa",
        "servicer": "0x9191919191919191919191919191919191919191",
        "collateral_manager": "0x5151515151515151515151515151515151515151",
        "decimals": 6,
        "discount_rate": "0.05",
        "collateral": [{ "token": "0xc0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0", "maintenance_ratio": "1.5" }]
    }],
    "reserve": {
        "address": "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee",
        "asset": "0xbabababababababababababababababababababa",
        "deposits": [{ "owner": "0x5757575757575757575757575757575757575757", "amount": "1000000000" }]
    }
}"#;

#[test]
fn simulate_then_execute_sale() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = dir.path().join("strategy.yaml");
    let world = dir.path().join("world.json");
    fs::write(&cfg, CONFIG)?;
    fs::write(&world, WORLD)?;

    let out = Command::cargo_bin("rtv")?
        .arg("simulate")
        .arg("--config")
        .arg(&cfg)
        .arg("--world")
        .arg(&world)
        .args(["--instrument", "0x1111111111111111111111111111111111111111"])
        .args(["--amount", "100000000"])
        .args(["--seller", "0x5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e"])
        .output()?;
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value = serde_json::from_slice(&out.stdout)?;
    assert_eq!(v["total_asset_value"], "1000000000");
    assert_eq!(v["liquid_reserve_ratio"], "1");
    assert_eq!(v["simulation"]["proceeds"], "99590781");
    assert_eq!(v["sale"]["proceeds"], "99590781");
    assert_eq!(v["sale"]["total_asset_value"], "1000000000");
    assert_eq!(v["sale"]["holdings"].as_array().map(Vec::len), Some(1));
    Ok(())
}
