use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

const BASE: &str = r#"
strategy:
  identity: "0x5757575757575757575757575757575757575757"
  management: "0x4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d"
  base_asset: "0xbabababababababababababababababababababa"
  base_decimals: 6
risk:
  time_to_maturity_threshold_secs: 7776000
  required_reserve_ratio: "0.1"
  concentration_limit: "0.5"
  discount_rate_markup: "0"
collateral:
  min_ratios:
    "0xc0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0": "1.2"
"#;

fn hash_line(out: &[u8]) -> String {
    String::from_utf8_lossy(out)
        .lines()
        .find(|l| l.starts_with("config_hash="))
        .map(str::to_string)
        .unwrap_or_default()
}

#[test]
fn config_hash_ignores_key_order() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let a = dir.path().join("a.yaml");
    let b = dir.path().join("b.yaml");
    fs::write(&a, "risk:\n  concentration_limit: \"0.5\"\n  required_reserve_ratio: \"0.1\"\n")?;
    fs::write(&b, "risk:\n  required_reserve_ratio: \"0.1\"\n  concentration_limit: \"0.5\"\n")?;

    let out_a = Command::cargo_bin("rtv")?.arg("config-hash").arg(&a).output()?;
    let out_b = Command::cargo_bin("rtv")?.arg("config-hash").arg(&b).output()?;
    assert!(out_a.status.success());
    assert!(out_b.status.success());

    let ha = hash_line(&out_a.stdout);
    assert_eq!(ha.len(), "config_hash=".len() + 64);
    assert_eq!(ha, hash_line(&out_b.stdout));
    Ok(())
}

#[test]
fn config_check_prints_parsed_limits() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let base = dir.path().join("base.yaml");
    let over = dir.path().join("override.yaml");
    fs::write(&base, BASE)?;
    fs::write(&over, "risk:\n  concentration_limit: \"0.25\"\n")?;

    Command::cargo_bin("rtv")?
        .arg("config-check")
        .arg(&base)
        .arg(&over)
        .assert()
        .success()
        .stdout(predicate::str::contains("concentration_limit=0.25"))
        .stdout(predicate::str::contains("base_decimals=6"))
        .stdout(predicate::str::contains("collateral_tokens=1"))
        .stdout(predicate::str::contains("unused_keys=0"));
    Ok(())
}

#[test]
fn strict_config_check_rejects_unused_keys() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let base = dir.path().join("base.yaml");
    fs::write(&base, format!("{BASE}\nlegacy:\n  knob: 3\n"))?;

    Command::cargo_bin("rtv")?
        .arg("config-check")
        .arg(&base)
        .assert()
        .success()
        .stdout(predicate::str::contains("unused_keys=1"));

    Command::cargo_bin("rtv")?
        .arg("config-check")
        .arg("--strict")
        .arg(&base)
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_UNUSED_KEYS"));
    Ok(())
}

#[test]
fn config_check_rejects_missing_required_key() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let base = dir.path().join("base.yaml");
    fs::write(&base, BASE.replace("  base_decimals: 6\n", ""))?;

    Command::cargo_bin("rtv")?
        .arg("config-check")
        .arg(&base)
        .assert()
        .failure()
        .stderr(predicate::str::contains("base_decimals"));
    Ok(())
}
