//! Config hash is a pure function of the merged content: identical inputs
//! hash identically, key order is irrelevant, any value change is visible.

use rtv_config::{load_layered_yaml, load_layered_yaml_from_strings};
use std::io::Write;

const BASE_YAML: &str = r#"
strategy:
  identity: "0x5757575757575757575757575757575757575757"
  management: "0x4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d"
  base_asset: "0xbabababababababababababababababababababa"
  base_decimals: 6
risk:
  time_to_maturity_threshold_secs: 7776000
  required_reserve_ratio: "0.1"
  concentration_limit: "0.5"
  discount_rate_markup: "0.005"
"#;

const BASE_YAML_REORDERED: &str = r#"
risk:
  discount_rate_markup: "0.005"
  concentration_limit: "0.5"
  required_reserve_ratio: "0.1"
  time_to_maturity_threshold_secs: 7776000
strategy:
  base_decimals: 6
  base_asset: "0xbabababababababababababababababababababa"
  management: "0x4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d"
  identity: "0x5757575757575757575757575757575757575757"
"#;

const OVERLAY_YAML: &str = r#"
risk:
  concentration_limit: "0.25"
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(
        a.config_hash, b.config_hash,
        "reordering keys in YAML must not change the hash"
    );
}

#[test]
fn overlay_overrides_and_changes_hash() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, merged.config_hash);

    let limit = merged
        .config_json
        .pointer("/risk/concentration_limit")
        .and_then(|v| v.as_str())
        .unwrap();
    assert_eq!(limit, "0.25");

    // Untouched siblings survive the merge.
    assert_eq!(
        merged
            .config_json
            .pointer("/risk/required_reserve_ratio")
            .and_then(|v| v.as_str()),
        Some("0.1")
    );
}

#[test]
fn files_hash_like_strings() {
    let mut base = tempfile::NamedTempFile::new().unwrap();
    base.write_all(BASE_YAML.as_bytes()).unwrap();
    let mut overlay = tempfile::NamedTempFile::new().unwrap();
    overlay.write_all(OVERLAY_YAML.as_bytes()).unwrap();

    let paths = [
        base.path().to_str().unwrap(),
        overlay.path().to_str().unwrap(),
    ];
    let from_files = load_layered_yaml(&paths).unwrap();
    let from_strings = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(from_files.config_hash, from_strings.config_hash);
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn missing_file_is_reported_with_path() {
    let err = load_layered_yaml(&["/nonexistent/rtv/config.yaml"]).unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/rtv/config.yaml"));
}
