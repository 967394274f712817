//! Config hash stability.
//!
//! GREEN when:
//! - identical inputs hash identically
//! - reordering keys within YAML does not change the hash
//! - different values produce different hashes
//! - overlays take effect and hash stably

use qb_config::{load_layered_yaml, load_layered_yaml_from_strings};

const BASE_YAML: &str = r#"
run:
  name: "tutorial"
defaults:
  position_limit: 50
  order_quantity: 10
instruments:
  PRODUCT1:
    strategy: market_maker
    spread_offset: 1
  PRODUCT2:
    strategy: mean_reversion
    window: 10
    threshold: 1
"#;

const BASE_YAML_REORDERED: &str = r#"
instruments:
  PRODUCT2:
    threshold: 1
    window: 10
    strategy: mean_reversion
  PRODUCT1:
    spread_offset: 1
    strategy: market_maker
defaults:
  order_quantity: 10
  position_limit: 50
run:
  name: "tutorial"
"#;

const OVERLAY_YAML: &str = r#"
instruments:
  PRODUCT1:
    spread_offset: 2
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
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(
        original.config_hash, reordered.config_hash,
        "reordering keys in YAML must not change the hash"
    );
    assert_eq!(original.canonical_json, reordered.canonical_json);
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn merged_layers_produce_stable_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);

    let offset = a
        .config_json
        .pointer("/instruments/PRODUCT1/spread_offset")
        .and_then(|v| v.as_i64())
        .unwrap();
    assert_eq!(offset, 2, "overlay should override base spread_offset");
    let window = a
        .config_json
        .pointer("/instruments/PRODUCT2/window")
        .and_then(|v| v.as_i64())
        .unwrap();
    assert_eq!(window, 10, "untouched siblings survive the merge");
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn files_and_strings_agree() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    let overlay = dir.path().join("overlay.yaml");
    std::fs::write(&base, BASE_YAML).unwrap();
    std::fs::write(&overlay, OVERLAY_YAML).unwrap();

    let from_files = load_layered_yaml(&[&base, &overlay]).unwrap();
    let from_strings = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(from_files.config_hash, from_strings.config_hash);

    assert!(load_layered_yaml(&[dir.path().join("missing.yaml")]).is_err());
}
