use qb_config::{load_layered_yaml_from_strings, report_unused_keys, UnusedKeyPolicy};

const CONSUMED: &[&str] = &["/run/name", "/backtest", "/instruments/PRODUCT1/strategy"];

const YAML: &str = r#"
run:
  name: tutorial
backtest:
  rest_orders: true
instruments:
  PRODUCT1:
    strategy: market_maker
    spred_offset: 2
"#;

#[test]
fn warn_mode_reports_unused_keys_without_error() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).expect("config load must succeed");
    let report = report_unused_keys(&loaded.config_json, CONSUMED, UnusedKeyPolicy::Warn)
        .expect("warn mode must not error");

    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/instruments/PRODUCT1/spred_offset".to_string()]
    );
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).expect("config load must succeed");
    let result = report_unused_keys(&loaded.config_json, CONSUMED, UnusedKeyPolicy::Fail);

    let msg = format!("{:?}", result.err().expect("fail policy must error"));
    assert!(msg.contains("CONFIG_UNUSED_KEYS"));
    assert!(msg.contains("spred_offset"));
}

#[test]
fn consumed_prefix_covers_nested_keys() {
    let yaml = r#"
backtest:
  rest_orders: false
  extra:
    nested: 1
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report =
        report_unused_keys(&loaded.config_json, CONSUMED, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean());
}

#[test]
fn deterministic_unused_pointer_ordering() {
    let yaml = r#"
unused:
  b: 2
  a: 1
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, CONSUMED, UnusedKeyPolicy::Warn).unwrap();
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/unused/a".to_string(), "/unused/b".to_string()]
    );
}
