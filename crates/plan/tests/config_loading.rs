use cirrus_core::LimitKind;
use plan::{ConfigError, PlanConfig, PlanRegistry};
use std::io::Write;

#[test]
fn empty_document_yields_defaults() {
    let cfg = PlanConfig::from_yaml_str("{}").unwrap();
    assert_eq!(cfg, PlanConfig::default());
}

#[test]
fn partial_tariff_overrides_keep_other_defaults() {
    let yaml = r#"
tariff:
  instance_hourly_fee: 50
  server_free_minutes: 0
"#;
    let cfg = PlanConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(cfg.tariff.instance_hourly_fee, 50.0);
    assert_eq!(cfg.tariff.server_free_minutes, 0.0);
    assert_eq!(cfg.tariff.transfer_free_tier, 1e10);
    assert_eq!(cfg.paid_limits, PlanConfig::default().paid_limits);
}

#[test]
fn limit_tables_load_from_file() {
    let yaml = r#"
free_limits:
  transfer: 1000
  storage: 2000
  fee: 0
"#;
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(yaml.as_bytes()).unwrap();
    let cfg = PlanConfig::from_yaml_path(f.path()).unwrap();
    let plan = PlanRegistry::new(&cfg);
    assert_eq!(plan.limit(LimitKind::Transfer), 1000.0);
    assert_eq!(plan.limit(LimitKind::Storage), 2000.0);
}

#[test]
fn zero_hourly_fee_is_rejected() {
    let res = PlanConfig::from_yaml_str("tariff:\n  instance_hourly_fee: 0\n");
    assert!(matches!(res, Err(ConfigError::Invalid(_))));
}

#[test]
fn negative_rate_is_rejected() {
    let res = PlanConfig::from_yaml_str("tariff:\n  transfer_rate: -1\n");
    assert!(matches!(res, Err(ConfigError::Invalid(_))));
}

#[test]
fn inverted_bounds_are_rejected() {
    let yaml = r#"
min_bounds: { transfer: 10, storage: 1, fee: 100 }
max_bounds: { transfer: 5, storage: 100, fee: 100 }
"#;
    assert!(matches!(PlanConfig::from_yaml_str(yaml), Err(ConfigError::Invalid(_))));
}

#[test]
fn malformed_yaml_errors() {
    assert!(matches!(PlanConfig::from_yaml_str("tariff: ["), Err(ConfigError::Yaml(_))));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let res = PlanConfig::from_yaml_path(dir.path().join("absent.yaml"));
    assert!(matches!(res, Err(ConfigError::Io(_))));
}
