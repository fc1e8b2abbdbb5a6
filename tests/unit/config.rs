//! Unit tests for server config parsing (§6 "Server config").

use pretty_assertions::assert_eq;
use sc4snmp_poller::config::{load_config, PollerConfig};
use serial_test::serial;

const SAMPLE_YAML: &str = r#"
mongo:
  database: sc4snmp_test
  walked_collection: walked_hosts
  unwalked_collection: unwalked_hosts
profiles:
  router:
    name: router
    frequency_seconds: 30
    patterns:
      - "Cisco IOS"
    varBinds:
      - "1.3.6.1.2.1.2.*"
usernames:
  alice:
    username: alice
    authProtocol: SHA
    authKey: authpass123
    privProtocol: AES
    privKey: privpass123
enricher:
  oidFamily:
    IF-MIB:
      existingVarBinds:
        - symbolic_name: ifDescr
          dimension_name: interface_desc
additionalMetricField:
  - profile
"#;

#[test]
fn parses_full_document() {
    let config: PollerConfig = serde_yaml::from_str(SAMPLE_YAML).unwrap();
    assert_eq!(config.mongo.database, "sc4snmp_test");
    assert_eq!(config.profiles["router"].frequency_seconds, Some(30));
    assert_eq!(config.usernames["alice"].username, "alice");
    assert!(config.enricher.oid_family.contains_key("IF-MIB"));
    assert_eq!(config.additional_metric_field, vec!["profile".to_string()]);
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let config = load_config(std::path::Path::new("/nonexistent/path/config.yml")).unwrap();
    assert_eq!(config.mongo.database, "sc4snmp");
    assert!(config.profiles.is_empty());
}

#[test]
#[serial]
fn env_override_replaces_store_database() {
    std::env::set_var("SC4SNMP_STORE_DATABASE", "overridden_db");
    let mut config = PollerConfig::default();
    config.apply_env_overrides();
    assert_eq!(config.mongo.database, "overridden_db");
    std::env::remove_var("SC4SNMP_STORE_DATABASE");
}
