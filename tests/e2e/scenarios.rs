//! End-to-end scenarios over the Orchestrator's in-memory state (§8
//! "Concrete End-to-End Scenarios"). These exercise the reconcile/dispatch
//! logic directly rather than through a live SNMP/HTTP/Postgres stack, so
//! they run without any external services.

use std::collections::HashMap;

use sc4snmp_poller::backend::scheduler::{device_restarted, match_unmatched_devices, OrchestratorState};
use sc4snmp_poller::enricher::{families_removed, EnricherConfig, FamilyRules};
use sc4snmp_poller::inventory::{InventoryRecord, DYNAMIC_PROFILE};
use sc4snmp_poller::profiles::Profile;
use sc4snmp_poller::snmp::SnmpVersion;

fn record(host: &str, profile: &str, freq: Option<u64>) -> InventoryRecord {
    InventoryRecord {
        host: host.to_string(),
        port: 161,
        version: SnmpVersion::V2c,
        credential: "public".to_string(),
        profile: profile.to_string(),
        frequency_seconds: freq,
    }
}

fn state() -> OrchestratorState {
    OrchestratorState::new(std::path::PathBuf::from("/nonexistent/inventory.csv"), std::path::PathBuf::from("/nonexistent/config.yml"))
}

#[test]
fn scenario_fresh_host_triggers_a_onetime_walk_and_enters_the_unmatched_set() {
    let mut s = state();
    let records = vec![record("192.0.2.10", DYNAMIC_PROFILE, None)];
    let outcome = s.reconcile(&records, &EnricherConfig::default());

    assert_eq!(outcome.onetime_walks.len(), 1);
    assert_eq!(outcome.onetime_walks[0].host_id, "192.0.2.10:161");
    assert!(s.unmatched_devices.contains_key("192.0.2.10"));
    assert!(s.jobs.is_empty());
}

#[test]
fn scenario_duplicate_inventory_row_does_not_duplicate_jobs() {
    let mut s = state();
    let records = vec![
        record("192.0.2.20", "router", Some(30)),
        record("192.0.2.20", "router", Some(30)),
        record("192.0.2.20", "router", Some(30)),
    ];
    s.reconcile(&records, &EnricherConfig::default());
    assert_eq!(s.jobs.len(), 1);
}

#[test]
fn scenario_dynamic_profile_match_creates_a_job_and_clears_the_unmatched_entry() {
    let mut s = state();
    let dynamic = record("192.0.2.30", DYNAMIC_PROFILE, None);
    s.reconcile(&[dynamic.clone()], &EnricherConfig::default());
    assert!(s.unmatched_devices.contains_key("192.0.2.30"));

    let mut profiles = HashMap::new();
    profiles.insert(
        "linux".to_string(),
        Profile { name: "linux".into(), frequency_seconds: Some(45), patterns: vec!["Linux".into()], var_binds: vec![] },
    );
    let mut unmatched = HashMap::new();
    unmatched.insert("192.0.2.30".to_string(), dynamic.clone());
    let mut descriptions = HashMap::new();
    descriptions.insert("192.0.2.30".to_string(), ("Linux 5.10 server".to_string(), String::new()));

    let matches = match_unmatched_devices(&unmatched, &descriptions, &profiles);
    assert_eq!(matches.len(), 1);
    let (matched_record, profile_name, frequency) = &matches[0];
    s.apply_profile_match(matched_record, profile_name, *frequency);

    assert!(!s.unmatched_devices.contains_key("192.0.2.30"));
    assert!(s.jobs.contains_key("192.0.2.30#linux"));
    assert_eq!(s.jobs["192.0.2.30#linux"].interval_seconds, 45);

    // The inventory row is still `profile=*`; a later periodic reconcile
    // over the same unchanged inventory must not revert the match.
    let outcome = s.reconcile(&[dynamic], &EnricherConfig::default());
    assert!(s.jobs.contains_key("192.0.2.30#linux"));
    assert!(!s.unmatched_devices.contains_key("192.0.2.30"));
    assert!(outcome.onetime_walks.is_empty());
}

#[test]
fn scenario_enricher_family_removal_never_touches_if_mib() {
    let mut old = EnricherConfig::default();
    old.oid_family.insert("IF-MIB".into(), FamilyRules::default());
    old.oid_family.insert("TCP-MIB".into(), FamilyRules::default());
    let new = EnricherConfig::default();

    let removed = families_removed(&old, &new);
    assert_eq!(removed, vec!["TCP-MIB".to_string()]);
}

#[test]
fn scenario_device_restart_is_detected_by_uptime_regression() {
    let previous_uptime = 5_000_000i64;
    let new_uptime_after_restart = 12_300i64;
    assert!(device_restarted(Some(previous_uptime), new_uptime_after_restart));
    assert!(!device_restarted(Some(1_000), 2_000));
}

#[test]
fn scenario_removed_inventory_row_deletes_the_device_document() {
    let mut s = state();
    s.reconcile(&[record("192.0.2.40", "router", Some(60))], &EnricherConfig::default());
    let outcome = s.reconcile(&[], &EnricherConfig::default());
    assert_eq!(outcome.deleted_host_ids, vec!["192.0.2.40:161".to_string()]);
}
