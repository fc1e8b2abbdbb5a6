//! Enricher (§4.D): joins a translated binding against the device's cached
//! interface topology and/or extracts dimensions via named-capture regex.
//!
//! Two mechanisms, in order: an existing-varbind index join (IF-MIB style)
//! and an additional-varbind regex applied to the metric name. Both are
//! pure functions of the binding plus the cached static data — enrichment
//! never touches the store directly (§4.D "pure function").

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::snmp::oids::IF_MIB_FAMILY;

/// One `existingVarBinds` rule: copy a symbolic OID's array of walked
/// values into `dimension_name`, indexed the same way as the interface
/// table (§3 EnricherConfig).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistingVarBind {
    pub symbolic_name: String,
    pub dimension_name: String,
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
}

/// Per-OID-family enrichment rules (§3 EnricherConfig).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FamilyRules {
    #[serde(default, rename = "existingVarBinds")]
    pub existing_var_binds: Vec<ExistingVarBind>,
    #[serde(default, rename = "additionalVarBinds")]
    pub additional_var_binds: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnricherConfig {
    #[serde(default, rename = "oidFamily")]
    pub oid_family: HashMap<String, FamilyRules>,
}

/// The walked dimension table for one family: `dimension_name -> values`,
/// indexed by row (`ifIndex` for IF-MIB).
pub type DimensionTable = HashMap<String, Vec<String>>;

/// One family's cached static data, as produced by a walk and stored by
/// the Store Adapter (§3 DeviceState.static_data).
pub type StaticData = HashMap<String, DimensionTable>;

/// A dimension to merge into the published record.
pub type Dimension = (String, String);

/// Parse the trailing `_<N>` row index off a metric name
/// (`sc4snmp.IF-MIB.ifDescr_3` -> `3`), the way `MibEnricher` did for the
/// Python poller. Returns a zero-based index (`N - 1`).
fn parsed_row_index(metric_name: &str) -> Option<usize> {
    let (_, tail) = metric_name.rsplit_once('_')?;
    let one_based: usize = tail.parse().ok()?;
    one_based.checked_sub(1)
}

/// Existing-varbind join: given a metric name carrying a trailing row
/// index and the family's static data, emit the dimensions whose arrays
/// cover that index.
fn join_existing_var_binds(family: &str, metric_name: &str, static_data: &StaticData) -> Vec<Dimension> {
    let Some(table) = static_data.get(family) else { return Vec::new() };
    let Some(index) = parsed_row_index(metric_name) else { return Vec::new() };

    table
        .iter()
        .filter_map(|(dimension_name, values)| {
            (index < values.len()).then(|| (dimension_name.clone(), values[index].clone()))
        })
        .collect()
}

/// Additional-varbind regex: run every configured named-capture pattern
/// for `family` against `metric_name`; every successful capture group
/// becomes a dimension (§8 scenario 6).
fn apply_additional_var_binds(rules: &FamilyRules, metric_name: &str) -> Vec<Dimension> {
    let mut dimensions = Vec::new();
    for pattern_str in &rules.additional_var_binds {
        let Ok(pattern) = Regex::new(pattern_str) else { continue };
        let Some(captures) = pattern.captures(metric_name) else { continue };
        for name in pattern.capture_names().flatten() {
            if let Some(m) = captures.name(name) {
                dimensions.push((name.to_string(), m.as_str().to_string()));
            }
        }
    }
    dimensions
}

/// Enrich one translated metric/event binding (§4.D). `family` is the
/// OID family the binding belongs to (e.g. `IF-MIB`); `metric_name` is the
/// fully-qualified published name (`sc4snmp.<family>.<name>[_<index>]`).
/// Returns an empty vec if the family has no rules or the device has no
/// cached static data — enrichment is skipped silently, never an error.
pub fn enrich(
    config: &EnricherConfig,
    static_data: Option<&StaticData>,
    family: &str,
    metric_name: &str,
) -> Vec<Dimension> {
    let Some(rules) = config.oid_family.get(family) else { return Vec::new() };

    let mut dimensions = Vec::new();
    if let Some(static_data) = static_data {
        dimensions.extend(join_existing_var_binds(family, metric_name, static_data));
    }
    dimensions.extend(apply_additional_var_binds(rules, metric_name));
    dimensions
}

/// Compute the set of OID families to delete from the store when the
/// enricher config changes, honoring the explicit "never delete IF-MIB
/// through this path" exception (§4.C, §4.E step 5, §8 boundary case).
pub fn families_removed(old: &EnricherConfig, new: &EnricherConfig) -> Vec<String> {
    old.oid_family
        .keys()
        .filter(|family| !new.oid_family.contains_key(*family))
        .filter(|family| family.as_str() != IF_MIB_FAMILY)
        .cloned()
        .collect()
}

/// True iff the IF-MIB entry of the enricher config changed between `old`
/// and `new` (§4.E step 5: triggers a one-time IF-MIB walk per known
/// device rather than an in-place table update).
pub fn if_mib_rules_changed(old: &EnricherConfig, new: &EnricherConfig) -> bool {
    old.oid_family.get(IF_MIB_FAMILY).map(|r| serde_json::to_string(r).ok())
        != new.oid_family.get(IF_MIB_FAMILY).map(|r| serde_json::to_string(r).ok())
}

/// Strip the metric name's trailing `_<index>` suffix if `name` is
/// `sc4snmp.<family>....` and `family` is configured in `enricher.oidFamily`
/// (§6 published metric payload, Open Question (b): applies regardless of
/// whether the family defines `existingVarBinds`).
pub fn strip_trailing_index(config: &EnricherConfig, metric_name: &str) -> String {
    let Some(rest) = metric_name.strip_prefix("sc4snmp.") else { return metric_name.to_string() };
    let Some((family, _)) = rest.split_once('.') else { return metric_name.to_string() };
    if !config.oid_family.contains_key(family) {
        return metric_name.to_string();
    }
    match metric_name.rsplit_once('_') {
        Some((head, tail)) if tail.chars().all(|c| c.is_ascii_digit()) && !tail.is_empty() => head.to_string(),
        _ => metric_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> EnricherConfig {
        let mut oid_family = HashMap::new();
        oid_family.insert(
            "IF-MIB".to_string(),
            FamilyRules {
                existing_var_binds: vec![ExistingVarBind {
                    symbolic_name: "ifDescr".into(),
                    dimension_name: "interface_desc".into(),
                    ttl_seconds: None,
                }],
                additional_var_binds: vec![],
            },
        );
        EnricherConfig { oid_family }
    }

    #[test]
    fn joins_existing_varbind_by_index() {
        let config = sample_config();
        let mut table = DimensionTable::new();
        table.insert("interface_desc".into(), vec!["lo".into(), "eth0".into()]);
        let mut static_data = StaticData::new();
        static_data.insert("IF-MIB".into(), table);

        let dims = enrich(&config, Some(&static_data), "IF-MIB", "sc4snmp.IF-MIB.ifOperStatus_2");
        assert_eq!(dims, vec![("interface_desc".to_string(), "eth0".to_string())]);
    }

    #[test]
    fn missing_static_data_yields_no_dimensions_but_does_not_error() {
        let config = sample_config();
        let dims = enrich(&config, None, "IF-MIB", "sc4snmp.IF-MIB.ifOperStatus_2");
        assert!(dims.is_empty());
    }

    #[test]
    fn out_of_bounds_index_is_silently_skipped() {
        let config = sample_config();
        let mut table = DimensionTable::new();
        table.insert("interface_desc".into(), vec!["lo".into()]);
        let mut static_data = StaticData::new();
        static_data.insert("IF-MIB".into(), table);

        let dims = enrich(&config, Some(&static_data), "IF-MIB", "sc4snmp.IF-MIB.ifOperStatus_5");
        assert!(dims.is_empty());
    }

    #[test]
    fn additional_varbind_regex_extracts_named_groups() {
        let mut oid_family = HashMap::new();
        oid_family.insert(
            "TCP-MIB".to_string(),
            FamilyRules {
                existing_var_binds: vec![],
                additional_var_binds: vec![
                    r"tcpConnLocalPort_(?P<IP_one>\d+_\d+_\d+_\d+)_(?P<port>\d+)_(?P<IP_two>\d+_\d+_\d+_\d+)_(?P<index_number>\d+)$".to_string(),
                ],
            },
        );
        let config = EnricherConfig { oid_family };
        let name = "sc4snmp.TCP-MIB.tcpConnLocalPort_192_168_0_1_161_127_0_0_1_5";
        let mut dims = enrich(&config, None, "TCP-MIB", name);
        dims.sort();
        let mut expected = vec![
            ("IP_one".to_string(), "192_168_0_1".to_string()),
            ("port".to_string(), "161".to_string()),
            ("IP_two".to_string(), "127_0_0_1".to_string()),
            ("index_number".to_string(), "5".to_string()),
        ];
        expected.sort();
        assert_eq!(dims, expected);
    }

    #[test]
    fn if_mib_is_never_in_families_removed() {
        let mut old = EnricherConfig::default();
        old.oid_family.insert("IF-MIB".into(), FamilyRules::default());
        old.oid_family.insert("TCP-MIB".into(), FamilyRules::default());
        let new = EnricherConfig::default();

        let removed = families_removed(&old, &new);
        assert_eq!(removed, vec!["TCP-MIB".to_string()]);
    }

    #[test]
    fn strips_trailing_index_only_for_configured_families() {
        let config = sample_config();
        assert_eq!(strip_trailing_index(&config, "sc4snmp.IF-MIB.ifDescr_3"), "sc4snmp.IF-MIB.ifDescr");
        assert_eq!(strip_trailing_index(&config, "sc4snmp.OTHER-MIB.foo_3"), "sc4snmp.OTHER-MIB.foo_3");
    }
}
