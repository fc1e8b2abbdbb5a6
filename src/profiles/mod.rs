//! Profile table (§3 Profile, §6 varBinds selector syntax): merges the
//! translation service's `/profiles` response with the server config's
//! `profiles` section, config winning on name clash, and classifies each
//! profile's variable-binding selectors into GET vs BULK requests.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// One variable-binding selector as it appears under `profiles[*].varBinds`
/// (§6). `Mib` carries the raw `[MIB, name]`/`[MIB, name, index]` forms;
/// `Oid` carries a literal dotted string, with or without a trailing `.*`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarBindSelector {
    Mib(Vec<String>),
    Oid(String),
}

/// The two request shapes the SNMP Request Engine understands (§4.B).
#[derive(Debug, Clone, PartialEq)]
pub enum RequestKind {
    Get(String),
    Bulk(String),
}

impl VarBindSelector {
    /// Classify a selector per §6: a 3-element MIB tuple is a GET, a
    /// 2-element tuple is a BULK, an OID ending in `.*` is a BULK of the
    /// prefix, any other scalar OID is a GET. `resolve` turns a `[MIB,
    /// name, ...]` tuple into a dotted OID (the translator / MIB table is
    /// the authority for that resolution; here we accept a pre-resolved
    /// OID string for the MIB forms since OID resolution is out of core
    /// scope).
    pub fn classify(&self, resolve: impl Fn(&[String]) -> Option<String>) -> Option<RequestKind> {
        match self {
            VarBindSelector::Mib(parts) if parts.len() == 3 => resolve(parts).map(RequestKind::Get),
            VarBindSelector::Mib(parts) if parts.len() == 2 => resolve(parts).map(RequestKind::Bulk),
            VarBindSelector::Mib(_) => None,
            VarBindSelector::Oid(oid) => {
                if let Some(prefix) = oid.strip_suffix(".*") {
                    Some(RequestKind::Bulk(prefix.to_string()))
                } else {
                    Some(RequestKind::Get(oid.clone()))
                }
            }
        }
    }
}

/// A named polling recipe (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub frequency_seconds: Option<u64>,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default, rename = "varBinds")]
    pub var_binds: Vec<VarBindSelector>,
}

/// Default frequency applied to a dynamically matched profile that omits
/// its own `frequency` (§4.E "Default frequency ... is a fixed constant").
pub const DEFAULT_DYNAMIC_FREQUENCY_SECONDS: u64 = 60;

/// Merge the translator's profile table with the server config's, the
/// server config winning on name clash (§3).
pub fn merge_profiles(
    translator_profiles: HashMap<String, Profile>,
    config_profiles: HashMap<String, Profile>,
) -> HashMap<String, Profile> {
    let mut merged = translator_profiles;
    for (name, profile) in config_profiles {
        merged.insert(name, profile);
    }
    merged
}

/// Match a device description tuple `(sysDescr, sysObjectID)` against a
/// profile's ordered `patterns` list, the way
/// `profile_matching.match_profile_with_device` does: the pattern only
/// needs to match at the start of the string (`Regex::find` at position 0),
/// not anchor the whole string.
fn pattern_matches(pattern: &Regex, candidate: &str) -> bool {
    matches!(pattern.find(candidate), Some(m) if m.start() == 0)
}

/// Evaluate every profile's patterns against the device description tuple
/// and return the first matching `(profile_name, frequency)` per profile,
/// in profile-table iteration order (§4.E profile matching task).
pub fn assign_profiles(
    profiles: &HashMap<String, Profile>,
    sys_descr: &str,
    sys_object_id: &str,
) -> Vec<(String, u64)> {
    let mut matches = Vec::new();
    for profile in profiles.values() {
        if profile.patterns.is_empty() {
            continue;
        }
        for raw_pattern in &profile.patterns {
            let Ok(pattern) = Regex::new(raw_pattern) else { continue };
            if pattern_matches(&pattern, sys_descr) || pattern_matches(&pattern, sys_object_id) {
                let frequency = profile.frequency_seconds.unwrap_or(DEFAULT_DYNAMIC_FREQUENCY_SECONDS);
                matches.push((profile.name.clone(), frequency));
                break;
            }
        }
    }
    matches
}
