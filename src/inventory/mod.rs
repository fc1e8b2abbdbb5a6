//! Inventory loading - CSV-based desired polling work.
//!
//! Mirrors the Perl/Python poller's `inventory.csv` loader: one row per
//! device/profile pairing, reloaded whenever the file's mtime advances.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{error, warn};

use crate::snmp::SnmpVersion;

/// Literal profile value meaning "match dynamically against device description".
pub const DYNAMIC_PROFILE: &str = "*";

/// One row of desired polling work, bound to a single device and profile.
///
/// Immutable value type; equality is by all five fields (§3 Invariant: at
/// most one `ScheduledJob` per `(host, profile)` pair relies on this).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InventoryRecord {
    pub host: String,
    pub port: u16,
    pub version: SnmpVersion,
    pub credential: String,
    pub profile: String,
    pub frequency_seconds: Option<u64>,
}

impl InventoryRecord {
    /// `host:port` form used as the device document key everywhere else.
    pub fn host_id(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `host#profile`, the unique key for a `ScheduledJob` (§3).
    pub fn entry_key(&self) -> String {
        format!("{}#{}", self.host, self.profile)
    }

    pub fn is_dynamic(&self) -> bool {
        self.profile == DYNAMIC_PROFILE
    }
}

/// A row that failed validation, kept around only for logging.
#[derive(Debug)]
pub struct InvalidRow {
    pub line_number: usize,
    pub reason: String,
}

/// Result of parsing the whole inventory file: valid rows plus a log of
/// everything that was dropped. Invariant 5: dropped rows never affect
/// jobs already derived from earlier, valid rows.
#[derive(Debug, Default)]
pub struct ParsedInventory {
    pub records: Vec<InventoryRecord>,
    pub invalid: Vec<InvalidRow>,
}

fn profile_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]*$").unwrap())
}

fn oid_literal_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d(\.\d+)*(\.\*)?$").unwrap())
}

/// Whether a raw inventory line should even be considered (§6: "skipped if
/// `host` is empty or its first non-whitespace character is `#`").
pub fn should_process_line(host_field: &str) -> bool {
    let trimmed = host_field.trim_start();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

fn is_valid_profile(profile: &str) -> bool {
    profile == DYNAMIC_PROFILE || profile_regex().is_match(profile) || oid_literal_regex().is_match(profile)
}

fn parse_host_port(host: &str) -> Result<(String, u16), String> {
    crate::util::split_host_port(host).map_err(|e| e.to_string())
}

/// Validate and build one [`InventoryRecord`] from the raw CSV fields.
///
/// Does not perform DNS resolution here (callers that need §6's "host does
/// not resolve" rule should call [`resolve_host`] separately so that tests
/// don't need network access).
fn build_record(
    host: &str,
    version: &str,
    community: &str,
    profile: &str,
    freq: &str,
) -> Result<InventoryRecord, String> {
    let (host_only, port) = parse_host_port(host.trim())?;

    let version = match version.trim() {
        "1" => SnmpVersion::V1,
        "2c" => SnmpVersion::V2c,
        "3" => SnmpVersion::V3,
        other => return Err(format!("unsupported SNMP version '{}'", other)),
    };

    let community = community.trim();
    if community.is_empty() {
        return Err("community/credential must not be blank".into());
    }

    let profile = profile.trim();
    if !is_valid_profile(profile) {
        return Err(format!("profile '{}' is neither a symbolic name, an OID literal, nor '*'", profile));
    }

    let freq = freq.trim();
    let frequency_seconds = if freq.is_empty() {
        None
    } else {
        match freq.parse::<i64>() {
            Ok(n) if n > 0 => Some(n as u64),
            Ok(_) => return Err(format!("freqinseconds '{}' must be a positive integer", freq)),
            Err(_) => return Err(format!("freqinseconds '{}' is not an integer", freq)),
        }
    };

    Ok(InventoryRecord {
        host: host_only,
        port,
        version,
        credential: community.to_string(),
        profile: profile.to_string(),
        frequency_seconds,
    })
}

/// Parse an inventory CSV document (header required: `host,version,community,profile,freqinseconds`).
pub fn parse_inventory(contents: &str) -> ParsedInventory {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(contents.as_bytes());
    let mut out = ParsedInventory::default();

    for (idx, record) in reader.records().enumerate() {
        let line_number = idx + 2; // account for header line
        let row = match record {
            Ok(r) => r,
            Err(e) => {
                out.invalid.push(InvalidRow { line_number, reason: e.to_string() });
                continue;
            }
        };
        if row.len() < 5 {
            out.invalid.push(InvalidRow {
                line_number,
                reason: format!("expected 5 columns, found {}", row.len()),
            });
            continue;
        }
        let host = &row[0];
        if !should_process_line(host) {
            continue;
        }
        match build_record(host, &row[1], &row[2], &row[3], &row[4]) {
            Ok(rec) => out.records.push(rec),
            Err(reason) => {
                warn!(line = line_number, %reason, "dropping invalid inventory row");
                out.invalid.push(InvalidRow { line_number, reason });
            }
        }
    }

    out
}

/// Load and parse the inventory file from disk.
pub fn load_inventory(path: &Path) -> Result<ParsedInventory> {
    let contents = fs::read_to_string(path).with_context(|| format!("reading inventory file {}", path.display()))?;
    Ok(parse_inventory(&contents))
}

/// mtime of a file, or `None` if it can't be stat'd (treated as "unchanged").
pub fn file_mtime(path: &Path) -> Option<SystemTime> {
    match fs::metadata(path) {
        Ok(meta) => meta.modified().ok(),
        Err(e) => {
            error!(path = %path.display(), error = %e, "could not stat file");
            None
        }
    }
}

/// Best-effort DNS resolution used by the validator for the "host does not
/// resolve" rule (§6). Kept separate from `build_record` so unit tests can
/// validate syntax without touching the network.
pub async fn resolve_host(host: &str) -> bool {
    use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
    use trust_dns_resolver::TokioAsyncResolver;

    if host.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }
    match TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()) {
        Ok(resolver) => resolver.lookup_ip(host).await.map(|r| r.iter().next().is_some()).unwrap_or(false),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_blank_and_comment_rows() {
        assert!(!should_process_line(""));
        assert!(!should_process_line("   "));
        assert!(!should_process_line("#10.0.0.1"));
        assert!(!should_process_line("  # 10.0.0.1"));
        assert!(should_process_line("10.0.0.1"));
    }

    #[test]
    fn parses_a_valid_row() {
        let csv = "host,version,community,profile,freqinseconds\n192.0.2.10,2c,public,1.3.6.1.2.1.1.*,60\n";
        let parsed = parse_inventory(csv);
        assert_eq!(parsed.invalid.len(), 0);
        assert_eq!(parsed.records.len(), 1);
        let rec = &parsed.records[0];
        assert_eq!(rec.host, "192.0.2.10");
        assert_eq!(rec.port, 161);
        assert_eq!(rec.version, SnmpVersion::V2c);
        assert_eq!(rec.profile, "1.3.6.1.2.1.1.*");
        assert_eq!(rec.frequency_seconds, Some(60));
        assert_eq!(rec.entry_key(), "192.0.2.10#1.3.6.1.2.1.1.*");
    }

    #[test]
    fn drops_invalid_version() {
        let csv = "host,version,community,profile,freqinseconds\n10.0.0.1,9,public,router,60\n";
        let parsed = parse_inventory(csv);
        assert_eq!(parsed.records.len(), 0);
        assert_eq!(parsed.invalid.len(), 1);
    }

    #[test]
    fn drops_nonpositive_frequency() {
        let csv = "host,version,community,profile,freqinseconds\n10.0.0.1,2c,public,router,0\n";
        let parsed = parse_inventory(csv);
        assert_eq!(parsed.records.len(), 0);

        let csv_neg = "host,version,community,profile,freqinseconds\n10.0.0.1,2c,public,router,-5\n";
        let parsed_neg = parse_inventory(csv_neg);
        assert_eq!(parsed_neg.records.len(), 0);
    }

    #[test]
    fn rejects_port_zero() {
        let csv = "host,version,community,profile,freqinseconds\n10.0.0.1:0,2c,public,router,60\n";
        let parsed = parse_inventory(csv);
        assert_eq!(parsed.records.len(), 0);
    }

    #[test]
    fn default_port_is_161() {
        let csv = "host,version,community,profile,freqinseconds\n10.0.0.1,2c,public,router,60\n";
        let parsed = parse_inventory(csv);
        assert_eq!(parsed.records[0].port, 161);
    }

    #[test]
    fn star_profile_is_dynamic() {
        let csv = "host,version,community,profile,freqinseconds\n10.0.0.2,2c,public,*,60\n";
        let parsed = parse_inventory(csv);
        assert!(parsed.records[0].is_dynamic());
    }

    #[test]
    fn blank_community_is_invalid() {
        let csv = "host,version,community,profile,freqinseconds\n10.0.0.1,2c,,router,60\n";
        let parsed = parse_inventory(csv);
        assert_eq!(parsed.records.len(), 0);
    }

    #[test]
    fn invalid_profile_symbol_is_dropped() {
        let csv = "host,version,community,profile,freqinseconds\n10.0.0.1,2c,public,bad profile!,60\n";
        let parsed = parse_inventory(csv);
        assert_eq!(parsed.records.len(), 0);
    }
}
