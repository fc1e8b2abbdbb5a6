//! Standard SNMP OID definitions and dotted-string <-> numeric conversions.

// System MIB (RFC 1213)
pub const SYS_DESCR: [u32; 8] = [1, 3, 6, 1, 2, 1, 1, 1];
pub const SYS_OBJECT_ID: [u32; 8] = [1, 3, 6, 1, 2, 1, 1, 2];
pub const SYS_UPTIME: [u32; 8] = [1, 3, 6, 1, 2, 1, 1, 3];
pub const SYS_CONTACT: [u32; 8] = [1, 3, 6, 1, 2, 1, 1, 4];
pub const SYS_NAME: [u32; 8] = [1, 3, 6, 1, 2, 1, 1, 5];
pub const SYS_LOCATION: [u32; 8] = [1, 3, 6, 1, 2, 1, 1, 6];
pub const SYS_SERVICES: [u32; 8] = [1, 3, 6, 1, 2, 1, 1, 7];
pub const SYS_UPTIME_INSTANCE: [u32; 9] = [1, 3, 6, 1, 2, 1, 1, 3, 0];

// Interfaces MIB (IF-MIB)
pub const IF_NUMBER: [u32; 8] = [1, 3, 6, 1, 2, 1, 2, 1];
pub const IF_INDEX: [u32; 10] = [1, 3, 6, 1, 2, 1, 2, 2, 1, 1];
pub const IF_DESCR: [u32; 10] = [1, 3, 6, 1, 2, 1, 2, 2, 1, 2];
pub const IF_TYPE: [u32; 10] = [1, 3, 6, 1, 2, 1, 2, 2, 1, 3];
pub const IF_ADMIN_STATUS: [u32; 10] = [1, 3, 6, 1, 2, 1, 2, 2, 1, 7];
pub const IF_OPER_STATUS: [u32; 10] = [1, 3, 6, 1, 2, 1, 2, 2, 1, 8];

/// OID family name as it appears in `enricher.oidFamily` config and in
/// published metric names (`sc4snmp.IF-MIB....`).
pub const IF_MIB_FAMILY: &str = "IF-MIB";

/// Root walked by a full-subtree discovery walk (§4.E real-time task) and
/// the base every OID in this file lives under.
pub const UNIVERSAL_ROOT: [u32; 4] = [1, 3, 6, 1];

/// The OIDs the discovery side-channel always stores, regardless of
/// profile-specific `oids_to_store` configuration (§4.B).
pub fn oids_to_store() -> &'static [&'static [u32]] {
    &[&SYS_DESCR, &SYS_OBJECT_ID]
}

/// Resolve a `[MIB, name]`/`[MIB, name, index]` varBind selector tuple to a
/// dotted OID string (§6 varBinds selector syntax): a 2-element tuple
/// resolves to the column's base OID (for a BULK of the column), a
/// 3-element tuple appends the instance index (for a GET of one row).
/// Only the MIB names this crate ever polls directly are covered; an
/// unrecognized `(mib, name)` pair resolves to `None` and the selector is
/// skipped (logged by the caller).
pub fn resolve_mib_name(parts: &[String]) -> Option<String> {
    let mib = parts.first()?;
    let name = parts.get(1)?;
    let base = oid_to_string(mib_name_table(mib, name)?);
    match parts.get(2) {
        Some(index) => Some(format!("{base}.{index}")),
        None => Some(base),
    }
}

fn mib_name_table(mib: &str, name: &str) -> Option<&'static [u32]> {
    Some(match (mib, name) {
        ("SNMPv2-MIB", "sysDescr") => &SYS_DESCR,
        ("SNMPv2-MIB", "sysObjectID") => &SYS_OBJECT_ID,
        ("SNMPv2-MIB", "sysUpTime") => &SYS_UPTIME,
        ("SNMPv2-MIB", "sysContact") => &SYS_CONTACT,
        ("SNMPv2-MIB", "sysName") => &SYS_NAME,
        ("SNMPv2-MIB", "sysLocation") => &SYS_LOCATION,
        ("SNMPv2-MIB", "sysServices") => &SYS_SERVICES,
        ("IF-MIB", "ifNumber") => &IF_NUMBER,
        ("IF-MIB", "ifIndex") => &IF_INDEX,
        ("IF-MIB", "ifDescr") => &IF_DESCR,
        ("IF-MIB", "ifType") => &IF_TYPE,
        ("IF-MIB", "ifAdminStatus") => &IF_ADMIN_STATUS,
        ("IF-MIB", "ifOperStatus") => &IF_OPER_STATUS,
        _ => return None,
    })
}

/// Parse a dotted OID string (`"1.3.6.1.2.1.1.1"`, optionally trailing
/// `.0` or `.*`) into numeric components. A trailing `*` is stripped.
pub fn parse_oid(dotted: &str) -> Option<Vec<u32>> {
    let trimmed = dotted.strip_suffix(".*").unwrap_or(dotted);
    trimmed.split('.').map(|p| p.parse::<u32>().ok()).collect()
}

/// Render numeric OID components back to dotted-decimal form.
pub fn oid_to_string(oid: &[u32]) -> String {
    oid.iter().map(|o| o.to_string()).collect::<Vec<_>>().join(".")
}

/// True iff `oid` lies within (or equals) the `root` subtree.
pub fn in_subtree(oid: &[u32], root: &[u32]) -> bool {
    oid.len() >= root.len() && oid[..root.len()] == *root
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_dotted_oid() {
        let parsed = parse_oid("1.3.6.1.2.1.1.1").unwrap();
        assert_eq!(oid_to_string(&parsed), oid_to_string(&SYS_DESCR));
    }

    #[test]
    fn strips_trailing_star() {
        let parsed = parse_oid("1.3.6.1.2.1.2.*").unwrap();
        assert_eq!(parsed, vec![1, 3, 6, 1, 2, 1, 2]);
    }

    #[test]
    fn subtree_membership() {
        let root = vec![1, 3, 6, 1, 2, 1, 2];
        let inside = vec![1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 1];
        let outside = vec![1, 3, 6, 1, 2, 1, 3, 1];
        assert!(in_subtree(&inside, &root));
        assert!(!in_subtree(&outside, &root));
    }

    #[test]
    fn sys_descr_is_under_universal_root() {
        assert!(in_subtree(&SYS_DESCR, &UNIVERSAL_ROOT));
    }

    #[test]
    fn two_element_mib_name_resolves_to_column_base() {
        let parts = vec!["IF-MIB".to_string(), "ifDescr".to_string()];
        assert_eq!(resolve_mib_name(&parts), Some(oid_to_string(&IF_DESCR)));
    }

    #[test]
    fn three_element_mib_name_appends_the_index() {
        let parts = vec!["IF-MIB".to_string(), "ifDescr".to_string(), "1".to_string()];
        assert_eq!(resolve_mib_name(&parts), Some(format!("{}.1", oid_to_string(&IF_DESCR))));
    }

    #[test]
    fn unknown_mib_name_resolves_to_none() {
        let parts = vec!["FAKE-MIB".to_string(), "nope".to_string()];
        assert_eq!(resolve_mib_name(&parts), None);
    }
}
