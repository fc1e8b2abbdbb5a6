//! Unit tests for OID helpers and SNMP value rendering, exercised at the
//! crate's public boundary (§4.B).

use pretty_assertions::assert_eq;
use sc4snmp_poller::snmp::oids::{in_subtree, oid_to_string, parse_oid, IF_NUMBER, SYS_UPTIME_INSTANCE};
use sc4snmp_poller::snmp::SnmpValue;

#[test]
fn parse_and_render_oid_round_trip() {
    let numeric = parse_oid("1.3.6.1.2.1.1.3.0").unwrap();
    assert_eq!(oid_to_string(&numeric), "1.3.6.1.2.1.1.3.0");
    assert_eq!(numeric, SYS_UPTIME_INSTANCE.to_vec());
}

#[test]
fn bulk_wildcard_suffix_is_stripped() {
    let numeric = parse_oid("1.3.6.1.2.1.2.*").unwrap();
    assert_eq!(oid_to_string(&numeric), "1.3.6.1.2.1.2");
}

#[test]
fn interface_table_entries_are_under_if_number() {
    let if_descr_1 = parse_oid("1.3.6.1.2.1.2.2.1.2.1").unwrap();
    assert!(in_subtree(&if_descr_1, &IF_NUMBER[..7]));
}

#[test]
fn exception_values_render_distinctly_from_ordinary_ones() {
    assert!(SnmpValue::NoSuchInstance.is_exception());
    assert!(!SnmpValue::Integer(1).is_exception());
    assert_eq!(SnmpValue::TimeTicks(12345).render_for_translator(), "12345");
}
