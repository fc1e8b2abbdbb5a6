//! Unit tests for shared helpers.

use pretty_assertions::assert_eq;
use sc4snmp_poller::util::{format_uptime, split_host_port};

#[test]
fn split_host_port_defaults_to_161() {
    assert_eq!(split_host_port("10.0.0.1").unwrap(), ("10.0.0.1".to_string(), 161));
}

#[test]
fn split_host_port_parses_explicit_port() {
    assert_eq!(split_host_port("10.0.0.1:1161").unwrap(), ("10.0.0.1".to_string(), 1161));
}

#[test]
fn split_host_port_rejects_port_zero() {
    assert!(split_host_port("10.0.0.1:0").is_err());
}

#[test]
fn split_host_port_rejects_non_numeric_port() {
    assert!(split_host_port("10.0.0.1:abc").is_err());
}

#[test]
fn format_uptime_zero_is_midnight() {
    assert_eq!(format_uptime(0), "00:00:00");
}

#[test]
fn format_uptime_one_day() {
    let ticks = 86400 * 100;
    assert_eq!(format_uptime(ticks), "1 day 00:00:00");
}

#[test]
fn format_uptime_multi_year() {
    let ticks = (400i64 * 86400) * 100;
    assert_eq!(format_uptime(ticks), "1 year 35 days 00:00:00");
}
