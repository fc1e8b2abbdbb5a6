//! SNMP Request Engine (§4.B): protocol version handling, typed values,
//! v1/v2c/v3 auth context construction, OID tables, and the session wrapper
//! around the `snmp` crate.

pub mod auth;
pub mod client;
pub mod oids;
pub mod value;

pub use client::{EngineError, Engine, ErrorKind, Outcome, StoredObservation};
pub use value::SnmpValue;

/// SNMP protocol version carried by an inventory row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnmpVersion {
    V1,
    V2c,
    V3,
}

impl SnmpVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnmpVersion::V1 => "1",
            SnmpVersion::V2c => "2c",
            SnmpVersion::V3 => "3",
        }
    }
}

impl std::fmt::Display for SnmpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
