//! Typed SNMP value representation.
//!
//! Replaces the dynamic `pysnmp` value typing with a closed sum type, so the
//! classifier and enricher never have to pattern-match on a library-specific
//! value class.

use std::fmt;

/// A decoded SNMP varbind value.
#[derive(Debug, Clone, PartialEq)]
pub enum SnmpValue {
    Boolean(bool),
    Integer(i64),
    OctetString(Vec<u8>),
    Null,
    ObjectIdentifier(String),
    IpAddress([u8; 4]),
    Counter32(u32),
    Unsigned32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl SnmpValue {
    /// Name of the underlying SNMP type, used as `val_type`/`oid_type` in
    /// the translator request payload.
    pub fn type_name(&self) -> &'static str {
        match self {
            SnmpValue::Boolean(_) => "Boolean",
            SnmpValue::Integer(_) => "Integer32",
            SnmpValue::OctetString(_) => "OctetString",
            SnmpValue::Null => "Null",
            SnmpValue::ObjectIdentifier(_) => "ObjectIdentifier",
            SnmpValue::IpAddress(_) => "IpAddress",
            SnmpValue::Counter32(_) => "Counter32",
            SnmpValue::Unsigned32(_) => "Unsigned32",
            SnmpValue::TimeTicks(_) => "TimeTicks",
            SnmpValue::Opaque(_) => "Opaque",
            SnmpValue::Counter64(_) => "Counter64",
            SnmpValue::NoSuchObject => "NoSuchObject",
            SnmpValue::NoSuchInstance => "NoSuchInstance",
            SnmpValue::EndOfMibView => "EndOfMibView",
        }
    }

    /// True for the three SNMPv2 "exception" values that terminate a walk
    /// or a single GET without being real data (§4.B Outcome kinds).
    pub fn is_exception(&self) -> bool {
        matches!(self, SnmpValue::NoSuchObject | SnmpValue::NoSuchInstance | SnmpValue::EndOfMibView)
    }

    /// Render the value the way the translator/publisher expects to see it
    /// on the wire (§4.A): octet strings and opaques are pretty-printed as
    /// UTF-8 (lossily, since device firmware is not always well-behaved),
    /// IP addresses as dotted-quad, everything else via its natural
    /// `Display`.
    pub fn render_for_translator(&self) -> String {
        match self {
            SnmpValue::Boolean(b) => b.to_string(),
            SnmpValue::Integer(i) => i.to_string(),
            SnmpValue::OctetString(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            SnmpValue::Null => String::new(),
            SnmpValue::ObjectIdentifier(oid) => oid.clone(),
            SnmpValue::IpAddress(octets) => {
                format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3])
            }
            SnmpValue::Counter32(v) => v.to_string(),
            SnmpValue::Unsigned32(v) => v.to_string(),
            SnmpValue::TimeTicks(v) => v.to_string(),
            SnmpValue::Opaque(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            SnmpValue::Counter64(v) => v.to_string(),
            SnmpValue::NoSuchObject => "NoSuchObject".to_string(),
            SnmpValue::NoSuchInstance => "NoSuchInstance".to_string(),
            SnmpValue::EndOfMibView => "EndOfMibView".to_string(),
        }
    }

    /// True when this value would be classified `METRIC` by the translator
    /// classifier fallback path (§4.A: "value parses as a finite number").
    pub fn looks_numeric(&self) -> bool {
        matches!(
            self,
            SnmpValue::Integer(_)
                | SnmpValue::Counter32(_)
                | SnmpValue::Unsigned32(_)
                | SnmpValue::TimeTicks(_)
                | SnmpValue::Counter64(_)
        ) || matches!(self, SnmpValue::OctetString(bytes) if String::from_utf8_lossy(bytes).trim().parse::<f64>().is_ok())
    }
}

impl fmt::Display for SnmpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render_for_translator())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_octet_string_as_utf8() {
        let v = SnmpValue::OctetString(b"cisco router".to_vec());
        assert_eq!(v.render_for_translator(), "cisco router");
    }

    #[test]
    fn renders_ip_address_dotted() {
        let v = SnmpValue::IpAddress([10, 0, 0, 1]);
        assert_eq!(v.render_for_translator(), "10.0.0.1");
    }

    #[test]
    fn exceptions_are_detected() {
        assert!(SnmpValue::NoSuchInstance.is_exception());
        assert!(!SnmpValue::Integer(1).is_exception());
    }

    #[test]
    fn numeric_detection_covers_numeric_octet_strings() {
        assert!(SnmpValue::Counter32(42).looks_numeric());
        assert!(SnmpValue::OctetString(b"123".to_vec()).looks_numeric());
        assert!(!SnmpValue::OctetString(b"cisco".to_vec()).looks_numeric());
    }
}
