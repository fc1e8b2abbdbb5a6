//! SNMP Request Engine (§4.B): wraps the `snmp` crate's blocking session
//! API with a typed outcome instead of bubbling the crate's own error type,
//! and records discovery side-channel OIDs as they pass through.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::{debug, warn};

use super::auth::AuthContext;
use super::oids::{self, oid_to_string, parse_oid};
use super::value::SnmpValue;

/// Closed set of failure kinds an Outcome can carry (§4.B).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoSuchInstance,
    Timeout,
    AuthFailure,
    Transport,
    Protocol,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl EngineError {
    fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self { kind, detail: detail.into() }
    }
}

/// Result of one request against a device. A walk/bulk call yields a
/// sequence of these, terminated by `EndOfSubtree` or `Error`, replacing
/// the source poller's Python generator (§9 design note).
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Values(Vec<(String, SnmpValue)>),
    EndOfSubtree,
    Error(EngineError),
}

/// A side-channel observation the engine makes while walking a device, fed
/// into the device document before translation (§4.B "oids to store").
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObservation {
    pub oid: String,
    pub value: SnmpValue,
}

/// Per-worker-thread SNMP engine. Lazily opens one session per
/// `(target, auth)` pair and reuses it across requests from the same
/// worker (§5 concurrency model).
#[derive(Debug, Default)]
pub struct Engine {
    timeout: Duration,
    retries: usize,
}

impl Engine {
    pub fn new(timeout: Duration, retries: usize) -> Self {
        Self { timeout, retries }
    }

    /// GET a single OID (§6: a 3-element selector tuple). The actual
    /// blocking UDP round-trip runs on a `spawn_blocking` thread (§5: SNMP
    /// I/O always suspends cleanly rather than blocking a runtime worker).
    pub async fn get(&self, target: SocketAddr, auth: &AuthContext, oid: &str) -> Outcome {
        let Some(numeric) = parse_oid(oid) else {
            return Outcome::Error(EngineError::new(ErrorKind::Protocol, format!("malformed OID '{oid}'")));
        };
        match auth {
            AuthContext::Community { community, mp_model } => {
                self.community_get(target, community, *mp_model, &numeric).await
            }
            AuthContext::V3(_) => Outcome::Error(EngineError::new(
                ErrorKind::Protocol,
                "SNMPv3 session bootstrap is not implemented",
            )),
        }
    }

    /// GETBULK starting at `oid` (§6: a 2-element selector tuple, or an
    /// OID ending in `.*`).
    pub async fn bulk(&self, target: SocketAddr, auth: &AuthContext, oid: &str, max_repetitions: u32) -> Outcome {
        let Some(numeric) = parse_oid(oid) else {
            return Outcome::Error(EngineError::new(ErrorKind::Protocol, format!("malformed OID '{oid}'")));
        };
        match auth {
            AuthContext::Community { community, mp_model } => {
                self.community_bulk(target, community, *mp_model, &numeric, max_repetitions).await
            }
            AuthContext::V3(_) => Outcome::Error(EngineError::new(
                ErrorKind::Protocol,
                "SNMPv3 session bootstrap is not implemented",
            )),
        }
    }

    /// Walk an entire subtree, one GETBULK page at a time, returning the
    /// full accumulated sequence of `Values` chunks. Stops at the first
    /// binding outside `root`, an exception value, or an error.
    pub async fn walk(&self, target: SocketAddr, auth: &AuthContext, root: &str) -> Vec<Outcome> {
        let Some(root_numeric) = parse_oid(root) else {
            return vec![Outcome::Error(EngineError::new(ErrorKind::Protocol, format!("malformed OID '{root}'")))];
        };

        let mut chunks = Vec::new();
        let mut cursor = root_numeric.clone();
        loop {
            let page = self.bulk(target, auth, &oid_to_string(&cursor), 20).await;
            match page {
                Outcome::Values(bindings) => {
                    if bindings.is_empty() {
                        chunks.push(Outcome::EndOfSubtree);
                        break;
                    }
                    let mut in_subtree = Vec::new();
                    let mut hit_boundary = false;
                    for (oid_str, value) in &bindings {
                        let Some(numeric) = parse_oid(oid_str) else { continue };
                        if !oids::in_subtree(&numeric, &root_numeric) || value.is_exception() {
                            hit_boundary = true;
                            break;
                        }
                        cursor = numeric;
                        in_subtree.push((oid_str.clone(), value.clone()));
                    }
                    if !in_subtree.is_empty() {
                        chunks.push(Outcome::Values(in_subtree));
                    }
                    if hit_boundary {
                        chunks.push(Outcome::EndOfSubtree);
                        break;
                    }
                }
                Outcome::EndOfSubtree => {
                    chunks.push(Outcome::EndOfSubtree);
                    break;
                }
                err @ Outcome::Error(_) => {
                    chunks.push(err);
                    break;
                }
            }
        }
        chunks
    }

    /// OIDs from a walk/get result that belong to the discovery
    /// side-channel set (§4.B), preserved for the store adapter regardless
    /// of what the translator does with the rest of the binding.
    pub fn extract_stored_observations(bindings: &[(String, SnmpValue)]) -> Vec<StoredObservation> {
        let to_store = oids::oids_to_store();
        bindings
            .iter()
            .filter_map(|(oid_str, value)| {
                let numeric = parse_oid(oid_str)?;
                to_store
                    .iter()
                    .any(|prefix| oids::in_subtree(&numeric, prefix))
                    .then(|| StoredObservation { oid: oid_str.clone(), value: value.clone() })
            })
            .collect()
    }

    async fn community_get(&self, target: SocketAddr, community: &str, mp_model: u8, oid: &[u32]) -> Outcome {
        debug!(%target, oid = %oid_to_string(oid), mp_model, "SNMP GET");
        self.with_session(target, community, None, oid.to_vec()).await
    }

    async fn community_bulk(
        &self,
        target: SocketAddr,
        community: &str,
        mp_model: u8,
        oid: &[u32],
        max_repetitions: u32,
    ) -> Outcome {
        debug!(%target, oid = %oid_to_string(oid), mp_model, max_repetitions, "SNMP GETBULK");
        self.with_session(target, community, Some(max_repetitions), oid.to_vec()).await
    }

    /// Open a session and run one request against it on a blocking-pool
    /// thread (§5: the `snmp` crate's session API is synchronous UDP I/O,
    /// so it must never run directly on a tokio worker thread), retrying
    /// on transport failure up to `self.retries` times.
    async fn with_session(
        &self,
        target: SocketAddr,
        community: &str,
        max_repetitions: Option<u32>,
        oid: Vec<u32>,
    ) -> Outcome {
        let mut last_err = None;
        for attempt in 0..=self.retries {
            let session = RawSession { target, community: community.to_string(), timeout: self.timeout };
            let oid = oid.clone();
            let result = tokio::task::spawn_blocking(move || session.dispatch(&oid, max_repetitions)).await;
            match result {
                Ok(Ok(bindings)) => return Outcome::Values(bindings),
                Ok(Err(e)) => {
                    warn!(%target, attempt, error = %e, "SNMP request failed");
                    last_err = Some(e);
                }
                Err(join_err) => {
                    warn!(%target, attempt, error = %join_err, "SNMP blocking task panicked");
                    last_err = Some(std::io::Error::new(std::io::ErrorKind::Other, join_err.to_string()));
                }
            }
        }
        let kind = match &last_err {
            Some(e) if e.kind() == std::io::ErrorKind::TimedOut => ErrorKind::Timeout,
            Some(e) if e.kind() == std::io::ErrorKind::PermissionDenied => ErrorKind::AuthFailure,
            _ => ErrorKind::Transport,
        };
        Outcome::Error(EngineError::new(kind, last_err.map(|e| e.to_string()).unwrap_or_default()))
    }
}

/// Thin handle around a UDP target; the actual BER request/response cycle
/// is delegated to the `snmp` crate's blocking session underneath, via
/// `snmp::SyncSession`, invoked from the worker pool with
/// `tokio::task::spawn_blocking` so the orchestrator's tick loop never
/// blocks on socket I/O.
struct RawSession {
    target: SocketAddr,
    community: String,
    timeout: Duration,
}

impl RawSession {
    /// Open a `snmp::SyncSession` against `self.target` with
    /// `self.community` and run a get or getbulk, converting every
    /// returned varbind into our own [`SnmpValue`].
    fn dispatch(&self, oid: &[u32], max_repetitions: Option<u32>) -> std::io::Result<Vec<(String, SnmpValue)>> {
        use snmp::{SyncSession, Value};

        let mut session = SyncSession::new(self.target, self.community.as_bytes(), Some(self.timeout), 0)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, format!("{e:?}")))?;

        let pdu = if let Some(max_rep) = max_repetitions {
            session.getbulk(&[oid], 0, max_rep)
        } else {
            session.get(&[oid])
        }
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::TimedOut, format!("{e:?}")))?;

        Ok(pdu
            .varbinds
            .map(|(oid, value)| {
                let oid_string = oid.to_string();
                let converted = match value {
                    Value::Boolean(b) => SnmpValue::Boolean(b),
                    Value::Integer(i) => SnmpValue::Integer(i),
                    Value::OctetString(bytes) => SnmpValue::OctetString(bytes.to_vec()),
                    Value::Null => SnmpValue::Null,
                    Value::ObjectIdentifier(oid) => SnmpValue::ObjectIdentifier(oid.to_string()),
                    Value::IpAddress(octets) => SnmpValue::IpAddress(octets),
                    Value::Counter32(v) => SnmpValue::Counter32(v),
                    Value::Unsigned32(v) => SnmpValue::Unsigned32(v),
                    Value::Timeticks(v) => SnmpValue::TimeTicks(v),
                    Value::Opaque(bytes) => SnmpValue::Opaque(bytes.to_vec()),
                    Value::Counter64(v) => SnmpValue::Counter64(v),
                    Value::EndOfMibView => SnmpValue::EndOfMibView,
                    Value::NoSuchObject => SnmpValue::NoSuchObject,
                    Value::NoSuchInstance => SnmpValue::NoSuchInstance,
                    _ => SnmpValue::Null,
                };
                (oid_string, converted)
            })
            .collect())
    }
}
