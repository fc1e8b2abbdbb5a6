//! Builds the SNMP auth/context data needed to open a session, the way
//! `task_utilities.build_authData`/`build_contextData` did for the Python
//! poller: v1/v2c carry a community string and an mpModel, v3 resolves a
//! named user out of the server config's `usernames` table.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::SnmpVersion;

#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    #[error("SNMPv3 user '{0}' is not present in the configured usernames table")]
    UnknownUser(String),
}

/// SNMPv3 authentication protocol (`AuthProtocolMap` in the source poller).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthProtocol {
    #[default]
    None,
    Md5,
    Sha,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl AuthProtocol {
    pub fn from_config_str(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "MD5" => AuthProtocol::Md5,
            "SHA" => AuthProtocol::Sha,
            "SHA224" => AuthProtocol::Sha224,
            "SHA256" => AuthProtocol::Sha256,
            "SHA384" => AuthProtocol::Sha384,
            "SHA512" => AuthProtocol::Sha512,
            _ => AuthProtocol::None,
        }
    }

    fn as_config_str(self) -> &'static str {
        match self {
            AuthProtocol::None => "NONE",
            AuthProtocol::Md5 => "MD5",
            AuthProtocol::Sha => "SHA",
            AuthProtocol::Sha224 => "SHA224",
            AuthProtocol::Sha256 => "SHA256",
            AuthProtocol::Sha384 => "SHA384",
            AuthProtocol::Sha512 => "SHA512",
        }
    }
}

impl Serialize for AuthProtocol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_config_str())
    }
}

impl<'de> Deserialize<'de> for AuthProtocol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(AuthProtocol::from_config_str(&String::deserialize(deserializer)?))
    }
}

/// SNMPv3 privacy protocol (`PrivProtocolMap` in the source poller).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrivProtocol {
    #[default]
    None,
    Des,
    Aes128,
    Aes192,
    Aes256,
}

impl PrivProtocol {
    pub fn from_config_str(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "DES" => PrivProtocol::Des,
            "AES" | "AES128" => PrivProtocol::Aes128,
            "AES192" => PrivProtocol::Aes192,
            "AES256" => PrivProtocol::Aes256,
            _ => PrivProtocol::None,
        }
    }

    fn as_config_str(self) -> &'static str {
        match self {
            PrivProtocol::None => "NONE",
            PrivProtocol::Des => "DES",
            PrivProtocol::Aes128 => "AES",
            PrivProtocol::Aes192 => "AES192",
            PrivProtocol::Aes256 => "AES256",
        }
    }
}

impl Serialize for PrivProtocol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_config_str())
    }
}

impl<'de> Deserialize<'de> for PrivProtocol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(PrivProtocol::from_config_str(&String::deserialize(deserializer)?))
    }
}

/// A resolved SNMPv3 user entry, as configured under `usernames:` in the
/// server config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct V3User {
    pub username: String,
    #[serde(rename = "authProtocol")]
    pub auth_protocol: AuthProtocol,
    #[serde(rename = "authKey")]
    pub auth_key: Option<String>,
    #[serde(rename = "privProtocol")]
    pub priv_protocol: PrivProtocol,
    #[serde(rename = "privKey")]
    pub priv_key: Option<String>,
    #[serde(rename = "securityEngineId")]
    pub security_engine_id: Option<String>,
    /// Overrides the `usernames` table key as the wire securityName, when set.
    #[serde(rename = "securityName")]
    pub security_name: Option<String>,
    #[serde(rename = "contextEngineId")]
    pub context_engine_id: Option<String>,
    #[serde(rename = "contextName")]
    pub context_name: Option<String>,
    /// How `authKey` is encoded: "passphrase" (default) or "hex".
    #[serde(rename = "authKeyType")]
    pub auth_key_type: Option<String>,
    #[serde(rename = "privKeyType")]
    pub priv_key_type: Option<String>,
}

impl V3User {
    /// The wire securityName: the explicit override if configured, else
    /// the `usernames` table key this entry was resolved under.
    pub fn security_name_or(&self, table_key: &str) -> String {
        self.security_name.clone().unwrap_or_else(|| table_key.to_string())
    }
}

/// Everything an SNMP session needs beyond the socket target.
#[derive(Debug, Clone)]
pub enum AuthContext {
    /// v1 (mpModel 0) or v2c (mpModel 1); `community` doubles as the
    /// context string.
    Community { community: String, mp_model: u8 },
    V3(V3User),
}

/// Build the [`AuthContext`] for a device (§4.B). `credential` is the
/// inventory row's community string (v1/v2c) or the v3 `securityName` to
/// look up in `usernames`.
pub fn build_auth_context(
    version: SnmpVersion,
    credential: &str,
    usernames: &HashMap<String, V3User>,
) -> Result<AuthContext, AuthError> {
    match version {
        SnmpVersion::V1 => Ok(AuthContext::Community { community: credential.to_string(), mp_model: 0 }),
        SnmpVersion::V2c => Ok(AuthContext::Community { community: credential.to_string(), mp_model: 1 }),
        SnmpVersion::V3 => usernames
            .get(credential)
            .cloned()
            .map(|mut user| {
                user.username = user.security_name_or(credential);
                AuthContext::V3(user)
            })
            .ok_or_else(|| AuthError::UnknownUser(credential.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_uses_mp_model_zero() {
        let ctx = build_auth_context(SnmpVersion::V1, "public", &HashMap::new()).unwrap();
        assert!(matches!(ctx, AuthContext::Community { mp_model: 0, .. }));
    }

    #[test]
    fn v2c_uses_mp_model_one() {
        let ctx = build_auth_context(SnmpVersion::V2c, "public", &HashMap::new()).unwrap();
        assert!(matches!(ctx, AuthContext::Community { mp_model: 1, .. }));
    }

    #[test]
    fn v3_resolves_named_user() {
        let mut users = HashMap::new();
        users.insert(
            "alice".to_string(),
            V3User {
                username: "alice".into(),
                auth_protocol: AuthProtocol::Sha,
                auth_key: Some("authpass123".into()),
                priv_protocol: PrivProtocol::Aes128,
                priv_key: Some("privpass123".into()),
                security_engine_id: None,
                security_name: None,
                context_engine_id: None,
                context_name: None,
                auth_key_type: None,
                priv_key_type: None,
            },
        );
        let ctx = build_auth_context(SnmpVersion::V3, "alice", &users).unwrap();
        match ctx {
            AuthContext::V3(u) => assert_eq!(u.auth_protocol, AuthProtocol::Sha),
            _ => panic!("expected v3 context"),
        }
    }

    #[test]
    fn v3_security_name_override_replaces_table_key() {
        let mut users = HashMap::new();
        users.insert("alice".to_string(), V3User { security_name: Some("alice-wire".into()), ..Default::default() });
        let ctx = build_auth_context(SnmpVersion::V3, "alice", &users).unwrap();
        match ctx {
            AuthContext::V3(u) => assert_eq!(u.username, "alice-wire"),
            _ => panic!("expected v3 context"),
        }
    }

    #[test]
    fn v3_unknown_user_is_an_error() {
        let err = build_auth_context(SnmpVersion::V3, "ghost", &HashMap::new()).unwrap_err();
        assert_eq!(err, AuthError::UnknownUser("ghost".to_string()));
    }

    #[test]
    fn unset_protocol_strings_default_to_none() {
        assert_eq!(AuthProtocol::from_config_str("NONE"), AuthProtocol::None);
        assert_eq!(AuthProtocol::from_config_str(""), AuthProtocol::None);
        assert_eq!(PrivProtocol::from_config_str("AES"), PrivProtocol::Aes128);
    }
}
