//! Server configuration structures (§6 "Server config (structured
//! document)").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::enricher::EnricherConfig;
use crate::profiles::Profile;
use crate::snmp::auth::V3User;

/// `mongo: {database, walked_collection, unwalked_collection}` — store
/// location, as named in the source config (§6). DESIGN.md records why
/// this stays Postgres-backed under the historical key name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreLocation {
    pub database: String,
    pub walked_collection: String,
    pub unwalked_collection: String,
}

impl Default for StoreLocation {
    fn default() -> Self {
        Self {
            database: "sc4snmp".into(),
            walked_collection: "walked_hosts".into(),
            unwalked_collection: "unwalked_hosts".into(),
        }
    }
}

/// `communities: {<name>: {...}}` (§6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunityEntry {
    #[serde(rename = "communityIndex")]
    pub community_index: Option<String>,
    #[serde(rename = "contextEngineId")]
    pub context_engine_id: Option<String>,
    #[serde(rename = "contextName")]
    pub context_name: Option<String>,
    pub tag: Option<String>,
    #[serde(rename = "securityName")]
    pub security_name: Option<String>,
}

/// Top-level server configuration (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub mongo: StoreLocation,
    pub profiles: HashMap<String, Profile>,
    pub communities: HashMap<String, CommunityEntry>,
    pub usernames: HashMap<String, V3User>,
    pub enricher: EnricherConfig,
    #[serde(rename = "additionalMetricField")]
    pub additional_metric_field: Vec<String>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            mongo: StoreLocation::default(),
            profiles: HashMap::new(),
            communities: HashMap::new(),
            usernames: HashMap::new(),
            enricher: EnricherConfig::default(),
            additional_metric_field: Vec::new(),
        }
    }
}

impl PollerConfig {
    /// Apply environment variable overrides (§6 "Environment variables
    /// consumed").
    pub fn apply_env_overrides(&mut self) {
        // CELERY_BROKER_URL / MIBS_SERVER_URL / MIBS_FILES_URL /
        // OTEL_SERVER_LOGS_URL / OTEL_SERVER_METRICS_URL are read directly
        // by the components that need them (broker, translator client,
        // publisher) rather than folded into this struct, since they name
        // external collaborators rather than core config.
        if let Ok(v) = std::env::var("SC4SNMP_STORE_DATABASE") {
            self.mongo.database = v;
        }
    }
}
