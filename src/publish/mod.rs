//! Payload shaping & publisher client (§6 "Published event/metric
//! payload", §4.E "Publisher glue"): builds the two wire shapes the
//! ingest gateway expects and POSTs them, logging and dropping on failure
//! rather than raising (§7 category 4).

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::enricher::{strip_trailing_index, EnricherConfig};

const ERROR_TOKEN: &str = "error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Meta,
    Walk,
    Error,
}

impl SourceType {
    fn as_str(self) -> &'static str {
        match self {
            SourceType::Meta => "sc4snmp:meta",
            SourceType::Walk => "sc4snmp:walk",
            SourceType::Error => "sc4snmp:error",
        }
    }

    /// §6: meta by default, walk if the record came from a one-time walk,
    /// error if the record represents an error condition or the event
    /// text contains the literal token `error`.
    pub fn classify(is_walk: bool, is_error: bool, event_text: &str) -> Self {
        if is_error || event_text.to_ascii_lowercase().contains(ERROR_TOKEN) {
            SourceType::Error
        } else if is_walk {
            SourceType::Walk
        } else {
            SourceType::Meta
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventPayload {
    pub time: f64,
    pub host: String,
    pub index: String,
    pub sourcetype: &'static str,
    pub event: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricPayload {
    pub time: f64,
    pub host: String,
    pub index: String,
    pub event: &'static str,
    pub fields: HashMap<String, Value>,
}

fn epoch_seconds() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}

/// Build an event payload (§6). `index` is `meta_index` when the record
/// classifies as `sc4snmp:meta`, `event_index` otherwise (§6 "index:
/// <event_or_meta_index>").
pub fn build_event_payload(
    host: &str,
    event_index: &str,
    meta_index: &str,
    is_walk: bool,
    is_error: bool,
    event_text: String,
) -> EventPayload {
    let source_type = SourceType::classify(is_walk, is_error, &event_text);
    let index = if source_type == SourceType::Meta { meta_index } else { event_index };
    EventPayload { time: epoch_seconds(), host: host.to_string(), index: index.to_string(), sourcetype: source_type.as_str(), event: event_text }
}

/// Build a metric payload (§6). `metric_name` is the fully-qualified
/// published name before trailing-index stripping; `dimensions` are the
/// fields the Enricher attached; `additional_fields` carries the
/// `additionalMetricField` config's copied InventoryRecord fields.
pub fn build_metric_payload(
    enricher: &EnricherConfig,
    host: &str,
    index: &str,
    metric_name: &str,
    value: f64,
    frequency_seconds: u64,
    dimensions: &[(String, String)],
    additional_fields: &HashMap<String, String>,
) -> MetricPayload {
    let stripped_name = strip_trailing_index(enricher, metric_name);

    let mut fields = HashMap::new();
    fields.insert(format!("metric_name:{stripped_name}"), serde_json::json!(value));
    fields.insert("frequency".to_string(), serde_json::json!(frequency_seconds.to_string()));
    for (name, value) in dimensions {
        fields.insert(name.clone(), serde_json::json!(value));
    }
    for (name, value) in additional_fields {
        fields.insert(name.clone(), serde_json::json!(value));
    }

    MetricPayload { time: epoch_seconds(), host: host.to_string(), index: index.to_string(), event: "metric", fields }
}

/// Ingest gateway HTTP client (§6 `OTEL_SERVER_LOGS_URL`/
/// `OTEL_SERVER_METRICS_URL`).
pub struct Publisher {
    http: Client,
    logs_url: String,
    metrics_url: String,
}

impl Publisher {
    pub fn new(logs_url: impl Into<String>, metrics_url: impl Into<String>) -> Self {
        Self {
            http: Client::builder().timeout(std::time::Duration::from_secs(60)).build().expect("reqwest client"),
            logs_url: logs_url.into(),
            metrics_url: metrics_url.into(),
        }
    }

    /// POST an event payload. Logs and returns on any failure; never
    /// propagates (§4.E "on connection error it logs and returns without
    /// raising", §7 category 4: no retry).
    pub async fn publish_event(&self, payload: &EventPayload) {
        if let Err(e) = self.http.post(&self.logs_url).json(payload).send().await {
            warn!(error = %e, host = %payload.host, "dropping event: ingest gateway unreachable");
        }
    }

    /// POST a metric payload. Same drop-on-failure policy as events.
    pub async fn publish_metric(&self, payload: &MetricPayload) {
        if let Err(e) = self.http.post(&self.metrics_url).json(payload).send().await {
            warn!(error = %e, host = %payload.host, "dropping metric: ingest gateway unreachable");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sourcetype_defaults_to_meta() {
        assert_eq!(SourceType::classify(false, false, "all good"), SourceType::Meta);
    }

    #[test]
    fn sourcetype_is_walk_for_onetime_walks() {
        assert_eq!(SourceType::classify(true, false, "discovered interfaces"), SourceType::Walk);
    }

    #[test]
    fn sourcetype_is_error_when_text_contains_error_token() {
        assert_eq!(SourceType::classify(false, false, "NoSuchInstance error occurred"), SourceType::Error);
    }

    #[test]
    fn sourcetype_is_error_when_explicitly_flagged_even_during_a_walk() {
        assert_eq!(SourceType::classify(true, true, "fine"), SourceType::Error);
    }

    #[test]
    fn metric_payload_has_namespaced_metric_name_and_frequency() {
        let enricher = EnricherConfig::default();
        let payload = build_metric_payload(
            &enricher, "10.0.0.1", "metrics", "sc4snmp.IF-MIB.ifInOctets_1", 42.0, 60, &[], &HashMap::new(),
        );
        assert_eq!(payload.fields["metric_name:sc4snmp.IF-MIB.ifInOctets_1"], serde_json::json!(42.0));
        assert_eq!(payload.fields["frequency"], serde_json::json!("60"));
    }
}
