//! Integration tests for the ingest gateway publisher (§4.E / §6 payload
//! shapes), against a mocked HTTP service.

use sc4snmp_poller::publish::{build_event_payload, build_metric_payload, Publisher};
use sc4snmp_poller::enricher::EnricherConfig;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn publishes_event_to_logs_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/logs"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let publisher = Publisher::new(format!("{}/logs", server.uri()), format!("{}/metrics", server.uri()));
    let payload = build_event_payload("10.0.0.1", "events", "meta", false, false, "sysDescr=router".to_string());
    publisher.publish_event(&payload).await;
}

#[tokio::test]
async fn publishes_metric_to_metrics_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let publisher = Publisher::new(format!("{}/logs", server.uri()), format!("{}/metrics", server.uri()));
    let enricher = EnricherConfig::default();
    let payload = build_metric_payload(&enricher, "10.0.0.1", "metrics", "sc4snmp.IF-MIB.ifInOctets_1", 1024.0, 60, &[], &Default::default());
    publisher.publish_metric(&payload).await;
}

#[tokio::test]
async fn unreachable_gateway_is_dropped_silently() {
    let publisher = Publisher::new("http://127.0.0.1:1/logs", "http://127.0.0.1:1/metrics");
    let payload = build_event_payload("10.0.0.1", "events", "meta", false, false, "fine".to_string());
    publisher.publish_event(&payload).await;
}
