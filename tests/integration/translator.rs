//! Integration tests for the translator client against a mocked HTTP
//! service (§4.A).

use sc4snmp_poller::snmp::SnmpValue;
use sc4snmp_poller::translate::{DataFormat, RawBinding, Translated, TranslatorClient};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn successful_translation_returns_symbolic_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/translation"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ifDescr"))
        .mount(&server)
        .await;

    let client = TranslatorClient::new(server.uri());
    let bindings = vec![RawBinding { oid: "1.3.6.1.2.1.2.2.1.2.1".into(), value: SnmpValue::OctetString(b"eth0".to_vec()) }];
    let result = client.translate(&bindings, DataFormat::Text).await;
    assert_eq!(result, Translated::Symbolic("ifDescr".to_string()));
}

#[tokio::test]
async fn server_error_falls_back_to_raw_shape_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/translation"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = TranslatorClient::new(server.uri());
    let bindings = vec![RawBinding { oid: "1.3.6.1.2.1.1.1.0".into(), value: SnmpValue::OctetString(b"router".to_vec()) }];
    let result = client.translate(&bindings, DataFormat::Text).await;
    assert!(matches!(result, Translated::RawFallback(_)));
}

#[tokio::test]
async fn non_numeric_metric_response_is_retried_as_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/translation"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not-a-number"))
        .mount(&server)
        .await;

    let client = TranslatorClient::new(server.uri());
    let bindings = vec![RawBinding { oid: "1.3.6.1.2.1.1.3.0".into(), value: SnmpValue::TimeTicks(42) }];
    let result = client.translate_with_sanity_check(&bindings, DataFormat::Metric).await;
    assert_eq!(result, Translated::Symbolic("not-a-number".to_string()));
}
