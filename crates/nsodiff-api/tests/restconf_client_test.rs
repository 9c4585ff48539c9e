#![allow(clippy::unwrap_used)]
// Integration tests for `RestconfClient` using wiremock.

use secrecy::SecretString;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use nsodiff_api::{Error, RestconfClient, RestconfMethod, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RestconfClient) {
    let server = MockServer::start().await;
    let token = SecretString::from("YWRtaW46YWRtaW4=".to_owned());
    let client = RestconfClient::new(&server.uri(), &token, &TransportConfig::default()).unwrap();
    (server, client)
}

// ── Success paths ───────────────────────────────────────────────────

#[tokio::test]
async fn test_get_sends_fixed_headers() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/restconf/data/tailf-ncs:devices/device=pe1"))
        .and(query_param("content", "config"))
        .and(header("Accept", "application/yang-data+xml"))
        .and(header("Content-Type", "application/yang-data+xml"))
        .and(header("Authorization", "Basic YWRtaW46YWRtaW4="))
        .respond_with(ResponseTemplate::new(200).set_body_string("<device><name>pe1</name></device>"))
        .expect(1)
        .mount(&server)
        .await;

    let body = client
        .get("data/tailf-ncs:devices/device=pe1?content=config")
        .await
        .unwrap();

    assert_eq!(body, "<device><name>pe1</name></device>");
}

#[tokio::test]
async fn test_success_codes_return_body() {
    for status in [200u16, 201, 204] {
        let (server, client) = setup().await;
        let body = if status == 204 { "" } else { "<ok/>" };

        Mock::given(method("POST"))
            .and(path("/restconf/data/tailf-ncs:devices"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;

        let text = client
            .post("data/tailf-ncs:devices", Some("<device-group/>"))
            .await
            .unwrap();
        assert_eq!(text, body, "status {status}");
    }
}

#[tokio::test]
async fn test_body_is_attached_verbatim() {
    let (server, client) = setup().await;
    let payload = "<device-group><name>abc12345</name></device-group>";

    Mock::given(method("POST"))
        .and(path("/restconf/data/tailf-ncs:devices"))
        .and(body_string(payload))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    client
        .send("data/tailf-ncs:devices", RestconfMethod::Post, Some(payload))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_escaped_newlines_are_normalized() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r"<a>\n  <b/>\n</a>"))
        .mount(&server)
        .await;

    let body = client.get("data").await.unwrap();
    assert_eq!(body, "<a>\n  <b/>\n</a>");
}

// ── Error paths ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_non_success_status_carries_body_and_url() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(404).set_body_string("<errors>uri keypath not found</errors>"))
        .mount(&server)
        .await;

    let result = client.delete("data/tailf-ncs:devices/device-group=gone").await;

    match &result {
        Err(Error::Status { status, body, url }) => {
            assert_eq!(*status, 404);
            assert!(body.contains("uri keypath not found"), "body: {body}");
            assert!(url.ends_with("/restconf/data/tailf-ncs:devices/device-group=gone"), "url: {url}");
        }
        other => panic!("expected Status error, got: {other:?}"),
    }
    assert!(result.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_202_is_not_success() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    assert!(matches!(
        client.get("data").await,
        Err(Error::Status { status: 202, .. })
    ));
}

#[tokio::test]
async fn test_unsupported_method_never_hits_the_wire() {
    let (server, client) = setup().await;

    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = client.request("data/tailf-ncs:devices", "PATCH", Some("<x/>")).await;

    assert!(
        matches!(result, Err(Error::UnsupportedMethod(ref m)) if m == "PATCH"),
        "expected UnsupportedMethod, got: {result:?}"
    );
}

#[tokio::test]
async fn test_method_by_name_is_accepted() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/restconf/data/tailf-ncs:devices/device-group=abc"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client
        .request("data/tailf-ncs:devices/device-group=abc", "delete", None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_slow_controller_times_out() {
    let server = MockServer::start().await;
    let token = SecretString::from("YWRtaW46YWRtaW4=".to_owned());
    let transport = TransportConfig {
        timeout: std::time::Duration::from_secs(1),
        ..TransportConfig::default()
    };
    let client = RestconfClient::new(&server.uri(), &token, &transport).unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(3)))
        .mount(&server)
        .await;

    let result = client.get("data/tailf-ncs:devices").await;

    assert!(
        matches!(result, Err(Error::Timeout { timeout_secs: 1 })),
        "expected Timeout, got: {result:?}"
    );
}
