#![allow(clippy::unwrap_used)]
// Integration tests for `Client` retry, login and subscription handling using wiremock.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio_test::assert_ok;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dsbridge_api::model::{Event, EventKind};
use dsbridge_api::{
    Client, ClientConfig, Credentials, Error, EventLoopConfig, HandlerError, Params, RetryPolicy,
    TransportConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn config(server: &MockServer, credentials: Credentials) -> ClientConfig {
    ClientConfig {
        retry: RetryPolicy {
            max_retries: 3,
            retry_delay: Duration::from_millis(10),
        },
        events: EventLoopConfig {
            subscription_id: Some(1234),
            ..EventLoopConfig::default()
        },
        ..ClientConfig::new(Url::parse(&server.uri()).unwrap(), credentials)
    }
}

fn password() -> Credentials {
    Credentials::Password {
        username: "dssadmin".into(),
        password: SecretString::from("dssadmin-pw".to_owned()),
    }
}

async fn setup() -> (MockServer, Client) {
    let server = MockServer::start().await;
    let client = Client::new(config(&server, password())).unwrap();
    (server, client)
}

fn ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": result }))
}

fn ok_empty() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "ok": true }))
}

fn fail(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "ok": false, "message": message }))
}

async fn mount_login(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path("/json/system/login"))
        .respond_with(ok(json!({ "token": token })))
        .mount(server)
        .await;
}

fn noop(_event: Arc<Event>) -> std::future::Ready<Result<(), HandlerError>> {
    std::future::ready(Ok(()))
}

// ── Login ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_sends_credentials_and_attaches_token() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/json/system/login"))
        .and(query_param("user", "dssadmin"))
        .and(query_param("password", "dssadmin-pw"))
        .respond_with(ok(json!({ "token": "tok-1" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/json/zone/getName"))
        .and(query_param("id", "1034"))
        .and(query_param("token", "tok-1"))
        .respond_with(ok(json!({ "name": "Living room" })))
        .expect(1)
        .mount(&server)
        .await;

    let zone = client.zone_get_name(1034).await.unwrap();
    assert_eq!(zone.name, "Living room");
}

#[tokio::test]
async fn test_api_key_uses_login_application() {
    let server = MockServer::start().await;
    let credentials = Credentials::ApiKey(SecretString::from("app-token".to_owned()));
    let client = Client::new(config(&server, credentials)).unwrap();

    Mock::given(method("GET"))
        .and(path("/json/system/loginApplication"))
        .and(query_param("loginToken", "app-token"))
        .respond_with(ok(json!({ "token": "session-9" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/json/property/getFloating"))
        .and(query_param("token", "session-9"))
        .respond_with(ok(json!({ "value": 21.5 })))
        .mount(&server)
        .await;

    let value = client
        .property_get_floating("/apartment/zones/zone0/temperature")
        .await
        .unwrap();
    assert!((value.value - 21.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_login() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/json/system/login"))
        .respond_with(ok(json!({ "token": "shared" })).set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/json/apartment/getCircuits"))
        .and(query_param("token", "shared"))
        .respond_with(ok(json!({ "circuits": [] })))
        .expect(3)
        .mount(&server)
        .await;

    let (a, b, c) = tokio::join!(
        client.apartment_get_circuits(),
        client.apartment_get_circuits(),
        client.apartment_get_circuits(),
    );
    assert_ok!(a);
    assert_ok!(b);
    assert_ok!(c);
}

#[tokio::test]
async fn test_rejected_login_exhausts_retries() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/json/system/login"))
        .respond_with(fail("Authentication failed"))
        .expect(3)
        .mount(&server)
        .await;

    let result = client.call("json/apartment/getCircuits", &Params::new()).await;
    match result {
        Err(Error::ExhaustedRetries { attempts, source }) => {
            assert_eq!(attempts, 3);
            assert!(
                matches!(*source, Error::Authentication { .. }),
                "expected Authentication cause, got: {source:?}"
            );
        }
        other => panic!("expected ExhaustedRetries, got: {other:?}"),
    }
}

// ── Retry policy ────────────────────────────────────────────────────

#[tokio::test]
async fn test_domain_error_is_not_retried() {
    let (server, client) = setup().await;
    mount_login(&server, "tok").await;

    Mock::given(method("GET"))
        .and(path("/json/zone/getName"))
        .respond_with(fail("Could not find zone with id '99'"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.zone_get_name(99).await;
    match result {
        Err(Error::Api { endpoint, message }) => {
            assert_eq!(endpoint, "json/zone/getName");
            assert!(message.contains("99"));
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_persistent_auth_failure_makes_exactly_three_attempts() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/json/system/login"))
        .respond_with(ok(json!({ "token": "never-valid" })))
        .expect(3)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/json/zone/getName"))
        .respond_with(fail("not logged in"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client.zone_get_name(1).await.unwrap_err();
    assert!(err.is_exhausted(), "expected ExhaustedRetries, got: {err:?}");
    assert!(err.root_cause().is_auth_expired());
}

#[tokio::test]
async fn test_transient_server_error_is_retried() {
    let (server, client) = setup().await;
    mount_login(&server, "tok").await;

    Mock::given(method("GET"))
        .and(path("/json/circuit/getConsumption"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/json/circuit/getConsumption"))
        .and(query_param("id", "302ed89f43f0000000000f7c"))
        .respond_with(ok(json!({ "consumption": 87 })))
        .expect(1)
        .mount(&server)
        .await;

    let consumption = client
        .circuit_get_consumption("302ed89f43f0000000000f7c")
        .await
        .unwrap();
    assert!((consumption.consumption - 87.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_relogin_resubscribes_and_completes_call() {
    let (server, client) = setup().await;

    // First login hands out a token the controller later forgets.
    Mock::given(method("GET"))
        .and(path("/json/system/login"))
        .respond_with(ok(json!({ "token": "t1" })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/json/system/login"))
        .respond_with(ok(json!({ "token": "t2" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/json/event/subscribe"))
        .and(query_param("name", "callScene"))
        .and(query_param("subscriptionID", "1234"))
        .respond_with(ok_empty())
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/json/zone/getName"))
        .and(query_param("token", "t1"))
        .respond_with(fail("not logged in"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/json/zone/getName"))
        .and(query_param("token", "t2"))
        .respond_with(ok(json!({ "name": "Kitchen" })))
        .expect(1)
        .mount(&server)
        .await;

    client.subscribe(EventKind::CallScene, noop).await.unwrap();

    let zone = client.zone_get_name(7).await.unwrap();
    assert_eq!(zone.name, "Kitchen");
    assert_eq!(client.subscribed_kinds(), vec![EventKind::CallScene]);
}

#[tokio::test]
async fn test_failed_resubscription_drops_kind() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/json/system/login"))
        .respond_with(ok(json!({ "token": "t1" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/json/system/login"))
        .respond_with(ok(json!({ "token": "t2" })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/json/event/subscribe"))
        .and(query_param("token", "t1"))
        .respond_with(ok_empty())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/json/event/subscribe"))
        .and(query_param("token", "t2"))
        .respond_with(fail("subscription limit reached"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/json/zone/getName"))
        .and(query_param("token", "t1"))
        .respond_with(fail("not logged in"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/json/zone/getName"))
        .and(query_param("token", "t2"))
        .respond_with(ok(json!({ "name": "Hall" })))
        .mount(&server)
        .await;

    client.subscribe("buttonClick", noop).await.unwrap();
    assert_eq!(client.zone_get_name(3).await.unwrap().name, "Hall");
    assert!(client.subscribed_kinds().is_empty());
}

// ── Secrets in errors ───────────────────────────────────────────────

fn assert_redacted(err: &Error, secret: &str) {
    let shown = format!("{err} / {err:?}");
    assert!(!shown.contains(secret), "secret leaked into: {shown}");
}

#[tokio::test]
async fn test_connect_failure_hides_login_password() {
    let credentials = Credentials::Password {
        username: "dssadmin".into(),
        password: SecretString::from("TOPSECRET-pw".to_owned()),
    };
    let client = Client::new(ClientConfig {
        retry: RetryPolicy {
            max_retries: 1,
            retry_delay: Duration::from_millis(10),
        },
        ..ClientConfig::new(Url::parse("http://127.0.0.1:1").unwrap(), credentials)
    })
    .unwrap();

    let err = client.zone_get_name(1).await.unwrap_err();
    assert_redacted(&err, "TOPSECRET-pw");
    assert!(err.to_string().contains("http://127.0.0.1:1"), "{err}");
}

#[tokio::test]
async fn test_timeout_hides_session_token() {
    let server = MockServer::start().await;
    mount_login(&server, "SESSION-TOKEN-42").await;

    Mock::given(method("GET"))
        .and(path("/json/zone/getName"))
        .respond_with(ok(json!({ "name": "Kitchen" })).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let client = Client::new(ClientConfig {
        transport: TransportConfig {
            timeout: Duration::from_millis(200),
            ..TransportConfig::default()
        },
        retry: RetryPolicy {
            max_retries: 1,
            retry_delay: Duration::from_millis(10),
        },
        ..config(&server, password())
    })
    .unwrap();

    let err = client.zone_get_name(1).await.unwrap_err();
    assert!(err.root_cause().is_transient(), "expected a timeout, got: {err:?}");
    assert_redacted(&err, "SESSION-TOKEN-42");
}

// ── Subscriptions ───────────────────────────────────────────────────

#[tokio::test]
async fn test_double_subscribe_issues_one_remote_call() {
    let (server, client) = setup().await;
    mount_login(&server, "tok").await;

    Mock::given(method("GET"))
        .and(path("/json/event/subscribe"))
        .and(query_param("name", "callScene"))
        .respond_with(ok_empty())
        .expect(1)
        .mount(&server)
        .await;

    let first = client.subscribe(EventKind::CallScene, noop).await.unwrap();
    let second = client.subscribe("callScene", noop).await.unwrap();

    assert_ne!(first, second);
    assert_eq!(client.handler_count(&EventKind::CallScene), 2);
}

#[tokio::test]
async fn test_failed_remote_subscribe_registers_nothing() {
    let (server, client) = setup().await;
    mount_login(&server, "tok").await;

    Mock::given(method("GET"))
        .and(path("/json/event/subscribe"))
        .respond_with(fail("invalid event name"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.subscribe(EventKind::Running, noop).await;
    assert!(matches!(result, Err(Error::Api { .. })), "got: {result:?}");
    assert!(client.subscribed_kinds().is_empty());
}

#[tokio::test]
async fn test_failed_remote_unsubscribe_keeps_handlers() {
    let (server, client) = setup().await;
    mount_login(&server, "tok").await;

    Mock::given(method("GET"))
        .and(path("/json/event/subscribe"))
        .respond_with(ok_empty())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/json/event/unsubscribe"))
        .respond_with(fail("unknown subscription"))
        .expect(1)
        .mount(&server)
        .await;

    client.subscribe(EventKind::UndoScene, noop).await.unwrap();
    let result = client.unsubscribe(EventKind::UndoScene).await;

    assert!(result.is_err());
    assert_eq!(client.subscribed_kinds(), vec![EventKind::UndoScene]);
    assert_eq!(client.handler_count(&EventKind::UndoScene), 1);
}

#[tokio::test]
async fn test_unsubscribe_removes_all_handlers() {
    let (server, client) = setup().await;
    mount_login(&server, "tok").await;

    Mock::given(method("GET"))
        .and(path("/json/event/subscribe"))
        .respond_with(ok_empty())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/json/event/unsubscribe"))
        .and(query_param("name", "buttonClick"))
        .respond_with(ok_empty())
        .expect(1)
        .mount(&server)
        .await;

    client.subscribe(EventKind::ButtonClick, noop).await.unwrap();
    client.subscribe(EventKind::ButtonClick, noop).await.unwrap();
    client.unsubscribe(EventKind::ButtonClick).await.unwrap();

    assert!(client.subscribed_kinds().is_empty());
    let again = client.unsubscribe(EventKind::ButtonClick).await;
    assert!(matches!(again, Err(Error::NotSubscribed { .. })));
}

#[tokio::test]
async fn test_remove_handler_unsubscribes_only_with_last() {
    let (server, client) = setup().await;
    mount_login(&server, "tok").await;

    Mock::given(method("GET"))
        .and(path("/json/event/subscribe"))
        .respond_with(ok_empty())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/json/event/unsubscribe"))
        .respond_with(ok_empty())
        .expect(1)
        .mount(&server)
        .await;

    let a = client.subscribe(EventKind::CallScene, noop).await.unwrap();
    let b = client.subscribe(EventKind::CallScene, noop).await.unwrap();

    assert_ok!(client.remove_handler(EventKind::CallScene, a).await);
    assert_eq!(client.handler_count(&EventKind::CallScene), 1);

    assert_ok!(client.remove_handler(EventKind::CallScene, b).await);
    assert!(client.subscribed_kinds().is_empty());

    let missing = client.remove_handler(EventKind::CallScene, a).await;
    assert!(matches!(missing, Err(Error::NotSubscribed { .. })));
}

// ── Typed endpoints ─────────────────────────────────────────────────

#[tokio::test]
async fn test_set_output_channel_value_encodes_pairs() {
    let (server, client) = setup().await;
    mount_login(&server, "tok").await;

    Mock::given(method("GET"))
        .and(path("/json/device/setOutputChannelValue"))
        .and(query_param("dsid", "303505d7f8000f0000000000"))
        .and(query_param("channelvalues", "shadePositionOutside=40;shadeOpeningAngleOutside=10"))
        .and(query_param("applyNow", "1"))
        .respond_with(ok_empty())
        .expect(1)
        .mount(&server)
        .await;

    client
        .device_set_output_channel_value(
            "303505d7f8000f0000000000",
            &[("shadePositionOutside", 40), ("shadeOpeningAngleOutside", 10)],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_get_apartment_unwraps_data_envelope() {
    let (server, client) = setup().await;
    mount_login(&server, "tok").await;

    Mock::given(method("GET"))
        .and(path("/api/v1/apartment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": "apartment",
                "attributes": { "name": "Home" },
                "included": {
                    "dsDevices": [{ "id": "dev-1", "attributes": { "name": "Ceiling", "submodules": ["sm-1"] } }]
                }
            }
        })))
        .mount(&server)
        .await;

    let apartment = client.get_apartment().await.unwrap();
    assert_eq!(apartment.attributes.name, "Home");
    assert_eq!(apartment.included.devices.len(), 1);
    assert_eq!(apartment.included.devices[0].attributes.submodules, vec!["sm-1"]);
}
