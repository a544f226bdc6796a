//! Contract Test: Cloudflare Access Group API
//!
//! Constraints verified:
//! - Reads and writes carry Bearer auth against the account/group URL
//! - Non-2xx responses become errors carrying status and body
//! - The write body is exactly one `/32` include entry
//! - A full reconcile tick against the API writes once, and only when needed

use allowsync_core::traits::{AddressSource, ResolvedAddress};
use allowsync_core::{Error, Notifier, PolicyStore, Reconciler, TickOutcome};
use allowsync_provider_cloudflare::CloudflarePolicyStore;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GROUP_PATH: &str = "/accounts/acc-1/access/groups/grp-2";

fn store_for(server: &MockServer) -> CloudflarePolicyStore {
    CloudflarePolicyStore::new("test-token", "acc-1", "grp-2")
        .unwrap()
        .with_base_url(server.uri())
}

fn group_response(include: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "result": {
            "id": "grp-2",
            "name": "home",
            "uid": "uid-2",
            "include": include,
            "require": [],
            "exclude": [],
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z"
        },
        "success": true,
        "errors": [],
        "messages": []
    }))
}

struct StaticAddress(&'static str);

#[async_trait::async_trait]
impl AddressSource for StaticAddress {
    async fn resolve_current(&self) -> allowsync_core::Result<ResolvedAddress> {
        Ok(ResolvedAddress::new(self.0, "static"))
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

#[tokio::test]
async fn fetch_decodes_group_with_bearer_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GROUP_PATH))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(group_response(json!([{"ip": {"ip": "203.0.113.1/32"}}])))
        .expect(1)
        .mount(&server)
        .await;

    let record = store_for(&server).fetch_policy().await.unwrap();

    assert_eq!(record.id, "grp-2");
    assert_eq!(record.name, "home");
    assert_eq!(record.current_host_address(), Some("203.0.113.1"));
    assert_eq!(record.extra.get("uid"), Some(&json!("uid-2")));
}

#[tokio::test]
async fn fetch_failure_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GROUP_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("{\"success\":false}"))
        .mount(&server)
        .await;

    let err = store_for(&server).fetch_policy().await.unwrap_err();

    assert!(matches!(err, Error::PolicyFetch(_)));
    let msg = err.to_string();
    assert!(msg.contains("403"), "{}", msg);
    assert!(msg.contains("{\"success\":false}"), "{}", msg);
}

#[tokio::test]
async fn fetch_rejects_undecodable_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GROUP_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = store_for(&server).fetch_policy().await.unwrap_err();
    assert!(matches!(err, Error::PolicyFetch(_)));
}

#[tokio::test]
async fn replace_sends_single_host_entry() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(GROUP_PATH))
        .and(header("authorization", "Bearer test-token"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"include": [{"ip": {"ip": "198.51.100.1/32"}}]})))
        .respond_with(group_response(json!([{"ip": {"ip": "198.51.100.1/32"}}])))
        .expect(1)
        .mount(&server)
        .await;

    store_for(&server).replace_policy("198.51.100.1").await.unwrap();
}

#[tokio::test]
async fn replace_failure_is_update_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(GROUP_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .mount(&server)
        .await;

    let err = store_for(&server).replace_policy("198.51.100.1").await.unwrap_err();

    assert!(matches!(err, Error::PolicyUpdate(_)));
    assert!(err.to_string().contains("bad request"));
}

#[tokio::test]
async fn reconcile_changed_address_writes_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GROUP_PATH))
        .respond_with(group_response(json!([{"ip": {"ip": "203.0.113.1/32"}}])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(GROUP_PATH))
        .and(body_json(json!({"include": [{"ip": {"ip": "198.51.100.1/32"}}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let reconciler = Reconciler::new(
        Arc::new(StaticAddress("198.51.100.1")),
        Arc::new(store_for(&server)),
        Notifier::disabled(),
    );

    assert_eq!(
        reconciler.run_once().await,
        TickOutcome::Updated {
            previous: "203.0.113.1".to_string(),
            address: "198.51.100.1".to_string(),
        }
    );
}

#[tokio::test]
async fn reconcile_matching_address_never_writes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GROUP_PATH))
        .respond_with(group_response(json!([{"ip": {"ip": "198.51.100.1/32"}}])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let reconciler = Reconciler::new(
        Arc::new(StaticAddress("198.51.100.1")),
        Arc::new(store_for(&server)),
        Notifier::disabled(),
    );

    assert!(matches!(
        reconciler.run_once().await,
        TickOutcome::Unchanged { .. }
    ));
}
