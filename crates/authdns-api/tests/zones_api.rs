//! HTTP API behavior against a live cache

use std::sync::Arc;

use authdns_api::{router, ApiState};
use authdns_store::ZoneStore;
use authdns_zone::{StandaloneReplicator, ZoneCache};
use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

const TOKEN: &str = "test-api-token";

fn server() -> (TempDir, TestServer) {
    let dir = TempDir::new().unwrap();
    let store = ZoneStore::new(dir.path());
    let cache = ZoneCache::spawn(store, Arc::new(StandaloneReplicator::default()));
    let app = router(ApiState::new(cache, TOKEN));
    (dir, TestServer::new(app).unwrap())
}

fn authentication() -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("authentication"),
        HeaderValue::from_str(&format!("Bearer {TOKEN}")).unwrap(),
    )
}

fn authorization() -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("authorization"),
        HeaderValue::from_str(&format!("Bearer {TOKEN}")).unwrap(),
    )
}

fn zone_doc(version: u64) -> Value {
    json!({
        "name": "hello.test",
        "version": version,
        "records": [{"type": "A", "data": "1.2.3.4", "ttl": 300}]
    })
}

#[tokio::test]
async fn requests_without_a_token_get_401_on_every_route() {
    let (_dir, server) = server();

    assert_eq!(server.get("/zones/hello.test").await.status_code(), 401);
    assert_eq!(server.delete("/zones/hello.test").await.status_code(), 401);
    assert_eq!(server.get("/no/such/route").await.status_code(), 401);

    let (name, _) = authentication();
    let wrong = server
        .get("/zones/hello.test")
        .add_header(name, HeaderValue::from_static("Bearer nope"))
        .await;
    assert_eq!(wrong.status_code(), 401);
}

#[tokio::test]
async fn authorization_header_is_accepted_as_fallback() {
    let (_dir, server) = server();

    let (name, value) = authorization();
    let response = server.get("/zones/hello.test").add_header(name, value).await;
    // Authenticated; the zone merely does not exist
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn full_zone_lifecycle() {
    let (_dir, server) = server();
    let (name, value) = authentication();

    // Create via PUT
    let created = server
        .put("/zones/hello.test")
        .add_header(name.clone(), value.clone())
        .json(&zone_doc(1))
        .await;
    assert_eq!(created.status_code(), 201);
    assert_eq!(created.json::<Value>()["status"], "created");

    // Read it back
    let fetched = server
        .get("/zones/hello.test")
        .add_header(name.clone(), value.clone())
        .await;
    assert_eq!(fetched.status_code(), 200);
    let body: Value = fetched.json();
    assert_eq!(body["version"], 1);
    assert_eq!(body["records"][0]["data"], "1.2.3.4");

    // Replace via PUT again: 200, not 201
    let replaced = server
        .put("/zones/hello.test")
        .add_header(name.clone(), value.clone())
        .json(&zone_doc(1))
        .await;
    assert_eq!(replaced.status_code(), 200);

    // Version-guarded update
    let patched = server
        .patch("/zones/hello.test")
        .add_header(name.clone(), value.clone())
        .json(&zone_doc(1))
        .await;
    assert_eq!(patched.status_code(), 200);
    assert_eq!(patched.json::<Value>()["version"], 2);

    // Stale version is rejected
    let stale = server
        .patch("/zones/hello.test")
        .add_header(name.clone(), value.clone())
        .json(&zone_doc(1))
        .await;
    assert_eq!(stale.status_code(), 422);

    // Delete, then the zone is gone
    let deleted = server
        .delete("/zones/hello.test")
        .add_header(name.clone(), value.clone())
        .await;
    assert_eq!(deleted.status_code(), 200);

    let gone = server
        .get("/zones/hello.test")
        .add_header(name.clone(), value.clone())
        .await;
    assert_eq!(gone.status_code(), 404);

    let gone_again = server
        .delete("/zones/hello.test")
        .add_header(name, value)
        .await;
    assert_eq!(gone_again.status_code(), 404);
}

#[tokio::test]
async fn body_name_must_match_the_url() {
    let (_dir, server) = server();
    let (name, value) = authentication();

    let mismatch = server
        .put("/zones/other.test")
        .add_header(name, value)
        .json(&zone_doc(1))
        .await;
    assert_eq!(mismatch.status_code(), 400);
}

#[tokio::test]
async fn malformed_bodies_are_400() {
    let (_dir, server) = server();
    let (name, value) = authentication();

    let garbage = server
        .put("/zones/hello.test")
        .add_header(name.clone(), value.clone())
        .add_header(
            HeaderName::from_static("content-type"),
            HeaderValue::from_static("application/json"),
        )
        .text("{ not json")
        .await;
    assert_eq!(garbage.status_code(), 400);

    // Missing required `records`
    let incomplete = server
        .put("/zones/hello.test")
        .add_header(name, value)
        .json(&json!({"name": "hello.test", "version": 1}))
        .await;
    assert_eq!(incomplete.status_code(), 400);
}

#[tokio::test]
async fn patch_without_version_is_unprocessable() {
    let (_dir, server) = server();
    let (name, value) = authentication();

    server
        .put("/zones/hello.test")
        .add_header(name.clone(), value.clone())
        .json(&zone_doc(1))
        .await;

    let unversioned = server
        .patch("/zones/hello.test")
        .add_header(name, value)
        .json(&json!({
            "name": "hello.test",
            "records": [{"type": "A", "data": "9.9.9.9"}]
        }))
        .await;
    assert_eq!(unversioned.status_code(), 422);
}

#[tokio::test]
async fn invalid_schema_is_a_bad_body_on_put() {
    let (_dir, server) = server();
    let (name, value) = authentication();

    let invalid = server
        .put("/zones/hello.test")
        .add_header(name, value)
        .json(&json!({
            "name": "hello.test",
            "version": 1,
            "records": [{"type": "SPF", "data": "x"}]
        }))
        .await;
    assert_eq!(invalid.status_code(), 400);
}

#[tokio::test]
async fn invalid_schema_is_unprocessable_on_patch() {
    let (_dir, server) = server();
    let (name, value) = authentication();

    server
        .put("/zones/hello.test")
        .add_header(name.clone(), value.clone())
        .json(&zone_doc(1))
        .await;

    let invalid = server
        .patch("/zones/hello.test")
        .add_header(name, value)
        .json(&json!({
            "name": "hello.test",
            "version": 1,
            "records": [{"type": "SPF", "data": "x"}]
        }))
        .await;
    assert_eq!(invalid.status_code(), 422);
}
