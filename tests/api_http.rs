// tests/api_http.rs
//
// HTTP-level tests for the public Router without opening sockets.
// Requests go through tower::ServiceExt::oneshot.
//
// Covered:
// - GET  /health
// - POST /chat/validate, /chat/extract
// - POST /listings/validate, /listings/ingest
// - GET  /csv/template, POST /csv/import (twice, duplicate skip)
// - GET  /sync/status, POST /sync/trigger/{id}

use serde_json::json;
use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use rbs_ingest::api;
use rbs_ingest::ingest::sync::{NewSyncSource, SyncFrequency};
use rbs_ingest::ingest::types::SourceType;
use rbs_ingest::{AppState, IngestConfig};

const BODY_LIMIT: usize = 1024 * 1024;
const IOS_EN: &str = include_str!("fixtures/ios_en.txt");

fn test_router() -> Router {
    api::router(AppState::from_config(IngestConfig::default()))
}

fn post_json(uri: &str, payload: &Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build json request")
}

fn post_text(uri: &str, text: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "text/plain; charset=utf-8")
        .body(Body::from(text.to_string()))
        .expect("build text request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET request")
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

async fn call_json(app: &Router, req: Request<Body>) -> (StatusCode, Json) {
    let (status, bytes) = call(app, req).await;
    let v = serde_json::from_slice(&bytes).expect("json body");
    (status, v)
}

#[tokio::test]
async fn health_returns_ok() {
    let (status, bytes) = call(&test_router(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(bytes).expect("utf8"), "ok");
}

#[tokio::test]
async fn chat_validate_sniffs_exports() {
    let app = test_router();
    let (_, v) = call_json(&app, post_text("/chat/validate", IOS_EN)).await;
    assert_eq!(v["valid"], json!(true));
    let (_, v) = call_json(&app, post_text("/chat/validate", "title,price\n")).await;
    assert_eq!(v["valid"], json!(false));
}

#[tokio::test]
async fn chat_extract_returns_pending_entities() {
    let app = test_router();
    let (status, v) = call_json(
        &app,
        post_json("/chat/extract", &json!({ "text": IOS_EN, "importId": "imp-42" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["importId"], "imp-42");
    assert_eq!(v["groupName"], "RBS Parents");
    assert_eq!(v["stats"]["totalMessages"], 4);

    let entities = v["entities"].as_array().expect("entities array");
    assert!(!entities.is_empty());
    for e in entities {
        assert_eq!(e["approvalStatus"], "PENDING");
        assert!(e["messageId"].as_str().unwrap().starts_with("imp-42-msg-"));
        assert_eq!(e["entityType"], e["extractedData"]["type"]);
    }
}

#[tokio::test]
async fn chat_extract_rejects_unparseable_text() {
    let (status, v) = call_json(
        &test_router(),
        post_json("/chat/extract", &json!({ "text": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(v["errors"], json!(["File is empty"]));
}

#[tokio::test]
async fn listing_validate_reports_all_required_fields() {
    let (status, v) = call_json(&test_router(), post_json("/listings/validate", &json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["isValid"], json!(false));
    assert_eq!(v["errors"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn listing_ingest_stores_and_then_skips_duplicates() {
    let app = test_router();
    let payload = json!({
        "listings": [{
            "title": "Kids Yoga",
            "titleHe": "יוגה לילדים",
            "description": "Calm movement for kids",
            "descriptionHe": "תנועה רגועה לילדים",
            "categoryName": "yoga",
            "providerId": "prov-yoga",
            "price": "₪90"
        }]
    });

    let (status, v) = call_json(&app, post_json("/listings/ingest", &payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["result"]["created"], 1);
    assert_eq!(v["store"]["stored"], 1);
    assert_eq!(v["result"]["listings"][0]["categoryId"], "cat-health");
    assert_eq!(v["result"]["listings"][0]["status"], "PENDING");

    let (_, v) = call_json(&app, post_json("/listings/ingest", &payload)).await;
    assert_eq!(v["result"]["created"], 0);
    assert_eq!(v["result"]["skipped"], 1);
    assert_eq!(v["stats"]["total"], 1);
}

#[tokio::test]
async fn csv_template_download_and_import() {
    let app = test_router();

    let resp = app.clone().oneshot(get("/csv/template")).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::OK);
    let ctype = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(ctype.starts_with("text/csv"), "{ctype}");
    let template = String::from_utf8(
        body::to_bytes(resp.into_body(), BODY_LIMIT)
            .await
            .expect("read body")
            .to_vec(),
    )
    .expect("utf8");

    let (status, v) = call_json(&app, post_text("/csv/import", &template)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["result"]["created"], 1);
    assert_eq!(v["result"]["listings"][0]["sourceType"], "CSV_IMPORT");

    let (_, v) = call_json(&app, post_text("/csv/import", &template)).await;
    assert_eq!(v["result"]["created"], 0);
    assert_eq!(v["result"]["skipped"], 1);

    let (status, v) = call_json(&app, post_text("/csv/import", "")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(v["errors"], json!(["CSV file is empty"]));
}

#[tokio::test]
async fn sync_endpoints() {
    let cfg = IngestConfig {
        sync_sources: vec![NewSyncSource {
            name: "parents-sheet".into(),
            url: "https://docs.example/sheets/parents".into(),
            source_type: SourceType::GoogleSheets,
            is_active: true,
            sync_frequency: SyncFrequency::Daily,
            column_mapping: None,
        }],
        ..Default::default()
    };
    let state = AppState::from_config(cfg);
    let id = state.sync.registry.list()[0].id.clone();
    let app = api::router(state);

    let (status, v) = call_json(&app, get("/sync/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["totalSources"], 1);
    assert_eq!(v["pendingSyncs"], 1);

    let (status, v) = call_json(&app, post_json(&format!("/sync/trigger/{id}"), &json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["log"]["status"], "SUCCESS");

    let (status, v) = call_json(&app, post_json("/sync/trigger/missing", &json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(v["errors"], json!(["Sync source not found: missing"]));

    let (_, v) = call_json(&app, get("/sync/status")).await;
    assert_eq!(v["pendingSyncs"], 0);
}
