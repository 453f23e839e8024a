mod common;

use axum::{body::to_bytes, body::Body, http::{Request, StatusCode}, Router};
use common::*;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn setup_app() -> Router {
    let (_repos, services) = setup().await;
    services.router()
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

fn member_body(members: Value) -> Value {
    json!({
        "inquiryId": INQUIRY_ID,
        "submitterEmail": CONTACT_EMAIL,
        "payload": { "type": "members", "data": { "members": members } }
    })
}

#[tokio::test]
async fn test_health() {
    let app = setup_app().await;
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_draft_submit_and_approve_over_http() {
    let app = setup_app().await;

    let (status, draft) = send(
        &app,
        "PUT",
        "/drafts/client",
        Some(member_body(json!([{ "name": "Ben Cruz", "email": "ben@example.edu" }]))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(draft["status"], "draft");
    let id = draft["_id"].as_str().unwrap().to_string();

    let (status, outcome) = send(
        &app,
        "POST",
        &format!("/inquiries/{}/drafts/client/submit", INQUIRY_ID),
        Some(json!({ "actor": CONTACT_EMAIL })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["submitted"].as_array().unwrap().len(), 1);

    let (status, pending) = send(
        &app,
        "GET",
        &format!("/inquiries/{}/drafts/client?status=pending", INQUIRY_ID),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let (status, approved) = send(
        &app,
        "POST",
        &format!("/drafts/client/{}/approve", id),
        Some(json!({ "reviewer": ADMIN })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["request"]["status"], "approved");
    assert_eq!(approved["assignedIds"].as_array().unwrap().len(), 1);

    let (status, err) = send(
        &app,
        "POST",
        &format!("/drafts/client/{}/approve", id),
        Some(json!({ "reviewer": ADMIN })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["details"]["currentState"], "approved");
}

#[tokio::test]
async fn test_upsert_with_mismatched_kind_is_bad_request() {
    let app = setup_app().await;
    let (status, _) = send(
        &app,
        "PUT",
        "/drafts/project",
        Some(member_body(json!([{ "name": "Ben Cruz", "email": "ben@example.edu" }]))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reject_without_reason_is_bad_request() {
    let app = setup_app().await;
    send(
        &app,
        "PUT",
        "/drafts/client",
        Some(member_body(json!([{ "name": "Ben Cruz", "email": "ben@example.edu" }]))),
    )
    .await;
    send(
        &app,
        "POST",
        &format!("/inquiries/{}/drafts/client/submit", INQUIRY_ID),
        Some(json!({ "actor": CONTACT_EMAIL })),
    )
    .await;
    let id = format!("{}_{}", INQUIRY_ID, CONTACT_EMAIL);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/drafts/client/{}/reject", id),
        Some(json!({ "reviewer": ADMIN })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation");
}

#[tokio::test]
async fn test_delete_missing_draft_is_not_found() {
    let app = setup_app().await;
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/inquiries/{}/drafts/client?email=nobody@example.edu", INQUIRY_ID),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_draft_stream_is_event_stream() {
    let app = setup_app().await;
    let req = Request::builder()
        .uri(format!("/inquiries/{}/drafts/client/stream", INQUIRY_ID))
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("text/event-stream"));
}

#[tokio::test]
async fn test_quotation_flow_over_http() {
    let app = setup_app().await;

    let (status, thread) = send(&app, "POST", &format!("/threads/{}", INQUIRY_ID), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thread["status"], "pending");

    let (status, version) = send(
        &app,
        "POST",
        &format!("/threads/{}/quotations", INQUIRY_ID),
        Some(json!({
            "items": [
                { "description": "DNA extraction", "quantity": 2, "unitPrice": 100.0 },
                { "description": "QC", "quantity": 1, "unitPrice": 50.0 }
            ],
            "discountPercentage": 12,
            "createdBy": ADMIN
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(version["version"], 1);
    assert_eq!(version["totalAmount"].as_f64(), Some(220.0));

    let (status, thread) = send(
        &app,
        "POST",
        &format!("/threads/{}/quotations/1/send", INQUIRY_ID),
        Some(json!({ "actor": ADMIN })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thread["status"], "quoted");
    assert_eq!(thread["unreadCount"]["client"], 1);

    let (status, thread) = send(
        &app,
        "POST",
        &format!("/threads/{}/quotations/1/approve", INQUIRY_ID),
        Some(json!({ "client": CONTACT_EMAIL })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thread["status"], "approved");

    let (status, read) = send(
        &app,
        "POST",
        &format!("/threads/{}/read", INQUIRY_ID),
        Some(json!({ "role": "client" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["unreadCount"]["client"], 0);
}

#[tokio::test]
async fn test_activity_logs_endpoint() {
    let app = setup_app().await;
    send(
        &app,
        "PUT",
        "/drafts/client",
        Some(member_body(json!([{ "name": "Ben Cruz", "email": "ben@example.edu" }]))),
    )
    .await;

    let (status, logs) = send(&app, "GET", "/activity-logs?entityType=client_request&limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "GET", "/activity-logs?from=yesterday", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
