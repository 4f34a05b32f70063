//! HTTP-level integration tests for session chat.

mod common;

use axum::http::StatusCode;
use common::{body_json, delete, delete_json, get, live_session, post, post_json, put_json};
use serde_json::{json, Value};

async fn send(app: &common::TestApp, session_id: i64, token: &str, body: Value) -> Value {
    let response = post_json(
        &app.router,
        &format!("/api/v1/sessions/{session_id}/messages"),
        token,
        body,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

// ---------------------------------------------------------------------------
// Sending
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_send_message_returns_201() {
    let app = common::build_test_app().await;
    let id = live_session(&app).await;

    let message = send(
        &app,
        id,
        &app.student.token,
        json!({ "content": "  Is the quiz open-book?  ", "message_type": "question" }),
    )
    .await;
    assert_eq!(message["content"], "Is the quiz open-book?");
    assert_eq!(message["message_type"], "question");
    assert_eq!(message["sender_id"], app.student.id);

    let response = get(
        &app.router,
        &format!("/api/v1/sessions/{id}/attendance/me"),
        Some(&app.student.token),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["engagement"]["messages_count"], 1);
    assert_eq!(json["data"]["engagement"]["questions_asked"], 1);
}

#[tokio::test]
async fn test_students_cannot_announce() {
    let app = common::build_test_app().await;
    let id = live_session(&app).await;
    let uri = format!("/api/v1/sessions/{id}/messages");

    let response = post_json(
        &app.router,
        &uri,
        &app.student.token,
        json!({ "content": "Class cancelled!", "message_type": "announcement" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = post_json(
        &app.router,
        &uri,
        &app.faculty.token,
        json!({ "content": "Break for ten minutes", "message_type": "announcement" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_blank_message_returns_400() {
    let app = common::build_test_app().await;
    let id = live_session(&app).await;

    let response = post_json(
        &app.router,
        &format!("/api/v1/sessions/{id}/messages"),
        &app.student.token,
        json!({ "content": "   " }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_disabled_returns_409() {
    let app = common::build_test_app().await;
    let id = common::create_session(&app, json!({ "enable_chat": false })).await;

    let response = post_json(
        &app.router,
        &format!("/api/v1/sessions/{id}/messages"),
        &app.faculty.token,
        json!({ "content": "Hello" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Edit and delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_only_sender_can_edit() {
    let app = common::build_test_app().await;
    let id = live_session(&app).await;
    let message = send(&app, id, &app.student.token, json!({ "content": "Teh answer" })).await;
    let uri = format!("/api/v1/messages/{}", message["id"]);

    let response = put_json(
        &app.router,
        &uri,
        &app.other_student.token,
        json!({ "content": "Hijacked" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = put_json(
        &app.router,
        &uri,
        &app.student.token,
        json!({ "content": "The answer" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["content"], "The answer");
    assert_eq!(json["data"]["is_edited"], true);
    assert_eq!(json["data"]["original_message"], "Teh answer");
}

#[tokio::test]
async fn test_deleted_message_leaves_listing() {
    let app = common::build_test_app().await;
    let id = live_session(&app).await;
    let message = send(&app, id, &app.student.token, json!({ "content": "Oops" })).await;
    let uri = format!("/api/v1/messages/{}", message["id"]);

    let response = delete(&app.router, &uri, &app.other_student.token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = delete(&app.router, &uri, &app.student.token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["is_deleted"], true);
    assert_eq!(json["data"]["deleted_by"], app.student.id);

    let response = get(
        &app.router,
        &format!("/api/v1/sessions/{id}/messages"),
        Some(&app.student.token),
    )
    .await;
    let json = body_json(response).await;
    assert!(json["data"].as_array().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Reactions and receipts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_reactions_add_and_remove() {
    let app = common::build_test_app().await;
    let id = live_session(&app).await;
    let message = send(&app, id, &app.faculty.token, json!({ "content": "Any questions?" })).await;
    let uri = format!("/api/v1/messages/{}/reactions", message["id"]);

    let response = post_json(&app.router, &uri, &app.student.token, json!({ "emoji": "👍" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = post_json(&app.router, &uri, &app.student.token, json!({ "emoji": "👍" })).await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["reactions"][0]["emoji"], "👍");
    assert_eq!(json["data"]["reactions"][0]["users"], json!([app.student.id]));

    let response = delete_json(&app.router, &uri, &app.student.token, json!({ "emoji": "👍" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["data"]["reactions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_mark_read_is_idempotent() {
    let app = common::build_test_app().await;
    let id = live_session(&app).await;
    let message = send(&app, id, &app.faculty.token, json!({ "content": "Slides are up" })).await;
    let uri = format!("/api/v1/messages/{}/read", message["id"]);

    let response = post(&app.router, &uri, &app.student.token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let first = body_json(response).await;
    assert_eq!(first["data"]["read_by"][0]["user_id"], app.student.id);

    let response = post(&app.router, &uri, &app.student.token).await;
    let second = body_json(response).await;
    assert_eq!(second["data"]["read_by"].as_array().unwrap().len(), 1);
    assert_eq!(second["data"]["version"], first["data"]["version"]);
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_list_messages_paginates_newest_first() {
    let app = common::build_test_app().await;
    let id = live_session(&app).await;
    for content in ["one", "two", "three"] {
        send(&app, id, &app.student.token, json!({ "content": content })).await;
    }
    let uri = format!("/api/v1/sessions/{id}/messages");

    let response = get(&app.router, &format!("{uri}?limit=2"), Some(&app.student.token)).await;
    let json = body_json(response).await;
    let contents: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["three", "two"]);

    let response = get(
        &app.router,
        &format!("{uri}?limit=2&offset=2"),
        Some(&app.student.token),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["data"][0]["content"], "one");
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_outsiders_cannot_read_chat() {
    let app = common::build_test_app().await;
    let id = live_session(&app).await;

    let response = get(
        &app.router,
        &format!("/api/v1/sessions/{id}/messages"),
        Some(&app.other_faculty.token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
