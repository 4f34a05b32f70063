//! HTTP-level integration tests for polls.

mod common;

use axum::http::StatusCode;
use common::{body_json, create_session, delete, get, live_session, post, post_json};
use serde_json::{json, Value};

async fn create_poll(app: &common::TestApp, session_id: i64, body: Value) -> i64 {
    let response = post_json(
        &app.router,
        &format!("/api/v1/sessions/{session_id}/polls"),
        &app.faculty.token,
        body,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}

fn three_options() -> Value {
    json!({
        "question": "Which consensus protocol?",
        "poll_type": "single_choice",
        "options": ["Paxos", "Raft", "Viewstamped"],
    })
}

async fn vote(app: &common::TestApp, poll_id: i64, token: &str, body: Value) -> axum::response::Response {
    post_json(&app.router, &format!("/api/v1/polls/{poll_id}/vote"), token, body).await
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_poll_returns_manager_view() {
    let app = common::build_test_app().await;
    let id = live_session(&app).await;

    let response = post_json(
        &app.router,
        &format!("/api/v1/sessions/{id}/polls"),
        &app.faculty.token,
        three_options(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["is_active"], true);
    assert_eq!(json["data"]["options"].as_array().unwrap().len(), 3);
    assert_eq!(json["data"]["results_visible"], true);
    assert_eq!(json["data"]["settings"]["show_results"], "after_vote");
}

#[tokio::test]
async fn test_yes_no_poll_fills_options() {
    let app = common::build_test_app().await;
    let id = live_session(&app).await;

    let poll_id = create_poll(
        &app,
        id,
        json!({ "question": "Ready to move on?", "poll_type": "yes_no" }),
    )
    .await;

    let response = get(
        &app.router,
        &format!("/api/v1/polls/{poll_id}"),
        Some(&app.faculty.token),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["options"][0]["text"], "Yes");
    assert_eq!(json["data"]["options"][1]["text"], "No");
}

#[tokio::test]
async fn test_create_poll_rejects_bad_input() {
    let app = common::build_test_app().await;
    let id = live_session(&app).await;
    let uri = format!("/api/v1/sessions/{id}/polls");

    let response = post_json(
        &app.router,
        &uri,
        &app.faculty.token,
        json!({ "question": "Pick one", "poll_type": "single_choice", "options": ["Only"] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json(&app.router, &uri, &app.student.token, three_options()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_poll_when_polls_disabled_returns_409() {
    let app = common::build_test_app().await;
    let id = create_session(&app, json!({ "enable_polls": false })).await;

    let response = post_json(
        &app.router,
        &format!("/api/v1/sessions/{id}/polls"),
        &app.faculty.token,
        three_options(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Voting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_second_vote_returns_409() {
    let app = common::build_test_app().await;
    let id = live_session(&app).await;
    let poll_id = create_poll(&app, id, three_options()).await;

    let response = vote(&app, poll_id, &app.student.token, json!({ "option_index": 1 })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["my_vote"], 1);
    assert_eq!(json["data"]["results"]["total_votes"], 1);
    assert_eq!(json["data"]["options"][1]["votes"], 1);

    let response = vote(&app, poll_id, &app.student.token, json!({ "option_index": 2 })).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "ALREADY_VOTED");
}

#[tokio::test]
async fn test_option_index_out_of_range_returns_400() {
    let app = common::build_test_app().await;
    let id = live_session(&app).await;
    let poll_id = create_poll(&app, id, three_options()).await;

    let response = vote(&app, poll_id, &app.student.token, json!({ "option_index": 3 })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_OPTION");

    let response = vote(&app, poll_id, &app.student.token, json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_results_hidden_until_student_votes() {
    let app = common::build_test_app().await;
    let id = live_session(&app).await;
    let poll_id = create_poll(&app, id, three_options()).await;

    vote(&app, poll_id, &app.student.token, json!({ "option_index": 0 })).await;

    let response = get(
        &app.router,
        &format!("/api/v1/polls/{poll_id}"),
        Some(&app.other_student.token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["results_visible"], false);
    assert_eq!(json["data"]["options"][0]["votes"], 0);
    assert!(json["data"]["options"][0]["voters"].is_null());

    let response = get(
        &app.router,
        &format!("/api/v1/polls/{poll_id}"),
        Some(&app.faculty.token),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["options"][0]["votes"], 1);
    assert_eq!(
        json["data"]["options"][0]["voters"][0]["user_id"],
        app.student.id
    );
}

#[tokio::test]
async fn test_text_poll_collects_responses() {
    let app = common::build_test_app().await;
    let id = live_session(&app).await;
    let poll_id = create_poll(
        &app,
        id,
        json!({ "question": "One thing you learned?", "poll_type": "text_response" }),
    )
    .await;

    let response = vote(
        &app,
        poll_id,
        &app.student.token,
        json!({ "text_response": "Quorums intersect" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["my_response"], "Quorums intersect");

    let response = vote(
        &app,
        poll_id,
        &app.student.token,
        json!({ "text_response": "Again" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "ALREADY_RESPONDED");
}

#[tokio::test]
async fn test_voting_counts_towards_participation() {
    let app = common::build_test_app().await;
    let id = live_session(&app).await;
    let poll_id = create_poll(&app, id, three_options()).await;

    vote(&app, poll_id, &app.student.token, json!({ "option_index": 0 })).await;

    let response = get(
        &app.router,
        &format!("/api/v1/sessions/{id}/attendance/me"),
        Some(&app.student.token),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["engagement"]["polls_participated"], 1);
    assert_eq!(json["data"]["engagement"]["participation_score"], 55);
}

// ---------------------------------------------------------------------------
// Close and delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_vote_after_close_returns_409() {
    let app = common::build_test_app().await;
    let id = live_session(&app).await;
    let poll_id = create_poll(&app, id, three_options()).await;

    let response = post(
        &app.router,
        &format!("/api/v1/polls/{poll_id}/close"),
        &app.faculty.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["is_active"], false);
    assert!(json["data"]["closed_at"].is_string());

    let response = vote(&app, poll_id, &app.student.token, json!({ "option_index": 0 })).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "POLL_INACTIVE");

    let response = post(
        &app.router,
        &format!("/api/v1/polls/{poll_id}/close"),
        &app.faculty.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_delete_poll_returns_204() {
    let app = common::build_test_app().await;
    let id = live_session(&app).await;
    let poll_id = create_poll(&app, id, three_options()).await;
    let uri = format!("/api/v1/polls/{poll_id}");

    let response = delete(&app.router, &uri, &app.student.token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = delete(&app.router, &uri, &app.faculty.token).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = get(&app.router, &uri, Some(&app.faculty.token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_session_polls() {
    let app = common::build_test_app().await;
    let id = live_session(&app).await;
    create_poll(&app, id, three_options()).await;
    create_poll(
        &app,
        id,
        json!({ "question": "Clear so far?", "poll_type": "yes_no" }),
    )
    .await;

    let response = get(
        &app.router,
        &format!("/api/v1/sessions/{id}/polls"),
        Some(&app.student.token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
}
