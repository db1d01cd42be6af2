use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

use quiz_session_api::store::{MemoryStore, SessionStore};

mod common;
use common::{
    create_test_app, moderator_token, participant_token, put_answer, seed_question, send,
    two_choice_question, FlakyStore,
};

const BASE: &str = "/api/v1/sessions/friday-quiz";

#[tokio::test]
async fn test_health_reports_store_backend() {
    let app = create_test_app(Arc::new(MemoryStore::new()));

    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["dependencies"]["store"]["backend"], "memory");
}

#[tokio::test]
async fn test_metrics_require_basic_auth() {
    let app = create_test_app(Arc::new(MemoryStore::new()));

    let (status, _) = send(&app, "GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let credentials = general_purpose::STANDARD.encode("admin:changeme");
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .header("authorization", format!("Basic {}", credentials))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&body).contains("http_requests_total"));
}

#[tokio::test]
async fn test_api_requires_bearer_token() {
    let app = create_test_app(Arc::new(MemoryStore::new()));

    let (status, _) = send(&app, "GET", &format!("{}/state", BASE), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "GET",
        &format!("{}/state", BASE),
        Some("not-a-jwt"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_roles_are_enforced() {
    let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
    seed_question(store.as_ref(), "q1", two_choice_question(None)).await;
    let app = create_test_app(store);

    let (status, body) = send(
        &app,
        "POST",
        &format!("{}/moderator/questions/q1/activate", BASE),
        Some(&participant_token("p1")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], 403);
    assert_eq!(body["error"], "moderator role required");

    let (status, body) = send(
        &app,
        "POST",
        &format!("{}/questions/q1/answers", BASE),
        Some(&moderator_token()),
        Some(json!({ "choice_id": "A" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "participant role required");
}

#[tokio::test]
async fn test_full_round_over_http() {
    let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
    seed_question(store.as_ref(), "q1", two_choice_question(Some(20.0))).await;
    let app = create_test_app(store);
    let moderator = moderator_token();

    let (status, body) = send(
        &app,
        "GET",
        &format!("{}/moderator/questions", BASE),
        Some(&moderator),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], "q1");
    assert_eq!(body[0]["expires_in_ms"], 20_000);

    let (status, body) = send(
        &app,
        "POST",
        &format!("{}/moderator/questions/q1/activate", BASE),
        Some(&moderator),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer_choices"], json!(["A", "B"]));

    let (status, body) = send(
        &app,
        "GET",
        &format!("{}/state", BASE),
        Some(&participant_token("ann")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_question"]["question_id"], "q1");
    assert_eq!(body["current_question"]["expired"], false);
    assert_eq!(body["show_leaderboard"], false);

    for (participant, choice) in [("ann", "A"), ("bob", "B")] {
        let (status, body) = send(
            &app,
            "POST",
            &format!("{}/questions/q1/answers", BASE),
            Some(&participant_token(participant)),
            Some(json!({ "choice_id": choice })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}: {}", participant, body);
        assert_eq!(body["within_window"], true);
    }

    let (status, body) = send(
        &app,
        "GET",
        &format!("{}/moderator/questions/q1/stats", BASE),
        Some(&moderator),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "2 (1 correct)");

    let (status, _) = send(
        &app,
        "PUT",
        &format!("{}/moderator/questions/q1/reveal", BASE),
        Some(&moderator),
        Some(json!({ "revealed": true })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(
        &app,
        "POST",
        &format!("{}/moderator/questions/q1/grade", BASE),
        Some(&moderator),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["submissions"], 2);
    assert_eq!(body["correct"], 1);

    let (status, body) = send(
        &app,
        "GET",
        &format!("{}/leaderboard", BASE),
        Some(&participant_token("bob")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([{ "participant_id": "ann", "total_points": 100, "rank": 1 }])
    );

    let (_, body) = send(
        &app,
        "GET",
        &format!("{}/state", BASE),
        Some(&participant_token("bob")),
        None,
    )
    .await;
    assert_eq!(body["show_leaderboard"], true);
    assert_eq!(body["current_question"]["answer_revealed"], true);
}

#[tokio::test]
async fn test_rejected_submission_returns_json_error() {
    let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
    seed_question(store.as_ref(), "q1", two_choice_question(None)).await;
    let app = create_test_app(store);
    let token = participant_token("ann");

    // No active question.
    let (status, body) = send(
        &app,
        "POST",
        &format!("{}/questions/q1/answers", BASE),
        Some(&token),
        Some(json!({ "choice_id": "A" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("no question is active"));

    // Body that does not match the request shape.
    let (status, body) = send(
        &app,
        "POST",
        &format!("{}/questions/q1/answers", BASE),
        Some(&token),
        Some(json!({ "answer": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    // Empty choice fails validation.
    let (status, _) = send(
        &app,
        "POST",
        &format!("{}/questions/q1/answers", BASE),
        Some(&token),
        Some(json!({ "choice_id": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_question_returns_404() {
    let app = create_test_app(Arc::new(MemoryStore::new()));

    let (status, body) = send(
        &app,
        "POST",
        &format!("{}/moderator/questions/ghost/grade", BASE),
        Some(&moderator_token()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_partial_grading_returns_bad_gateway_with_failed_paths() {
    let flaky = FlakyStore::new();
    let store: Arc<dyn SessionStore> = Arc::new(flaky.clone());
    seed_question(store.as_ref(), "q1", two_choice_question(None)).await;
    put_answer(store.as_ref(), "q1", "ann", "A", 1).await;
    let app = create_test_app(store);

    flaky.fail_writes_containing("showLeaderboard");
    let (status, body) = send(
        &app,
        "POST",
        &format!("{}/moderator/questions/q1/grade", BASE),
        Some(&moderator_token()),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(
        body["failed_writes"][0]["path"],
        "sessions/friday-quiz/state/showLeaderboard"
    );

    flaky.heal();
    let (status, _) = send(
        &app,
        "POST",
        &format!("{}/moderator/questions/q1/grade", BASE),
        Some(&moderator_token()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_responses_carry_trace_id() {
    let app = create_test_app(Arc::new(MemoryStore::new()));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-trace-id", "trace-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-trace-id"], "trace-123");
}
