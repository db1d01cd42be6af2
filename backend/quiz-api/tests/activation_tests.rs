use serde_json::{json, Value};
use std::sync::Arc;

use quiz_session_api::{
    error::QuizError,
    models::{ActiveQuestionRecord, ReleasedWindow},
    services::activation_service::ActivationService,
    store::{MemoryStore, SessionStore},
};

mod common;
use common::{paths, read, seed_question, two_choice_question, FlakyStore};

fn activator(store: Arc<dyn SessionStore>) -> ActivationService {
    ActivationService::new(store, paths())
}

async fn current(store: &dyn SessionStore) -> ActiveQuestionRecord {
    let value = read(store, paths().current_question()).await.unwrap();
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn test_activate_writes_window_record_and_hides_leaderboard() {
    let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
    seed_question(store.as_ref(), "q1", two_choice_question(Some(20.0))).await;
    store
        .write(&paths().show_leaderboard(), json!(true))
        .await
        .unwrap();

    let summary = activator(store.clone()).activate_by_id("q1").await.unwrap();
    assert_eq!(summary.expires_in, 20_000);

    let record = current(store.as_ref()).await;
    assert_eq!(record.question_id, "q1");
    assert_eq!(record.answer_choices, vec!["A", "B"]);
    assert_eq!(record.expires_in, 20_000);
    assert!(!record.answer_revealed);
    assert!(record.started_at > 0);

    let window: ReleasedWindow =
        serde_json::from_value(read(store.as_ref(), paths().released("q1").unwrap()).await.unwrap())
            .unwrap();
    assert_eq!(window.expires_in, 20_000);
    assert!(window.started_at > 0);

    assert_eq!(
        read(store.as_ref(), paths().show_leaderboard()).await,
        Some(Value::Bool(false))
    );
}

#[tokio::test]
async fn test_missing_or_non_positive_time_limit_defaults_to_thirty_seconds() {
    let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
    seed_question(store.as_ref(), "none", two_choice_question(None)).await;
    seed_question(store.as_ref(), "zero", two_choice_question(Some(0.0))).await;
    seed_question(store.as_ref(), "negative", two_choice_question(Some(-3.0))).await;

    for id in ["none", "zero", "negative"] {
        activator(store.clone()).activate_by_id(id).await.unwrap();
        let record = current(store.as_ref()).await;
        assert_eq!(record.question_id, id);
        assert_eq!(record.expires_in, 30_000, "question {}", id);
    }
}

#[tokio::test]
async fn test_latest_activation_is_the_only_active_question() {
    let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
    seed_question(store.as_ref(), "q1", two_choice_question(None)).await;
    seed_question(store.as_ref(), "q2", two_choice_question(Some(10.0))).await;

    let service = activator(store.clone());
    service.activate_by_id("q1").await.unwrap();
    service.set_answer_revealed("q1", true).await.unwrap();
    service.activate_by_id("q2").await.unwrap();

    let record = current(store.as_ref()).await;
    assert_eq!(record.question_id, "q2");
    assert!(!record.answer_revealed);

    // Release windows are kept per question across rounds.
    assert!(read(store.as_ref(), paths().released("q1").unwrap()).await.is_some());
    assert!(read(store.as_ref(), paths().released("q2").unwrap()).await.is_some());

    // Re-activating an earlier question makes it current again.
    service.activate_by_id("q1").await.unwrap();
    assert_eq!(current(store.as_ref()).await.question_id, "q1");
}

#[tokio::test]
async fn test_unknown_question_is_rejected_without_writes() {
    let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());

    let err = activator(store.clone()).activate_by_id("ghost").await.unwrap_err();
    assert!(matches!(err, QuizError::QuestionNotFound(ref id) if id == "ghost"));
    assert!(read(store.as_ref(), common::path("sessions")).await.is_none());
}

#[tokio::test]
async fn test_question_without_choices_is_rejected_without_writes() {
    let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
    seed_question(store.as_ref(), "empty", json!({ "text": "No choices", "timeLimit": 5 })).await;

    let err = activator(store.clone()).activate_by_id("empty").await.unwrap_err();
    assert!(err.is_validation());
    assert!(read(store.as_ref(), paths().current_question()).await.is_none());
    assert!(read(store.as_ref(), paths().show_leaderboard()).await.is_none());
}

#[tokio::test]
async fn test_invalid_question_id_is_a_validation_error() {
    let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
    let err = activator(store).activate_by_id("bad.id").await.unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_reveal_requires_the_active_question() {
    let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
    seed_question(store.as_ref(), "q1", two_choice_question(None)).await;
    seed_question(store.as_ref(), "q2", two_choice_question(None)).await;
    let service = activator(store.clone());

    // Nothing active yet.
    assert!(service.set_answer_revealed("q1", true).await.unwrap_err().is_validation());

    service.activate_by_id("q1").await.unwrap();
    assert!(service.set_answer_revealed("q2", true).await.unwrap_err().is_validation());

    service.set_answer_revealed("q1", true).await.unwrap();
    assert!(current(store.as_ref()).await.answer_revealed);

    service.set_answer_revealed("q1", false).await.unwrap();
    assert!(!current(store.as_ref()).await.answer_revealed);
}

#[tokio::test]
async fn test_partial_activation_reports_failed_path_and_retry_converges() {
    let flaky = FlakyStore::new();
    let store: Arc<dyn SessionStore> = Arc::new(flaky.clone());
    seed_question(store.as_ref(), "q1", two_choice_question(Some(12.0))).await;
    store
        .write(&paths().show_leaderboard(), json!(true))
        .await
        .unwrap();

    flaky.fail_writes_containing("released");
    let err = activator(store.clone()).activate_by_id("q1").await.unwrap_err();

    let failure = match err {
        QuizError::PartialWrite(failure) => failure,
        other => panic!("expected partial write, got {:?}", other),
    };
    assert_eq!(failure.attempted, 3);
    assert_eq!(failure.failures.len(), 1);
    assert_eq!(failure.failures[0].path, "sessions/friday-quiz/state/released/q1");

    // The other members landed.
    assert_eq!(current(store.as_ref()).await.question_id, "q1");
    assert_eq!(
        read(store.as_ref(), paths().show_leaderboard()).await,
        Some(Value::Bool(false))
    );
    assert!(read(store.as_ref(), paths().released("q1").unwrap()).await.is_none());

    flaky.heal();
    activator(store.clone()).activate_by_id("q1").await.unwrap();

    let record = current(store.as_ref()).await;
    let window: ReleasedWindow =
        serde_json::from_value(read(store.as_ref(), paths().released("q1").unwrap()).await.unwrap())
            .unwrap();
    assert_eq!(record.question_id, "q1");
    assert_eq!(window.expires_in, 12_000);
    assert!(window.started_at > 0);
}
