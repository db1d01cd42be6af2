#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use quiz_session_api::{
    config::Config,
    create_router,
    middlewares::auth::{JwtClaims, JwtService, ROLE_MODERATOR, ROLE_PARTICIPANT},
    models::SessionPaths,
    services::AppState,
    store::{
        is_server_timestamp, MemoryStore, SessionStore, SnapshotStream, StoreError, StorePath,
    },
};

pub const TEST_JWT_SECRET: &str = "test-secret";
pub const SESSION: &str = "friday-quiz";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn test_config() -> Config {
    Config::in_memory(TEST_JWT_SECRET)
}

pub fn paths() -> SessionPaths {
    SessionPaths::new(SESSION).unwrap()
}

pub fn create_test_app(store: Arc<dyn SessionStore>) -> Router {
    init_tracing();
    let state = Arc::new(AppState::with_store(test_config(), store));
    create_router(state)
}

pub fn token(sub: &str, role: &str) -> String {
    JwtService::new(TEST_JWT_SECRET)
        .generate_token(&JwtClaims::new(sub, role, 3600))
        .unwrap()
}

pub fn moderator_token() -> String {
    token("host", ROLE_MODERATOR)
}

pub fn participant_token(participant_id: &str) -> String {
    token(participant_id, ROLE_PARTICIPANT)
}

/// Sends one request and returns the status with the decoded JSON body (`Null` if empty
/// or not JSON).
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

pub fn path(raw: &str) -> StorePath {
    StorePath::parse(raw).unwrap()
}

/// Two choices, `A` correct and `B` wrong.
pub fn two_choice_question(time_limit: Option<f64>) -> Value {
    let mut question = json!({
        "text": "Pick A",
        "answers": {
            "A": { "correct": true, "text": "right" },
            "B": { "correct": false, "text": "wrong" }
        }
    });
    if let Some(limit) = time_limit {
        question["timeLimit"] = json!(limit);
    }
    question
}

pub async fn seed_question(store: &dyn SessionStore, question_id: &str, question: Value) {
    let path = paths().question(question_id).unwrap();
    store.write(&path, question).await.unwrap();
}

/// Writes an answer record with a fixed timestamp, as the store would after a submission.
pub async fn put_answer(
    store: &dyn SessionStore,
    question_id: &str,
    participant_id: &str,
    choice_id: &str,
    timestamp: i64,
) {
    let path = paths().answer(question_id, participant_id).unwrap();
    store
        .write(&path, json!({ "answerId": choice_id, "timestamp": timestamp }))
        .await
        .unwrap();
}

pub async fn read(store: &dyn SessionStore, path: StorePath) -> Option<Value> {
    store.read(&path).await.unwrap()
}

/// Memory store that fails every write whose path contains one of the armed fragments.
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes_containing(&self, fragment: &str) {
        self.failing.lock().unwrap().insert(fragment.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn should_fail(&self, path: &StorePath) -> bool {
        let rendered = path.to_string();
        self.failing
            .lock()
            .unwrap()
            .iter()
            .any(|fragment| rendered.contains(fragment.as_str()))
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        if self.should_fail(path) {
            return Err(StoreError::Backend(format!("injected failure at {}", path)));
        }
        self.inner.write(path, value).await
    }

    async fn subscribe(&self, path: &StorePath) -> Result<SnapshotStream, StoreError> {
        self.inner.subscribe(path).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

/// Memory store whose clock is pinned to a fixed instant, independent of the host clock.
#[derive(Clone, Default)]
pub struct FixedClockStore {
    inner: MemoryStore,
    now: i64,
}

impl FixedClockStore {
    pub fn at(now: i64) -> Self {
        Self {
            inner: MemoryStore::new(),
            now,
        }
    }

    fn stamp(&self, value: Value) -> Value {
        match value {
            ref v if is_server_timestamp(v) => json!(self.now),
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, child)| (key, self.stamp(child)))
                    .collect(),
            ),
            other => other,
        }
    }
}

#[async_trait]
impl SessionStore for FixedClockStore {
    async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        self.inner.write(path, self.stamp(value)).await
    }

    async fn subscribe(&self, path: &StorePath) -> Result<SnapshotStream, StoreError> {
        self.inner.subscribe(path).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }

    fn backend_name(&self) -> &'static str {
        "fixed-clock"
    }
}
