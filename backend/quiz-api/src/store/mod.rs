//! Hierarchical session store.
//!
//! Everything the quiz core persists goes through [`SessionStore`]: a path-addressed JSON
//! tree with atomic single-path writes, point-in-time subtree reads, live subscriptions and
//! a server-assigned timestamp that is only meaningful inside a write. Writes that span
//! several paths are never transactional; see [`write_group`].

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::{json, Map, Value};

pub mod memory;
pub mod path;
pub mod redis_store;
pub mod write_group;

pub use memory::MemoryStore;
pub use path::StorePath;
pub use redis_store::RedisStore;
pub use write_group::{PartialWriteFailure, WriteFailure, WriteGroup, WriteGroupReport};

const SERVER_VALUE_KEY: &str = ".sv";
const SERVER_VALUE_TIMESTAMP: &str = "timestamp";

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("invalid store path '{0}'")]
    InvalidPath(String),
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("malformed value at '{path}': {message}")]
    Malformed { path: String, message: String },
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Malformed {
            path: String::new(),
            message: err.to_string(),
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Stream of subtree snapshots. `None` means the path currently holds nothing.
pub type SnapshotStream = BoxStream<'static, Result<Option<Value>, StoreError>>;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Point-in-time read of the value at `path` including all children.
    async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError>;

    /// Atomically replaces the subtree at `path`. `Null` or an empty object deletes it.
    /// Server timestamp placeholders anywhere in `value` are resolved by the store.
    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError>;

    /// Live view of `path`: the current value first, then a fresh snapshot after every
    /// accepted write that touches the subtree.
    async fn subscribe(&self, path: &StorePath) -> Result<SnapshotStream, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    fn backend_name(&self) -> &'static str;
}

/// Placeholder resolved to the store's clock (epoch milliseconds) when written.
pub fn server_timestamp() -> Value {
    json!({ SERVER_VALUE_KEY: SERVER_VALUE_TIMESTAMP })
}

pub fn is_server_timestamp(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            map.len() == 1
                && map.get(SERVER_VALUE_KEY).and_then(Value::as_str) == Some(SERVER_VALUE_TIMESTAMP)
        }
        _ => false,
    }
}

/// Replaces every server timestamp placeholder and drops empty branches, so that a
/// written value has the same shape a later read would return.
pub(crate) fn normalize_for_write(value: Value, now_ms: i64) -> Option<Value> {
    if is_server_timestamp(&value) {
        return Some(Value::from(now_ms));
    }
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let normalized: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| normalize_for_write(v, now_ms).map(|v| (k, v)))
                .collect();
            if normalized.is_empty() {
                None
            } else {
                Some(Value::Object(normalized))
            }
        }
        other => Some(other),
    }
}

/// Validates every object key below `path` so a stored tree stays addressable.
/// Arrays are stored as opaque leaves and cannot carry server timestamps.
pub(crate) fn validate_value(path: &StorePath, value: &Value) -> Result<(), StoreError> {
    if is_server_timestamp(value) {
        return Ok(());
    }
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = path.child(key)?;
                validate_value(&child_path, child)?;
            }
        }
        Value::Array(items) if items.iter().any(contains_server_timestamp) => {
            return Err(StoreError::Malformed {
                path: path.to_string(),
                message: "server timestamps are not allowed inside arrays".to_string(),
            });
        }
        _ => {}
    }
    Ok(())
}

fn contains_server_timestamp(value: &Value) -> bool {
    is_server_timestamp(value)
        || match value {
            Value::Object(map) => map.values().any(contains_server_timestamp),
            Value::Array(items) => items.iter().any(contains_server_timestamp),
            _ => false,
        }
}

pub(crate) fn is_empty_branch(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.is_empty())
}

/// Replaces the node at `segments` below `node`, creating branches on the way down and
/// pruning any branch left empty on the way back up. Writing below a leaf turns the
/// leaf into a branch.
pub(crate) fn replace_at(node: &mut Value, segments: &[String], value: Option<Value>) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value.unwrap_or_else(|| Value::Object(Map::new()));
        return;
    };

    if !node.is_object() {
        if value.is_none() {
            return;
        }
        *node = Value::Object(Map::new());
    }

    if let Value::Object(map) = node {
        if rest.is_empty() {
            match value {
                Some(value) => {
                    map.insert(head.clone(), value);
                }
                None => {
                    map.remove(head);
                }
            }
            return;
        }

        let child = map
            .entry(head.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        replace_at(child, rest, value);
        if is_empty_branch(child) {
            map.remove(head);
        }
    }
}
