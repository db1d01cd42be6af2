use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::{future, stream, StreamExt};
use serde_json::{Map, Value};
use tokio::sync::{broadcast, RwLock};

use super::{
    is_empty_branch, normalize_for_write, replace_at, validate_value, SessionStore, SnapshotStream,
    StoreError, StorePath,
};
use crate::metrics::track_store_operation;

const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// In-process session store used for local runs and tests.
///
/// The whole tree sits behind one lock, so every single-path write is atomic and the
/// server clock advances in the order writes are accepted.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    tree: RwLock<Tree>,
    changes: broadcast::Sender<StorePath>,
}

struct Tree {
    root: Value,
    clock_ms: i64,
}

impl Tree {
    /// Wall clock, clamped so it never runs backwards between accepted writes.
    fn tick(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis().max(self.clock_ms);
        self.clock_ms = now;
        now
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                tree: RwLock::new(Tree {
                    root: Value::Object(Map::new()),
                    clock_ms: 0,
                }),
                changes,
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        track_store_operation("read", self.backend_name(), async {
            let tree = self.inner.tree.read().await;
            Ok(lookup(&tree.root, path)
                .filter(|value| !is_empty_branch(value))
                .cloned())
        })
        .await
    }

    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        track_store_operation("write", self.backend_name(), async {
            validate_value(path, &value)?;

            let mut tree = self.inner.tree.write().await;
            let now = tree.tick();
            replace_at(&mut tree.root, path.segments(), normalize_for_write(value, now));

            // Sent under the lock so subscribers observe changes in acceptance order.
            // An error only means nobody is subscribed.
            let _ = self.inner.changes.send(path.clone());
            Ok(())
        })
        .await
    }

    async fn subscribe(&self, path: &StorePath) -> Result<SnapshotStream, StoreError> {
        // Subscribe before the initial read so no write can slip between the two.
        let rx = self.inner.changes.subscribe();
        let initial = self.read(path).await;

        let updates = stream::unfold(
            (self.clone(), path.clone(), rx),
            |(store, path, mut rx)| async move {
                loop {
                    match rx.recv().await {
                        Ok(changed) if changed.overlaps(&path) => {
                            let snapshot = store.read(&path).await;
                            return Some((snapshot, (store, path, rx)));
                        }
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::debug!(
                                "Subscriber on {} lagged by {} changes, resending snapshot",
                                path,
                                skipped
                            );
                            let snapshot = store.read(&path).await;
                            return Some((snapshot, (store, path, rx)));
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            },
        );

        Ok(stream::once(future::ready(initial)).chain(updates).boxed())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

fn lookup<'a>(root: &'a Value, path: &StorePath) -> Option<&'a Value> {
    let mut node = root;
    for segment in path.segments() {
        node = node.as_object()?.get(segment)?;
    }
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::server_timestamp;
    use serde_json::json;

    fn path(raw: &str) -> StorePath {
        StorePath::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn write_then_read_subtree() {
        let store = MemoryStore::new();
        store.write(&path("s/answers/q1/p1"), json!({ "answerId": "a" })).await.unwrap();
        store.write(&path("s/answers/q1/p2"), json!({ "answerId": "b" })).await.unwrap();

        let answers = store.read(&path("s/answers/q1")).await.unwrap().unwrap();
        assert_eq!(answers["p1"]["answerId"], "a");
        assert_eq!(answers["p2"]["answerId"], "b");
        assert!(store.read(&path("s/answers/q2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_replaces_whole_subtree() {
        let store = MemoryStore::new();
        store.write(&path("s/state"), json!({ "a": 1, "b": 2 })).await.unwrap();
        store.write(&path("s/state"), json!({ "c": 3 })).await.unwrap();

        assert_eq!(store.read(&path("s/state")).await.unwrap(), Some(json!({ "c": 3 })));
    }

    #[tokio::test]
    async fn null_write_deletes_and_prunes_parents() {
        let store = MemoryStore::new();
        store.write(&path("s/score/p1/q1"), json!(100)).await.unwrap();
        store.write(&path("s/score/p1/q1"), Value::Null).await.unwrap();

        assert!(store.read(&path("s/score/p1")).await.unwrap().is_none());
        assert!(store.read(&path("s")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn writing_below_a_leaf_replaces_it() {
        let store = MemoryStore::new();
        store.write(&path("s/flag"), json!(true)).await.unwrap();
        store.write(&path("s/flag/inner"), json!(1)).await.unwrap();

        assert_eq!(store.read(&path("s/flag")).await.unwrap(), Some(json!({ "inner": 1 })));
    }

    #[tokio::test]
    async fn server_timestamps_never_decrease() {
        let store = MemoryStore::new();
        let mut last = 0;
        for i in 0..50 {
            let p = path(&format!("s/ts/{}", i));
            store.write(&p, server_timestamp()).await.unwrap();
            let ts = store.read(&p).await.unwrap().unwrap().as_i64().unwrap();
            assert!(ts >= last);
            last = ts;
        }
    }

    #[tokio::test]
    async fn invalid_keys_are_not_written() {
        let store = MemoryStore::new();
        let result = store.write(&path("s"), json!({ "bad.key": 1 })).await;
        assert!(matches!(result, Err(StoreError::InvalidPath(_))));
        assert!(store.read(&path("s")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn subscription_sees_initial_value_and_overlapping_changes() {
        let store = MemoryStore::new();
        store.write(&path("s/score/p1/q1"), json!(100)).await.unwrap();

        let mut updates = store.subscribe(&path("s/score")).await.unwrap();
        let first = updates.next().await.unwrap().unwrap();
        assert_eq!(first, Some(json!({ "p1": { "q1": 100 } })));

        // Unrelated branch: no snapshot for it.
        store.write(&path("s/answers/q1/p1"), json!({ "answerId": "a" })).await.unwrap();
        store.write(&path("s/score/p2/q1"), json!(99)).await.unwrap();

        let second = updates.next().await.unwrap().unwrap().unwrap();
        assert_eq!(second["p2"]["q1"], 99);

        // A write to an ancestor also reaches the subscriber.
        store.write(&path("s"), Value::Null).await.unwrap();
        assert_eq!(updates.next().await.unwrap().unwrap(), None);
    }
}
