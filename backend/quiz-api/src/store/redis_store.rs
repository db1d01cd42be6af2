use async_trait::async_trait;
use futures::{future, stream, StreamExt};
use lazy_static::lazy_static;
use redis::aio::ConnectionManager;
use serde_json::{Map, Value};

use super::{
    is_server_timestamp, replace_at, validate_value, SessionStore, SnapshotStream, StoreError,
    StorePath,
};
use crate::metrics::track_store_operation;

lazy_static! {
    // Returns a flat list of (path, json) pairs for the leaf at ARGV[2] and every leaf below it.
    static ref READ_SUBTREE_SCRIPT: redis::Script = redis::Script::new(
        r#"
        local index = KEYS[1]
        local leaf_prefix = ARGV[1]
        local path = ARGV[2]

        local paths
        if path == '' then
            paths = redis.call('ZRANGEBYLEX', index, '-', '+')
        else
            paths = redis.call('ZRANGEBYLEX', index, '[' .. path .. '/', '(' .. path .. '0')
            if redis.call('ZSCORE', index, path) then
                table.insert(paths, 1, path)
            end
        end

        local out = {}
        for _, p in ipairs(paths) do
            local v = redis.call('GET', leaf_prefix .. p)
            if v then
                table.insert(out, p)
                table.insert(out, v)
            end
        end
        return out
        "#
    );

    // Replaces the subtree at ARGV[2] in one step:
    //   ARGV[4]                 number of ancestor paths that follow
    //   ARGV[5 .. 4+n]          ancestors whose leaves must be dropped
    //   then triples of         (leaf path, 'v' | 'ts', json payload)
    // Server timestamps come from TIME, clamped against the clock key so they never
    // decrease in the order writes are accepted.
    static ref WRITE_SUBTREE_SCRIPT: redis::Script = redis::Script::new(
        r#"
        local index = KEYS[1]
        local clock = KEYS[2]
        local leaf_prefix = ARGV[1]
        local path = ARGV[2]
        local channel = ARGV[3]
        local ancestor_count = tonumber(ARGV[4])

        local t = redis.call('TIME')
        local now = tonumber(t[1]) * 1000 + math.floor(tonumber(t[2]) / 1000)
        local last = tonumber(redis.call('GET', clock) or '0')
        if now < last then
            now = last
        end
        local now_text = string.format('%.0f', now)
        redis.call('SET', clock, now_text)

        local function drop(p)
            redis.call('DEL', leaf_prefix .. p)
            redis.call('ZREM', index, p)
        end

        for i = 5, 4 + ancestor_count do
            if redis.call('ZSCORE', index, ARGV[i]) then
                drop(ARGV[i])
            end
        end

        local existing
        if path == '' then
            existing = redis.call('ZRANGEBYLEX', index, '-', '+')
        else
            existing = redis.call('ZRANGEBYLEX', index, '[' .. path .. '/', '(' .. path .. '0')
            if redis.call('ZSCORE', index, path) then
                table.insert(existing, path)
            end
        end
        for _, p in ipairs(existing) do
            drop(p)
        end

        for i = 5 + ancestor_count, #ARGV, 3 do
            local p = ARGV[i]
            local v = ARGV[i + 2]
            if ARGV[i + 1] == 'ts' then
                v = now_text
            end
            redis.call('SET', leaf_prefix .. p, v)
            redis.call('ZADD', index, 0, p)
        end

        redis.call('PUBLISH', channel, path)
        return now_text
        "#
    );
}

/// Session store backed by Redis.
///
/// Each leaf of the tree lives in its own key holding JSON text; a sorted set of leaf
/// paths (all scored 0) gives lexicographic range scans over a subtree. Reads and writes
/// run as Lua scripts so each one sees or replaces a subtree atomically. Every write
/// publishes its path on the changes channel, which drives subscriptions.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    conn: ConnectionManager,
    prefix: String,
}

#[derive(Debug, PartialEq)]
struct Leaf {
    path: String,
    kind: LeafKind,
}

#[derive(Debug, PartialEq)]
enum LeafKind {
    Json(String),
    ServerTimestamp,
}

impl Leaf {
    fn tag(&self) -> &'static str {
        match self.kind {
            LeafKind::Json(_) => "v",
            LeafKind::ServerTimestamp => "ts",
        }
    }

    fn payload(&self) -> &str {
        match &self.kind {
            LeafKind::Json(json) => json,
            LeafKind::ServerTimestamp => "",
        }
    }
}

impl RedisStore {
    pub async fn connect(client: redis::Client, prefix: &str) -> Result<Self, StoreError> {
        let conn = ConnectionManager::new(client.clone()).await?;
        Ok(Self {
            client,
            conn,
            prefix: prefix.to_string(),
        })
    }

    fn index_key(&self) -> String {
        format!("{}:index", self.prefix)
    }

    fn clock_key(&self) -> String {
        format!("{}:clock", self.prefix)
    }

    fn leaf_prefix(&self) -> String {
        format!("{}:leaf:", self.prefix)
    }

    fn changes_channel(&self) -> String {
        format!("{}:changes", self.prefix)
    }

    async fn read_subtree(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        let mut conn = self.conn.clone();
        let flat: Vec<String> = READ_SUBTREE_SCRIPT
            .key(self.index_key())
            .arg(self.leaf_prefix())
            .arg(path.to_string())
            .invoke_async(&mut conn)
            .await?;

        let pairs = flat
            .chunks(2)
            .filter_map(|pair| match pair {
                [leaf_path, json] => Some((leaf_path.clone(), json.clone())),
                _ => None,
            })
            .collect();

        unflatten(path, pairs)
    }

    async fn write_subtree(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        validate_value(path, &value)?;

        let mut leaves = Vec::new();
        flatten(path, &value, &mut leaves)?;

        let mut ancestors: Vec<String> = Vec::new();
        if !path.is_root() {
            // A scalar written at the root is stored under the empty path.
            ancestors.push(String::new());
        }
        ancestors.extend(path.ancestors().iter().map(|p| p.to_string()));

        let mut invocation = WRITE_SUBTREE_SCRIPT.key(self.index_key());
        invocation
            .key(self.clock_key())
            .arg(self.leaf_prefix())
            .arg(path.to_string())
            .arg(self.changes_channel())
            .arg(ancestors.len());
        for ancestor in &ancestors {
            invocation.arg(ancestor);
        }
        for leaf in &leaves {
            invocation.arg(&leaf.path).arg(leaf.tag()).arg(leaf.payload());
        }

        let mut conn = self.conn.clone();
        let accepted_at: String = invocation.invoke_async(&mut conn).await?;
        tracing::trace!(
            "Redis write accepted: path={}, leaves={}, at={}",
            path,
            leaves.len(),
            accepted_at
        );
        Ok(())
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        track_store_operation("read", self.backend_name(), self.read_subtree(path)).await
    }

    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        track_store_operation("write", self.backend_name(), self.write_subtree(path, value)).await
    }

    async fn subscribe(&self, path: &StorePath) -> Result<SnapshotStream, StoreError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(self.changes_channel()).await?;
        let messages = Box::pin(pubsub.into_on_message());

        // Subscribed before the initial read so no write can slip between the two.
        let initial = self.read(path).await;

        let updates = stream::unfold(
            (self.clone(), path.clone(), messages),
            |(store, path, mut messages)| async move {
                while let Some(message) = messages.next().await {
                    let changed = match message.get_payload::<String>() {
                        Ok(raw) => raw,
                        Err(e) => {
                            tracing::warn!("Unreadable change notification: {}", e);
                            continue;
                        }
                    };
                    let changed = match StorePath::parse(&changed) {
                        Ok(changed) => changed,
                        Err(e) => {
                            tracing::warn!("Ignoring change notification: {}", e);
                            continue;
                        }
                    };
                    if changed.overlaps(&path) {
                        let snapshot = store.read(&path).await;
                        return Some((snapshot, (store, path, messages)));
                    }
                }
                None
            },
        );

        Ok(stream::once(future::ready(initial)).chain(updates).boxed())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

fn flatten(path: &StorePath, value: &Value, out: &mut Vec<Leaf>) -> Result<(), StoreError> {
    if is_server_timestamp(value) {
        out.push(Leaf {
            path: path.to_string(),
            kind: LeafKind::ServerTimestamp,
        });
        return Ok(());
    }

    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, child) in map {
                flatten(&path.child(key)?, child, out)?;
            }
        }
        leaf => out.push(Leaf {
            path: path.to_string(),
            kind: LeafKind::Json(serde_json::to_string(leaf)?),
        }),
    }
    Ok(())
}

fn unflatten(base: &StorePath, leaves: Vec<(String, String)>) -> Result<Option<Value>, StoreError> {
    let mut root: Option<Value> = None;

    for (raw_path, json) in leaves {
        let leaf_path = StorePath::parse(&raw_path)?;
        let value: Value = serde_json::from_str(&json).map_err(|e| StoreError::Malformed {
            path: raw_path.clone(),
            message: e.to_string(),
        })?;

        let Some(relative) = base.relative(&leaf_path) else {
            continue;
        };
        if relative.is_empty() {
            // Writes clear descendants of a leaf, so an exact hit is the whole value.
            return Ok(Some(value));
        }
        let node = root.get_or_insert_with(|| Value::Object(Map::new()));
        replace_at(node, relative, Some(value));
    }

    Ok(root)
}
