use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;

use super::{SessionStore, StorePath};

/// Best-effort parallel write group.
///
/// Members are issued concurrently as independent single-path writes and the group waits
/// for every one of them to settle. There is no rollback and no retry: a reader may see
/// the group partially applied, and a failed member is reported back so the caller can
/// reissue the whole command.
#[derive(Debug, Default)]
pub struct WriteGroup {
    writes: Vec<(StorePath, Value)>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WriteFailure {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteGroupReport {
    pub attempted: usize,
    pub failures: Vec<WriteFailure>,
}

#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("{} of {attempted} writes failed", .failures.len())]
pub struct PartialWriteFailure {
    pub attempted: usize,
    pub failures: Vec<WriteFailure>,
}

impl WriteGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: StorePath, value: Value) -> &mut Self {
        self.writes.push((path, value));
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub async fn commit(self, store: &dyn SessionStore) -> WriteGroupReport {
        let attempted = self.writes.len();
        let results = join_all(self.writes.into_iter().map(|(path, value)| async move {
            let result = store.write(&path, value).await;
            (path, result)
        }))
        .await;

        let failures: Vec<WriteFailure> = results
            .into_iter()
            .filter_map(|(path, result)| {
                result.err().map(|e| {
                    tracing::warn!("Write to {} failed: {}", path, e);
                    WriteFailure {
                        path: path.to_string(),
                        error: e.to_string(),
                    }
                })
            })
            .collect();

        WriteGroupReport {
            attempted,
            failures,
        }
    }
}

impl WriteGroupReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn into_result(self) -> Result<usize, PartialWriteFailure> {
        if self.failures.is_empty() {
            Ok(self.attempted)
        } else {
            Err(PartialWriteFailure {
                attempted: self.attempted,
                failures: self.failures,
            })
        }
    }
}
