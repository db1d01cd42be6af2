use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;

use crate::error::QuizError;
use crate::models::{LeaderboardOrder, LeaderboardRow, ReadView, SessionPaths};
use crate::store::{SessionStore, StoreError};

pub type LeaderboardStream = BoxStream<'static, Result<ReadView<Vec<LeaderboardRow>>, StoreError>>;

/// Sums the `state/score` tree into ranked rows.
///
/// Only participants with at least one integer score entry appear. `ByScoreDesc` uses
/// competition ranking (1, 2, 2, 4); `ByParticipant` ranks by list position.
pub fn aggregate(scores: Option<&Value>, order: LeaderboardOrder) -> Vec<LeaderboardRow> {
    let mut totals: BTreeMap<&str, i64> = BTreeMap::new();

    if let Some(Value::Object(participants)) = scores {
        for (participant_id, entries) in participants {
            let Value::Object(entries) = entries else {
                tracing::warn!("Ignoring non-object score node for {}", participant_id);
                continue;
            };
            for (question_id, points) in entries {
                match points.as_i64() {
                    Some(points) => {
                        *totals.entry(participant_id.as_str()).or_insert(0) += points;
                    }
                    None => tracing::warn!(
                        "Ignoring non-integer score: participant={}, question={}, value={}",
                        participant_id,
                        question_id,
                        points
                    ),
                }
            }
        }
    }

    // BTreeMap iteration already yields participant order.
    let mut rows: Vec<(String, i64)> = totals
        .into_iter()
        .map(|(pid, total)| (pid.to_string(), total))
        .collect();

    match order {
        LeaderboardOrder::ByParticipant => rows
            .into_iter()
            .enumerate()
            .map(|(i, (participant_id, total_points))| LeaderboardRow {
                participant_id,
                total_points,
                rank: i as u32 + 1,
            })
            .collect(),
        LeaderboardOrder::ByScoreDesc => {
            rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            let mut ranked = Vec::with_capacity(rows.len());
            let mut rank = 0u32;
            let mut previous: Option<i64> = None;
            for (i, (participant_id, total_points)) in rows.into_iter().enumerate() {
                if previous != Some(total_points) {
                    rank = i as u32 + 1;
                    previous = Some(total_points);
                }
                ranked.push(LeaderboardRow {
                    participant_id,
                    total_points,
                    rank,
                });
            }
            ranked
        }
    }
}

pub struct LeaderboardService {
    store: Arc<dyn SessionStore>,
    paths: SessionPaths,
}

impl LeaderboardService {
    pub fn new(store: Arc<dyn SessionStore>, paths: SessionPaths) -> Self {
        Self { store, paths }
    }

    pub async fn snapshot(&self, order: LeaderboardOrder) -> Result<Vec<LeaderboardRow>, QuizError> {
        let scores = self.store.read(&self.paths.scores()).await?;
        Ok(aggregate(scores.as_ref(), order))
    }

    /// `Pending` first, then one `Ready` per snapshot of the score tree.
    pub async fn watch(&self, order: LeaderboardOrder) -> Result<LeaderboardStream, QuizError> {
        let snapshots = self.store.subscribe(&self.paths.scores()).await?;
        let rows = snapshots.map(move |snapshot| {
            snapshot.map(|scores| ReadView::Ready(aggregate(scores.as_ref(), order)))
        });
        Ok(stream::once(async { Ok(ReadView::Pending) }).chain(rows).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids_and_ranks(rows: &[LeaderboardRow]) -> Vec<(&str, i64, u32)> {
        rows.iter()
            .map(|r| (r.participant_id.as_str(), r.total_points, r.rank))
            .collect()
    }

    #[test]
    fn sums_per_participant_and_ranks_by_score() {
        let scores = json!({
            "p1": { "q1": 100, "q2": 99 },
            "p2": { "q1": 99, "q2": 100 },
            "p3": { "q1": 98 },
            "p4": { "q2": 250 }
        });
        let rows = aggregate(Some(&scores), LeaderboardOrder::ByScoreDesc);
        assert_eq!(
            ids_and_ranks(&rows),
            vec![("p4", 250, 1), ("p1", 199, 2), ("p2", 199, 2), ("p3", 98, 4)]
        );
    }

    #[test]
    fn participant_order_ranks_by_position() {
        let scores = json!({ "b": { "q1": 10 }, "a": { "q1": 50 }, "c": { "q1": 10 } });
        let rows = aggregate(Some(&scores), LeaderboardOrder::ByParticipant);
        assert_eq!(
            ids_and_ranks(&rows),
            vec![("a", 50, 1), ("b", 10, 2), ("c", 10, 3)]
        );
    }

    #[test]
    fn non_integer_scores_are_ignored() {
        let scores = json!({
            "p1": { "q1": 100, "q2": "lots", "q3": 1.5 },
            "p2": { "q1": "x" },
            "p3": 7
        });
        let rows = aggregate(Some(&scores), LeaderboardOrder::ByScoreDesc);
        assert_eq!(ids_and_ranks(&rows), vec![("p1", 100, 1)]);
    }

    #[test]
    fn empty_tree_has_no_rows() {
        assert!(aggregate(None, LeaderboardOrder::ByScoreDesc).is_empty());
        assert!(aggregate(Some(&json!({})), LeaderboardOrder::ByParticipant).is_empty());
    }
}
