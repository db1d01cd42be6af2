use serde::{Deserialize, Serialize};

/// Reward for the earliest correct answer to a question.
pub const MAX_REWARD: i64 = 100;
/// Rewards stop decaying here.
pub const MIN_REWARD: i64 = 50;

/// `state/score/{participantId}/{questionId}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreEntry {
    pub participant_id: String,
    pub question_id: String,
    pub points: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardRow {
    pub participant_id: String,
    pub total_points: i64,
    pub rank: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardOrder {
    #[default]
    ByScoreDesc,
    ByParticipant,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default)]
    pub order: LeaderboardOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GradeReport {
    pub question_id: String,
    /// Decodable submissions in the answer snapshot.
    pub submissions: usize,
    pub correct: usize,
    pub awarded: Vec<ScoreEntry>,
}
