use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

/// `answers/{questionId}/{participantId}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerSubmission {
    #[serde(rename = "answerId", alias = "answerChoiceId")]
    pub answer_choice_id: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantAnswer {
    pub participant_id: String,
    pub submission: AnswerSubmission,
}

/// Decodes a point-in-time read of `answers/{questionId}`.
///
/// Entries that do not decode are logged and dropped; they never count as answers.
pub fn parse_answer_set(question_id: &str, snapshot: Option<Value>) -> Vec<ParticipantAnswer> {
    let Some(Value::Object(entries)) = snapshot else {
        return Vec::new();
    };

    entries
        .into_iter()
        .filter_map(|(participant_id, raw)| {
            match serde_json::from_value::<AnswerSubmission>(raw) {
                Ok(submission) => Some(ParticipantAnswer {
                    participant_id,
                    submission,
                }),
                Err(e) => {
                    tracing::warn!(
                        "Skipping undecodable answer: question={}, participant={}, error={}",
                        question_id,
                        participant_id,
                        e
                    );
                    None
                }
            }
        })
        .collect()
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    #[validate(length(
        min = 1,
        max = 128,
        message = "Choice id must be between 1 and 128 characters"
    ))]
    pub choice_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitAnswerResponse {
    pub question_id: String,
    pub choice_id: String,
    /// Advisory: late answers are still recorded.
    pub within_window: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerStats {
    pub question_id: String,
    pub total: usize,
    pub correct: usize,
}

impl AnswerStats {
    /// Moderator label, e.g. `3 (2 correct)`.
    pub fn label(&self) -> String {
        format!("{} ({} correct)", self.total, self.correct)
    }
}
