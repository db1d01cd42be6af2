use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use super::question::Question;
use crate::store::server_timestamp;

/// `state/currentQuestion`: the one question participants may currently answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveQuestionRecord {
    pub question_id: String,
    /// Choice ids as they were when the question was activated.
    #[serde(default)]
    pub answer_choices: Vec<String>,
    pub started_at: i64,
    pub expires_in: u64,
    #[serde(default)]
    pub answer_revealed: bool,
}

/// `state/released/{questionId}`, kept across rounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReleasedWindow {
    pub started_at: i64,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RevealAnswerRequest {
    pub revealed: bool,
}

impl ActiveQuestionRecord {
    /// Value written on activation; `startedAt` is left to the store clock.
    pub fn pending(question: &Question) -> Value {
        json!({
            "questionId": question.id,
            "answerChoices": question.choice_ids(),
            "startedAt": server_timestamp(),
            "expiresIn": question.expires_in_ms(),
            "answerRevealed": false,
        })
    }

    pub fn window(&self) -> ReleasedWindow {
        ReleasedWindow {
            started_at: self.started_at,
            expires_in: self.expires_in,
        }
    }

    pub fn offers_choice(&self, choice_id: &str) -> bool {
        self.answer_choices.iter().any(|c| c == choice_id)
    }
}

impl ReleasedWindow {
    pub fn pending(question: &Question) -> Value {
        json!({
            "startedAt": server_timestamp(),
            "expiresIn": question.expires_in_ms(),
        })
    }

    pub fn expires_at(&self) -> i64 {
        let expires_in = i64::try_from(self.expires_in).unwrap_or(i64::MAX);
        self.started_at.saturating_add(expires_in)
    }

    pub fn remaining_ms(&self, now_ms: i64) -> u64 {
        u64::try_from(self.expires_at().saturating_sub(now_ms)).unwrap_or(0)
    }

    pub fn elapsed_ms(&self, now_ms: i64) -> u64 {
        u64::try_from(now_ms.saturating_sub(self.started_at))
            .unwrap_or(0)
            .min(self.expires_in)
    }

    pub fn is_open_at(&self, now_ms: i64) -> bool {
        now_ms <= self.expires_at()
    }
}
