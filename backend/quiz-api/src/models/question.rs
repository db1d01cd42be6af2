use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::store::StoreError;

/// Answer window used when a question has no usable time limit.
pub const DEFAULT_EXPIRES_IN_MS: u64 = 30_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerChoice {
    #[serde(default)]
    pub correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A question as stored under `questions/{questionId}`.
///
/// Choices are keyed by choice id; the map keeps them in id order, which is the order
/// the activation snapshot and the moderator listing use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub answers: BTreeMap<String, AnswerChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<f64>,
}

impl Question {
    pub fn from_snapshot(id: &str, value: Value) -> Result<Self, StoreError> {
        let mut question: Question =
            serde_json::from_value(value).map_err(|e| StoreError::Malformed {
                path: format!("questions/{}", id),
                message: e.to_string(),
            })?;
        question.id = id.to_string();
        Ok(question)
    }

    /// Length of the answer window in milliseconds, always at least 1.
    pub fn expires_in_ms(&self) -> u64 {
        match self.time_limit {
            Some(secs) if secs.is_finite() && secs > 0.0 => {
                let ms = (secs * 1000.0).round();
                if ms >= u64::MAX as f64 {
                    u64::MAX
                } else {
                    (ms as u64).max(1)
                }
            }
            _ => DEFAULT_EXPIRES_IN_MS,
        }
    }

    pub fn has_choices(&self) -> bool {
        !self.answers.is_empty()
    }

    pub fn choice_ids(&self) -> Vec<String> {
        self.answers.keys().cloned().collect()
    }

    /// Unknown choices are never correct.
    pub fn is_correct(&self, choice_id: &str) -> bool {
        self.answers
            .get(choice_id)
            .map(|choice| choice.correct)
            .unwrap_or(false)
    }
}

/// Moderator listing entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionSummary {
    pub id: String,
    pub text: Option<String>,
    pub choices: Vec<ChoiceSummary>,
    pub time_limit_secs: Option<f64>,
    pub expires_in_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChoiceSummary {
    pub id: String,
    pub text: Option<String>,
    pub correct: bool,
}

impl From<&Question> for QuestionSummary {
    fn from(question: &Question) -> Self {
        QuestionSummary {
            id: question.id.clone(),
            text: question.text.clone(),
            choices: question
                .answers
                .iter()
                .map(|(id, choice)| ChoiceSummary {
                    id: id.clone(),
                    text: choice.text.clone(),
                    correct: choice.correct,
                })
                .collect(),
            time_limit_secs: question.time_limit,
            expires_in_ms: question.expires_in_ms(),
        }
    }
}
