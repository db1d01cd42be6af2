use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events pushed on the countdown stream of the active question.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CountdownEvent {
    QuestionTick(QuestionTick),
    QuestionExpired(QuestionExpired),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QuestionTick {
    pub question_id: String,
    pub remaining_ms: u64,
    pub elapsed_ms: u64,
    pub expires_in: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QuestionExpired {
    pub question_id: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl CountdownEvent {
    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            CountdownEvent::QuestionTick(_) => "question-tick",
            CountdownEvent::QuestionExpired(_) => "question-expired",
        }
    }
}
