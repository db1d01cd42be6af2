use serde::{Deserialize, Serialize};

use super::round::ActiveQuestionRecord;

/// A live view that has not yet received its first snapshot is `Pending`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum ReadView<T> {
    Pending,
    Ready(T),
}

impl<T> ReadView<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            ReadView::Ready(value) => Some(value),
            ReadView::Pending => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveQuestionView {
    pub question_id: String,
    pub answer_choices: Vec<String>,
    pub started_at: i64,
    pub expires_in: u64,
    pub answer_revealed: bool,
    pub remaining_ms: u64,
    pub expired: bool,
}

impl ActiveQuestionView {
    pub fn at(record: ActiveQuestionRecord, now_ms: i64) -> Self {
        let window = record.window();
        ActiveQuestionView {
            remaining_ms: window.remaining_ms(now_ms),
            expired: !window.is_open_at(now_ms),
            question_id: record.question_id,
            answer_choices: record.answer_choices,
            started_at: record.started_at,
            expires_in: record.expires_in,
            answer_revealed: record.answer_revealed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionStateView {
    pub current_question: Option<ActiveQuestionView>,
    pub show_leaderboard: bool,
}
