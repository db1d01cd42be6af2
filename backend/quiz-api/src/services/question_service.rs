use std::sync::Arc;

use serde_json::Value;

use crate::error::QuizError;
use crate::models::{Question, SessionPaths};
use crate::store::SessionStore;

/// Read access to the question catalogue of a session.
pub struct QuestionService {
    store: Arc<dyn SessionStore>,
    paths: SessionPaths,
}

impl QuestionService {
    pub fn new(store: Arc<dyn SessionStore>, paths: SessionPaths) -> Self {
        Self { store, paths }
    }

    pub async fn get_question(&self, question_id: &str) -> Result<Option<Question>, QuizError> {
        let path = self.paths.question(question_id)?;
        match self.store.read(&path).await? {
            Some(value) => Ok(Some(Question::from_snapshot(question_id, value)?)),
            None => Ok(None),
        }
    }

    /// Fresh read that fails with `QuestionNotFound` when the question is missing and
    /// with `Validation` when it has nothing to answer.
    pub async fn require_answerable(&self, question_id: &str) -> Result<Question, QuizError> {
        let question = self
            .get_question(question_id)
            .await?
            .ok_or_else(|| QuizError::QuestionNotFound(question_id.to_string()))?;

        if !question.has_choices() {
            return Err(QuizError::validation(format!(
                "question '{}' has no answer choices",
                question_id
            )));
        }
        Ok(question)
    }

    pub async fn list_questions(&self) -> Result<Vec<Question>, QuizError> {
        let Some(Value::Object(entries)) = self.store.read(&self.paths.questions()).await? else {
            return Ok(Vec::new());
        };

        let mut questions = Vec::with_capacity(entries.len());
        for (id, value) in entries {
            match Question::from_snapshot(&id, value) {
                Ok(question) => questions.push(question),
                Err(e) => tracing::warn!("Skipping unreadable question {}: {}", id, e),
            }
        }
        Ok(questions)
    }
}
