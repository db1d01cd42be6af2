use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::question_service::QuestionService;
use super::session_service::read_active_question;
use crate::error::QuizError;
use crate::metrics::{status_label, QUESTIONS_ACTIVATED_TOTAL};
use crate::models::{ActiveQuestionRecord, Question, ReleasedWindow, SessionPaths};
use crate::store::{SessionStore, WriteGroup};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActivationSummary {
    pub question_id: String,
    pub answer_choices: Vec<String>,
    pub expires_in: u64,
}

/// Makes one question live: records its window, replaces the active question record
/// and hides the leaderboard, as one best-effort write group.
pub struct ActivationService {
    store: Arc<dyn SessionStore>,
    paths: SessionPaths,
}

impl ActivationService {
    pub fn new(store: Arc<dyn SessionStore>, paths: SessionPaths) -> Self {
        Self { store, paths }
    }

    pub async fn activate_by_id(&self, question_id: &str) -> Result<ActivationSummary, QuizError> {
        let questions = QuestionService::new(self.store.clone(), self.paths.clone());
        let question = questions.require_answerable(question_id).await?;
        self.activate(&question).await
    }

    pub async fn activate(&self, question: &Question) -> Result<ActivationSummary, QuizError> {
        if !question.has_choices() {
            return Err(QuizError::validation(format!(
                "question '{}' has no answer choices",
                question.id
            )));
        }

        let released = self.paths.released(&question.id)?;
        let summary = ActivationSummary {
            question_id: question.id.clone(),
            answer_choices: question.choice_ids(),
            expires_in: question.expires_in_ms(),
        };

        tracing::info!(
            "Activating question: session={}, question={}, expires_in={}ms",
            self.paths.session_id(),
            summary.question_id,
            summary.expires_in
        );

        let mut group = WriteGroup::new();
        group
            .push(released, ReleasedWindow::pending(question))
            .push(
                self.paths.current_question(),
                ActiveQuestionRecord::pending(question),
            )
            .push(self.paths.show_leaderboard(), Value::Bool(false));

        let result = group.commit(self.store.as_ref()).await.into_result();
        QUESTIONS_ACTIVATED_TOTAL
            .with_label_values(&[status_label(result.is_ok())])
            .inc();
        result?;

        Ok(summary)
    }

    pub async fn set_answer_revealed(
        &self,
        question_id: &str,
        revealed: bool,
    ) -> Result<(), QuizError> {
        let record = read_active_question(self.store.as_ref(), &self.paths)
            .await?
            .ok_or_else(|| QuizError::validation("no question is active"))?;

        if record.question_id != question_id {
            return Err(QuizError::validation(format!(
                "question '{}' is not the active question",
                question_id
            )));
        }

        self.store
            .write(&self.paths.answer_revealed(), Value::Bool(revealed))
            .await?;
        tracing::info!(
            "Answer reveal set: session={}, question={}, revealed={}",
            self.paths.session_id(),
            question_id,
            revealed
        );
        Ok(())
    }
}
