use std::sync::Arc;

use serde_json::json;

use super::question_service::QuestionService;
use super::session_service::read_active_question;
use crate::error::QuizError;
use crate::metrics::ANSWERS_SUBMITTED_TOTAL;
use crate::models::answer::{parse_answer_set, SubmitAnswerResponse};
use crate::models::{AnswerStats, AnswerSubmission, ParticipantAnswer, SessionPaths};
use crate::store::{server_timestamp, SessionStore};
use crate::utils::time::now_millis;

pub struct AnswerService {
    store: Arc<dyn SessionStore>,
    paths: SessionPaths,
}

impl AnswerService {
    pub fn new(store: Arc<dyn SessionStore>, paths: SessionPaths) -> Self {
        Self { store, paths }
    }

    /// Records a participant's choice for the active question.
    ///
    /// The answer must target the active question and one of the choices captured when it
    /// was activated. The store clock stamps the record and a resubmission replaces it.
    pub async fn submit_answer(
        &self,
        participant_id: &str,
        question_id: &str,
        choice_id: &str,
    ) -> Result<SubmitAnswerResponse, QuizError> {
        tracing::info!(
            "Processing answer submission: session={}, participant={}, question={}",
            self.paths.session_id(),
            participant_id,
            question_id
        );

        let path = self.paths.answer(question_id, participant_id)?;

        let record = read_active_question(self.store.as_ref(), &self.paths)
            .await?
            .ok_or_else(|| QuizError::validation("no question is active"))?;

        if record.question_id != question_id {
            return Err(QuizError::validation(format!(
                "question '{}' is not the active question",
                question_id
            )));
        }
        if !record.offers_choice(choice_id) {
            return Err(QuizError::validation(format!(
                "choice '{}' is not offered for question '{}'",
                choice_id, question_id
            )));
        }

        self.store
            .write(
                &path,
                json!({ "answerId": choice_id, "timestamp": server_timestamp() }),
            )
            .await?;

        // Judged on the store clock that stamped both the answer and the activation.
        let submitted_at = self
            .store
            .read(&path)
            .await?
            .and_then(|value| serde_json::from_value::<AnswerSubmission>(value).ok())
            .map(|submission| submission.timestamp)
            .unwrap_or_else(now_millis);
        let within_window = record.window().is_open_at(submitted_at);
        ANSWERS_SUBMITTED_TOTAL
            .with_label_values(&[if within_window { "true" } else { "false" }])
            .inc();

        if !within_window {
            tracing::info!(
                "Late answer accepted: session={}, participant={}, question={}",
                self.paths.session_id(),
                participant_id,
                question_id
            );
        }

        Ok(SubmitAnswerResponse {
            question_id: question_id.to_string(),
            choice_id: choice_id.to_string(),
            within_window,
        })
    }

    /// One point-in-time read of every submission for `question_id`.
    pub async fn answer_set(&self, question_id: &str) -> Result<Vec<ParticipantAnswer>, QuizError> {
        let snapshot = self.store.read(&self.paths.answers(question_id)?).await?;
        Ok(parse_answer_set(question_id, snapshot))
    }

    /// Counts submissions, resolving correctness against the current question definition.
    pub async fn answer_stats(&self, question_id: &str) -> Result<AnswerStats, QuizError> {
        let questions = QuestionService::new(self.store.clone(), self.paths.clone());
        let question = questions
            .get_question(question_id)
            .await?
            .ok_or_else(|| QuizError::QuestionNotFound(question_id.to_string()))?;

        let answers = self.answer_set(question_id).await?;
        let correct = answers
            .iter()
            .filter(|a| question.is_correct(&a.submission.answer_choice_id))
            .count();

        Ok(AnswerStats {
            question_id: question_id.to_string(),
            total: answers.len(),
            correct,
        })
    }
}
