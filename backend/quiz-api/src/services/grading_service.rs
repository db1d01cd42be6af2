use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use super::answer_service::AnswerService;
use super::question_service::QuestionService;
use crate::error::QuizError;
use crate::metrics::{status_label, GRADING_RUNS_TOTAL, SCORES_AWARDED_TOTAL};
use crate::models::score::{MAX_REWARD, MIN_REWARD};
use crate::models::{GradeReport, ParticipantAnswer, Question, ScoreEntry, SessionPaths};
use crate::store::{SessionStore, WriteGroup};

/// Awards decaying rewards to correct answers in submission order.
///
/// Answers are ordered by server timestamp, ties broken by participant id. The first
/// correct answer earns `MAX_REWARD`; every correct answer after it earns one point less
/// until `MIN_REWARD`, which every remaining correct answer gets. Incorrect or unknown
/// choices earn nothing and leave the reward where it is.
pub fn assign_rewards(question: &Question, answers: &[ParticipantAnswer]) -> Vec<ScoreEntry> {
    let mut ordered: Vec<&ParticipantAnswer> = answers.iter().collect();
    ordered.sort_by(|a, b| {
        a.submission
            .timestamp
            .cmp(&b.submission.timestamp)
            .then_with(|| a.participant_id.cmp(&b.participant_id))
    });

    let mut reward = MAX_REWARD;
    let mut awarded = Vec::new();
    for answer in ordered {
        if !question.is_correct(&answer.submission.answer_choice_id) {
            continue;
        }
        awarded.push(ScoreEntry {
            participant_id: answer.participant_id.clone(),
            question_id: question.id.clone(),
            points: reward,
        });
        if reward > MIN_REWARD {
            reward -= 1;
        }
    }
    awarded
}

pub struct GradingService {
    store: Arc<dyn SessionStore>,
    paths: SessionPaths,
}

impl GradingService {
    pub fn new(store: Arc<dyn SessionStore>, paths: SessionPaths) -> Self {
        Self { store, paths }
    }

    /// Scores every submission for `question_id` and shows the leaderboard.
    ///
    /// Each score entry is overwritten, never accumulated, and entries for submissions that
    /// are no longer correct are removed, so grading again converges on the current answers.
    pub async fn grade(&self, question_id: &str) -> Result<GradeReport, QuizError> {
        let result = self.run(question_id).await;
        GRADING_RUNS_TOTAL
            .with_label_values(&[status_label(result.is_ok())])
            .inc();
        result
    }

    async fn run(&self, question_id: &str) -> Result<GradeReport, QuizError> {
        let questions = QuestionService::new(self.store.clone(), self.paths.clone());
        let question = questions.require_answerable(question_id).await?;

        let answers = AnswerService::new(self.store.clone(), self.paths.clone())
            .answer_set(question_id)
            .await?;

        let awarded = assign_rewards(&question, &answers);

        let mut group = WriteGroup::new();
        let mut award_paths = HashSet::new();
        for entry in &awarded {
            let path = self.paths.score(&entry.participant_id, &entry.question_id)?;
            award_paths.insert(path.to_string());
            group.push(path, Value::from(entry.points));
        }
        // Submissions that no longer earn points lose any score from an earlier grading.
        let mut cleared = 0;
        for answer in &answers {
            let path = self.paths.score(&answer.participant_id, question_id)?;
            if !award_paths.contains(&path.to_string()) {
                group.push(path, Value::Null);
                cleared += 1;
            }
        }
        group.push(self.paths.show_leaderboard(), Value::Bool(true));

        tracing::info!(
            "Grading question: session={}, question={}, submissions={}, correct={}, cleared={}",
            self.paths.session_id(),
            question_id,
            answers.len(),
            awarded.len(),
            cleared
        );

        let report = group.commit(self.store.as_ref()).await;
        let failed_awards = report
            .failures
            .iter()
            .filter(|f| award_paths.contains(&f.path))
            .count();
        SCORES_AWARDED_TOTAL.inc_by((awarded.len() - failed_awards) as u64);
        report.into_result()?;

        Ok(GradeReport {
            question_id: question_id.to_string(),
            submissions: answers.len(),
            correct: awarded.len(),
            awarded,
        })
    }
}
