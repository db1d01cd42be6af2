use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    error::QuizError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::{round::RevealAnswerRequest, QuestionSummary, SessionPaths},
    services::{
        activation_service::ActivationService, answer_service::AnswerService,
        grading_service::GradingService, question_service::QuestionService, AppState,
    },
};

/// GET /api/v1/sessions/{sid}/moderator/questions
pub async fn list_questions(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, QuizError> {
    let paths = SessionPaths::new(&session_id)?;
    let questions = QuestionService::new(state.store.clone(), paths)
        .list_questions()
        .await?;

    let summaries: Vec<QuestionSummary> = questions.iter().map(QuestionSummary::from).collect();
    Ok(Json(summaries))
}

/// POST /api/v1/sessions/{sid}/moderator/questions/{qid}/activate
pub async fn activate_question(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((session_id, question_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, QuizError> {
    tracing::info!(
        "Moderator {} activating question {} in session {}",
        claims.sub,
        question_id,
        session_id
    );

    let paths = SessionPaths::new(&session_id)?;
    let summary = ActivationService::new(state.store.clone(), paths)
        .activate_by_id(&question_id)
        .await?;

    Ok((StatusCode::OK, Json(summary)))
}

/// POST /api/v1/sessions/{sid}/moderator/questions/{qid}/grade
pub async fn grade_question(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((session_id, question_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, QuizError> {
    tracing::info!(
        "Moderator {} grading question {} in session {}",
        claims.sub,
        question_id,
        session_id
    );

    let paths = SessionPaths::new(&session_id)?;
    let report = GradingService::new(state.store.clone(), paths)
        .grade(&question_id)
        .await?;

    Ok(Json(report))
}

/// PUT /api/v1/sessions/{sid}/moderator/questions/{qid}/reveal
pub async fn reveal_answer(
    State(state): State<Arc<AppState>>,
    Path((session_id, question_id)): Path<(String, String)>,
    AppJson(req): AppJson<RevealAnswerRequest>,
) -> Result<impl IntoResponse, QuizError> {
    let paths = SessionPaths::new(&session_id)?;
    ActivationService::new(state.store.clone(), paths)
        .set_answer_revealed(&question_id, req.revealed)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/sessions/{sid}/moderator/questions/{qid}/stats
pub async fn answer_stats(
    State(state): State<Arc<AppState>>,
    Path((session_id, question_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, QuizError> {
    let paths = SessionPaths::new(&session_id)?;
    let stats = AnswerService::new(state.store.clone(), paths)
        .answer_stats(&question_id)
        .await?;

    Ok(Json(json!({
        "question_id": stats.question_id,
        "total": stats.total,
        "correct": stats.correct,
        "label": stats.label(),
    })))
}
