use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    error::QuizError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::{answer::SubmitAnswerRequest, SessionPaths},
    services::{answer_service::AnswerService, AppState},
};

/// POST /api/v1/sessions/{sid}/questions/{qid}/answers
///
/// The participant id is the token subject, never a body field.
pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((session_id, question_id)): Path<(String, String)>,
    AppJson(req): AppJson<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, QuizError> {
    let paths = SessionPaths::new(&session_id)?;
    let response = AnswerService::new(state.store.clone(), paths)
        .submit_answer(&claims.sub, &question_id, &req.choice_id)
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}
