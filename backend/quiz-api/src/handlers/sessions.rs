use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    error::QuizError,
    models::{score::LeaderboardQuery, SessionPaths},
    services::{
        leaderboard_service::LeaderboardService, session_service::SessionService, AppState,
    },
};

/// GET /api/v1/sessions/{sid}/state
pub async fn get_session_state(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, QuizError> {
    let paths = SessionPaths::new(&session_id)?;
    let view = SessionService::new(state.store.clone(), paths)
        .session_state()
        .await?;
    Ok(Json(view))
}

/// GET /api/v1/sessions/{sid}/leaderboard?order=by_score_desc|by_participant
pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<impl IntoResponse, QuizError> {
    let paths = SessionPaths::new(&session_id)?;
    let rows = LeaderboardService::new(state.store.clone(), paths)
        .snapshot(query.order)
        .await?;
    Ok(Json(rows))
}
