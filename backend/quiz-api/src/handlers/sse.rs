use axum::{
    extract::{Path, Query, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use chrono::Utc;
use futures::stream::{self, Stream, StreamExt};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::{
    error::QuizError,
    metrics::LiveStreamGuard,
    models::{
        score::LeaderboardQuery,
        timer::{CountdownEvent, QuestionExpired, QuestionTick},
        ActiveQuestionRecord, SessionPaths,
    },
    services::{
        leaderboard_service::LeaderboardService, session_service::SessionService, AppState,
    },
    utils::time::now_millis,
};

/// SSE endpoint for live leaderboard updates
/// GET /api/v1/sessions/{sid}/leaderboard/stream
pub async fn leaderboard_stream(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<impl IntoResponse, QuizError> {
    let paths = SessionPaths::new(&session_id)?;
    let updates = LeaderboardService::new(state.store.clone(), paths)
        .watch(query.order)
        .await?;

    tracing::info!("Client connected to leaderboard stream: session={}", session_id);

    let guard = LiveStreamGuard::open();
    let events = updates.map(move |update| {
        let _open = &guard;
        let event = match update {
            Ok(view) => Event::default()
                .event("leaderboard")
                .data(serde_json::to_string(&view).unwrap_or_else(|_| "{}".to_string())),
            Err(e) => {
                tracing::warn!("Leaderboard stream error: {}", e);
                Event::default()
                    .event("error")
                    .data(json!({ "error": e.to_string() }).to_string())
            }
        };
        Ok::<_, Infallible>(event)
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// SSE endpoint for the active question's countdown
/// GET /api/v1/sessions/{sid}/countdown
pub async fn countdown_stream(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, QuizError> {
    let paths = SessionPaths::new(&session_id)?;
    let record = SessionService::new(state.store.clone(), paths)
        .active_question()
        .await?
        .ok_or_else(|| QuizError::validation("no question is active"))?;

    let tick_interval = state.config.countdown_tick_interval_ms;
    tracing::info!(
        "Starting countdown stream: session={}, question={}, expires_in={}ms, tick_interval={}ms",
        session_id,
        record.question_id,
        record.expires_in,
        tick_interval
    );

    Ok(Sse::new(create_countdown_stream(record, tick_interval)).keep_alive(KeepAlive::default()))
}

/// Ticks until the window closes, then sends one `question-expired` and ends.
fn create_countdown_stream(
    record: ActiveQuestionRecord,
    tick_interval_ms: u64,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let window = record.window();
    let guard = LiveStreamGuard::open();

    stream::unfold(
        (record.question_id, true, false, guard),
        move |(qid, first, final_sent, guard)| async move {
            if final_sent {
                return None;
            }

            if !first {
                let remaining = window.remaining_ms(now_millis());
                sleep(Duration::from_millis(tick_interval_ms.min(remaining.max(1)))).await;
            }

            let now = now_millis();
            let remaining = window.remaining_ms(now);
            let event = if remaining == 0 {
                tracing::info!("Question expired: question={}", qid);
                CountdownEvent::QuestionExpired(QuestionExpired {
                    question_id: qid.clone(),
                    timestamp: Utc::now(),
                    message: "Answer window closed".to_string(),
                })
            } else {
                CountdownEvent::QuestionTick(QuestionTick {
                    question_id: qid.clone(),
                    remaining_ms: remaining,
                    elapsed_ms: window.elapsed_ms(now),
                    expires_in: window.expires_in,
                    timestamp: Utc::now(),
                })
            };

            let expired = matches!(event, CountdownEvent::QuestionExpired(_));
            let sse = Event::default()
                .event(event.event_name())
                .data(event.to_sse_data());

            Some((Ok(sse), (qid, false, expired, guard)))
        },
    )
}
