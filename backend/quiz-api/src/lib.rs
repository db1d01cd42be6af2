use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::QuizError;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler).layer(middleware::from_fn_with_state(
                app_state.clone(),
                handlers::metrics_auth_middleware,
            )),
        )
        // Protected endpoints (require JWT)
        .nest(
            "/api/v1/sessions/{session_id}",
            session_routes()
                .merge(participant_routes())
                .merge(moderator_routes())
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        .with_state(app_state)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn session_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/state", get(handlers::sessions::get_session_state))
        .route("/leaderboard", get(handlers::sessions::get_leaderboard))
        .route(
            "/leaderboard/stream",
            get(handlers::sse::leaderboard_stream),
        )
        .route("/countdown", get(handlers::sse::countdown_stream))
}

fn participant_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/questions/{question_id}/answers",
            post(handlers::participant::submit_answer),
        )
        .route_layer(middleware::from_fn(
            middlewares::auth::participant_guard_middleware,
        ))
}

fn moderator_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/moderator/questions",
            get(handlers::moderator::list_questions),
        )
        .route(
            "/moderator/questions/{question_id}/activate",
            post(handlers::moderator::activate_question),
        )
        .route(
            "/moderator/questions/{question_id}/grade",
            post(handlers::moderator::grade_question),
        )
        .route(
            "/moderator/questions/{question_id}/reveal",
            put(handlers::moderator::reveal_answer),
        )
        .route(
            "/moderator/questions/{question_id}/stats",
            get(handlers::moderator::answer_stats),
        )
        .route_layer(middleware::from_fn(
            middlewares::auth::moderator_guard_middleware,
        ))
}
