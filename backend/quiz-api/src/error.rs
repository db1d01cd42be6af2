use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::store::{PartialWriteFailure, StoreError};

/// Failures surfaced by the quiz commands and views.
#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    /// The command was rejected before anything was written.
    #[error("{0}")]
    Validation(String),
    #[error("question '{0}' not found")]
    QuestionNotFound(String),
    #[error("{0}")]
    Forbidden(String),
    /// Some members of a write group were not applied. The command is safe to reissue.
    #[error("write group partially applied: {0}")]
    PartialWrite(#[from] PartialWriteFailure),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for QuizError {
    fn from(err: StoreError) -> Self {
        match err {
            // Paths are built from caller-supplied ids, so a bad segment is bad input.
            StoreError::InvalidPath(path) => {
                QuizError::Validation(format!("invalid identifier in '{}'", path))
            }
            other => QuizError::Store(other),
        }
    }
}

impl QuizError {
    pub fn validation(message: impl Into<String>) -> Self {
        QuizError::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, QuizError::Validation(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            QuizError::Validation(_) => StatusCode::BAD_REQUEST,
            QuizError::QuestionNotFound(_) => StatusCode::NOT_FOUND,
            QuizError::Forbidden(_) => StatusCode::FORBIDDEN,
            QuizError::PartialWrite(_) => StatusCode::BAD_GATEWAY,
            QuizError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for QuizError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            QuizError::PartialWrite(failure) => {
                tracing::error!("{}", self);
                json!({
                    "error": self.to_string(),
                    "status": status.as_u16(),
                    "failed_writes": failure.failures,
                })
            }
            QuizError::Store(_) => {
                tracing::error!("Store failure: {}", self);
                json!({ "error": "session store unavailable", "status": status.as_u16() })
            }
            _ => {
                tracing::warn!("Request rejected: {}", self);
                json!({ "error": self.to_string(), "status": status.as_u16() })
            }
        };
        (status, Json(body)).into_response()
    }
}
