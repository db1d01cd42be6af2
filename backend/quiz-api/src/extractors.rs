use axum::{
    extract::{FromRequest, Request},
    response::{IntoResponse, Response},
    Json,
};
use validator::Validate;

use crate::error::QuizError;

/// JSON body extractor that answers malformed or invalid bodies with the same JSON error
/// shape as every other rejected command.
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            QuizError::validation(format!("Failed to parse JSON request body: {}", rejection))
                .into_response()
        })?;

        value
            .validate()
            .map_err(|e| QuizError::validation(e.to_string()).into_response())?;

        Ok(AppJson(value))
    }
}
