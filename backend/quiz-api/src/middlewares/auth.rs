use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::QuizError;
use crate::services::AppState;

pub const ROLE_MODERATOR: &str = "moderator";
pub const ROLE_PARTICIPANT: &str = "participant";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub sub: String,  // participant or moderator id
    pub role: String, // moderator | participant
    pub exp: usize,
    pub iat: usize,
}

impl JwtClaims {
    pub fn new(sub: &str, role: &str, ttl_secs: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: sub.to_string(),
            role: role.to_string(),
            exp: (now + ttl_secs).max(0) as usize,
            iat: now.max(0) as usize,
        }
    }

    pub fn is_moderator(&self) -> bool {
        self.role == ROLE_MODERATOR
    }

    pub fn is_participant(&self) -> bool {
        self.role == ROLE_PARTICIPANT
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    ExpiredToken,
    #[error("Invalid token signature")]
    InvalidSignature,
    #[error("Unknown role '{0}'")]
    UnknownRole(String),
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn generate_token(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(|_| AuthError::InvalidToken)
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let claims = decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::InvalidToken,
            })?;

        if !claims.is_moderator() && !claims.is_participant() {
            return Err(AuthError::UnknownRole(claims.role));
        }
        Ok(claims)
    }
}

/// Validates the bearer token and stores its claims in the request extensions.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let claims = jwt_service.validate_token(token).map_err(|e| {
        tracing::warn!("JWT validation failed: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    tracing::debug!("Authenticated {} (role: {})", claims.sub, claims.role);

    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

pub async fn moderator_guard_middleware(
    request: Request,
    next: Next,
) -> Result<Response, QuizError> {
    role_guard(request, next, ROLE_MODERATOR).await
}

pub async fn participant_guard_middleware(
    request: Request,
    next: Next,
) -> Result<Response, QuizError> {
    role_guard(request, next, ROLE_PARTICIPANT).await
}

async fn role_guard(request: Request, next: Next, role: &str) -> Result<Response, QuizError> {
    match request.extensions().get::<JwtClaims>() {
        Some(claims) if claims.role == role => Ok(next.run(request).await),
        _ => {
            tracing::warn!("Access denied: {} role required", role);
            Err(QuizError::Forbidden(format!("{} role required", role)))
        }
    }
}
