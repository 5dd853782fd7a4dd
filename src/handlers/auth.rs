use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::OperatorSession;
use crate::services::auth;
use crate::state::AppState;

pub(crate) fn bearer_token(headers: &HeaderMap) -> &str {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("")
        .trim()
}

/// Resolves the request's bearer token to a live operator session.
pub(crate) fn require_operator(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<OperatorSession, AppError> {
    let db = state.conn()?;
    auth::current_operator(&db, bearer_token(headers))
}

#[derive(Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    token: String,
    email: String,
    expires_at: String,
}

impl From<OperatorSession> for SessionResponse {
    fn from(session: OperatorSession) -> Self {
        Self {
            token: session.token,
            email: session.email,
            expires_at: session.expires_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        }
    }
}

// POST /api/auth/sign-up
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Credentials>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let db = state.conn()?;
    let session = auth::sign_up(
        &db,
        &body.email,
        &body.password,
        state.config.session_ttl_hours,
    )?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

// POST /api/auth/sign-in
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Credentials>,
) -> Result<Json<SessionResponse>, AppError> {
    let db = state.conn()?;
    let session = auth::sign_in(
        &db,
        &body.email,
        &body.password,
        state.config.session_ttl_hours,
    )?;
    Ok(Json(session.into()))
}

// POST /api/auth/sign-out
pub async fn sign_out(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let db = state.conn()?;
    auth::sign_out(&db, bearer_token(&headers))?;
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let session = require_operator(&state, &headers)?;
    Ok(Json(serde_json::json!({
        "operator_id": session.operator_id,
        "email": session.email,
    })))
}
