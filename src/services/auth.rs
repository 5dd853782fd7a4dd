//! Operator accounts and sessions.
//!
//! The shop has a single operator: sign-up is open only until the first
//! account exists. Sessions are opaque tokens stored in SQLite with an expiry.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::Engine;
use chrono::{Duration, NaiveDateTime, Utc};
use rusqlite::Connection;

use crate::config::DEFAULT_SESSION_TTL_HOURS;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::OperatorSession;

const MIN_PASSWORD_LEN: usize = 8;

/// Hashes with Argon2id and returns the PHC string (`$argon2id$v=19$...`).
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes())
        .map_err(|e| AppError::Internal(format!("password salt: {e}")))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// 256 random bits, base64url encoded.
fn session_token() -> String {
    let mut bytes = [0u8; 32];
    bytes[..16].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
    bytes[16..].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Expiry `ttl_hours` after `now`. Values chrono cannot represent fall back
/// to the default TTL.
fn session_expiry(now: NaiveDateTime, ttl_hours: i64) -> NaiveDateTime {
    Duration::try_hours(ttl_hours)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or_else(|| {
            tracing::warn!(ttl_hours, "session TTL out of range, using default");
            now + Duration::hours(DEFAULT_SESSION_TTL_HOURS)
        })
}

fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("a valid email is required".to_string()));
    }
    Ok(email)
}

fn open_session(
    conn: &Connection,
    operator_id: &str,
    email: &str,
    ttl_hours: i64,
) -> Result<OperatorSession, AppError> {
    let session = OperatorSession {
        token: session_token(),
        operator_id: operator_id.to_string(),
        email: email.to_string(),
        expires_at: session_expiry(Utc::now().naive_utc(), ttl_hours),
    };
    queries::insert_session(conn, &session)?;

    let purged = queries::delete_expired_sessions(conn)?;
    if purged > 0 {
        tracing::debug!(purged, "expired operator sessions removed");
    }

    Ok(session)
}

/// Creates the operator account and signs it in.
pub fn sign_up(
    conn: &Connection,
    email: &str,
    password: &str,
    ttl_hours: i64,
) -> Result<OperatorSession, AppError> {
    if queries::count_operators(conn)? > 0 {
        return Err(AppError::Validation("sign-up is closed".to_string()));
    }
    let email = normalize_email(email)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let id = uuid::Uuid::new_v4().to_string();
    queries::insert_operator(conn, &id, &email, &hash_password(password)?)?;
    tracing::info!(operator = %email, "operator account created");

    open_session(conn, &id, &email, ttl_hours)
}

pub fn sign_in(
    conn: &Connection,
    email: &str,
    password: &str,
    ttl_hours: i64,
) -> Result<OperatorSession, AppError> {
    let email = email.trim().to_lowercase();
    let Some((operator, stored)) = queries::get_operator_credentials(conn, &email)? else {
        tracing::warn!(operator = %email, "sign-in for unknown operator");
        return Err(AppError::Unauthorized);
    };
    if !verify_password(password, &stored) {
        tracing::warn!(operator = %email, "sign-in with wrong password");
        return Err(AppError::Unauthorized);
    }

    tracing::info!(operator = %operator.email, "operator signed in");
    open_session(conn, &operator.id, &operator.email, ttl_hours)
}

pub fn sign_out(conn: &Connection, token: &str) -> Result<(), AppError> {
    if queries::delete_session(conn, token)? {
        tracing::info!("operator signed out");
    }
    Ok(())
}

/// Resolves a bearer token to its live session.
pub fn current_operator(conn: &Connection, token: &str) -> Result<OperatorSession, AppError> {
    if token.is_empty() {
        return Err(AppError::Unauthorized);
    }
    queries::get_active_session(conn, token)?.ok_or(AppError::Unauthorized)
}
