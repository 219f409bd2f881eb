use axum::http::HeaderMap;

use crate::errors::AppError;
use crate::services::auth;
use crate::state::AppState;

fn bearer(headers: &HeaderMap) -> &str {
    let value = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    value.strip_prefix("Bearer ").unwrap_or("").trim()
}

/// Resolves the calling user from a signed session token.
pub fn current_user(headers: &HeaderMap, state: &AppState) -> Result<String, AppError> {
    let token = bearer(headers);
    if token.is_empty() {
        return Err(AppError::Unauthorized);
    }
    auth::verify_token(&state.config.session_secret, token).ok_or(AppError::Unauthorized)
}

pub fn check_admin(headers: &HeaderMap, state: &AppState) -> Result<(), AppError> {
    let token = bearer(headers);
    if token.is_empty() || token != state.config.admin_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}
