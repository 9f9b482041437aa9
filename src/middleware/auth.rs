use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::app::AppState;
use crate::auth::{validate_jwt, Actor, SINGLE_USER};
use crate::config::SecurityConfig;
use crate::error::ApiError;

/// Resolves the bearer token into an [`Actor`] and stores it in the request
/// extensions for the handlers.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token_from_headers(request.headers()).map_err(ApiError::unauthorized)?;
    let actor = session_actor(&state.config.security, &token).map_err(ApiError::unauthorized)?;

    debug!("session for {}", actor.user_id);
    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

/// Rejects requests that do not carry `X-Requested-With: XMLHttpRequest`.
pub async fn csrf_middleware(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, ApiError> {
    if state.config.security.require_csrf_header && !has_csrf_header(request.headers()) {
        return Err(ApiError::bad_request("checkCSRFToken FAILED"));
    }
    Ok(next.run(request).await)
}

fn has_csrf_header(headers: &HeaderMap) -> bool {
    headers
        .get("X-Requested-With")
        .and_then(|value| value.to_str().ok())
        .map_or(false, |value| value == "XMLHttpRequest")
}

/// Extract the bearer token from the Authorization header
fn extract_token_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty bearer token".to_string());
        }
        Ok(token.trim().to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}

/// The single-user token wins; anything else must be a valid JWT.
fn session_actor(security: &SecurityConfig, token: &str) -> Result<Actor, String> {
    if security.single_user_token.as_deref() == Some(token) {
        return Ok(Actor::single_user());
    }

    let claims = validate_jwt(token, &security.jwt_secret).map_err(|e| e.to_string())?;
    if claims.sub.is_empty() {
        return Err("Token has no subject".to_string());
    }
    if claims.sub == SINGLE_USER {
        return Err("Token subject is reserved".to_string());
    }
    Ok(Actor::new(claims.sub))
}
