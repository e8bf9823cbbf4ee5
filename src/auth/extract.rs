//! Request extractors that authenticate the caller and gate access.

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use tracing::debug;

use crate::auth::Credentials;
use crate::error::AppError;
use crate::models::User;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "X-Edx-Api-Key";

/// Credentials from an `Authorization: Basic ...` header.
pub fn basic_credentials(headers: &HeaderMap) -> Option<Credentials> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Credentials::resolve(Some(username.to_string()), Some(password.to_string()), None)
}

/// True when the request carries the configured API key.
pub fn has_valid_api_key(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return false;
    };
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|provided| constant_time_eq(provided.as_bytes(), expected.as_bytes()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// An active user authenticated through the identity backend.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let credentials = basic_credentials(&parts.headers).ok_or(AppError::Unauthorized)?;

        let user = state
            .auth
            .authenticate(&credentials)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !user.is_active {
            debug!("rejecting inactive user {}", user.username);
            return Err(AppError::Unauthorized);
        }

        Ok(Self(user))
    }
}

/// Either the API key header or an authenticated user. `None` means the key.
#[derive(Debug, Clone)]
pub struct ApiKeyOrAuthenticated(pub Option<User>);

impl FromRequestParts<AppState> for ApiKeyOrAuthenticated {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if has_valid_api_key(&parts.headers, state.config.api_key.as_deref()) {
            return Ok(Self(None));
        }
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;
        Ok(Self(Some(user)))
    }
}

/// Write access to course modes: the API key header or a staff user.
#[derive(Debug, Clone)]
pub struct CanEditModes(pub Option<User>);

impl FromRequestParts<AppState> for CanEditModes {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if has_valid_api_key(&parts.headers, state.config.api_key.as_deref()) {
            return Ok(Self(None));
        }
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !user.is_staff {
            return Err(AppError::Forbidden);
        }
        Ok(Self(Some(user)))
    }
}
