//! Bearer token authentication and principal extractors
//!
//! Provides:
//! - [`authenticate`] turning an `Authorization: Bearer` header into a [`Principal`]
//! - [`AuthPrincipal`] extractor for handlers requiring an authenticated caller

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use jsonwebtoken::errors::ErrorKind;
use tracing::debug;

use crate::domain::Principal;
use crate::error::AppError;
use crate::repository::PrincipalRepository;
use crate::state::HasServices;

/// Authentication errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No Authorization header present
    MissingToken,
    /// Invalid Authorization header format
    InvalidHeader(String),
    /// Token validation failed
    InvalidToken(String),
    /// Token has expired
    TokenExpired,
    /// Token is valid but the principal is unknown or deactivated
    InactivePrincipal,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingToken => "Missing authorization token",
            AuthError::InvalidHeader(_) => "Invalid authorization header",
            AuthError::InvalidToken(_) => "Invalid token",
            AuthError::TokenExpired => "Token has expired",
            AuthError::InactivePrincipal => "Principal is not active",
        };

        let body = serde_json::json!({
            "error": "unauthorized",
            "message": message,
        });

        (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
    }
}

/// Extract the Bearer token from the Authorization header
pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidHeader("Invalid header encoding".to_string()))?;

    auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        AuthError::InvalidHeader("Authorization header must use Bearer scheme".to_string())
    })
}

/// Identify the caller.
///
/// No Authorization header means an anonymous request (`Ok(None)`). A header
/// that is present but does not identify an active principal is an error.
pub async fn authenticate<S: HasServices>(
    state: &S,
    headers: &HeaderMap,
) -> Result<Option<Principal>, AuthError> {
    let token = match extract_bearer_token(headers) {
        Ok(token) => token,
        Err(AuthError::MissingToken) => return Ok(None),
        Err(e) => return Err(e),
    };

    let claims = state
        .jwt_manager()
        .verify_identity_token(token)
        .map_err(|e| match e {
            AppError::Jwt(ref jwt) if matches!(jwt.kind(), ErrorKind::ExpiredSignature) => {
                AuthError::TokenExpired
            }
            other => AuthError::InvalidToken(other.to_string()),
        })?;
    let principal_id = claims
        .principal_id()
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    match state.principal_repo().find_by_id(principal_id).await {
        Ok(Some(principal)) if principal.is_active => Ok(Some(principal)),
        Ok(_) => Err(AuthError::InactivePrincipal),
        Err(e) => {
            debug!(principal_id = %principal_id, error = %e, "Principal lookup failed");
            Err(AuthError::InvalidToken("Principal lookup failed".to_string()))
        }
    }
}

/// Axum extractor for an authenticated principal
///
/// Reuses the principal loaded by the tenant context middleware when present,
/// otherwise authenticates the request itself.
///
/// ```ignore
/// async fn handler(AuthPrincipal(principal): AuthPrincipal) -> String {
///     principal.email
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthPrincipal(pub Principal);

impl<S> FromRequestParts<S> for AuthPrincipal
where
    S: HasServices,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(AuthPrincipal(principal.clone()));
        }
        authenticate(state, &parts.headers)
            .await?
            .map(AuthPrincipal)
            .ok_or(AuthError::MissingToken)
    }
}
