//! HTTP-facing errors for the authentication flow.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use encore_identity::{AuthError, StoreError};
use std::fmt;

/// Errors surfaced by the login/callback/logout routes.
#[derive(Debug)]
pub enum AuthFlowError {
    /// The requested provider slug is not configured.
    UnknownProvider(String),
    /// The OAuth `state` parameter failed signature verification.
    InvalidState,
    /// The authentication lifecycle failed.
    Auth(AuthError),
    /// Storage failed outside the lifecycle service.
    Store(StoreError),
}

impl fmt::Display for AuthFlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownProvider(slug) => write!(f, "unknown provider '{slug}'"),
            Self::InvalidState => write!(f, "state parameter failed verification"),
            Self::Auth(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for AuthFlowError {}

impl From<AuthError> for AuthFlowError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl From<StoreError> for AuthFlowError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl IntoResponse for AuthFlowError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::UnknownProvider(slug) => {
                tracing::warn!(provider = %slug, "login attempt for unknown provider");
                (StatusCode::NOT_FOUND, "Unknown provider")
            }
            Self::InvalidState => (StatusCode::FORBIDDEN, "Invalid state"),
            Self::Auth(err) => {
                tracing::error!(error = %err, "authentication failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Authentication failed")
            }
            Self::Store(err) => {
                tracing::error!(error = %err, "storage error during auth flow");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, message).into_response()
    }
}
