//! Session middleware and extractors for Axum.
//!
//! The middleware runs the session state machine for every request and
//! publishes the outcome as a request extension. Handlers consume it
//! through the `RequireAuth` / `RequireAdmin` / `OptionalUser`
//! extractors.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use encore_core::UserId;
use encore_identity::SessionGate;
use time::Duration as TimeDuration;

use super::AppState;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "encore_user";

/// What the session middleware learned about the request.
#[derive(Debug, Clone)]
pub struct RequestIdentity {
    /// The authenticated user, if any.
    pub user: Option<SessionUser>,
    /// Login links for every configured provider, carrying the signed
    /// return path.
    pub login_links: Vec<LoginLink>,
    /// Logout link carrying the signed return path.
    pub logout_link: String,
}

/// Display view of the authenticated user.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionUser {
    pub id: UserId,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub username: Option<String>,
    pub is_admin: bool,
}

/// A login entry point for one provider.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LoginLink {
    pub provider: String,
    pub name: String,
    pub href: String,
}

/// Session middleware: evaluates the session cookie, publishes
/// `RequestIdentity`, and clears the cookie on any downgrade.
pub async fn authenticate(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let raw_cookie = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());

    let gate = match state
        .service
        .authenticate_cookie(&state.codec, &state.registry, raw_cookie.as_deref())
        .await
    {
        Ok(gate) => gate,
        Err(e) => {
            tracing::error!(error = %e, "session lookup failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
        }
    };

    let from = request
        .uri()
        .path_and_query()
        .map_or_else(|| "/".to_string(), ToString::to_string);
    let identity = |user: Option<SessionUser>| request_identity(&state, &from, user);

    match gate {
        SessionGate::Anonymous => {
            request.extensions_mut().insert(identity(None));
            next.run(request).await
        }
        SessionGate::ClearCookie => {
            request.extensions_mut().insert(identity(None));
            let response = next.run(request).await;
            (jar.add(removal_cookie()), response).into_response()
        }
        SessionGate::RenewFailed { reason } => {
            tracing::error!(reason = %reason, "session renewal failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                jar.add(removal_cookie()),
                "Authentication failed",
            )
                .into_response()
        }
        SessionGate::Authenticated { user, record: _ } => {
            let session_user = SessionUser {
                id: user.id(),
                display_name: user.display_name().to_string(),
                avatar_url: user.avatar_url().map(ToString::to_string),
                username: user.username().map(ToString::to_string),
                is_admin: user.is_admin(),
            };
            request.extensions_mut().insert(identity(Some(session_user)));
            next.run(request).await
        }
    }
}

fn request_identity(state: &AppState, from: &str, user: Option<SessionUser>) -> RequestIdentity {
    let encoded_from: String = url::form_urlencoded::byte_serialize(from.as_bytes()).collect();
    let signed_from: String =
        url::form_urlencoded::byte_serialize(state.codec.sign(from).as_bytes()).collect();

    let login_links = state
        .registry
        .slugs()
        .into_iter()
        .filter_map(|slug| {
            state.registry.get(&slug).map(|provider| LoginLink {
                name: provider.descriptor().name.clone(),
                href: format!("/auth/login?provider={slug}&from={encoded_from}"),
                provider: slug,
            })
        })
        .collect();

    RequestIdentity {
        user,
        login_links,
        logout_link: format!("/auth/logout?from={signed_from}"),
    }
}

/// An expired cookie that overwrites the session cookie.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(TimeDuration::ZERO)
        .build()
}

/// Extractor for requiring an authenticated user.
pub struct RequireAuth(pub SessionUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts
            .extensions
            .get::<RequestIdentity>()
            .ok_or(AuthRejection::MiddlewareMissing)?;

        identity
            .user
            .clone()
            .map(RequireAuth)
            .ok_or(AuthRejection::NotAuthenticated)
    }
}

/// Extractor for optionally getting the authenticated user.
pub struct OptionalUser(pub Option<SessionUser>);

impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalUser(
            parts
                .extensions
                .get::<RequestIdentity>()
                .and_then(|identity| identity.user.clone()),
        ))
    }
}

/// Extractor for requiring an authenticated admin user.
pub struct RequireAdmin(pub SessionUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        if !user.is_admin {
            return Err(AuthRejection::AdminRequired);
        }

        Ok(RequireAdmin(user))
    }
}

/// Rejection type for authentication extractors.
#[derive(Debug)]
pub enum AuthRejection {
    NotAuthenticated,
    AdminRequired,
    MiddlewareMissing,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::NotAuthenticated => {
                (StatusCode::FORBIDDEN, "Authentication required").into_response()
            }
            Self::AdminRequired => (StatusCode::FORBIDDEN, "Admin access required").into_response(),
            Self::MiddlewareMissing => {
                tracing::error!("auth extractor used without session middleware");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
