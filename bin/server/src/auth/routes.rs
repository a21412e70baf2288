//! Authentication routes for login, callback, and logout.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration as TimeDuration;

use encore_identity::AuthStore;

use super::middleware::{OptionalUser, RequireAuth, SESSION_COOKIE, SessionUser, removal_cookie};
use super::AppState;
use crate::error::AuthFlowError;

/// Query parameters for starting a login.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    provider: String,
    from: Option<String>,
}

/// Query parameters for the OAuth callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: String,
    state: String,
}

/// Query parameters for logout.
#[derive(Debug, Deserialize)]
pub struct LogoutQuery {
    from: Option<String>,
}

/// Redirects to the provider's authorization page.
///
/// The return path travels through the provider inside the signed
/// `state` parameter, so the callback can trust it.
pub async fn login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> Result<Redirect, AuthFlowError> {
    let provider = state
        .registry
        .get(&query.provider)
        .ok_or_else(|| AuthFlowError::UnknownProvider(query.provider.clone()))?;

    let from = query.from.as_deref().unwrap_or("/");
    let signed_state = state.codec.sign(from);

    Ok(Redirect::to(&provider.login_url(&signed_state)))
}

/// Completes the OAuth dance for one provider.
pub async fn callback(
    State(state): State<AppState>,
    Path(provider_slug): Path<String>,
    Query(query): Query<CallbackQuery>,
    OptionalUser(current): OptionalUser,
    jar: CookieJar,
) -> Result<impl IntoResponse, AuthFlowError> {
    let provider = state
        .registry
        .get(&provider_slug)
        .ok_or_else(|| AuthFlowError::UnknownProvider(provider_slug.clone()))?;

    let from = state
        .codec
        .verify(&query.state)
        .map_err(|_| AuthFlowError::InvalidState)?;

    let token = provider
        .exchange_code(&query.code)
        .await
        .map_err(encore_identity::AuthError::from)?;

    let record = state.service.ensure_authenticated(provider, token).await?;

    // For a logged-in user the new record links to their account
    // instead of minting a fresh user.
    let current_user = match current {
        Some(session_user) => state.service.store().find_user(session_user.id).await?,
        None => None,
    };
    let user = state.service.login_or_link(&record, current_user).await?;

    tracing::info!(
        user = %user.id(),
        provider = %provider_slug,
        "login completed"
    );

    let session_cookie = Cookie::build((SESSION_COOKIE, state.codec.sign(&user.id().to_string())))
        .path("/")
        .http_only(true)
        .secure(state.session.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::days(state.session.cookie_lifetime_days));

    Ok((jar.add(session_cookie), Redirect::to(&from)))
}

/// Clears the session cookie and returns to the signed `from` path.
///
/// An unverifiable `from` falls back to `/` rather than failing; there
/// is nothing sensitive behind a logout.
pub async fn logout(
    State(state): State<AppState>,
    Query(query): Query<LogoutQuery>,
    jar: CookieJar,
) -> impl IntoResponse {
    let target = query
        .from
        .as_deref()
        .and_then(|signed| state.codec.verify(signed).ok())
        .unwrap_or_else(|| "/".to_string());

    (jar.add(removal_cookie()), Redirect::to(&target))
}

/// Returns the authenticated user as JSON.
pub async fn whoami(RequireAuth(user): RequireAuth) -> Json<SessionUser> {
    Json(user)
}
