//! The authentication lifecycle service.
//!
//! Ties providers and the record store together: interactive logins,
//! background re-verification, token renewal, and the per-request
//! session state machine.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use encore_core::UserId;

use crate::error::{AuthError, StoreError};
use crate::provider::{OauthProvider, ProviderRegistry};
use crate::record::{AuthRecord, refresh_lead};
use crate::signed::SignedValueCodec;
use crate::store::AuthStore;
use crate::token::Token;
use crate::user::User;

/// Outcome of evaluating a session cookie for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionGate {
    /// No cookie was presented; the request proceeds anonymously.
    Anonymous,
    /// The cookie or its backing state is no longer usable; the cookie
    /// must be cleared and the request proceeds anonymously.
    ClearCookie,
    /// A synchronous credential renewal failed; the request must abort.
    RenewFailed { reason: String },
    /// A live session.
    Authenticated { user: User, record: AuthRecord },
}

/// Authentication lifecycle operations over a record store.
pub struct AuthService<S> {
    store: Arc<S>,
}

impl<S> Clone for AuthService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: AuthStore> AuthService<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Verifies a token against its provider and persists the result.
    ///
    /// The provider identity behind `token` is fetched (renewing the
    /// token first when it is close to expiry) and the matching record
    /// is created or updated with fresh credentials and profile.
    pub async fn ensure_authenticated(
        &self,
        provider: &Arc<dyn OauthProvider>,
        token: Token,
    ) -> Result<AuthRecord, AuthError> {
        self.ensure_inner(provider, token, None).await
    }

    /// Re-verifies an existing record against its provider.
    ///
    /// On identity-fetch failure the record is marked invalid and the
    /// failure is returned; the user must log in again.
    pub async fn reauthenticate(
        &self,
        provider: &Arc<dyn OauthProvider>,
        record: AuthRecord,
    ) -> Result<AuthRecord, AuthError> {
        let token = record.token();
        self.ensure_inner(provider, token, Some(record)).await
    }

    async fn ensure_inner(
        &self,
        provider: &Arc<dyn OauthProvider>,
        token: Token,
        existing: Option<AuthRecord>,
    ) -> Result<AuthRecord, AuthError> {
        let slug = provider.descriptor().slug.clone();
        let now = Utc::now();

        // A token about to expire is renewed before the identity fetch.
        // Renewal failure is not fatal here: the old token may still be
        // accepted, and the fetch below decides.
        let token = if token.expires_within(refresh_lead(), now) {
            match provider.refresh_token(&token).await {
                Ok(fresh) => fresh,
                Err(e) => {
                    tracing::warn!(provider = %slug, error = %e, "pre-fetch token renewal failed");
                    token
                }
            }
        } else {
            token
        };

        let identity = match provider.fetch_identity(&token).await {
            Ok(identity) => identity,
            Err(e) => {
                if let Some(mut record) = existing {
                    tracing::warn!(
                        provider = %slug,
                        record = %record.id(),
                        error = %e,
                        "identity fetch failed, invalidating record"
                    );
                    record.mark_invalid();
                    self.store.upsert_record(&record).await?;
                }
                return Err(e.into());
            }
        };

        let record = match self
            .store
            .find_record_by_identity(&slug, &identity.provider_identity_id)
            .await?
        {
            Some(mut record) => {
                record.update_from_exchange(&token, &identity.profile);
                record
            }
            None => AuthRecord::new(slug, &identity, &token),
        };

        Ok(self.store.upsert_record(&record).await?)
    }

    /// Renews a record's token if it is close to expiry.
    ///
    /// Invalid records fail immediately with `AuthInvalid` and no
    /// provider traffic. A failed renewal invalidates the record.
    pub async fn renew_if_needed(
        &self,
        provider: &Arc<dyn OauthProvider>,
        mut record: AuthRecord,
    ) -> Result<AuthRecord, AuthError> {
        if !record.is_valid() {
            return Err(AuthError::AuthInvalid {
                record: record.id(),
            });
        }

        if !record.has_expiring_token() || !record.is_expiring_soon(Utc::now()) {
            return Ok(record);
        }

        match provider.refresh_token(&record.token()).await {
            Ok(token) => {
                record.apply_refresh(&token);
                Ok(self.store.upsert_record(&record).await?)
            }
            Err(e) => {
                tracing::warn!(
                    provider = %record.provider(),
                    record = %record.id(),
                    error = %e,
                    "token renewal failed, invalidating record"
                );
                record.mark_invalid();
                self.store.upsert_record(&record).await?;
                Err(e.into())
            }
        }
    }

    /// Resolves a freshly verified record to an application user.
    ///
    /// A logged-in user completing the dance for a different provider
    /// gets the record linked as a secondary identity. Otherwise the
    /// record's owner is found, or a user is created; the first user
    /// ever created is promoted to admin.
    pub async fn login_or_link(
        &self,
        record: &AuthRecord,
        current_user: Option<User>,
    ) -> Result<User, StoreError> {
        if let Some(mut user) = current_user {
            // Linking is reserved for an identity from another provider.
            // A second account on the same provider is a plain login as
            // whoever owns that record.
            let active_provider = self
                .store
                .find_record(user.active_auth_record_id())
                .await?
                .map(|active| active.provider().to_string());
            if active_provider.is_some_and(|provider| provider != record.provider()) {
                user.link_record(record.id());
                self.store.update_user(&user).await?;
                return Ok(user);
            }
        }

        match self.store.find_user_by_record(record.id()).await? {
            Some(mut user) => {
                user.set_profile(&crate::token::UserProfile {
                    display_name: record.display_name().to_string(),
                    avatar_url: record.avatar_url().map(ToString::to_string),
                    username: record.username().map(ToString::to_string),
                });
                self.store.update_user(&user).await?;
                Ok(user)
            }
            None => {
                let is_admin = self.store.count_users().await? == 0;
                let profile = crate::token::UserProfile {
                    display_name: record.display_name().to_string(),
                    avatar_url: record.avatar_url().map(ToString::to_string),
                    username: record.username().map(ToString::to_string),
                };
                let user = User::new(record.id(), &profile, is_admin);
                self.store.create_user(&user).await?;
                if is_admin {
                    tracing::info!(user = %user.id(), "first user promoted to admin");
                }
                Ok(user)
            }
        }
    }

    /// The per-request session state machine, free of HTTP concerns.
    ///
    /// Evaluates the raw session cookie value (if any) and decides what
    /// the request should see. Store failures surface as errors; every
    /// authentication downgrade is a `SessionGate` variant.
    pub async fn authenticate_cookie(
        &self,
        codec: &SignedValueCodec,
        registry: &ProviderRegistry,
        raw_cookie: Option<&str>,
    ) -> Result<SessionGate, StoreError> {
        let Some(raw) = raw_cookie else {
            return Ok(SessionGate::Anonymous);
        };

        let payload = match codec.verify(raw) {
            Ok(payload) => payload,
            Err(_) => return Ok(SessionGate::ClearCookie),
        };

        let Ok(user_id) = UserId::from_str(&payload) else {
            tracing::warn!("session cookie payload is not a user id");
            return Ok(SessionGate::ClearCookie);
        };

        let Some(mut user) = self.store.find_user(user_id).await? else {
            return Ok(SessionGate::ClearCookie);
        };

        let Some(record) = self.store.find_record(user.active_auth_record_id()).await? else {
            tracing::warn!(user = %user.id(), "active auth record missing");
            return Ok(SessionGate::ClearCookie);
        };

        if !record.is_valid() {
            return Ok(SessionGate::ClearCookie);
        }

        let Some(provider) = registry.get(record.provider()) else {
            tracing::warn!(provider = %record.provider(), "session backed by unconfigured provider");
            return Ok(SessionGate::ClearCookie);
        };

        let now = Utc::now();
        let record = if record.is_stale(provider.descriptor().reauth_interval, now) {
            match self.reauthenticate(provider, record).await {
                Ok(record) => record,
                Err(AuthError::Store(e)) => return Err(e),
                Err(e) => {
                    return Ok(SessionGate::RenewFailed {
                        reason: e.to_string(),
                    });
                }
            }
        } else {
            record
        };

        if user.needs_last_seen_update(now) {
            user.touch_last_seen(now);
            if let Err(e) = self.store.update_user(&user).await {
                tracing::warn!(user = %user.id(), error = %e, "last-seen update failed");
            }
        }

        Ok(SessionGate::Authenticated { user, record })
    }
}
