//! Auth records: one stored credential set per linked provider identity.

use chrono::{DateTime, Duration, Utc};
use encore_core::AuthRecordId;

use crate::provider::ProviderIdentity;
use crate::token::{Token, UserProfile};

/// Renew tokens this far ahead of their expiry.
#[must_use]
pub fn refresh_lead() -> Duration {
    Duration::minutes(5)
}

/// One authenticated link between a provider identity and its credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRecord {
    id: AuthRecordId,
    provider: String,
    provider_identity_id: String,
    access_token: String,
    refresh_token: Option<String>,
    token_expiry: Option<DateTime<Utc>>,
    is_valid: bool,
    last_authenticated_at: DateTime<Utc>,
    display_name: String,
    avatar_url: Option<String>,
    username: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AuthRecord {
    /// Creates a fresh, valid record from a completed login.
    #[must_use]
    pub fn new(provider: String, identity: &ProviderIdentity, token: &Token) -> Self {
        let now = Utc::now();
        Self {
            id: AuthRecordId::new(),
            provider,
            provider_identity_id: identity.provider_identity_id.clone(),
            access_token: token.access_token().to_string(),
            refresh_token: token.refresh_token().map(ToString::to_string),
            token_expiry: token.expires_at(),
            is_valid: true,
            last_authenticated_at: now,
            display_name: identity.profile.display_name.clone(),
            avatar_url: identity.profile.avatar_url.clone(),
            username: identity.profile.username.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstructs a record from stored fields.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn with_all_fields(
        id: AuthRecordId,
        provider: String,
        provider_identity_id: String,
        access_token: String,
        refresh_token: Option<String>,
        token_expiry: Option<DateTime<Utc>>,
        is_valid: bool,
        last_authenticated_at: DateTime<Utc>,
        display_name: String,
        avatar_url: Option<String>,
        username: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            provider,
            provider_identity_id,
            access_token,
            refresh_token,
            token_expiry,
            is_valid,
            last_authenticated_at,
            display_name,
            avatar_url,
            username,
            created_at,
            updated_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> AuthRecordId {
        self.id
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    #[must_use]
    pub fn provider_identity_id(&self) -> &str {
        &self.provider_identity_id
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    #[must_use]
    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        self.token_expiry
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    #[must_use]
    pub fn last_authenticated_at(&self) -> DateTime<Utc> {
        self.last_authenticated_at
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// The stored credential material as a token value.
    #[must_use]
    pub fn token(&self) -> Token {
        Token::new(
            self.access_token.clone(),
            self.refresh_token.clone(),
            self.token_expiry,
        )
    }

    /// Whether this record's token can go stale at all.
    ///
    /// Records with neither a refresh token nor an expiry hold
    /// non-expiring credentials and are never renewed.
    #[must_use]
    pub fn has_expiring_token(&self) -> bool {
        self.refresh_token.is_some() || self.token_expiry.is_some()
    }

    /// Whether the token expires within the renewal lead of `now`.
    #[must_use]
    pub fn is_expiring_soon(&self, now: DateTime<Utc>) -> bool {
        self.has_expiring_token()
            && self
                .token_expiry
                .is_some_and(|expiry| expiry - now < refresh_lead())
    }

    /// Whether the identity was last verified longer than `interval` ago.
    #[must_use]
    pub fn is_stale(&self, interval: Duration, now: DateTime<Utc>) -> bool {
        now - self.last_authenticated_at > interval
    }

    /// Applies a fresh login or re-verification of the identity.
    pub fn update_from_exchange(&mut self, token: &Token, profile: &UserProfile) {
        let now = Utc::now();
        self.access_token = token.access_token().to_string();
        self.refresh_token = token.refresh_token().map(ToString::to_string);
        self.token_expiry = token.expires_at();
        self.display_name = profile.display_name.clone();
        self.avatar_url = profile.avatar_url.clone();
        self.username = profile.username.clone();
        self.is_valid = true;
        self.last_authenticated_at = now;
        self.updated_at = now;
    }

    /// Applies a token refresh without touching profile or verification time.
    pub fn apply_refresh(&mut self, token: &Token) {
        self.access_token = token.access_token().to_string();
        self.refresh_token = token.refresh_token().map(ToString::to_string);
        self.token_expiry = token.expires_at();
        self.updated_at = Utc::now();
    }

    /// Marks the record's credentials as bad.
    ///
    /// Once invalid, the record stays invalid until the user completes
    /// a fresh interactive login.
    pub fn mark_invalid(&mut self) {
        self.is_valid = false;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> ProviderIdentity {
        ProviderIdentity {
            provider_identity_id: "acme/42".to_string(),
            profile: UserProfile {
                display_name: "Ada".to_string(),
                avatar_url: Some("https://acme.test/ada.png".to_string()),
                username: Some("ada".to_string()),
            },
        }
    }

    fn expiring_token(now: DateTime<Utc>, expires_in: Duration) -> Token {
        Token::new(
            "at".to_string(),
            Some("rt".to_string()),
            Some(now + expires_in),
        )
    }

    #[test]
    fn new_record_is_valid() {
        let token = expiring_token(Utc::now(), Duration::hours(1));
        let record = AuthRecord::new("acme".to_string(), &identity(), &token);
        assert!(record.is_valid());
        assert_eq!(record.provider(), "acme");
        assert_eq!(record.provider_identity_id(), "acme/42");
        assert_eq!(record.display_name(), "Ada");
    }

    #[test]
    fn non_expiring_record_never_expires_soon() {
        let token = Token::new("at".to_string(), None, None);
        let record = AuthRecord::new("songkick".to_string(), &identity(), &token);
        assert!(!record.has_expiring_token());
        assert!(!record.is_expiring_soon(Utc::now() + Duration::days(365)));
    }

    #[test]
    fn record_expiring_within_lead() {
        let now = Utc::now();
        let token = expiring_token(now, Duration::minutes(3));
        let record = AuthRecord::new("acme".to_string(), &identity(), &token);
        assert!(record.is_expiring_soon(now));
    }

    #[test]
    fn record_not_expiring_outside_lead() {
        let now = Utc::now();
        let token = expiring_token(now, Duration::hours(1));
        let record = AuthRecord::new("acme".to_string(), &identity(), &token);
        assert!(!record.is_expiring_soon(now));
    }

    #[test]
    fn staleness_follows_interval() {
        let now = Utc::now();
        let token = expiring_token(now, Duration::hours(1));
        let record = AuthRecord::new("acme".to_string(), &identity(), &token);
        assert!(!record.is_stale(Duration::minutes(15), now));
        assert!(record.is_stale(Duration::minutes(15), now + Duration::minutes(16)));
    }

    #[test]
    fn mark_invalid_sticks() {
        let token = expiring_token(Utc::now(), Duration::hours(1));
        let mut record = AuthRecord::new("acme".to_string(), &identity(), &token);
        record.mark_invalid();
        assert!(!record.is_valid());
    }

    #[test]
    fn update_from_exchange_revalidates() {
        let now = Utc::now();
        let token = expiring_token(now, Duration::hours(1));
        let mut record = AuthRecord::new("acme".to_string(), &identity(), &token);
        record.mark_invalid();

        let new_token = expiring_token(now, Duration::hours(2));
        let new_profile = UserProfile {
            display_name: "Ada Lovelace".to_string(),
            avatar_url: None,
            username: Some("ada".to_string()),
        };
        record.update_from_exchange(&new_token, &new_profile);

        assert!(record.is_valid());
        assert_eq!(record.display_name(), "Ada Lovelace");
        assert_eq!(record.avatar_url(), None);
    }

    #[test]
    fn apply_refresh_keeps_verification_time() {
        let now = Utc::now();
        let token = expiring_token(now, Duration::minutes(3));
        let mut record = AuthRecord::new("acme".to_string(), &identity(), &token);
        let last_auth = record.last_authenticated_at();

        record.apply_refresh(&expiring_token(now, Duration::hours(1)));

        assert_eq!(record.last_authenticated_at(), last_auth);
        assert!(!record.is_expiring_soon(now));
    }

    #[test]
    fn token_round_trips_stored_fields() {
        let now = Utc::now();
        let token = expiring_token(now, Duration::hours(1));
        let record = AuthRecord::new("acme".to_string(), &identity(), &token);
        assert_eq!(record.token(), token);
    }
}
