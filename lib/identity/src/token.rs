//! Opaque credential material and the profile snapshot taken alongside it.

use chrono::{DateTime, Duration, Utc};

/// Credential material obtained from a provider.
///
/// `expires_at` is `None` for providers whose tokens never expire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl Token {
    #[must_use]
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at,
        }
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
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether the token expires within `lead` of `now`.
    ///
    /// Tokens without an expiry never report as expiring.
    #[must_use]
    pub fn expires_within(&self, lead: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at - now < lead)
    }
}

/// Display information captured from a provider's profile endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub username: Option<String>,
}
