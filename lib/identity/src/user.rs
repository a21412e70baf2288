//! Users: the application-level account an auth record logs in to.

use chrono::{DateTime, Duration, Utc};
use encore_core::{AuthRecordId, UserId};

use crate::token::UserProfile;

/// Minimum gap between persisted last-seen updates.
fn last_seen_interval() -> Duration {
    Duration::minutes(5)
}

/// An application user, backed by one active auth record and at most
/// one linked secondary record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    active_auth_record_id: AuthRecordId,
    linked_auth_record_id: Option<AuthRecordId>,
    display_name: String,
    avatar_url: Option<String>,
    username: Option<String>,
    is_admin: bool,
    last_seen_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a user for a first-time login via `record_id`.
    #[must_use]
    pub fn new(record_id: AuthRecordId, profile: &UserProfile, is_admin: bool) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            active_auth_record_id: record_id,
            linked_auth_record_id: None,
            display_name: profile.display_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            username: profile.username.clone(),
            is_admin,
            last_seen_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstructs a user from stored fields.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn with_all_fields(
        id: UserId,
        active_auth_record_id: AuthRecordId,
        linked_auth_record_id: Option<AuthRecordId>,
        display_name: String,
        avatar_url: Option<String>,
        username: Option<String>,
        is_admin: bool,
        last_seen_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            active_auth_record_id,
            linked_auth_record_id,
            display_name,
            avatar_url,
            username,
            is_admin,
            last_seen_at,
            created_at,
            updated_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn active_auth_record_id(&self) -> AuthRecordId {
        self.active_auth_record_id
    }

    #[must_use]
    pub fn linked_auth_record_id(&self) -> Option<AuthRecordId> {
        self.linked_auth_record_id
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
    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    #[must_use]
    pub fn last_seen_at(&self) -> DateTime<Utc> {
        self.last_seen_at
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Refreshes the user's display fields from a provider profile.
    pub fn set_profile(&mut self, profile: &UserProfile) {
        self.display_name = profile.display_name.clone();
        self.avatar_url = profile.avatar_url.clone();
        self.username = profile.username.clone();
        self.updated_at = Utc::now();
    }

    pub fn set_admin(&mut self, is_admin: bool) {
        self.is_admin = is_admin;
        self.updated_at = Utc::now();
    }

    /// Attaches a secondary provider's record to this user.
    pub fn link_record(&mut self, record_id: AuthRecordId) {
        self.linked_auth_record_id = Some(record_id);
        self.updated_at = Utc::now();
    }

    /// Whether enough time has passed since the persisted last-seen
    /// timestamp to warrant another write.
    #[must_use]
    pub fn needs_last_seen_update(&self, now: DateTime<Utc>) -> bool {
        now - self.last_seen_at > last_seen_interval()
    }

    pub fn touch_last_seen(&mut self, now: DateTime<Utc>) {
        self.last_seen_at = now;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile {
            display_name: "Ada".to_string(),
            avatar_url: None,
            username: Some("ada".to_string()),
        }
    }

    #[test]
    fn new_user_has_no_linked_record() {
        let user = User::new(AuthRecordId::new(), &profile(), false);
        assert!(user.linked_auth_record_id().is_none());
        assert!(!user.is_admin());
    }

    #[test]
    fn first_user_can_be_admin() {
        let user = User::new(AuthRecordId::new(), &profile(), true);
        assert!(user.is_admin());
    }

    #[test]
    fn link_record_attaches_secondary() {
        let mut user = User::new(AuthRecordId::new(), &profile(), false);
        let linked = AuthRecordId::new();
        user.link_record(linked);
        assert_eq!(user.linked_auth_record_id(), Some(linked));
    }

    #[test]
    fn last_seen_update_is_throttled() {
        let user = User::new(AuthRecordId::new(), &profile(), false);
        let now = user.last_seen_at();
        assert!(!user.needs_last_seen_update(now + Duration::minutes(2)));
        assert!(user.needs_last_seen_update(now + Duration::minutes(6)));
    }

    #[test]
    fn set_profile_updates_display_fields() {
        let mut user = User::new(AuthRecordId::new(), &profile(), false);
        user.set_profile(&UserProfile {
            display_name: "Ada Lovelace".to_string(),
            avatar_url: Some("https://acme.test/ada.png".to_string()),
            username: Some("ada".to_string()),
        });
        assert_eq!(user.display_name(), "Ada Lovelace");
        assert_eq!(user.avatar_url(), Some("https://acme.test/ada.png"));
    }
}
