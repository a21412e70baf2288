//! In-memory store and scriptable provider for service-level tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use encore_core::{AuthRecordId, UserId};

use crate::error::{ProviderError, StoreError};
use crate::provider::{OauthProvider, ProviderDescriptor, ProviderIdentity};
use crate::record::AuthRecord;
use crate::store::AuthStore;
use crate::token::{Token, UserProfile};
use crate::user::User;

#[derive(Default)]
pub(crate) struct InMemoryStore {
    records: Mutex<HashMap<AuthRecordId, AuthRecord>>,
    users: Mutex<HashMap<UserId, User>>,
}

impl InMemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_count(&self) -> usize {
        self.records.lock().expect("lock").len()
    }

    pub(crate) fn user_count(&self) -> usize {
        self.users.lock().expect("lock").len()
    }

    pub(crate) fn record_by_id(&self, id: AuthRecordId) -> Option<AuthRecord> {
        self.records.lock().expect("lock").get(&id).cloned()
    }

    pub(crate) fn user_by_id(&self, id: UserId) -> Option<User> {
        self.users.lock().expect("lock").get(&id).cloned()
    }

    pub(crate) fn put_record(&self, record: AuthRecord) -> AuthRecord {
        self.records
            .lock()
            .expect("lock")
            .insert(record.id(), record.clone());
        record
    }

    pub(crate) fn invalidate_record(&self, id: AuthRecordId) {
        let mut records = self.records.lock().expect("lock");
        if let Some(record) = records.get_mut(&id) {
            record.mark_invalid();
        }
    }

    pub(crate) fn backdate_record(&self, id: AuthRecordId, age: Duration) {
        let mut records = self.records.lock().expect("lock");
        if let Some(record) = records.get(&id) {
            let backdated = AuthRecord::with_all_fields(
                record.id(),
                record.provider().to_string(),
                record.provider_identity_id().to_string(),
                record.access_token().to_string(),
                record.refresh_token().map(ToString::to_string),
                record.token_expiry(),
                record.is_valid(),
                Utc::now() - age,
                record.display_name().to_string(),
                record.avatar_url().map(ToString::to_string),
                record.username().map(ToString::to_string),
                record.created_at(),
                record.updated_at(),
            );
            records.insert(id, backdated);
        }
    }

    pub(crate) fn backdate_user_last_seen(&self, id: UserId, age: Duration) {
        let mut users = self.users.lock().expect("lock");
        if let Some(user) = users.get(&id) {
            let backdated = User::with_all_fields(
                user.id(),
                user.active_auth_record_id(),
                user.linked_auth_record_id(),
                user.display_name().to_string(),
                user.avatar_url().map(ToString::to_string),
                user.username().map(ToString::to_string),
                user.is_admin(),
                Utc::now() - age,
                user.created_at(),
                user.updated_at(),
            );
            users.insert(id, backdated);
        }
    }
}

#[async_trait]
impl AuthStore for InMemoryStore {
    async fn find_record(&self, id: AuthRecordId) -> Result<Option<AuthRecord>, StoreError> {
        Ok(self.record_by_id(id))
    }

    async fn find_record_by_identity(
        &self,
        provider: &str,
        provider_identity_id: &str,
    ) -> Result<Option<AuthRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .expect("lock")
            .values()
            .find(|r| {
                r.provider() == provider && r.provider_identity_id() == provider_identity_id
            })
            .cloned())
    }

    async fn upsert_record(&self, record: &AuthRecord) -> Result<AuthRecord, StoreError> {
        let mut records = self.records.lock().expect("lock");
        // Converge on the already-stored ID for the same identity.
        let stored_id = records
            .values()
            .find(|r| {
                r.provider() == record.provider()
                    && r.provider_identity_id() == record.provider_identity_id()
            })
            .map(AuthRecord::id)
            .unwrap_or_else(|| record.id());

        let stored = AuthRecord::with_all_fields(
            stored_id,
            record.provider().to_string(),
            record.provider_identity_id().to_string(),
            record.access_token().to_string(),
            record.refresh_token().map(ToString::to_string),
            record.token_expiry(),
            record.is_valid(),
            record.last_authenticated_at(),
            record.display_name().to_string(),
            record.avatar_url().map(ToString::to_string),
            record.username().map(ToString::to_string),
            record.created_at(),
            record.updated_at(),
        );
        records.insert(stored_id, stored.clone());
        Ok(stored)
    }

    async fn find_overdue_records(
        &self,
        provider: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<AuthRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .expect("lock")
            .values()
            .filter(|r| {
                r.provider() == provider && r.is_valid() && r.last_authenticated_at() < cutoff
            })
            .cloned()
            .collect())
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.user_by_id(id))
    }

    async fn find_user_by_record(
        &self,
        record_id: AuthRecordId,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .expect("lock")
            .values()
            .find(|u| {
                u.active_auth_record_id() == record_id
                    || u.linked_auth_record_id() == Some(record_id)
            })
            .cloned())
    }

    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        self.users
            .lock()
            .expect("lock")
            .insert(user.id(), user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        self.users
            .lock()
            .expect("lock")
            .insert(user.id(), user.clone());
        Ok(())
    }

    async fn count_users(&self) -> Result<u64, StoreError> {
        Ok(self.user_count() as u64)
    }
}

/// A scriptable provider with call counters and failure switches.
pub(crate) struct MockProvider {
    descriptor: ProviderDescriptor,
    identity_suffix: Mutex<String>,
    bound_identities: Mutex<HashMap<String, String>>,
    profile: Mutex<UserProfile>,
    fail_identity: std::sync::atomic::AtomicBool,
    fail_refresh: std::sync::atomic::AtomicBool,
    exchange_calls: AtomicUsize,
    identity_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
}

impl MockProvider {
    pub(crate) fn new(slug: &str, reauth_interval: Duration) -> Self {
        Self {
            descriptor: ProviderDescriptor::new(
                slug,
                "client-id".to_string(),
                "client-secret".to_string(),
                format!("https://{slug}.test/authorize"),
                format!("https://{slug}.test/token"),
                Vec::new(),
                format!("https://app.test/auth/callback/{slug}"),
                reauth_interval,
            )
            .expect("valid descriptor"),
            identity_suffix: Mutex::new("1".to_string()),
            bound_identities: Mutex::new(HashMap::new()),
            profile: Mutex::new(UserProfile {
                display_name: "Mock User".to_string(),
                avatar_url: None,
                username: Some("mock".to_string()),
            }),
            fail_identity: std::sync::atomic::AtomicBool::new(false),
            fail_refresh: std::sync::atomic::AtomicBool::new(false),
            exchange_calls: AtomicUsize::new(0),
            identity_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn fail_identity(&self, fail: bool) {
        self.fail_identity.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_refresh(&self, fail: bool) {
        self.fail_refresh.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_identity_suffix(&self, suffix: &str) {
        *self.identity_suffix.lock().expect("lock") = suffix.to_string();
    }

    /// Pins the identity suffix returned for a given access token, so
    /// several live identities can coexist on one provider.
    pub(crate) fn bind_token(&self, access_token: &str, suffix: &str) {
        self.bound_identities
            .lock()
            .expect("lock")
            .insert(access_token.to_string(), suffix.to_string());
    }

    pub(crate) fn set_profile(&self, profile: UserProfile) {
        *self.profile.lock().expect("lock") = profile;
    }

    pub(crate) fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn identity_calls(&self) -> usize {
        self.identity_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.exchange_calls() + self.identity_calls() + self.refresh_calls()
    }
}

#[async_trait]
impl OauthProvider for MockProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn login_url(&self, state: &str) -> String {
        format!("{}?state={state}", self.descriptor.auth_url)
    }

    async fn exchange_code(&self, _code: &str) -> Result<Token, ProviderError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Token::new(
            "exchanged-access-token".to_string(),
            Some("exchanged-refresh-token".to_string()),
            Some(Utc::now() + Duration::hours(1)),
        ))
    }

    async fn fetch_identity(&self, token: &Token) -> Result<ProviderIdentity, ProviderError> {
        self.identity_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_identity.load(Ordering::SeqCst) {
            return Err(ProviderError::IdentityTransport {
                provider: self.descriptor.slug.clone(),
                reason: "scripted failure".to_string(),
            });
        }
        let suffix = self
            .bound_identities
            .lock()
            .expect("lock")
            .get(token.access_token())
            .cloned()
            .unwrap_or_else(|| self.identity_suffix.lock().expect("lock").clone());
        Ok(ProviderIdentity {
            provider_identity_id: format!("{}/{suffix}", self.descriptor.slug),
            profile: self.profile.lock().expect("lock").clone(),
        })
    }

    async fn refresh_token(&self, token: &Token) -> Result<Token, ProviderError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(ProviderError::Refresh {
                provider: self.descriptor.slug.clone(),
                reason: "scripted failure".to_string(),
            });
        }
        Ok(Token::new(
            "refreshed-access-token".to_string(),
            token
                .refresh_token()
                .map(ToString::to_string)
                .or(Some("refreshed-refresh-token".to_string())),
            Some(Utc::now() + Duration::hours(1)),
        ))
    }
}
