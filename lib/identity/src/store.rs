//! The persistence seam for auth records and users.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use encore_core::{AuthRecordId, UserId};

use crate::error::StoreError;
use crate::record::AuthRecord;
use crate::user::User;

/// Storage backend for auth records and users.
///
/// Implementations must keep `(provider, provider_identity_id)` unique
/// across records: concurrent upserts for the same identity converge on
/// a single stored record.
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn find_record(&self, id: AuthRecordId) -> Result<Option<AuthRecord>, StoreError>;

    async fn find_record_by_identity(
        &self,
        provider: &str,
        provider_identity_id: &str,
    ) -> Result<Option<AuthRecord>, StoreError>;

    /// Inserts or updates a record, keyed on its provider identity.
    ///
    /// When another record already holds the same identity, its fields
    /// are overwritten but its stored ID is preserved; the returned
    /// record reflects what is actually stored.
    async fn upsert_record(&self, record: &AuthRecord) -> Result<AuthRecord, StoreError>;

    /// Valid records for `provider` last verified before `cutoff`.
    async fn find_overdue_records(
        &self,
        provider: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<AuthRecord>, StoreError>;

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Finds the user whose active or linked record is `record_id`.
    async fn find_user_by_record(
        &self,
        record_id: AuthRecordId,
    ) -> Result<Option<User>, StoreError>;

    async fn create_user(&self, user: &User) -> Result<(), StoreError>;

    async fn update_user(&self, user: &User) -> Result<(), StoreError>;

    async fn count_users(&self) -> Result<u64, StoreError>;
}
