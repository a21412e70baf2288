//! Periodic re-verification of stored identities.

use chrono::Utc;

use crate::provider::ProviderRegistry;
use crate::service::AuthService;
use crate::store::AuthStore;

/// Counters from one reauth sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReauthSummary {
    pub renewed: usize,
    pub failed: usize,
}

/// Runs one sweep over every configured provider.
///
/// For each provider, records whose last verification predates the
/// provider's reauth interval are re-verified. Individual failures are
/// logged and counted; the sweep never aborts early.
pub async fn run_reauth_sweep<S: AuthStore>(
    service: &AuthService<S>,
    registry: &ProviderRegistry,
) -> ReauthSummary {
    let mut summary = ReauthSummary::default();
    let now = Utc::now();

    for (slug, provider) in registry.iter() {
        let cutoff = now - provider.descriptor().reauth_interval;
        let overdue = match service.store().find_overdue_records(slug, cutoff).await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(provider = %slug, error = %e, "overdue record lookup failed");
                continue;
            }
        };

        for record in overdue {
            let record_id = record.id();
            match service.reauthenticate(provider, record).await {
                Ok(_) => {
                    tracing::debug!(provider = %slug, record = %record_id, "record re-verified");
                    summary.renewed += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        provider = %slug,
                        record = %record_id,
                        error = %e,
                        "record re-verification failed"
                    );
                    summary.failed += 1;
                }
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::OauthProvider;
    use crate::testutil::{InMemoryStore, MockProvider};
    use crate::token::Token;
    use chrono::Duration;
    use std::sync::Arc;

    fn token() -> Token {
        Token::new(
            "at".to_string(),
            Some("rt".to_string()),
            Some(Utc::now() + Duration::hours(1)),
        )
    }

    #[tokio::test]
    async fn sweep_renews_only_overdue_records() {
        let service = AuthService::new(InMemoryStore::new());
        let mock = Arc::new(MockProvider::new("acme", Duration::minutes(15)));
        let provider: Arc<dyn OauthProvider> = mock.clone();
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::clone(&provider));

        // Three accounts on one provider, each behind its own token.
        let mut records = Vec::new();
        for n in 1..=3 {
            let access = format!("at-{n}");
            mock.bind_token(&access, &n.to_string());
            let token = Token::new(
                access,
                Some("rt".to_string()),
                Some(Utc::now() + Duration::hours(1)),
            );
            records.push(
                service
                    .ensure_authenticated(&provider, token)
                    .await
                    .expect("login"),
            );
        }
        let fresh = records.pop().expect("third record");
        for overdue in &records {
            service
                .store()
                .backdate_record(overdue.id(), Duration::minutes(20));
        }

        let calls_before = mock.identity_calls();
        let summary = run_reauth_sweep(&service, &registry).await;

        assert_eq!(summary, ReauthSummary { renewed: 2, failed: 0 });
        assert_eq!(mock.identity_calls(), calls_before + 2);

        // Both overdue records' verification times moved forward; the
        // fresh one is untouched.
        for overdue in &records {
            let renewed = service
                .store()
                .record_by_id(overdue.id())
                .expect("record stored");
            assert!(!renewed.is_stale(Duration::minutes(15), Utc::now()));
        }
        let untouched = service
            .store()
            .record_by_id(fresh.id())
            .expect("record stored");
        assert_eq!(
            untouched.last_authenticated_at(),
            fresh.last_authenticated_at()
        );
    }

    #[tokio::test]
    async fn sweep_counts_failures_and_continues() {
        let service = AuthService::new(InMemoryStore::new());
        let mock = Arc::new(MockProvider::new("acme", Duration::minutes(15)));
        let provider: Arc<dyn OauthProvider> = mock.clone();
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::clone(&provider));

        let record = service
            .ensure_authenticated(&provider, token())
            .await
            .expect("login");
        service
            .store()
            .backdate_record(record.id(), Duration::minutes(20));
        mock.fail_identity(true);

        let summary = run_reauth_sweep(&service, &registry).await;
        assert_eq!(summary, ReauthSummary { renewed: 0, failed: 1 });

        // Failure invalidated the record; the next sweep skips it.
        let summary = run_reauth_sweep(&service, &registry).await;
        assert_eq!(summary, ReauthSummary { renewed: 0, failed: 0 });
    }

    #[tokio::test]
    async fn sweep_over_empty_registry_is_a_no_op() {
        let service: AuthService<InMemoryStore> = AuthService::new(InMemoryStore::new());
        let summary = run_reauth_sweep(&service, &ProviderRegistry::new()).await;
        assert_eq!(summary, ReauthSummary::default());
    }
}
