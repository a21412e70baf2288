//! Authentication wiring for the encore server.
//!
//! This module provides:
//! - The Postgres-backed record store
//! - Session middleware and extractors for Axum routes
//! - Login, callback, and logout routes
//!
//! Identity lifecycle semantics live in `encore-identity`; everything
//! here adapts them to HTTP and Postgres.

pub mod db;
pub mod middleware;
pub mod routes;

pub use db::PgAuthStore;
pub use middleware::{
    OptionalUser, RequestIdentity, RequireAdmin, RequireAuth, SessionUser, authenticate,
};
pub use routes::{callback, login, logout, whoami};

use std::sync::Arc;

use encore_identity::providers::{GoogleProvider, SongkickProvider, SpotifyProvider};
use encore_identity::{AuthService, ProviderError, ProviderRegistry, SignedValueCodec};

use crate::config::{ProvidersConfig, SessionConfig};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Authentication lifecycle service over the Postgres store.
    pub service: AuthService<PgAuthStore>,
    /// Configured identity providers.
    pub registry: ProviderRegistry,
    /// Codec for session cookies and OAuth state.
    pub codec: SignedValueCodec,
    /// Session configuration.
    pub session: SessionConfig,
}

impl AppState {
    /// Creates a new application state.
    #[must_use]
    pub fn new(
        service: AuthService<PgAuthStore>,
        registry: ProviderRegistry,
        codec: SignedValueCodec,
        session: SessionConfig,
    ) -> Self {
        Self {
            service,
            registry,
            codec,
            session,
        }
    }
}

/// Builds the provider registry from configured credentials.
///
/// Each provider's redirect URL is derived from the server's public
/// base URL and the provider's slug. A base URL that does not form a
/// valid redirect URL is rejected here, at startup.
pub fn build_registry(
    base_url: &str,
    providers: &ProvidersConfig,
) -> Result<ProviderRegistry, ProviderError> {
    let base = base_url.trim_end_matches('/');
    let mut registry = ProviderRegistry::new();

    if let Some(creds) = &providers.google {
        registry.register(Arc::new(GoogleProvider::new(
            creds.client_id.clone(),
            creds.client_secret.clone(),
            format!("{base}/auth/callback/google"),
        )?));
    }

    if let Some(creds) = &providers.spotify {
        registry.register(Arc::new(SpotifyProvider::new(
            creds.client_id.clone(),
            creds.client_secret.clone(),
            format!("{base}/auth/callback/spotify"),
        )?));
    }

    if let Some(creds) = &providers.songkick {
        registry.register(Arc::new(SongkickProvider::new(
            creds.client_id.clone(),
            creds.client_secret.clone(),
            creds.api_key.clone(),
            format!("{base}/auth/callback/songkick"),
        )?));
    }

    if registry.is_empty() {
        tracing::warn!("no identity providers configured, login is unavailable");
    }

    Ok(registry)
}
