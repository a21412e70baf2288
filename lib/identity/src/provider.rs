//! The provider seam: the trait each OAuth provider implements, the
//! descriptor of its endpoints, and shared helpers for the OAuth dance.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, RefreshToken,
    Scope, TokenResponse, TokenUrl, basic::BasicClient,
};

use crate::error::ProviderError;
use crate::token::{Token, UserProfile};

/// Timeout applied to all outbound provider requests.
const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Static description of a provider's OAuth endpoints and credentials.
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    pub name: String,
    pub slug: String,
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
    pub redirect_url: String,
    /// How often an identity from this provider must be re-verified.
    pub reauth_interval: Duration,
}

impl ProviderDescriptor {
    /// Builds a descriptor, validating the endpoint and redirect URLs.
    ///
    /// A descriptor that constructs successfully can always build its
    /// OAuth clients, so a bad URL fails here rather than on a request.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        client_id: String,
        client_secret: String,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
        scopes: Vec<String>,
        redirect_url: String,
        reauth_interval: Duration,
    ) -> Result<Self, ProviderError> {
        let name = name.into();
        let slug = slugify(&name);
        let auth_url = auth_url.into();
        let token_url = token_url.into();
        let invalid = |what: &str, e: oauth2::url::ParseError| ProviderError::Configuration {
            provider: slug.clone(),
            reason: format!("invalid {what}: {e}"),
        };
        AuthUrl::new(auth_url.clone()).map_err(|e| invalid("auth URL", e))?;
        TokenUrl::new(token_url.clone()).map_err(|e| invalid("token URL", e))?;
        RedirectUrl::new(redirect_url.clone()).map_err(|e| invalid("redirect URL", e))?;
        Ok(Self {
            name,
            slug,
            client_id,
            client_secret,
            auth_url,
            token_url,
            scopes,
            redirect_url,
            reauth_interval,
        })
    }
}

/// Derives a URL-safe slug from a provider's display name.
///
/// Lowercases, collapses runs of non-alphanumerics into single hyphens,
/// and trims leading and trailing hyphens.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// A provider-scoped identity together with its profile snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    /// Namespaced identity ID, `"<slug>/<provider's raw id>"`.
    ///
    /// The namespace keeps raw IDs from different providers from
    /// colliding in the store.
    pub provider_identity_id: String,
    pub profile: UserProfile,
}

/// One external OAuth identity provider.
#[async_trait]
pub trait OauthProvider: Send + Sync {
    /// The provider's endpoint and credential descriptor.
    fn descriptor(&self) -> &ProviderDescriptor;

    /// Builds the authorization URL carrying `state` for the user to visit.
    fn login_url(&self, state: &str) -> String;

    /// Exchanges an authorization code for credential material.
    async fn exchange_code(&self, code: &str) -> Result<Token, ProviderError>;

    /// Fetches the identity and profile behind `token`.
    async fn fetch_identity(&self, token: &Token) -> Result<ProviderIdentity, ProviderError>;

    /// Obtains fresh credential material for `token`.
    async fn refresh_token(&self, token: &Token) -> Result<Token, ProviderError>;
}

/// Builds an authorization URL for `descriptor`, embedding `state` verbatim.
#[must_use]
pub(crate) fn authorize_url(
    descriptor: &ProviderDescriptor,
    state: &str,
    extra_params: &[(&str, &str)],
) -> String {
    let client = BasicClient::new(ClientId::new(descriptor.client_id.clone()))
        .set_client_secret(ClientSecret::new(descriptor.client_secret.clone()))
        .set_auth_uri(AuthUrl::new(descriptor.auth_url.clone()).expect("URL checked at construction"))
        .set_redirect_uri(
            RedirectUrl::new(descriptor.redirect_url.clone())
                .expect("URL checked at construction"),
        );

    let state = state.to_string();
    let mut request = client.authorize_url(move || CsrfToken::new(state));
    for scope in &descriptor.scopes {
        request = request.add_scope(Scope::new(scope.clone()));
    }
    for (key, value) in extra_params {
        request = request.add_extra_param(*key, *value);
    }

    let (url, _csrf) = request.url();
    url.to_string()
}

/// Exchanges an authorization code against `descriptor`'s token endpoint.
pub(crate) async fn exchange_code(
    descriptor: &ProviderDescriptor,
    code: &str,
) -> Result<Token, ProviderError> {
    let http_client = http_client().map_err(|e| ProviderError::Exchange {
        provider: descriptor.slug.clone(),
        reason: e.to_string(),
    })?;

    let client = token_client(descriptor);

    let response = client
        .exchange_code(AuthorizationCode::new(code.to_string()))
        .request_async(&http_client)
        .await
        .map_err(|e| ProviderError::Exchange {
            provider: descriptor.slug.clone(),
            reason: e.to_string(),
        })?;

    Ok(token_from_response(&response, None))
}

/// Exchanges a refresh token for fresh credential material.
///
/// Providers that do not rotate refresh tokens omit one from the
/// response; the previous refresh token is carried forward.
pub(crate) async fn refresh(
    descriptor: &ProviderDescriptor,
    token: &Token,
) -> Result<Token, ProviderError> {
    let Some(refresh_token) = token.refresh_token() else {
        return Err(ProviderError::Refresh {
            provider: descriptor.slug.clone(),
            reason: "no refresh token on record".to_string(),
        });
    };

    let http_client = http_client().map_err(|e| ProviderError::Refresh {
        provider: descriptor.slug.clone(),
        reason: e.to_string(),
    })?;

    let client = token_client(descriptor);

    let response = client
        .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
        .request_async(&http_client)
        .await
        .map_err(|e| ProviderError::Refresh {
            provider: descriptor.slug.clone(),
            reason: e.to_string(),
        })?;

    Ok(token_from_response(&response, token.refresh_token()))
}

fn token_client(
    descriptor: &ProviderDescriptor,
) -> oauth2::basic::BasicClient<
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointSet,
> {
    BasicClient::new(ClientId::new(descriptor.client_id.clone()))
        .set_client_secret(ClientSecret::new(descriptor.client_secret.clone()))
        .set_token_uri(
            TokenUrl::new(descriptor.token_url.clone()).expect("URL checked at construction"),
        )
        .set_redirect_uri(
            RedirectUrl::new(descriptor.redirect_url.clone())
                .expect("URL checked at construction"),
        )
}

fn token_from_response(
    response: &oauth2::basic::BasicTokenResponse,
    previous_refresh: Option<&str>,
) -> Token {
    let access_token = response.access_token().secret().clone();
    let refresh_token = response
        .refresh_token()
        .map(|t| t.secret().clone())
        .or_else(|| previous_refresh.map(ToString::to_string));
    let expires_at = response.expires_in().and_then(|d| {
        Duration::from_std(d)
            .ok()
            .map(|lifetime| Utc::now() + lifetime)
    });

    Token::new(access_token, refresh_token, expires_at)
}

/// HTTP client for provider requests.
///
/// Redirects are disabled so token endpoints cannot bounce credentials
/// to a third party.
pub(crate) fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(HTTP_TIMEOUT)
        .build()
}

/// The set of configured providers, keyed by slug.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn OauthProvider>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn OauthProvider>) {
        let slug = provider.descriptor().slug.clone();
        self.providers.insert(slug, provider);
    }

    #[must_use]
    pub fn get(&self, slug: &str) -> Option<&Arc<dyn OauthProvider>> {
        self.providers.get(slug)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn OauthProvider>)> {
        self.providers.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Registered slugs in sorted order, for stable link rendering.
    #[must_use]
    pub fn slugs(&self) -> Vec<String> {
        let mut slugs: Vec<String> = self.providers.keys().cloned().collect();
        slugs.sort();
        slugs
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("slugs", &self.slugs())
            .finish()
    }
}
