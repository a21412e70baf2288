//! Songkick OAuth provider.
//!
//! Songkick issues non-expiring tokens with no refresh flow, and its
//! API requires an application API key on every request alongside the
//! user's OAuth token.

use async_trait::async_trait;
use chrono::Duration;
use serde::Deserialize;

use crate::error::ProviderError;
use crate::provider::{self, OauthProvider, ProviderDescriptor, ProviderIdentity};
use crate::token::{Token, UserProfile};

const AUTH_URL: &str = "https://www.songkick.com/oauth/login";
const TOKEN_URL: &str = "https://www.songkick.com/oauth/exchange";
const PROFILE_URL: &str = "https://api.songkick.com/api/3.0/users/:me.json";

pub struct SongkickProvider {
    descriptor: ProviderDescriptor,
    api_key: String,
}

impl SongkickProvider {
    pub fn new(
        client_id: String,
        client_secret: String,
        api_key: String,
        redirect_url: String,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            descriptor: ProviderDescriptor::new(
                "Songkick",
                client_id,
                client_secret,
                AUTH_URL,
                TOKEN_URL,
                Vec::new(),
                redirect_url,
                Duration::minutes(15),
            )?,
            api_key,
        })
    }
}

#[async_trait]
impl OauthProvider for SongkickProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn login_url(&self, state: &str) -> String {
        provider::authorize_url(&self.descriptor, state, &[])
    }

    async fn exchange_code(&self, code: &str) -> Result<Token, ProviderError> {
        provider::exchange_code(&self.descriptor, code).await
    }

    async fn fetch_identity(&self, token: &Token) -> Result<ProviderIdentity, ProviderError> {
        let client = provider::http_client().map_err(|e| ProviderError::IdentityTransport {
            provider: self.descriptor.slug.clone(),
            reason: e.to_string(),
        })?;

        let response = client
            .get(PROFILE_URL)
            .query(&[
                ("oauth_token", token.access_token()),
                ("oauth_version", "v2-10"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::IdentityTransport {
                provider: self.descriptor.slug.clone(),
                reason: e.to_string(),
            })?
            .error_for_status()
            .map_err(|e| ProviderError::IdentityTransport {
                provider: self.descriptor.slug.clone(),
                reason: e.to_string(),
            })?;

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::IdentityTransport {
                provider: self.descriptor.slug.clone(),
                reason: e.to_string(),
            })?;

        parse_identity(&body)
    }

    /// Songkick tokens do not expire; the existing token is kept as-is.
    async fn refresh_token(&self, token: &Token) -> Result<Token, ProviderError> {
        Ok(token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct ProfileEnvelope {
    #[serde(rename = "resultsPage")]
    results_page: ResultsPage,
}

#[derive(Debug, Deserialize)]
struct ResultsPage {
    results: Results,
}

#[derive(Debug, Deserialize)]
struct Results {
    user: SongkickUser,
}

#[derive(Debug, Deserialize)]
struct SongkickUser {
    id: u64,
    username: String,
}

fn parse_identity(body: &str) -> Result<ProviderIdentity, ProviderError> {
    let envelope: ProfileEnvelope =
        serde_json::from_str(body).map_err(|e| ProviderError::IdentityShape {
            provider: "songkick".to_string(),
            reason: e.to_string(),
        })?;

    let user = envelope.results_page.results.user;
    let avatar_url = format!(
        "https://images.sk-static.com/images/media/profile_images/users/{}/col2",
        user.id
    );

    Ok(ProviderIdentity {
        provider_identity_id: format!("songkick/{}", user.id),
        profile: UserProfile {
            display_name: user.username.clone(),
            avatar_url: Some(avatar_url),
            username: Some(user.username),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_profile_response() {
        let body = r#"{
            "resultsPage": {
                "status": "ok",
                "results": {
                    "user": {"id": 123456, "username": "gigfan"}
                }
            }
        }"#;
        let identity = parse_identity(body).expect("should parse");
        assert_eq!(identity.provider_identity_id, "songkick/123456");
        assert_eq!(identity.profile.display_name, "gigfan");
        assert_eq!(identity.profile.username.as_deref(), Some("gigfan"));
        assert_eq!(
            identity.profile.avatar_url.as_deref(),
            Some("https://images.sk-static.com/images/media/profile_images/users/123456/col2")
        );
    }

    #[test]
    fn missing_user_is_shape_error() {
        let body = r#"{"resultsPage": {"status": "error", "results": {}}}"#;
        let err = parse_identity(body).unwrap_err();
        assert!(matches!(err, ProviderError::IdentityShape { .. }));
    }

    #[tokio::test]
    async fn refresh_returns_token_unchanged() {
        let p = SongkickProvider::new(
            "id".to_string(),
            "secret".to_string(),
            "api-key".to_string(),
            "https://app.test/auth/callback/songkick".to_string(),
        )
        .expect("valid provider");
        let token = Token::new("non-expiring".to_string(), None, None);
        let refreshed = p.refresh_token(&token).await.expect("should succeed");
        assert_eq!(refreshed, token);
    }

    #[test]
    fn descriptor_has_no_scopes() {
        let p = SongkickProvider::new(
            "id".to_string(),
            "secret".to_string(),
            "api-key".to_string(),
            "https://app.test/auth/callback/songkick".to_string(),
        )
        .expect("valid provider");
        assert!(p.descriptor().scopes.is_empty());
        assert_eq!(p.descriptor().slug, "songkick");
    }
}
