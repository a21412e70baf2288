//! Google OAuth provider.

use async_trait::async_trait;
use chrono::Duration;
use serde::Deserialize;

use crate::error::ProviderError;
use crate::provider::{self, OauthProvider, ProviderDescriptor, ProviderIdentity};
use crate::token::{Token, UserProfile};

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const TOKEN_URL: &str = "https://www.googleapis.com/oauth2/v3/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/userinfo.profile",
    "https://www.googleapis.com/auth/userinfo.email",
];

pub struct GoogleProvider {
    descriptor: ProviderDescriptor,
}

impl GoogleProvider {
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_url: String,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            descriptor: ProviderDescriptor::new(
                "Google",
                client_id,
                client_secret,
                AUTH_URL,
                TOKEN_URL,
                SCOPES.iter().map(ToString::to_string).collect(),
                redirect_url,
                Duration::minutes(15),
            )?,
        })
    }
}

#[async_trait]
impl OauthProvider for GoogleProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn login_url(&self, state: &str) -> String {
        // Offline access with forced consent, so a refresh token is
        // issued on every login rather than only the first.
        provider::authorize_url(
            &self.descriptor,
            state,
            &[("access_type", "offline"), ("prompt", "consent")],
        )
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
            .get(USERINFO_URL)
            .bearer_auth(token.access_token())
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

    async fn refresh_token(&self, token: &Token) -> Result<Token, ProviderError> {
        provider::refresh(&self.descriptor, token).await
    }
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    id: String,
    name: String,
    picture: Option<String>,
}

fn parse_identity(body: &str) -> Result<ProviderIdentity, ProviderError> {
    let info: UserInfo =
        serde_json::from_str(body).map_err(|e| ProviderError::IdentityShape {
            provider: "google".to_string(),
            reason: e.to_string(),
        })?;

    Ok(ProviderIdentity {
        provider_identity_id: format!("google/{}", info.id),
        profile: UserProfile {
            display_name: info.name,
            avatar_url: info.picture,
            username: None,
        },
    })
}
