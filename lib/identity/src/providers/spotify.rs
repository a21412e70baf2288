//! Spotify OAuth provider.

use async_trait::async_trait;
use chrono::Duration;
use serde::Deserialize;

use crate::error::ProviderError;
use crate::provider::{self, OauthProvider, ProviderDescriptor, ProviderIdentity};
use crate::token::{Token, UserProfile};

// show_dialog forces the approval screen so account switching works.
const AUTH_URL: &str = "https://accounts.spotify.com/authorize?show_dialog=true";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const PROFILE_URL: &str = "https://api.spotify.com/v1/me";

const SCOPES: &[&str] = &[
    "playlist-read-private",
    "playlist-read-collaborative",
    "user-follow-read",
    "user-library-read",
    "user-read-private",
    "user-read-email",
];

pub struct SpotifyProvider {
    descriptor: ProviderDescriptor,
}

impl SpotifyProvider {
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_url: String,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            descriptor: ProviderDescriptor::new(
                "Spotify",
                client_id,
                client_secret,
                AUTH_URL,
                TOKEN_URL,
                SCOPES.iter().map(ToString::to_string).collect(),
                redirect_url,
                Duration::minutes(30),
            )?,
        })
    }
}

#[async_trait]
impl OauthProvider for SpotifyProvider {
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
struct Profile {
    id: String,
    email: Option<String>,
    display_name: Option<String>,
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: String,
    width: Option<u32>,
}

fn parse_identity(body: &str) -> Result<ProviderIdentity, ProviderError> {
    let profile: Profile =
        serde_json::from_str(body).map_err(|e| ProviderError::IdentityShape {
            provider: "spotify".to_string(),
            reason: e.to_string(),
        })?;

    let avatar_url = profile
        .images
        .iter()
        .max_by_key(|img| img.width.unwrap_or(0))
        .map(|img| img.url.clone());

    // Users without a display name fall back to their Spotify ID.
    let display_name = profile
        .display_name
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| profile.id.clone());

    Ok(ProviderIdentity {
        provider_identity_id: format!("spotify/{}", profile.id),
        profile: UserProfile {
            display_name,
            avatar_url,
            username: profile.email,
        },
    })
}
