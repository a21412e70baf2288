//! Centralized server configuration.
//!
//! Strongly-typed configuration loaded via the `config` crate from
//! environment variables (`SESSION__SECURE_COOKIES=false`, etc.).

use serde::Deserialize;

/// Server configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Secret used to sign session cookies and OAuth state.
    pub secret: String,

    /// Public base URL of this server, for OAuth redirect URLs.
    pub base_url: String,

    /// Address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Provider credentials. Providers without credentials are not
    /// registered.
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Client-side lifetime of the session cookie, in days.
    #[serde(default = "default_cookie_lifetime_days")]
    pub cookie_lifetime_days: i64,

    /// Interval between reauth scheduler sweeps, in seconds.
    #[serde(default = "default_reauth_tick_seconds")]
    pub reauth_tick_seconds: u64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_cookie_lifetime_days() -> i64 {
    14
}

fn default_reauth_tick_seconds() -> u64 {
    30
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_lifetime_days: default_cookie_lifetime_days(),
            reauth_tick_seconds: default_reauth_tick_seconds(),
            secure_cookies: default_secure_cookies(),
        }
    }
}

/// Per-provider OAuth credentials.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub google: Option<OauthCredentials>,
    #[serde(default)]
    pub spotify: Option<OauthCredentials>,
    #[serde(default)]
    pub songkick: Option<SongkickCredentials>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OauthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Songkick additionally needs an application API key for its API.
#[derive(Debug, Clone, Deserialize)]
pub struct SongkickCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub api_key: String,
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
