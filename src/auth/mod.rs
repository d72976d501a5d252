//! OAuth credentials and access-token exchange for the publishing API.
//!
//! A long-lived refresh token is exchanged for short-lived access tokens on
//! demand. Nothing touches the network until the first
//! [`RefreshTokenProvider::access_token`] call, so a run with nothing to
//! publish never contacts the token endpoint.

use std::fmt;
use std::time::{Duration, Instant};

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Environment variable holding the OAuth client id.
pub const CLIENT_ID_ENV: &str = "CLIENT_ID";
/// Environment variable holding the OAuth client secret.
pub const CLIENT_SECRET_ENV: &str = "CLIENT_SECRET";
/// Environment variable holding the refresh token.
pub const REFRESH_TOKEN_ENV: &str = "REFRESH_TOKEN";

/// Token endpoint used when no override is configured.
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Lifetime assumed when the endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Credential values could not be assembled.
#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    /// One or more required values are unset or blank.
    #[error(
        "missing credentials: {}\n  Suggestion: Export CLIENT_ID, CLIENT_SECRET and REFRESH_TOKEN (or pass --client-id/--client-secret/--refresh-token)",
        .names.join(", ")
    )]
    Missing {
        /// Names of the missing values.
        names: Vec<&'static str>,
    },
}

/// Errors from the token exchange.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token endpoint could not be reached.
    #[error("token exchange failed: {source}")]
    Network {
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The token endpoint answered with an error status.
    #[error("token endpoint returned HTTP {status}: {body}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// Response body, for diagnosis.
        body: String,
    },

    /// The token endpoint answered with something unparseable.
    #[error("invalid token response: {message}")]
    InvalidResponse {
        /// What was wrong.
        message: String,
    },
}

/// OAuth client credentials plus a refresh token.
///
/// Secret fields are redacted in Debug output.
#[derive(Clone)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

impl Credentials {
    /// Assembles credentials, reporting every value that is unset or blank.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::Missing`] naming each missing value.
    pub fn from_values(
        client_id: Option<String>,
        client_secret: Option<String>,
        refresh_token: Option<String>,
    ) -> Result<Self, CredentialsError> {
        let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        let (client_id, client_secret, refresh_token) = (
            present(client_id),
            present(client_secret),
            present(refresh_token),
        );

        let mut names = Vec::new();
        if client_id.is_none() {
            names.push(CLIENT_ID_ENV);
        }
        if client_secret.is_none() {
            names.push(CLIENT_SECRET_ENV);
        }
        if refresh_token.is_none() {
            names.push(REFRESH_TOKEN_ENV);
        }

        match (client_id, client_secret, refresh_token) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => Ok(Self {
                client_id,
                client_secret,
                refresh_token,
            }),
            _ => Err(CredentialsError::Missing { names }),
        }
    }

    /// The OAuth client id (not secret).
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Exchanges a refresh token for access tokens and caches the result.
pub struct RefreshTokenProvider {
    client: Client,
    credentials: Credentials,
    token_url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for RefreshTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshTokenProvider")
            .field("credentials", &self.credentials)
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

impl RefreshTokenProvider {
    /// Creates a provider for the default token endpoint.
    #[must_use]
    pub fn new(client: Client, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
            token_url: DEFAULT_TOKEN_URL.to_string(),
            cached: Mutex::new(None),
        }
    }

    /// Overrides the token endpoint.
    #[must_use]
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// Returns a valid access token, exchanging the refresh token when the
    /// cached one is missing or about to expire.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the exchange fails.
    #[instrument(skip(self), fields(client_id = %self.credentials.client_id))]
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached
            .as_ref()
            .filter(|token| Instant::now() + EXPIRY_MARGIN < token.expires_at)
        {
            return Ok(token.value.clone());
        }

        let fresh = self.exchange().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn exchange(&self) -> Result<CachedToken, AuthError> {
        debug!(token_url = %self.token_url, "exchanging refresh token");
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.credentials.client_id)
            .append_pair("client_secret", &self.credentials.client_secret)
            .append_pair("refresh_token", &self.credentials.refresh_token)
            .append_pair("grant_type", "refresh_token")
            .finish();

        let response = self
            .client
            .post(&self.token_url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|source| AuthError::Network { source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse {
                message: e.to_string(),
            })?;
        if token.access_token.is_empty() {
            return Err(AuthError::InvalidResponse {
                message: "empty access_token".to_string(),
            });
        }

        let lifetime = token
            .expires_in
            .map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs);
        debug!(lifetime_secs = lifetime.as_secs(), "access token obtained");
        Ok(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }
}
