//! Upstream access tokens.
//!
//! [`AccessTokenProvider`] exchanges app credentials for a short-lived bearer
//! token and caches it until shortly before expiry. Refreshes are
//! single-flight: the cache lock is held across the token request, so
//! concurrent callers wait for the one refresh in progress and then share its
//! token.

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::telemetry;
use crate::{HuginnError, Result};

/// Default token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Tokens are treated as expired this long before their actual expiry.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// App credentials for the token endpoint.
///
/// With a username and password the password grant is used, otherwise the
/// client-credentials grant.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            username: None,
            password: None,
        }
    }

    /// Use the password grant for a script app.
    pub fn with_password(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    fn grant(&self) -> Vec<(&'static str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => vec![
                ("grant_type", "password"),
                ("username", user.as_str()),
                ("password", pass.as_str()),
            ],
            _ => vec![("grant_type", "client_credentials")],
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// A bearer token and when it stops being usable.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: Instant,
}

impl AccessToken {
    /// Whether the token is still valid, keeping [`EXPIRY_MARGIN`] in reserve.
    pub fn is_fresh(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN < self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

/// Caching, single-flight token source for one upstream.
pub struct AccessTokenProvider {
    http: Client,
    token_url: String,
    credentials: Credentials,
    source_tag: String,
    cached: Mutex<Option<AccessToken>>,
}

impl AccessTokenProvider {
    pub fn new(
        http: Client,
        token_url: impl Into<String>,
        credentials: Credentials,
        source_tag: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            credentials,
            source_tag: source_tag.into(),
            cached: Mutex::new(None),
        }
    }

    /// A valid bearer token, refreshing it first when needed.
    pub async fn get_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && token.is_fresh()
        {
            return Ok(token.token.clone());
        }

        let result = self.refresh().await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(telemetry::TOKEN_REFRESHES_TOTAL,
            "source" => self.source_tag.clone(),
            "status" => status,
        )
        .increment(1);

        let token = result.inspect_err(|e| {
            warn!(source = %self.source_tag, error = %e, "token refresh failed");
        })?;
        let value = token.token.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Drop the cached token; the next call refreshes.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
        debug!(source = %self.source_tag, "access token invalidated");
    }

    async fn refresh(&self) -> Result<AccessToken> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&self.credentials.grant())
            .send()
            .await
            .map_err(|e| HuginnError::Auth(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HuginnError::Auth(format!(
                "token endpoint returned HTTP {status}"
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| HuginnError::Auth(format!("unreadable token response: {e}")))?;
        if let Some(error) = body.error {
            return Err(HuginnError::Auth(format!("token endpoint error: {error}")));
        }
        let (Some(token), Some(expires_in)) = (body.access_token, body.expires_in) else {
            return Err(HuginnError::Auth(
                "token response missing access_token or expires_in".to_string(),
            ));
        };

        let expires_at = Instant::now()
            .checked_add(Duration::from_secs(expires_in))
            .ok_or_else(|| HuginnError::Auth(format!("expires_in out of range: {expires_in}")))?;

        debug!(source = %self.source_tag, expires_in, "access token refreshed");
        Ok(AccessToken { token, expires_at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn token_expires_early() {
        let token = AccessToken {
            token: "t".to_string(),
            expires_at: Instant::now() + Duration::from_secs(120),
        };
        assert!(token.is_fresh());
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(token.is_fresh());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!token.is_fresh());
    }

    #[test]
    fn grant_depends_on_password() {
        let app = Credentials::new("id", "secret");
        assert_eq!(app.grant(), vec![("grant_type", "client_credentials")]);
        let script = app.with_password("bot", "hunter2");
        assert_eq!(script.grant()[0], ("grant_type", "password"));
        assert_eq!(script.grant().len(), 3);
    }

    #[test]
    fn debug_redacts_secrets() {
        let creds = Credentials::new("id", "secret").with_password("bot", "hunter2");
        let shown = format!("{creds:?}");
        assert!(!shown.contains("secret\""));
        assert!(!shown.contains("hunter2"));
    }
}
