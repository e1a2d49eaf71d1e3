//! Client-credential authentication for Azure Storage
//!
//! Access tokens are cached in memory and reused until 30 seconds before
//! they expire (storage tokens are typically valid for an hour).

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::debug;

use crate::BlobError;

/// Microsoft Entra ID authority used when the config does not name one
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";

/// Seconds before expiry at which a cached token is considered stale
const TOKEN_EXPIRY_BUFFER_SECS: i64 = 30;

/// Bearer token with its expiry
#[derive(Clone, Debug)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Check if the token is still valid (not expired)
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now + TimeDelta::seconds(TOKEN_EXPIRY_BUFFER_SECS)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Service principal credential (tenant, client id and secret)
pub struct ClientSecretCredential {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    authority_host: String,
    http: reqwest::Client,
    cached: Mutex<Option<AccessToken>>,
}

impl ClientSecretCredential {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            http,
            cached: Mutex::new(None),
        }
    }

    /// Use a different authority (sovereign clouds)
    pub fn with_authority_host(mut self, authority_host: impl Into<String>) -> Self {
        self.authority_host = authority_host.into();
        self
    }

    /// OAuth2 v2 token endpoint for the tenant
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }

    /// Get a bearer token, reusing the cached one while it is valid
    pub async fn token(&self) -> Result<String, BlobError> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let fresh = self.request_token().await?;
        let token = fresh.token.clone();
        *self.cached.lock() = Some(fresh);
        Ok(token)
    }

    /// Drop the cached token so the next call re-authenticates
    pub fn invalidate(&self) {
        self.cached.lock().take();
    }

    fn cached_token(&self) -> Option<String> {
        self.cached
            .lock()
            .as_ref()
            .filter(|t| t.is_valid())
            .map(|t| t.token.clone())
    }

    async fn request_token(&self) -> Result<AccessToken, BlobError> {
        debug!(tenant_id = %self.tenant_id, client_id = %self.client_id, "requesting storage token");

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", STORAGE_SCOPE),
        ];

        let response = self.http.post(self.token_url()).form(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BlobError::Auth {
                tenant_id: self.tenant_id.clone(),
                status,
                body,
            });
        }

        let body: TokenResponse = response.json().await?;
        Ok(AccessToken {
            token: body.access_token,
            expires_at: Utc::now() + TimeDelta::seconds(body.expires_in),
        })
    }
}

impl std::fmt::Debug for ClientSecretCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecretCredential")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authority_host", &self.authority_host)
            .finish()
    }
}
