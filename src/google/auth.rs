//! Service account credentials for Google APIs.
//!
//! A service account key is exchanged for a short lived access token
//! using the JWT bearer grant. The token is cached and only re-minted
//! when it's about to expire so concurrent requests share it.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::RemoteServiceError;

pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

// Re-mint a little early so a token never expires mid-request
const EXPIRY_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    String::from("https://oauth2.googleapis.com/token")
}

/// The parts of a service account JSON key file that are needed to
/// mint access tokens.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid service account JSON")
    }

    /// Decode a base64 encoded key file, the format used when the key
    /// is passed through an environment variable.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .context("Service account credential is not valid base64")?;
        let json = String::from_utf8(bytes).context("Service account credential is not UTF-8")?;
        Self::from_json(&json)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read credential file {}", path.display()))?;
        Self::from_json(&json)
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

#[derive(Clone)]
struct AccessToken {
    token: String,
    expires_at: DateTime<Utc>,
}

pub struct ServiceAccountAuth {
    client_email: String,
    key_id: Option<String>,
    token_uri: String,
    scope: String,
    signing_key: EncodingKey,
    http: reqwest::Client,
    cached: Mutex<Option<AccessToken>>,
}

impl ServiceAccountAuth {
    /// Fails if the private key can't be parsed so a bad credential
    /// is caught at startup rather than on the first request.
    pub fn new(key: ServiceAccountKey, scope: &str) -> Result<Self> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| anyhow!("Invalid service account private key: {}", e))?;

        Ok(Self {
            client_email: key.client_email,
            key_id: key.private_key_id,
            token_uri: key.token_uri,
            scope: scope.to_string(),
            signing_key,
            http: reqwest::Client::new(),
            cached: Mutex::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Returns a bearer token for the service account, minting a new
    /// one when there isn't a cached token with time left on it.
    pub async fn access_token(&self) -> Result<String, RemoteServiceError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref()
            && token.expires_at - TimeDelta::seconds(EXPIRY_MARGIN_SECS) > Utc::now()
        {
            return Ok(token.token.clone());
        }

        let fresh = self.mint().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);

        Ok(token)
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String, RemoteServiceError> {
        let iat = now.timestamp();
        let claims = Claims {
            iss: &self.client_email,
            scope: &self.scope,
            aud: &self.token_uri,
            iat,
            exp: iat + 3600,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.signing_key)
            .map_err(|e| RemoteServiceError::Auth(format!("Failed to sign assertion: {}", e)))
    }

    async fn mint(&self) -> Result<AccessToken, RemoteServiceError> {
        let now = Utc::now();
        let assertion = self.assertion(now)?;

        tracing::debug!("Requesting access token for {}", self.client_email);

        let resp = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| match e.error_description {
                    Some(desc) => format!("{}: {}", e.error, desc),
                    None => e.error,
                })
                .unwrap_or(body);
            return Err(RemoteServiceError::Auth(format!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                message
            )));
        }

        let token: TokenResponse = resp.json().await?;

        Ok(AccessToken {
            token: token.access_token,
            expires_at: now + TimeDelta::seconds(token.expires_in),
        })
    }
}
