use std::{fmt, path::PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::errors::{DomainResult, InspectError};

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens closer than this to expiry are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for AuthorizedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedUser")
            .field("client_id", &self.client_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

/// Shape of an ADC json file, discriminated by its `type` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CredentialFile {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUser),
}

#[derive(Debug, Clone)]
pub enum CredentialSource {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUser),
    /// Compute metadata server of the VM/container we run on.
    Metadata,
}

impl CredentialSource {
    /// Embedded key from the secrets file.
    pub fn from_embedded(value: &serde_json::Value) -> Result<Self> {
        let key: ServiceAccountKey = serde_json::from_value(value.clone())
            .context("embedded service account is missing client_email/private_key")?;
        Ok(Self::ServiceAccount(key))
    }

    /// Application Default Credentials: explicit file, gcloud well-known file, metadata server.
    pub async fn ambient() -> Result<Self> {
        let env = |k: &str| std::env::var(k).ok();
        for candidate in ambient_candidates(env) {
            let path = candidate.path.display();
            match tokio::fs::read_to_string(&candidate.path).await {
                Ok(text) => {
                    info!(path = %path, "using ambient credentials file");
                    return Self::from_file_contents(&text).with_context(|| format!("parsing {path}"));
                }
                Err(e) if !candidate.required && e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e).with_context(|| format!("reading {path}")),
            }
        }
        info!("no credentials file found, falling back to the metadata server");
        Ok(Self::Metadata)
    }

    fn from_file_contents(text: &str) -> Result<Self> {
        Ok(match serde_json::from_str::<CredentialFile>(text)? {
            CredentialFile::ServiceAccount(k) => Self::ServiceAccount(k),
            CredentialFile::AuthorizedUser(u) => Self::AuthorizedUser(u),
        })
    }

    pub fn describe(&self) -> String {
        match self {
            Self::ServiceAccount(k) => format!("service account {}", k.client_email),
            Self::AuthorizedUser(_) => "gcloud user credentials".into(),
            Self::Metadata => "metadata server".into(),
        }
    }
}

struct Candidate {
    path: PathBuf,
    /// Explicitly configured; a missing file is an error rather than a skip.
    required: bool,
}

fn ambient_candidates<F: Fn(&str) -> Option<String>>(env: F) -> Vec<Candidate> {
    let mut out = Vec::new();
    if let Some(p) = env("GOOGLE_APPLICATION_CREDENTIALS").filter(|p| !p.is_empty()) {
        out.push(Candidate { path: p.into(), required: true });
    }
    let well_known = if cfg!(windows) {
        env("APPDATA").map(|d| PathBuf::from(d).join("gcloud"))
    } else {
        env("CLOUDSDK_CONFIG")
            .map(PathBuf::from)
            .or_else(|| env("HOME").map(|h| PathBuf::from(h).join(".config").join("gcloud")))
    };
    if let Some(dir) = well_known {
        out.push(Candidate {
            path: dir.join("application_default_credentials.json"),
            required: false,
        });
    }
    out
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Scoped credential that mints and caches OAuth2 access tokens.
pub struct GcpCredentials {
    source: CredentialSource,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl GcpCredentials {
    pub fn new(source: CredentialSource, http: reqwest::Client) -> Self {
        Self { source, http, cached: Mutex::new(None) }
    }

    pub fn source(&self) -> &CredentialSource {
        &self.source
    }

    /// Cached token, or a fresh one when the cache is empty or about to expire.
    pub async fn access_token(&self) -> DomainResult<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.value.clone());
        }

        let response = self
            .fetch()
            .await
            .map_err(|e| InspectError::Authentication(format!("{}: {e:#}", self.source.describe())))?;
        let expires_at = token_expiry(Utc::now(), response.expires_in);
        debug!(source = %self.source.describe(), %expires_at, "access token refreshed");

        let value = response.access_token;
        *cached = Some(CachedToken { value: value.clone(), expires_at });
        Ok(value)
    }

    async fn fetch(&self) -> Result<TokenResponse> {
        let request = match &self.source {
            CredentialSource::ServiceAccount(key) => {
                let token_uri = key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
                let assertion = sign_assertion(key, Utc::now())?;
                self.http
                    .post(token_uri)
                    .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            }
            CredentialSource::AuthorizedUser(user) => {
                let token_uri = user.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
                self.http.post(token_uri).form(&[
                    ("grant_type", "refresh_token"),
                    ("client_id", user.client_id.as_str()),
                    ("client_secret", user.client_secret.as_str()),
                    ("refresh_token", user.refresh_token.as_str()),
                ])
            }
            CredentialSource::Metadata => self
                .http
                .get(METADATA_TOKEN_URL)
                .query(&[("scopes", CLOUD_PLATFORM_SCOPE)])
                .header("Metadata-Flavor", "Google"),
        };

        let response = request.send().await.context("token request failed")?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("token endpoint returned {status}: {body}"));
        }
        response.json().await.context("unreadable token response")
    }
}

/// Expiry of a freshly minted token. `expires_in` is clamped to `0..=ASSERTION_LIFETIME_SECS`;
/// whatever the token server sends, the result never overflows.
fn token_expiry(now: DateTime<Utc>, expires_in: Option<i64>) -> DateTime<Utc> {
    let secs = expires_in
        .unwrap_or(ASSERTION_LIFETIME_SECS)
        .clamp(0, ASSERTION_LIFETIME_SECS);
    Duration::try_seconds(secs)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or(now)
}

/// RS256 JWT assertion for the jwt-bearer grant, scoped to cloud-platform.
fn sign_assertion(key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<String> {
    let token_uri = key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: CLOUD_PLATFORM_SCOPE,
        aud: token_uri,
        iat: now.timestamp(),
        exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
    };
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();
    let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .context("service account private_key is not a PEM RSA key")?;
    jsonwebtoken::encode(&header, &claims, &signing_key).context("signing JWT assertion")
}
