//! Startup configuration.
//!
//! Values come from the secrets file first, then the environment. The result is
//! immutable for the life of the process.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{anyhow, Context, Result};

use crate::domain::verdict::DefectPolicy;

pub const DEFAULT_SECRETS_FILE: &str = ".streamlit/secrets.toml";
pub const DEFAULT_LOCATION: &str = "us-central1";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8090";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const DEFAULT_SESSION_IDLE_SECS: u64 = 3600;
/// Upper bound for `SESSION_IDLE_SECS` (30 days).
const MAX_SESSION_IDLE_SECS: u64 = 30 * 24 * 3600;

/// Table holding an embedded service-account key in the secrets file.
const SERVICE_ACCOUNT_TABLE: &str = "gcp_service_account";
/// Environment fallback for the same key as a JSON string.
const SERVICE_ACCOUNT_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS_JSON";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub project_id: String,
    pub endpoint_id: String,
    pub location: String,
    /// Embedded service-account key. `None` means ambient credentials.
    pub service_account: Option<serde_json::Value>,
    pub bind_addr: SocketAddr,
    pub static_dir: PathBuf,
    pub defect_labels: Vec<String>,
    pub max_upload_bytes: usize,
    pub session_idle: Duration,
}

impl AppConfig {
    /// Loads `.env`, the secrets file and the process environment.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let path = std::env::var("SECRETS_FILE").unwrap_or_else(|_| DEFAULT_SECRETS_FILE.into());
        let secrets = match std::fs::read_to_string(&path) {
            Ok(text) => {
                let table = text
                    .parse::<toml::Table>()
                    .with_context(|| format!("parsing secrets file {path}"))?;
                tracing::info!(path = %path, "loaded secrets file");
                Some(table)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e).with_context(|| format!("reading secrets file {path}")),
        };

        Self::from_sources(secrets.as_ref(), |key| std::env::var(key).ok())
    }

    pub fn from_sources<F>(secrets: Option<&toml::Table>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| -> Option<String> {
            secrets
                .and_then(|s| s.get(key))
                .map(|v| match v {
                    toml::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .or_else(|| env(key))
        };

        let service_account = match secrets.and_then(|s| s.get(SERVICE_ACCOUNT_TABLE)) {
            Some(toml::Value::Table(table)) => Some(
                serde_json::to_value(table).context("converting embedded service account")?,
            ),
            Some(_) => return Err(anyhow!("[{SERVICE_ACCOUNT_TABLE}] must be a table")),
            None => match env(SERVICE_ACCOUNT_ENV) {
                Some(json) if !json.trim().is_empty() => Some(
                    serde_json::from_str(&json)
                        .with_context(|| format!("{SERVICE_ACCOUNT_ENV} is not valid JSON"))?,
                ),
                _ => None,
            },
        };

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.into())
            .parse()
            .context("BIND_ADDR must be host:port")?;

        let defect_labels = match lookup("DEFECT_LABELS") {
            Some(list) => list.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
            None => DefectPolicy::default().labels().to_vec(),
        };

        let max_upload_bytes = match lookup("MAX_UPLOAD_BYTES") {
            Some(v) => v.parse().context("MAX_UPLOAD_BYTES must be an integer")?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let session_idle_secs = match lookup("SESSION_IDLE_SECS") {
            Some(v) => v.parse().context("SESSION_IDLE_SECS must be an integer")?,
            None => DEFAULT_SESSION_IDLE_SECS,
        };
        anyhow::ensure!(
            (1..=MAX_SESSION_IDLE_SECS).contains(&session_idle_secs),
            "SESSION_IDLE_SECS must be between 1 and {MAX_SESSION_IDLE_SECS}, got {session_idle_secs}"
        );

        Ok(Self {
            project_id: lookup("PROJECT_ID").unwrap_or_default(),
            endpoint_id: lookup("ENDPOINT_ID").unwrap_or_default(),
            location: lookup("LOCATION")
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| DEFAULT_LOCATION.into()),
            service_account,
            bind_addr,
            static_dir: lookup("STATIC_DIR").unwrap_or_else(|| "static".into()).into(),
            defect_labels,
            max_upload_bytes,
            session_idle: Duration::from_secs(session_idle_secs),
        })
    }

    pub fn defect_policy(&self) -> DefectPolicy {
        DefectPolicy::new(&self.defect_labels)
    }
}
