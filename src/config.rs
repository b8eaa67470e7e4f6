use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Which cloud translation model family to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationModel {
    Nmt,
    Advanced,
}

impl Default for TranslationModel {
    fn default() -> Self {
        TranslationModel::Nmt
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// TCP port for the HTTP/WebSocket listener
    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Global cap on concurrent client connections
    #[serde(default = "defaults::max_connections")]
    pub max_connections: usize,

    /// Cap on concurrent connections from a single remote address
    #[serde(default = "defaults::max_connections_per_ip")]
    pub max_connections_per_ip: usize,

    /// Seconds of session inactivity before forced termination
    #[serde(default = "defaults::inactivity_timeout")]
    pub inactivity_timeout: u64,

    /// Whether directional glossaries are applied to MT requests
    #[serde(default = "defaults::glossary_enabled")]
    pub glossary_enabled: bool,

    /// Translation model family (nmt | advanced)
    #[serde(default)]
    pub translation_model: TranslationModel,

    /// Cloud project that owns the translation and speech resources
    #[serde(default)]
    pub google_cloud_project: String,

    /// Cloud location for translation resources (glossaries are regional)
    #[serde(default = "defaults::location")]
    pub google_cloud_location: String,
}

mod defaults {
    pub fn port() -> u16 {
        8080
    }
    pub fn max_connections() -> usize {
        50
    }
    pub fn max_connections_per_ip() -> usize {
        5
    }
    pub fn inactivity_timeout() -> u64 {
        1800
    }
    pub fn glossary_enabled() -> bool {
        true
    }
    pub fn location() -> String {
        "us-central1".to_string()
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;

        let cfg: Config = settings
            .try_deserialize()
            .context("Failed to read configuration from environment")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.google_cloud_project.is_empty() {
            bail!("GOOGLE_CLOUD_PROJECT must be set");
        }
        if self.max_connections == 0 || self.max_connections_per_ip == 0 {
            bail!("connection caps must be at least 1");
        }
        Ok(())
    }

    /// Parent resource path for translation requests.
    pub fn translation_parent(&self) -> String {
        format!(
            "projects/{}/locations/{}",
            self.google_cloud_project, self.google_cloud_location
        )
    }

    pub fn inactivity_window(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout)
    }
}

/// Service-account credentials for the cloud translation and speech APIs.
///
/// Resolved from one of three channels, in order: inline JSON in
/// `GOOGLE_CLOUD_CREDENTIALS_JSON`, a file path in
/// `GOOGLE_APPLICATION_CREDENTIALS`, or the default path next to the binary.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
}

const DEFAULT_CREDENTIALS_PATH: &str = "service-account.json";

impl ServiceAccountKey {
    /// Resolve and validate credentials at startup. Missing or malformed
    /// credentials are a fatal configuration error.
    pub fn resolve() -> Result<Self> {
        if let Ok(raw) = std::env::var("GOOGLE_CLOUD_CREDENTIALS_JSON") {
            let key: ServiceAccountKey = serde_json::from_str(&raw)
                .context("GOOGLE_CLOUD_CREDENTIALS_JSON is not valid service-account JSON")?;
            key.validate()?;
            return Ok(key);
        }

        let path = std::env::var("GOOGLE_APPLICATION_CREDENTIALS")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CREDENTIALS_PATH));

        let raw = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "No translation credentials: set GOOGLE_CLOUD_CREDENTIALS_JSON, \
                 GOOGLE_APPLICATION_CREDENTIALS, or place {}",
                path.display()
            )
        })?;
        let key: ServiceAccountKey =
            serde_json::from_str(&raw).context("Credentials file is not valid JSON")?;
        key.validate()?;
        Ok(key)
    }

    fn validate(&self) -> Result<()> {
        if self.project_id.is_empty() || self.client_email.is_empty() || self.private_key.is_empty()
        {
            bail!("Service-account key is missing project_id, client_email, or private_key");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_parent() {
        let cfg = Config {
            port: 8080,
            max_connections: 50,
            max_connections_per_ip: 5,
            inactivity_timeout: 1800,
            glossary_enabled: true,
            translation_model: TranslationModel::Nmt,
            google_cloud_project: "demo-project".to_string(),
            google_cloud_location: "us-central1".to_string(),
        };
        assert_eq!(
            cfg.translation_parent(),
            "projects/demo-project/locations/us-central1"
        );
    }

    #[test]
    fn test_key_validation_rejects_empty() {
        let key = ServiceAccountKey {
            project_id: String::new(),
            client_email: "svc@demo.iam".to_string(),
            private_key: "---".to_string(),
        };
        assert!(key.validate().is_err());
    }
}
