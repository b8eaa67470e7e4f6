use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::glossary::glossary_for;
use crate::config::{Config, TranslationModel};

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Errors from the translation service, classified for the retry policy.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("translation service unavailable: {0}")]
    Unavailable(String),
    #[error("translation quota exhausted: {0}")]
    ResourceExhausted(String),
    #[error("glossary missing: {0}")]
    GlossaryMissing(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("translation request rejected: {0}")]
    Rejected(String),
}

impl TranslateError {
    /// Whether the retry policy should attempt this call again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TranslateError::Unavailable(_)
                | TranslateError::ResourceExhausted(_)
                | TranslateError::Transport(_)
        )
    }
}

/// One full-context translation request.
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
}

/// The translate call, behind a trait so sessions can be driven against a
/// scripted fake in tests.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, request: &TranslationRequest) -> Result<String, TranslateError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslateTextBody<'a> {
    contents: Vec<&'a str>,
    mime_type: &'a str,
    source_language_code: &'a str,
    target_language_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    glossary_config: Option<GlossaryConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GlossaryConfig {
    glossary: String,
    ignore_case: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateTextResponse {
    #[serde(default)]
    translations: Vec<Translation>,
    #[serde(default)]
    glossary_translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Cloud translation client with exponential-backoff retry.
pub struct CloudTranslator {
    http: reqwest::Client,
    endpoint: String,
    parent: String,
    access_token: String,
    model: TranslationModel,
    glossary_enabled: bool,
}

impl CloudTranslator {
    pub fn new(config: &Config, access_token: String) -> anyhow::Result<Self> {
        let parent = config.translation_parent();
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()?,
            endpoint: format!("https://translation.googleapis.com/v3/{}:translateText", parent),
            parent,
            access_token,
            model: config.translation_model,
            glossary_enabled: config.glossary_enabled,
        })
    }

    fn model_resource(&self) -> Option<String> {
        match self.model {
            TranslationModel::Nmt => None,
            TranslationModel::Advanced => {
                Some(format!("{}/models/general/translation-llm", self.parent))
            }
        }
    }

    async fn translate_once(
        &self,
        request: &TranslationRequest,
        glossary: Option<&str>,
    ) -> Result<String, TranslateError> {
        let body = TranslateTextBody {
            contents: vec![&request.text],
            mime_type: "text/plain",
            source_language_code: &request.source_lang,
            target_language_code: &request.target_lang,
            model: self.model_resource(),
            glossary_config: glossary.map(|g| GlossaryConfig {
                glossary: g.to_string(),
                ignore_case: true,
            }),
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_api_error(status.as_u16(), &text, glossary.is_some()));
        }

        let parsed: TranslateTextResponse = response
            .json()
            .await
            .map_err(|e| TranslateError::Rejected(format!("malformed response: {}", e)))?;

        // Prefer the glossary-aware rendering when one came back
        let translation = parsed
            .glossary_translations
            .into_iter()
            .next()
            .or_else(|| parsed.translations.into_iter().next())
            .ok_or_else(|| TranslateError::Rejected("empty translation response".to_string()))?;

        Ok(translation.translated_text)
    }
}

fn classify_transport(err: reqwest::Error) -> TranslateError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        TranslateError::Transport(err.to_string())
    } else {
        TranslateError::Rejected(err.to_string())
    }
}

/// Map an HTTP error response onto the retry taxonomy. gRPC-style status
/// strings in the body take precedence over the bare HTTP code.
fn classify_api_error(http_status: u16, body: &str, glossary_in_use: bool) -> TranslateError {
    let parsed: Option<ApiError> = serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|e| e.error)
        .ok();
    let message = parsed
        .as_ref()
        .map(|e| e.message.clone())
        .unwrap_or_else(|| body.chars().take(200).collect());
    let status = parsed.as_ref().map(|e| e.status.clone()).unwrap_or_default();
    let code = parsed.as_ref().map(|e| e.code).unwrap_or(http_status);

    let message_lower = message.to_lowercase();
    if glossary_in_use
        && (message_lower.contains("glossary") || code == 404)
        && message_lower.contains("not found")
    {
        return TranslateError::GlossaryMissing(message);
    }

    match (code, status.as_str()) {
        (503, _) | (_, "UNAVAILABLE") => TranslateError::Unavailable(message),
        (429, _) | (_, "RESOURCE_EXHAUSTED") => TranslateError::ResourceExhausted(message),
        _ => TranslateError::Rejected(message),
    }
}

#[async_trait]
impl Translator for CloudTranslator {
    async fn translate(&self, request: &TranslationRequest) -> Result<String, TranslateError> {
        let mut glossary = if self.glossary_enabled {
            glossary_for(&self.parent, &request.source_lang, &request.target_lang)
        } else {
            None
        };

        let mut attempt = 0u32;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            match self.translate_once(request, glossary.as_deref()).await {
                Ok(translated) => {
                    debug!(
                        chars = request.text.len(),
                        glossary = glossary.is_some(),
                        "translation succeeded"
                    );
                    return Ok(translated);
                }
                Err(TranslateError::GlossaryMissing(message)) if glossary.is_some() => {
                    // Retry immediately without the glossary; this does not
                    // consume a retry attempt
                    warn!("glossary unavailable, retrying without it: {}", message);
                    glossary = None;
                }
                Err(err) if err.is_retryable() && attempt + 1 < MAX_ATTEMPTS => {
                    attempt += 1;
                    warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "translation attempt failed: {}, backing off",
                        err
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(TranslateError::Unavailable("down".into()).is_retryable());
        assert!(TranslateError::ResourceExhausted("quota".into()).is_retryable());
        assert!(TranslateError::Transport("reset".into()).is_retryable());
        assert!(!TranslateError::Rejected("bad tag".into()).is_retryable());
        assert!(!TranslateError::GlossaryMissing("gone".into()).is_retryable());
    }

    #[test]
    fn test_api_error_mapping() {
        let body = r#"{"error": {"code": 14, "message": "try later", "status": "UNAVAILABLE"}}"#;
        assert!(matches!(
            classify_api_error(500, body, false),
            TranslateError::Unavailable(_)
        ));

        let body = r#"{"error": {"code": 8, "message": "slow down", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert!(matches!(
            classify_api_error(500, body, false),
            TranslateError::ResourceExhausted(_)
        ));

        assert!(matches!(
            classify_api_error(429, "busy", false),
            TranslateError::ResourceExhausted(_)
        ));
        assert!(matches!(
            classify_api_error(503, "maintenance", false),
            TranslateError::Unavailable(_)
        ));
        assert!(matches!(
            classify_api_error(400, "bad request", false),
            TranslateError::Rejected(_)
        ));
    }

    #[test]
    fn test_glossary_not_found_detected_only_when_in_use() {
        let body =
            r#"{"error": {"code": 404, "message": "Glossary not found: ro-en", "status": "NOT_FOUND"}}"#;
        assert!(matches!(
            classify_api_error(404, body, true),
            TranslateError::GlossaryMissing(_)
        ));
        assert!(matches!(
            classify_api_error(404, body, false),
            TranslateError::Rejected(_)
        ));
    }

    #[test]
    fn test_request_body_shape() {
        let body = TranslateTextBody {
            contents: vec!["bun venit"],
            mime_type: "text/plain",
            source_language_code: "ro-RO",
            target_language_code: "en",
            model: None,
            glossary_config: Some(GlossaryConfig {
                glossary: "projects/p/locations/l/glossaries/ro-en".to_string(),
                ignore_case: true,
            }),
        };

        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"mimeType\":\"text/plain\""));
        assert!(json.contains("\"sourceLanguageCode\":\"ro-RO\""));
        assert!(json.contains("\"ignoreCase\":true"));
        assert!(!json.contains("\"model\""));
    }
}
