use serde::{Deserialize, Serialize};

/// Audio chunk payload as it appears inside a JSON `audio-data` event.
///
/// Browsers send either a base64 string or a plain integer array depending on
/// how they serialize the capture buffer; raw binary WebSocket frames bypass
/// this type entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AudioPayload {
    Base64(String),
    Bytes(Vec<u8>),
}

/// Messages arriving from a client over the WebSocket channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    StartSession {
        source_language: String,
        target_lang: String,
        #[serde(default)]
        mode: Option<String>,
        /// Optional override in milliseconds, validated against 1000-60000
        #[serde(default)]
        translation_interval: Option<u64>,
    },
    #[serde(rename_all = "camelCase")]
    TranscriptResult { text: String, is_final: bool },
    AudioData { audio: AudioPayload },
    StopSession,
}

/// Messages emitted to a client over the WebSocket channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    SessionStarted {
        source_language: String,
        target_language: String,
    },
    #[serde(rename_all = "camelCase")]
    InterimResult { text: String, is_final: bool },
    #[serde(rename_all = "camelCase")]
    TranslationResult {
        original: String,
        translated: String,
        accumulated: String,
        count: u64,
        is_interim: bool,
        reason: String,
    },
    TranslationError { message: String },
    RecognitionError { message: String, code: String },
    #[serde(rename_all = "camelCase")]
    SessionTimeout {
        message: String,
        inactive_minutes: u64,
    },
    #[serde(rename_all = "camelCase")]
    SessionStopped {
        translation_count: u64,
        accumulated_text: String,
    },
    ConnectionError { message: String, code: String },
}
