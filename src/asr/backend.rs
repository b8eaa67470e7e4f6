use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Configuration for one recognizer stream.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Source language tag (e.g. `ro-RO`)
    pub language: String,
    /// Domain phrase hints supplied to the recognizer
    pub phrase_hints: Vec<String>,
    /// Boost applied to the phrase hints
    pub hint_boost: f32,
    pub auto_punctuation: bool,
    /// Request the enhanced long-form model
    pub long_form_model: bool,
    pub sample_rate: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            phrase_hints: Vec::new(),
            hint_boost: 10.0,
            auto_punctuation: true,
            long_form_model: true,
            sample_rate: 16_000,
        }
    }
}

/// An error event surfaced by the recognizer stream.
#[derive(Debug, Clone)]
pub struct AsrFault {
    pub code: Option<i32>,
    pub message: String,
}

/// Recovery classes for recognizer faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    /// No audio reached the recognizer for ~10 s. Restart without counting
    /// toward the attempt cap.
    SilenceTimeout,
    /// The stream hit the provider's duration limit. Restart.
    DurationLimit,
    /// Anything else surfaces to the client.
    Other,
}

const OUT_OF_RANGE: i32 = 11;
const DEADLINE_EXCEEDED: i32 = 4;

impl AsrFault {
    pub fn class(&self) -> FaultClass {
        let message = self.message.to_lowercase();
        if message.contains("no audio") || message.contains("audio timeout") {
            return FaultClass::SilenceTimeout;
        }
        if message.contains("maximum allowed stream duration")
            || matches!(self.code, Some(OUT_OF_RANGE) | Some(DEADLINE_EXCEEDED))
        {
            return FaultClass::DurationLimit;
        }
        FaultClass::Other
    }
}

/// Events decoded from the recognizer stream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Transcript { text: String, is_final: bool },
    Fault(AsrFault),
    /// The stream ended without an error event
    Closed,
}

/// A live recognizer stream: an audio sink and a decoded event source.
pub struct SpeechStream {
    pub audio_tx: mpsc::Sender<Vec<u8>>,
    pub events: mpsc::Receiver<StreamEvent>,
}

/// Recognizer backend, behind a trait so the controller can be exercised
/// against a scripted fake.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Open a new recognizer stream.
    async fn open(&self, config: &StreamConfig) -> Result<SpeechStream>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_timeout_classification() {
        let fault = AsrFault {
            code: Some(OUT_OF_RANGE),
            message: "Audio Timeout Error: no audio received for 10s".to_string(),
        };
        assert_eq!(fault.class(), FaultClass::SilenceTimeout);
    }

    #[test]
    fn test_duration_limit_classification() {
        let by_message = AsrFault {
            code: None,
            message: "Exceeded maximum allowed stream duration of 305 seconds".to_string(),
        };
        assert_eq!(by_message.class(), FaultClass::DurationLimit);

        let by_code = AsrFault {
            code: Some(DEADLINE_EXCEEDED),
            message: "deadline".to_string(),
        };
        assert_eq!(by_code.class(), FaultClass::DurationLimit);
    }

    #[test]
    fn test_other_faults_surface() {
        let fault = AsrFault {
            code: Some(7),
            message: "permission denied".to_string(),
        };
        assert_eq!(fault.class(), FaultClass::Other);
    }
}
