//! WebSocket binding to the cloud streaming recognizer.
//!
//! Opens one socket per stream, sends a JSON configuration frame, then
//! base64-encoded audio frames. Result and error frames are decoded into
//! [`StreamEvent`]s on a reader task.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::backend::{AsrFault, SpeechBackend, SpeechStream, StreamConfig, StreamEvent};

pub struct CloudSpeechBackend {
    endpoint: String,
    access_token: String,
}

impl CloudSpeechBackend {
    pub fn new(endpoint: String, access_token: String) -> Self {
        Self {
            endpoint,
            access_token,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecognizerFrame {
    #[serde(default)]
    results: Vec<RecognizerResult>,
    #[serde(default)]
    error: Option<RecognizerError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecognizerResult {
    #[serde(default)]
    alternatives: Vec<RecognizerAlternative>,
    #[serde(default)]
    is_final: bool,
}

#[derive(Debug, Deserialize)]
struct RecognizerAlternative {
    #[serde(default)]
    transcript: String,
}

#[derive(Debug, Deserialize)]
struct RecognizerError {
    #[serde(default)]
    code: Option<i32>,
    #[serde(default)]
    message: String,
}

#[async_trait]
impl SpeechBackend for CloudSpeechBackend {
    async fn open(&self, config: &StreamConfig) -> Result<SpeechStream> {
        let url = format!("{}?access_token={}", self.endpoint, self.access_token);
        let (socket, _response) = connect_async(&url)
            .await
            .context("Failed to connect to recognizer")?;
        let (mut sink, mut source) = socket.split();

        let setup = json!({
            "config": {
                "languageCode": config.language,
                "enableAutomaticPunctuation": config.auto_punctuation,
                "model": if config.long_form_model { "latest_long" } else { "default" },
                "useEnhanced": config.long_form_model,
                "sampleRateHertz": config.sample_rate,
                "speechContexts": [{
                    "phrases": config.phrase_hints,
                    "boost": config.hint_boost,
                }],
            }
        });
        sink.send(Message::Text(setup.to_string()))
            .await
            .context("Failed to send recognizer configuration")?;

        info!(language = %config.language, "recognizer stream opened");

        let (audio_tx, mut audio_rx) = mpsc::channel::<Vec<u8>>(64);
        let (event_tx, event_rx) = mpsc::channel::<StreamEvent>(64);

        // Writer task: audio chunks out
        tokio::spawn(async move {
            while let Some(chunk) = audio_rx.recv().await {
                let frame = json!({
                    "audio": base64::engine::general_purpose::STANDARD.encode(&chunk)
                });
                if let Err(e) = sink.send(Message::Text(frame.to_string())).await {
                    warn!("recognizer write failed: {}", e);
                    break;
                }
            }
            let _ = sink.send(Message::Close(None)).await;
            debug!("recognizer writer task exiting");
        });

        // Reader task: decoded events in
        tokio::spawn(async move {
            while let Some(message) = source.next().await {
                let text = match message {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = event_tx
                            .send(StreamEvent::Fault(AsrFault {
                                code: None,
                                message: e.to_string(),
                            }))
                            .await;
                        return;
                    }
                };

                let frame: RecognizerFrame = match serde_json::from_str(&text) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("unparseable recognizer frame: {}", e);
                        continue;
                    }
                };

                if let Some(error) = frame.error {
                    let _ = event_tx
                        .send(StreamEvent::Fault(AsrFault {
                            code: error.code,
                            message: error.message,
                        }))
                        .await;
                    return;
                }

                for result in frame.results {
                    let Some(alternative) = result.alternatives.into_iter().next() else {
                        continue;
                    };
                    if alternative.transcript.is_empty() {
                        continue;
                    }
                    if event_tx
                        .send(StreamEvent::Transcript {
                            text: alternative.transcript,
                            is_final: result.is_final,
                        })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
            }
            let _ = event_tx.send(StreamEvent::Closed).await;
            debug!("recognizer reader task exiting");
        });

        Ok(SpeechStream {
            audio_tx,
            events: event_rx,
        })
    }

    fn name(&self) -> &str {
        "cloud-speech-ws"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_frame_decoding() {
        let json = r#"{
            "results": [{"alternatives": [{"transcript": "bun venit"}], "isFinal": true}]
        }"#;
        let frame: RecognizerFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.results.len(), 1);
        assert!(frame.results[0].is_final);
        assert_eq!(frame.results[0].alternatives[0].transcript, "bun venit");
    }

    #[test]
    fn test_error_frame_decoding() {
        let json = r#"{"error": {"code": 11, "message": "maximum allowed stream duration"}}"#;
        let frame: RecognizerFrame = serde_json::from_str(json).unwrap();
        let error = frame.error.unwrap();
        assert_eq!(error.code, Some(11));
        assert!(frame.results.is_empty());
    }
}
