use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::backend::{FaultClass, SpeechBackend, StreamConfig, StreamEvent};
use crate::events::AudioPayload;

/// Restart this long before the provider's ~305 s hard limit.
const RESTART_AFTER: Duration = Duration::from_secs(290);
pub const MAX_RESTART_ATTEMPTS: u32 = 10;
const MAX_CHUNK_BYTES: usize = 1024 * 1024;
const MAX_BYTES_PER_SECOND: usize = 2 * 1024 * 1024;
const MAX_BUFFERED_CHUNKS: usize = 50;
const REOPEN_DELAY: Duration = Duration::from_millis(500);

/// Client-visible rejection of an audio chunk.
#[derive(Debug, Error)]
pub enum WriteRejection {
    #[error("audio chunk of {0} bytes exceeds the 1 MB limit")]
    ChunkTooLarge(usize),
    #[error("audio rate exceeds 2 MB/s")]
    RateLimited,
    #[error("audio chunk is not valid base64")]
    MalformedChunk,
}

impl WriteRejection {
    pub fn code(&self) -> &'static str {
        match self {
            WriteRejection::ChunkTooLarge(_) => "chunk_too_large",
            WriteRejection::RateLimited => "rate_limited",
            WriteRejection::MalformedChunk => "malformed_chunk",
        }
    }
}

/// What the controller did about a recognizer fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultDisposition {
    /// Stream restarted; the caller should reset its committed translation
    Restarted,
    /// Restart cap exceeded or the stream cannot be reopened
    Fatal,
    /// Not recoverable here; surface to the client
    Surface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireFormat {
    Binary,
    Base64,
    IntegerArray,
}

struct RateWindow {
    window_start: Instant,
    bytes: usize,
}

impl RateWindow {
    fn new() -> Self {
        Self {
            window_start: Instant::now(),
            bytes: 0,
        }
    }

    fn admit(&mut self, len: usize) -> bool {
        let now = Instant::now();
        if now.duration_since(self.window_start) >= Duration::from_secs(1) {
            self.window_start = now;
            self.bytes = 0;
        }
        if self.bytes + len > MAX_BYTES_PER_SECOND {
            return false;
        }
        self.bytes += len;
        true
    }
}

/// Manages one session's recognizer stream: proactive restarts, buffering
/// across the restart gap, and write-path validation.
///
/// Exactly one stream handle is writable at any time.
pub struct AsrSessionController {
    backend: Arc<dyn SpeechBackend>,
    config: StreamConfig,
    events_tx: mpsc::Sender<StreamEvent>,
    audio_tx: Option<mpsc::Sender<Vec<u8>>>,
    forwarder: Option<JoinHandle<()>>,
    stream_started: Instant,
    restart_attempts: u32,
    restarting: bool,
    restart_buffer: VecDeque<Vec<u8>>,
    overflow_logged: bool,
    rate: RateWindow,
    wire_format: Option<WireFormat>,
}

impl AsrSessionController {
    pub fn new(
        backend: Arc<dyn SpeechBackend>,
        config: StreamConfig,
        events_tx: mpsc::Sender<StreamEvent>,
    ) -> Self {
        Self {
            backend,
            config,
            events_tx,
            audio_tx: None,
            forwarder: None,
            stream_started: Instant::now(),
            restart_attempts: 0,
            restarting: false,
            restart_buffer: VecDeque::new(),
            overflow_logged: false,
            rate: RateWindow::new(),
            wire_format: None,
        }
    }

    /// Open the first stream.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        self.open_stream().await?;
        info!(backend = self.backend.name(), "recognizer session started");
        Ok(())
    }

    async fn open_stream(&mut self) -> anyhow::Result<()> {
        let stream = self.backend.open(&self.config).await?;
        let events_tx = self.events_tx.clone();
        let mut events = stream.events;

        self.forwarder = Some(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if events_tx.send(event).await.is_err() {
                    break;
                }
            }
        }));
        self.audio_tx = Some(stream.audio_tx);
        self.stream_started = Instant::now();
        Ok(())
    }

    /// When the current stream must be proactively restarted.
    pub fn restart_deadline(&self) -> Instant {
        self.stream_started + RESTART_AFTER
    }

    /// Tear down the current stream and open a fresh one.
    ///
    /// Guarded against concurrent triggers: the underlying stream may signal
    /// both an end and a close for the same teardown.
    pub async fn restart(&mut self, reason: &str, count_attempt: bool) -> FaultDisposition {
        if self.restarting {
            debug!("restart already in progress, ignoring trigger: {}", reason);
            return FaultDisposition::Restarted;
        }
        self.restarting = true;
        info!(reason, attempts = self.restart_attempts, "restarting recognizer stream");

        if let Some(handle) = self.forwarder.take() {
            handle.abort();
        }
        self.audio_tx = None;

        // Silence timeouts and proactive restarts do not consume attempts,
        // but any reopen failure from then on does
        let mut count = count_attempt;
        loop {
            if count {
                self.restart_attempts += 1;
                if self.restart_attempts > MAX_RESTART_ATTEMPTS {
                    error!("recognizer restart attempts exhausted");
                    self.restarting = false;
                    return FaultDisposition::Fatal;
                }
            }
            match self.open_stream().await {
                Ok(()) => break,
                Err(e) => {
                    warn!("recognizer reopen failed: {}", e);
                    count = true;
                    tokio::time::sleep(REOPEN_DELAY).await;
                }
            }
        }

        self.flush_buffer().await;
        self.restarting = false;
        FaultDisposition::Restarted
    }

    async fn flush_buffer(&mut self) {
        if self.restart_buffer.is_empty() {
            return;
        }
        debug!(
            chunks = self.restart_buffer.len(),
            "flushing audio buffered during restart"
        );
        let Some(tx) = self.audio_tx.clone() else {
            return;
        };
        while let Some(chunk) = self.restart_buffer.pop_front() {
            if tx.send(chunk).await.is_err() {
                break;
            }
        }
        self.overflow_logged = false;
    }

    /// Classify and act on a recognizer fault.
    pub async fn handle_fault(&mut self, class: FaultClass, message: &str) -> FaultDisposition {
        match class {
            FaultClass::SilenceTimeout => self.restart(message, false).await,
            FaultClass::DurationLimit => self.restart(message, true).await,
            FaultClass::Other => FaultDisposition::Surface,
        }
    }

    /// Decode an incoming audio payload, caching the wire format seen first.
    pub fn decode_chunk(&mut self, payload: AudioPayload) -> Result<Vec<u8>, WriteRejection> {
        let (format, bytes) = match payload {
            AudioPayload::Base64(encoded) => (
                WireFormat::Base64,
                base64::engine::general_purpose::STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|_| WriteRejection::MalformedChunk)?,
            ),
            AudioPayload::Bytes(bytes) => (WireFormat::IntegerArray, bytes),
        };
        self.note_format(format);
        Ok(bytes)
    }

    /// Record the wire format of a raw binary frame.
    pub fn note_binary_frame(&mut self) {
        self.note_format(WireFormat::Binary);
    }

    fn note_format(&mut self, format: WireFormat) {
        if self.wire_format.is_none() {
            info!(?format, "detected audio wire format");
            self.wire_format = Some(format);
        }
    }

    /// Validate and write one audio chunk, buffering while a restart is in
    /// flight.
    pub async fn write(&mut self, chunk: Vec<u8>) -> Result<(), WriteRejection> {
        if chunk.len() > MAX_CHUNK_BYTES {
            return Err(WriteRejection::ChunkTooLarge(chunk.len()));
        }
        if !self.rate.admit(chunk.len()) {
            return Err(WriteRejection::RateLimited);
        }

        if self.restarting || self.audio_tx.is_none() {
            if self.restart_buffer.len() >= MAX_BUFFERED_CHUNKS {
                if !self.overflow_logged {
                    warn!("restart buffer full, dropping newest audio chunks");
                    self.overflow_logged = true;
                }
                return Ok(());
            }
            self.restart_buffer.push_back(chunk);
            return Ok(());
        }

        if let Some(tx) = &self.audio_tx {
            if tx.send(chunk).await.is_err() {
                // The stream died under us; buffer until a restart runs
                self.audio_tx = None;
            }
        }
        Ok(())
    }

    pub fn restart_attempts(&self) -> u32 {
        self.restart_attempts
    }

    /// Tear down the stream without reopening.
    pub fn stop(&mut self) {
        if let Some(handle) = self.forwarder.take() {
            handle.abort();
        }
        self.audio_tx = None;
        self.restart_buffer.clear();
    }
}

impl Drop for AsrSessionController {
    fn drop(&mut self) {
        self.stop();
    }
}
