use std::sync::Arc;
use std::time::{Duration, Instant as StdInstant};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::options::ModeConfig;
use super::stats::SessionStats;
use crate::asr::{
    AsrSessionController, FaultDisposition, SpeechBackend, StreamConfig, StreamEvent,
};
use crate::events::{AudioPayload, ServerEvent};
use crate::pipeline::{TermMapping, TranslationPipeline};
use crate::rules::{Decision, RulesEngine, TranscriptUpdate, Trigger};
use crate::store::{TranslationLog, TranslationRecord, UsageTracker};
use crate::translate::{TranslateError, TranslationRequest, Translator};

/// Commands driving one session's event loop.
#[derive(Debug)]
pub enum SessionCommand {
    Transcript { text: String, is_final: bool },
    AudioJson(AudioPayload),
    AudioBinary(Vec<u8>),
    Stop,
    /// Internal: decoded recognizer stream event
    Asr(StreamEvent),
    /// Internal: completion of a spawned MT call
    TranslationFinished {
        job: TranslationJob,
        outcome: Result<String, TranslateError>,
    },
}

/// The inputs a spawned MT call carries back to the session loop.
#[derive(Debug)]
pub struct TranslationJob {
    full_text: String,
    decision: Decision,
}

struct PendingTranslation {
    text: String,
    decision: Decision,
}

/// Everything a session needs at construction.
pub struct SessionParams {
    pub client_id: String,
    pub source_language: String,
    pub target_language: String,
    pub mode: ModeConfig,
    pub translator: Arc<dyn Translator>,
    /// Present only when the session ingests raw audio
    pub speech_backend: Option<Arc<dyn SpeechBackend>>,
    pub phrase_hints: Vec<String>,
    pub log: Arc<TranslationLog>,
    pub usage: Arc<UsageTracker>,
    pub events_tx: mpsc::Sender<ServerEvent>,
    pub inactivity_timeout: Duration,
    pub mappings: Arc<Vec<TermMapping>>,
}

/// Channel and task handle for a running session.
pub struct SessionHandle {
    pub session_id: String,
    pub commands: mpsc::Sender<SessionCommand>,
    pub task: JoinHandle<()>,
}

enum Flow {
    Continue,
    Stop,
}

const COMMAND_BUFFER: usize = 256;

/// Owns all per-session state and serializes translations.
///
/// The session runs as a single task: updates are processed in arrival
/// order, MT calls are spawned and their completions re-enter the loop as
/// commands, so at most one translation is in flight at any time.
pub struct SessionCoordinator {
    session_id: String,
    params: SessionParams,
    rules: RulesEngine,
    pipeline: TranslationPipeline,
    session_active: bool,
    translation_in_flight: bool,
    pending_translation: Option<PendingTranslation>,
    last_interim_text: String,
    last_change_at: StdInstant,
    pause_deadline: Option<Instant>,
    inactivity_deadline: Instant,
    asr: Option<AsrSessionController>,
    commands_tx: mpsc::Sender<SessionCommand>,
    started_at: chrono::DateTime<Utc>,
}

impl SessionCoordinator {
    /// Spawn a session task and return its handle.
    pub fn spawn(params: SessionParams) -> SessionHandle {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let session_id = Uuid::new_v4().to_string();

        let coordinator = SessionCoordinator {
            session_id: session_id.clone(),
            rules: RulesEngine::new(params.mode.clone()),
            pipeline: TranslationPipeline::new(params.mappings.clone()),
            session_active: true,
            translation_in_flight: false,
            pending_translation: None,
            last_interim_text: String::new(),
            last_change_at: StdInstant::now(),
            pause_deadline: None,
            inactivity_deadline: Instant::now() + params.inactivity_timeout,
            asr: None,
            commands_tx: commands_tx.clone(),
            started_at: Utc::now(),
            params,
        };

        let task = tokio::spawn(coordinator.run(commands_rx));

        SessionHandle {
            session_id,
            commands: commands_tx,
            task,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        info!(
            session_id = %self.session_id,
            client_id = %self.params.client_id,
            source = %self.params.source_language,
            target = %self.params.target_language,
            new_text_overlap = self.params.mode.new_text_overlap_threshold,
            dedup_overlap = self.params.mode.dedup_overlap_threshold,
            dedup_window_ms = self.params.mode.dedup_window().as_millis() as u64,
            "session started"
        );

        self.emit(ServerEvent::SessionStarted {
            source_language: self.params.source_language.clone(),
            target_language: self.params.target_language.clone(),
        })
        .await;

        if let Some(backend) = self.params.speech_backend.clone() {
            if let Err(e) = self.start_recognizer(backend).await {
                warn!(session_id = %self.session_id, "recognizer failed to start: {}", e);
                self.emit(ServerEvent::RecognitionError {
                    message: e.to_string(),
                    code: "recognizer_unavailable".to_string(),
                })
                .await;
                self.teardown();
                return;
            }
        }

        loop {
            let pause_at = self.pause_deadline.unwrap_or_else(far_future);
            let pause_armed = self.pause_deadline.is_some();
            let restart_at = self
                .asr
                .as_ref()
                .map(|a| a.restart_deadline())
                .unwrap_or_else(far_future);
            let asr_armed = self.asr.is_some();
            let inactivity_at = self.inactivity_deadline;

            tokio::select! {
                maybe_command = commands.recv() => {
                    match maybe_command {
                        None => {
                            debug!(session_id = %self.session_id, "client channel closed");
                            break;
                        }
                        Some(command) => {
                            if let Flow::Stop = self.handle(command).await {
                                break;
                            }
                        }
                    }
                }
                _ = sleep_until(pause_at), if pause_armed => {
                    self.on_pause_fired().await;
                }
                _ = sleep_until(restart_at), if asr_armed => {
                    if let Flow::Stop = self.proactive_restart().await {
                        break;
                    }
                }
                _ = sleep_until(inactivity_at) => {
                    let minutes = self.params.inactivity_timeout.as_secs() / 60;
                    info!(session_id = %self.session_id, "session inactive, terminating");
                    self.emit(ServerEvent::SessionTimeout {
                        message: "Session terminated after inactivity".to_string(),
                        inactive_minutes: minutes,
                    })
                    .await;
                    break;
                }
            }
        }

        self.teardown();
    }

    async fn start_recognizer(&mut self, backend: Arc<dyn SpeechBackend>) -> anyhow::Result<()> {
        let (asr_tx, mut asr_rx) = mpsc::channel(64);
        let commands_tx = self.commands_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = asr_rx.recv().await {
                if commands_tx.send(SessionCommand::Asr(event)).await.is_err() {
                    break;
                }
            }
        });

        let config = StreamConfig {
            language: self.params.source_language.clone(),
            phrase_hints: self.params.phrase_hints.clone(),
            ..StreamConfig::default()
        };
        let mut controller = AsrSessionController::new(backend, config, asr_tx);
        controller.start().await?;
        self.asr = Some(controller);
        Ok(())
    }

    async fn handle(&mut self, command: SessionCommand) -> Flow {
        match command {
            SessionCommand::Transcript { text, is_final } => {
                self.touch_inactivity();
                self.on_transcript(text, is_final).await;
                Flow::Continue
            }
            SessionCommand::AudioJson(payload) => {
                self.touch_inactivity();
                let Some(asr) = self.asr.as_mut() else {
                    debug!("audio received without a recognizer session, ignoring");
                    return Flow::Continue;
                };
                match asr.decode_chunk(payload) {
                    Ok(chunk) => self.write_audio(chunk).await,
                    Err(rejection) => {
                        self.emit(ServerEvent::RecognitionError {
                            message: rejection.to_string(),
                            code: rejection.code().to_string(),
                        })
                        .await;
                        Flow::Continue
                    }
                }
            }
            SessionCommand::AudioBinary(chunk) => {
                self.touch_inactivity();
                if let Some(asr) = self.asr.as_mut() {
                    asr.note_binary_frame();
                } else {
                    debug!("audio received without a recognizer session, ignoring");
                    return Flow::Continue;
                }
                self.write_audio(chunk).await
            }
            SessionCommand::Asr(event) => self.on_stream_event(event).await,
            SessionCommand::TranslationFinished { job, outcome } => {
                self.on_translation_finished(job, outcome).await;
                Flow::Continue
            }
            SessionCommand::Stop => {
                self.emit(ServerEvent::SessionStopped {
                    translation_count: self.pipeline.emitted_count(),
                    accumulated_text: self.rules.accumulated_text().to_string(),
                })
                .await;
                Flow::Stop
            }
        }
    }

    async fn write_audio(&mut self, chunk: Vec<u8>) -> Flow {
        let Some(asr) = self.asr.as_mut() else {
            return Flow::Continue;
        };
        if let Err(rejection) = asr.write(chunk).await {
            self.emit(ServerEvent::RecognitionError {
                message: rejection.to_string(),
                code: rejection.code().to_string(),
            })
            .await;
        }
        Flow::Continue
    }

    async fn on_stream_event(&mut self, event: StreamEvent) -> Flow {
        match event {
            StreamEvent::Transcript { text, is_final } => {
                self.touch_inactivity();
                self.on_transcript(text, is_final).await;
                Flow::Continue
            }
            StreamEvent::Fault(fault) => {
                let Some(asr) = self.asr.as_mut() else {
                    return Flow::Continue;
                };
                match asr.handle_fault(fault.class(), &fault.message).await {
                    FaultDisposition::Restarted => {
                        // Fresh stream: fresh full-context translations
                        self.pipeline.reset_committed();
                        Flow::Continue
                    }
                    FaultDisposition::Fatal => {
                        self.emit(ServerEvent::RecognitionError {
                            message: "Recognition restarts exhausted".to_string(),
                            code: "max_restarts_exceeded".to_string(),
                        })
                        .await;
                        Flow::Stop
                    }
                    FaultDisposition::Surface => {
                        self.emit(ServerEvent::RecognitionError {
                            message: fault.message.clone(),
                            code: fault
                                .code
                                .map(|c| c.to_string())
                                .unwrap_or_else(|| "recognition_error".to_string()),
                        })
                        .await;
                        Flow::Continue
                    }
                }
            }
            StreamEvent::Closed => {
                let Some(asr) = self.asr.as_mut() else {
                    return Flow::Continue;
                };
                match asr.restart("stream closed by provider", true).await {
                    FaultDisposition::Fatal => {
                        self.emit(ServerEvent::RecognitionError {
                            message: "Recognition restarts exhausted".to_string(),
                            code: "max_restarts_exceeded".to_string(),
                        })
                        .await;
                        Flow::Stop
                    }
                    _ => {
                        self.pipeline.reset_committed();
                        Flow::Continue
                    }
                }
            }
        }
    }

    async fn proactive_restart(&mut self) -> Flow {
        let Some(asr) = self.asr.as_mut() else {
            return Flow::Continue;
        };
        match asr.restart("max stream duration approaching", false).await {
            FaultDisposition::Fatal => {
                self.emit(ServerEvent::RecognitionError {
                    message: "Recognition restarts exhausted".to_string(),
                    code: "max_restarts_exceeded".to_string(),
                })
                .await;
                Flow::Stop
            }
            _ => {
                self.pipeline.reset_committed();
                Flow::Continue
            }
        }
    }

    async fn on_transcript(&mut self, text: String, is_final: bool) {
        self.emit(ServerEvent::InterimResult {
            text: text.clone(),
            is_final,
        })
        .await;

        let changed = text != self.last_interim_text;
        if changed {
            self.last_change_at = StdInstant::now();
            // Any text change cancels a scheduled pause check
            self.pause_deadline = None;
        }
        self.last_interim_text = text.clone();

        let update = TranscriptUpdate {
            text,
            is_final,
            time_since_last_change: self.last_change_at.elapsed(),
            trigger: if is_final {
                Trigger::Final
            } else {
                Trigger::Interim
            },
            client_id: self.params.client_id.clone(),
        };
        let decision = self.rules.decide(&update);

        if decision.should_translate {
            self.start_or_defer(update.text, decision, is_final).await;
        } else if !is_final && changed && self.pause_deadline.is_none() {
            self.pause_deadline = Some(Instant::now() + self.params.mode.pause_detection);
        }
    }

    async fn on_pause_fired(&mut self) {
        self.pause_deadline = None;
        if self.last_interim_text.is_empty() {
            return;
        }

        let update = TranscriptUpdate {
            text: self.last_interim_text.clone(),
            is_final: false,
            time_since_last_change: self.params.mode.pause_detection,
            trigger: Trigger::Pause,
            client_id: self.params.client_id.clone(),
        };
        let decision = self.rules.decide(&update);
        if decision.should_translate && !self.translation_in_flight {
            self.launch(update.text, decision);
        }
    }

    /// At most one MT call per session: later finals replace earlier ones,
    /// interims arriving during a call are dropped.
    async fn start_or_defer(&mut self, full_text: String, decision: Decision, is_final: bool) {
        if !self.translation_in_flight {
            self.launch(full_text, decision);
        } else if is_final {
            debug!(session_id = %self.session_id, "deferring final behind in-flight translation");
            self.pending_translation = Some(PendingTranslation {
                text: full_text,
                decision,
            });
        } else {
            debug!(session_id = %self.session_id, "dropping interim while translation in flight");
        }
    }

    fn launch(&mut self, full_text: String, decision: Decision) {
        self.translation_in_flight = true;

        let request = TranslationRequest {
            text: full_text.clone(),
            source_lang: self.params.source_language.clone(),
            target_lang: self.params.target_language.clone(),
        };
        let job = TranslationJob {
            full_text,
            decision,
        };
        let translator = self.params.translator.clone();
        let commands_tx = self.commands_tx.clone();

        tokio::spawn(async move {
            let outcome = translator.translate(&request).await;
            let _ = commands_tx
                .send(SessionCommand::TranslationFinished { job, outcome })
                .await;
        });
    }

    async fn on_translation_finished(
        &mut self,
        job: TranslationJob,
        outcome: Result<String, TranslateError>,
    ) {
        self.translation_in_flight = false;

        if !self.session_active {
            debug!("translation completed after session end, discarding");
            return;
        }

        match outcome {
            Ok(translated_full) => {
                let emitted = self.pipeline.process(
                    &translated_full,
                    &job.decision.new_text,
                    &job.full_text,
                    &self.params.target_language,
                );

                if emitted.is_empty() {
                    debug!("translation added nothing new");
                } else if self.rules.is_duplicate_translation(&emitted) {
                    debug!("duplicate translation suppressed");
                } else {
                    self.rules.record_translation(&emitted);
                    self.rules.record_emission(&emitted);
                    let count = self.pipeline.mark_emitted();

                    self.emit(ServerEvent::TranslationResult {
                        original: job.decision.new_text.clone(),
                        translated: emitted.clone(),
                        accumulated: self.rules.accumulated_text().to_string(),
                        count,
                        is_interim: !job.decision.is_complete,
                        reason: job.decision.reason.as_str().to_string(),
                    })
                    .await;

                    self.params
                        .usage
                        .record_translation(job.full_text.chars().count() as u64);

                    let record = TranslationRecord::new(
                        &self.session_id,
                        &self.params.client_id,
                        &job.decision.new_text,
                        &emitted,
                        &self.params.source_language,
                        &self.params.target_language,
                        job.decision.reason.as_str(),
                    );
                    let log = self.params.log.clone();
                    tokio::spawn(async move {
                        log.append(record).await;
                    });
                }
            }
            Err(error) => {
                warn!(session_id = %self.session_id, "translation failed: {}", error);
                self.emit(ServerEvent::TranslationError {
                    message: error.to_string(),
                })
                .await;
            }
        }

        if self.session_active {
            if let Some(pending) = self.pending_translation.take() {
                debug!(session_id = %self.session_id, "running deferred final translation");
                self.launch(pending.text, pending.decision);
            }
        }
    }

    fn touch_inactivity(&mut self) {
        self.inactivity_deadline = Instant::now() + self.params.inactivity_timeout;
    }

    async fn emit(&self, event: ServerEvent) {
        if !self.session_active {
            return;
        }
        if self.params.events_tx.send(event).await.is_err() {
            debug!(session_id = %self.session_id, "client event channel closed");
        }
    }

    fn teardown(&mut self) {
        self.session_active = false;
        self.pending_translation = None;
        self.pause_deadline = None;
        if let Some(mut asr) = self.asr.take() {
            asr.stop();
        }

        let metrics = self.rules.metrics();
        let stats = SessionStats {
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            source_language: self.params.source_language.clone(),
            target_language: self.params.target_language.clone(),
            translation_count: self.pipeline.emitted_count(),
            decision_checks: metrics.checks,
            decision_approvals: metrics.approvals,
        };
        info!(
            session_id = %self.session_id,
            checks = metrics.checks,
            approvals = metrics.approvals,
            rejections = metrics.rejections,
            stats = %serde_json::to_string(&stats).unwrap_or_default(),
            "session ended"
        );
        debug!(reasons = ?metrics.by_reason, "decision histogram");
    }
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400 * 365)
}
