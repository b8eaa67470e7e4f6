use std::net::SocketAddr;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::state::{AppState, ConnectionPermit};
use crate::events::{ClientEvent, ServerEvent};
use crate::session::{
    validate_source_language, validate_target_language, ModeConfig, SessionCommand,
    SessionCoordinator, SessionHandle, SessionMode, SessionParams,
};

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "activeConnections": state.connections.active(),
        })),
    )
}

/// GET /ws - upgrade to the per-session event channel
pub async fn ws_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    match state.connections.clone().try_acquire(addr.ip()) {
        Ok(permit) => ws.on_upgrade(move |socket| handle_socket(socket, state, addr, permit)),
        Err(rejection) => {
            info!(%addr, code = rejection.code(), "connection refused");
            // Still upgrade so the client receives a structured error
            ws.on_upgrade(move |mut socket| async move {
                let event = ServerEvent::ConnectionError {
                    message: rejection.message().to_string(),
                    code: rejection.code().to_string(),
                };
                if let Ok(payload) = serde_json::to_string(&event) {
                    let _ = socket.send(Message::Text(payload)).await;
                }
                let _ = socket.close().await;
            })
        }
    }
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    addr: SocketAddr,
    permit: ConnectionPermit,
) {
    let client_id = Uuid::new_v4().to_string();
    info!(%addr, %client_id, "client connected");

    let (mut sink, mut stream) = socket.split();
    let (events_tx, mut events_rx) = mpsc::channel::<ServerEvent>(64);

    // Writer task: session events out to the socket
    let writer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("failed to serialize server event: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut session: Option<SessionHandle> = None;

    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                debug!(%client_id, "websocket read error: {}", e);
                break;
            }
        };

        match message {
            Message::Text(text) => {
                let event = match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(%client_id, "unparseable client event: {}", e);
                        send_event(
                            &events_tx,
                            ServerEvent::ConnectionError {
                                message: "Malformed event".to_string(),
                                code: "malformed_event".to_string(),
                            },
                        )
                        .await;
                        continue;
                    }
                };
                handle_client_event(event, &state, &client_id, &events_tx, &mut session).await;
            }
            Message::Binary(chunk) => {
                if let Some(handle) = &session {
                    let _ = handle
                        .commands
                        .send(SessionCommand::AudioBinary(chunk))
                        .await;
                }
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    // Disconnect is a stop: the session must not outlive its channel
    if let Some(handle) = session.take() {
        let _ = handle.commands.send(SessionCommand::Stop).await;
    }
    writer.abort();
    drop(permit);
    info!(%addr, %client_id, "client disconnected");
}

async fn handle_client_event(
    event: ClientEvent,
    state: &AppState,
    client_id: &str,
    events_tx: &mpsc::Sender<ServerEvent>,
    session: &mut Option<SessionHandle>,
) {
    match event {
        ClientEvent::StartSession {
            source_language,
            target_lang,
            mode,
            translation_interval,
        } => {
            // Idempotent: a new start tears down the prior session first
            if let Some(old) = session.take() {
                debug!(%client_id, "restarting session");
                let _ = old.commands.send(SessionCommand::Stop).await;
            }

            let mode_config = match build_mode(mode.as_deref(), translation_interval) {
                Ok(config) => config,
                Err(message) => {
                    send_event(
                        events_tx,
                        ServerEvent::ConnectionError {
                            message,
                            code: "invalid_mode".to_string(),
                        },
                    )
                    .await;
                    return;
                }
            };

            if validate_source_language(&source_language).is_err()
                || validate_target_language(&target_lang).is_err()
            {
                send_event(
                    events_tx,
                    ServerEvent::ConnectionError {
                        message: format!(
                            "Invalid language pair: {} -> {}",
                            source_language, target_lang
                        ),
                        code: "invalid_language".to_string(),
                    },
                )
                .await;
                return;
            }

            let handle = SessionCoordinator::spawn(SessionParams {
                client_id: client_id.to_string(),
                source_language,
                target_language: target_lang,
                mode: mode_config,
                translator: state.translator.clone(),
                speech_backend: state.speech_backend.clone(),
                phrase_hints: state.phrase_hints.as_ref().clone(),
                log: state.log.clone(),
                usage: state.usage.clone(),
                events_tx: events_tx.clone(),
                inactivity_timeout: state.config.inactivity_window(),
                mappings: state.mappings.clone(),
            });
            *session = Some(handle);
        }
        ClientEvent::TranscriptResult { text, is_final } => {
            if let Some(handle) = session {
                let _ = handle
                    .commands
                    .send(SessionCommand::Transcript { text, is_final })
                    .await;
            } else {
                debug!(%client_id, "transcript before start-session, ignoring");
            }
        }
        ClientEvent::AudioData { audio } => {
            if let Some(handle) = session {
                let _ = handle.commands.send(SessionCommand::AudioJson(audio)).await;
            }
        }
        ClientEvent::StopSession => {
            if let Some(handle) = session.take() {
                let _ = handle.commands.send(SessionCommand::Stop).await;
            }
        }
    }
}

fn build_mode(mode: Option<&str>, translation_interval: Option<u64>) -> Result<ModeConfig, String> {
    let session_mode = match mode {
        Some(name) => SessionMode::parse(name).map_err(|e| e.to_string())?,
        None => SessionMode::Talks,
    };
    let mut config = ModeConfig::for_mode(session_mode);
    if let Some(interval) = translation_interval {
        config = config
            .with_interval_override(interval)
            .map_err(|e| e.to_string())?;
    }
    Ok(config)
}

async fn send_event(events_tx: &mpsc::Sender<ServerEvent>, event: ServerEvent) {
    if events_tx.send(event).await.is_err() {
        debug!("event channel closed while sending error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_mode_defaults_to_talks() {
        let config = build_mode(None, None).unwrap();
        assert_eq!(config.translation_interval.as_millis(), 15_000);
    }

    #[test]
    fn test_build_mode_rejects_unknown() {
        assert!(build_mode(Some("whisper"), None).is_err());
    }

    #[test]
    fn test_build_mode_applies_interval_override() {
        let config = build_mode(Some("earbuds"), Some(5_000)).unwrap();
        assert_eq!(config.translation_interval.as_millis(), 5_000);
        assert!(config.enable_tts);
    }

    #[test]
    fn test_build_mode_rejects_out_of_range_interval() {
        assert!(build_mode(Some("talks"), Some(500)).is_err());
        assert!(build_mode(Some("talks"), Some(120_000)).is_err());
    }
}
