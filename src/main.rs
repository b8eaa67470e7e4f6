use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use lingo_relay::asr::{CloudSpeechBackend, SpeechBackend};
use lingo_relay::config::ServiceAccountKey;
use lingo_relay::translate::CloudTranslator;
use lingo_relay::{create_router, AppState, Config};
use tracing::info;

const SPEECH_ENDPOINT: &str = "wss://speech.googleapis.com/v1p1beta1/speech:streamingrecognize";

/// Domain phrase hints handed to the recognizer. Deployment-specific lists
/// replace these via configuration management.
fn default_phrase_hints() -> Vec<String> {
    ["Iehova", "Isus", "Biblia", "versetul", "capitolul"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("lingo-relay v{} - speech translation relay", env!("CARGO_PKG_VERSION"));

    // Fail fast on missing configuration or credentials
    let config = Config::from_env()?;
    let credentials = ServiceAccountKey::resolve()?;
    info!(
        project = %credentials.project_id,
        account = %credentials.client_email,
        "cloud credentials loaded"
    );

    let access_token = std::env::var("GOOGLE_CLOUD_ACCESS_TOKEN")
        .context("GOOGLE_CLOUD_ACCESS_TOKEN must be provided by the deployment's token refresher")?;

    let translator = Arc::new(CloudTranslator::new(&config, access_token.clone())?);
    let speech_backend: Option<Arc<dyn SpeechBackend>> = Some(Arc::new(CloudSpeechBackend::new(
        SPEECH_ENDPOINT.to_string(),
        access_token,
    )));

    let port = config.port;
    let state = AppState::new(config, translator, speech_backend, default_phrase_hints());
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!("listening on http://{}", addr);
    info!("endpoints: GET /ws (session channel), GET /health");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
