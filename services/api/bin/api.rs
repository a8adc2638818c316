//! Main Entrypoint for the Chatvox API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the text generation and speech synthesis gateways.
//! 3. Constructing the Axum router and applying middleware.
//! 4. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use chatvox_api::{
    config::Config,
    router::create_router,
    state::AppState,
    ws::relay::{Relay, RelaySettings},
};
use chatvox_core::{
    llm_client::{GenerationOptions, OpenAICompatibleClient, TextGenerator},
    session::SessionStore,
    speech::{ElevenLabsClient, SpeechSynthesizer},
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Gateways ---
    let openai_config = OpenAIConfig::new()
        .with_api_key(&config.llm_api_key)
        .with_api_base(config.provider.api_base());
    let generator: Arc<dyn TextGenerator> = Arc::new(OpenAICompatibleClient::new(
        openai_config,
        config.chat_model.clone(),
    ));
    let synthesizer: Arc<dyn SpeechSynthesizer> = Arc::new(ElevenLabsClient::new(
        config.elevenlabs_api_key.clone(),
        config.tts_model.clone(),
    ));

    let relay = Relay::new(
        generator,
        synthesizer,
        RelaySettings {
            generation: GenerationOptions::default(),
            voice_id: config.voice_id.clone(),
            output_format: config.output_format.clone(),
            gateway_timeout: config.gateway_timeout,
        },
    );

    let app_state = Arc::new(AppState {
        sessions: SessionStore::new(config.default_personality.clone()),
        relay: Arc::new(relay),
        config: Arc::new(config.clone()),
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // --- 5. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        tts_model = %config.tts_model,
        static_dir = %config.static_dir.display(),
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
