//! The per-session message relay.
//!
//! The `Relay` maps each inbound client event to its server action, drives the
//! text generation and speech synthesis gateways in order, mutates the
//! session, and pushes outbound events onto the connection's channel as soon
//! as each one is ready.

use super::protocol::{ClientMessage, ProtocolError, ServerMessage};
use base64::{Engine, engine::general_purpose::STANDARD};
use chatvox_core::{
    llm_client::{GenerationError, GenerationOptions, GenerationRequest, TextGenerator},
    session::Session,
    speech::{DEFAULT_OUTPUT_FORMAT, SpeechSynthesizer, SynthesisError, SynthesisRequest},
};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

pub const PROCESSING_MESSAGE: &str = "Thinking...";
pub const PERSONALITY_SET_MESSAGE: &str = "Personality updated successfully";

/// Tunables shared by every session's relay.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub generation: GenerationOptions,
    pub voice_id: String,
    pub output_format: String,
    /// Upper bound on each individual gateway call.
    pub gateway_timeout: Duration,
}

impl RelaySettings {
    pub fn new(voice_id: impl Into<String>) -> Self {
        Self {
            generation: GenerationOptions::default(),
            voice_id: voice_id.into(),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            gateway_timeout: Duration::from_secs(30),
        }
    }
}

/// Drives one inbound event at a time through the gateways for a session.
pub struct Relay {
    generator: Arc<dyn TextGenerator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    settings: RelaySettings,
}

impl Relay {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            generator,
            synthesizer,
            settings,
        }
    }

    /// Handles one inbound event to completion, emitting its outbound events in order.
    #[instrument(skip_all, fields(session_id = %session.id()))]
    pub async fn handle(
        &self,
        session: &mut Session,
        message: ClientMessage,
        outbound: &mpsc::Sender<ServerMessage>,
    ) {
        match message {
            ClientMessage::UserMessage { message } => {
                self.handle_user_message(session, message, outbound).await;
            }
            ClientMessage::ClearHistory => {
                session.clear_history();
                info!("History cleared");
                emit(outbound, ServerMessage::HistoryCleared).await;
            }
            ClientMessage::SetPersonality { personality } => {
                session.set_personality(personality);
                info!("Personality updated");
                emit(
                    outbound,
                    ServerMessage::PersonalitySet {
                        message: PERSONALITY_SET_MESSAGE.to_string(),
                    },
                )
                .await;
            }
        }
    }

    /// Reports an inbound frame that could not be decoded.
    pub async fn reject(&self, error: ProtocolError, outbound: &mpsc::Sender<ServerMessage>) {
        warn!(%error, "Rejecting inbound frame");
        emit(
            outbound,
            ServerMessage::Error {
                message: error.to_string(),
            },
        )
        .await;
    }

    async fn handle_user_message(
        &self,
        session: &mut Session,
        text: String,
        outbound: &mpsc::Sender<ServerMessage>,
    ) {
        info!(chars = text.len(), "Received user message");
        emit(
            outbound,
            ServerMessage::Processing {
                message: PROCESSING_MESSAGE.to_string(),
            },
        )
        .await;

        let request = GenerationRequest {
            history: session.history().to_vec(),
            personality: session.personality().to_string(),
            message: text.clone(),
            options: self.settings.generation,
        };
        let reply = match self.generate(request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Text generation failed");
                emit(outbound, ServerMessage::Error { message: e.to_string() }).await;
                return;
            }
        };

        // The exchange is committed before synthesis so a speech failure keeps the turn.
        session.record_exchange(text, reply.clone());
        emit(outbound, ServerMessage::AiResponse { text: reply.clone() }).await;

        let request = SynthesisRequest {
            text: reply,
            voice_id: self.settings.voice_id.clone(),
            output_format: self.settings.output_format.clone(),
        };
        match self.synthesize(request).await {
            Ok(audio) => {
                debug!(bytes = audio.len(), "Sending audio");
                emit(
                    outbound,
                    ServerMessage::Audio {
                        audio: STANDARD.encode(audio),
                    },
                )
                .await;
            }
            Err(e) => {
                warn!(error = %e, "Speech synthesis failed");
                emit(outbound, ServerMessage::Error { message: e.to_string() }).await;
            }
        }
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let timeout = self.settings.gateway_timeout;
        tokio::time::timeout(timeout, self.generator.generate(request))
            .await
            .map_err(|_| GenerationError::Timeout(timeout))?
    }

    async fn synthesize(&self, request: SynthesisRequest) -> Result<Vec<u8>, SynthesisError> {
        let timeout = self.settings.gateway_timeout;
        tokio::time::timeout(timeout, self.synthesizer.synthesize(request))
            .await
            .map_err(|_| SynthesisError::Timeout(timeout))?
    }
}

/// Pushes an event to the connection's writer. A closed channel means the
/// client is gone, so the event is dropped.
async fn emit(outbound: &mpsc::Sender<ServerMessage>, message: ServerMessage) {
    if outbound.send(message).await.is_err() {
        debug!("Client disconnected; dropping outbound event");
    }
}
