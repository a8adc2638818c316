use crate::session::{Role, Turn};
use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Sampling temperature used for every reply.
pub const DEFAULT_TEMPERATURE: f32 = 0.9;
/// Upper bound on the length of a generated reply, in tokens.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 200;

/// Errors surfaced by a [`TextGenerator`].
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Text generation failed: {0}")]
    Provider(String),
    #[error("Text generation returned an empty reply")]
    EmptyResponse,
    #[error("Text generation timed out after {0:?}")]
    Timeout(Duration),
}

impl From<OpenAIError> for GenerationError {
    fn from(err: OpenAIError) -> Self {
        Self::Provider(err.to_string())
    }
}

/// Sampling settings for a single generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}

/// Everything the model needs to produce the next reply.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Prior turns of the conversation, oldest first.
    pub history: Vec<Turn>,
    /// System prompt for the session.
    pub personality: String,
    /// The user's new message.
    pub message: String,
    pub options: GenerationOptions,
}

/// A client that turns a conversation into the model's next reply.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Makes a single, non-streaming call and returns the whole reply text.
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}

/// Builds the chat message list: system prompt, prior turns, then the new message.
pub fn build_messages(
    request: &GenerationRequest,
) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
    let mut messages: Vec<ChatCompletionRequestMessage> =
        Vec::with_capacity(request.history.len() + 2);
    messages.push(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(request.personality.clone())
            .build()?
            .into(),
    );
    for turn in &request.history {
        match turn.role {
            Role::User => messages.push(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.content.clone())
                    .build()?
                    .into(),
            ),
            Role::Model => messages.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.content.clone())
                    .build()?
                    .into(),
            ),
        };
    }
    messages.push(
        ChatCompletionRequestUserMessageArgs::default()
            .content(request.message.clone())
            .build()?
            .into(),
    );
    Ok(messages)
}

/// An implementation of `TextGenerator` for any OpenAI-compatible API.
///
/// Gemini is reached through its OpenAI-compatible endpoint, so the same
/// client serves both providers.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The model identifier to use for chat completions (e.g., "gemini-2.0-flash-exp").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAICompatibleClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let messages = build_messages(&request)?;
        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(request.options.temperature)
            .max_completion_tokens(request.options.max_output_tokens)
            .build()?;

        let response: CreateChatCompletionResponse =
            self.client.chat().create(chat_request).await?;
        let reply = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(GenerationError::EmptyResponse)?;

        if reply.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        debug!(model = %self.model, chars = reply.len(), "Received completion");
        Ok(reply)
    }
}
