use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::streaming::{dispatch_events, ChatStream, StreamHandler};
use crate::types::ChatMessage;

/// Default instructions sent ahead of every user message
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a Solutions Development Assistant that helps users with projects, ideas, documents, and platform features. Provide helpful, concise responses about project management, ServiceNow integration, document creation, calendar events, idea development, and platform features.";

pub const DEFAULT_MAX_TOKENS: u32 = 800;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Trait for single-turn chat completions
///
/// Provides both streaming and non-streaming completions. Each call sends a
/// fresh `[system, user]` conversation; nothing is remembered between calls.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Non-streaming completion. An empty reply is `Ok(String::new())`.
    async fn request_completion(&self, user_text: &str) -> Result<String>;

    /// Streaming completion. Setup failures are returned as `Err`; failures
    /// after the response has started arrive as a terminal `StreamEvent::Error`.
    async fn stream_completion(&self, user_text: &str) -> Result<ChatStream>;

    /// Callback form of [`ChatClient::stream_completion`].
    ///
    /// Setup failures go to `on_error`; otherwise fragments are forwarded in
    /// order followed by exactly one terminal callback.
    async fn stream_completion_with(&self, user_text: &str, handler: &mut dyn StreamHandler) {
        match self.stream_completion(user_text).await {
            Ok(stream) => dispatch_events(stream, handler).await,
            Err(error) => handler.on_error(&error),
        }
    }
}

/// Request body for the chat-completions endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub stream: bool,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            stream: false,
        }
    }

    /// The `[system, user]` pair used for every portal call
    pub fn single_turn(system_prompt: &str, user_text: &str, options: &CompletionOptions) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(user_text)],
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            stream: false,
        }
    }

    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: Some(DEFAULT_TEMPERATURE),
        }
    }
}

impl CompletionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    /// Leave temperature to the service default
    pub fn without_temperature(mut self) -> Self {
        self.temperature = None;
        self
    }
}
