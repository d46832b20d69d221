// Azure OpenAI chat-completions client

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{AzureConfig, ConfigProvider};
use crate::error::{ChatError, Result};
use crate::streaming::{decode_event_stream, ChatStream};
use crate::traits::{ChatClient, CompletionOptions, CompletionRequest, DEFAULT_SYSTEM_PROMPT};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// Azure OpenAI client (HTTP direct, no SDK)
///
/// Azure OpenAI differs from OpenAI in endpoint structure and authentication:
/// - URL: {endpoint}openai/deployments/{deployment}/chat/completions?api-version={version}
/// - Auth header: `api-key` instead of `Authorization: Bearer`
///
/// Connection settings come from a [`ConfigProvider`] consulted on every
/// call, so an incomplete configuration is reported per call as
/// [`ChatError::ConfigurationMissing`] without touching the network.
pub struct AzureOpenAIClient {
    http_client: reqwest::Client,
    config: Arc<dyn ConfigProvider>,
    system_prompt: String,
    options: CompletionOptions,
    request_timeout: Duration,
    stream_timeout: Duration,
}

impl fmt::Debug for AzureOpenAIClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureOpenAIClient")
            .field("options", &self.options)
            .field("request_timeout", &self.request_timeout)
            .field("stream_timeout", &self.stream_timeout)
            .finish_non_exhaustive()
    }
}

impl AzureOpenAIClient {
    /// Create new Azure OpenAI client with builder pattern
    pub fn builder(config: impl ConfigProvider + 'static) -> AzureOpenAIClientBuilder {
        AzureOpenAIClientBuilder::new(Arc::new(config))
    }

    /// Builder over a provider that is shared with other components
    pub fn builder_shared(config: Arc<dyn ConfigProvider>) -> AzureOpenAIClientBuilder {
        AzureOpenAIClientBuilder::new(config)
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Snapshot the configuration and build the request body for one call
    fn prepare(&self, user_text: &str, stream: bool) -> Result<(AzureConfig, CompletionRequest)> {
        let config = self.config.azure_config();
        if let Err(e) = config.ensure_complete() {
            tracing::error!(error = %e, "Azure OpenAI credentials not found");
            return Err(e);
        }

        let request = CompletionRequest::single_turn(&self.system_prompt, user_text, &self.options)
            .streaming(stream);

        Ok((config, request))
    }

    /// POST the request and check the status line
    async fn send(
        &self,
        config: &AzureConfig,
        request: &CompletionRequest,
        timeout: Duration,
    ) -> Result<reqwest::Response> {
        let url = config.chat_completions_url();

        let mut builder = self
            .http_client
            .post(&url)
            .header("api-key", config.api_key.as_str())
            .timeout(timeout)
            .json(request);
        if request.stream {
            builder = builder.header(ACCEPT, HeaderValue::from_static("text/event-stream"));
        }

        let response = builder.send().await.map_err(|e| {
            let error = ChatError::from_send_error(&e);
            tracing::error!(error = %e, kind = error.kind(), "Failed to send request");
            error
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Azure OpenAI API error");
            return Err(ChatError::from_status(status, body));
        }

        Ok(response)
    }
}

/// Builder for AzureOpenAIClient
pub struct AzureOpenAIClientBuilder {
    config: Arc<dyn ConfigProvider>,
    system_prompt: String,
    options: CompletionOptions,
    request_timeout: Duration,
    stream_timeout: Duration,
}

impl AzureOpenAIClientBuilder {
    fn new(config: Arc<dyn ConfigProvider>) -> Self {
        Self {
            config,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            options: CompletionOptions::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
        }
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// Upper bound for a non-streaming call, response body included
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Upper bound for a streaming call, from send until the last byte
    pub fn stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<AzureOpenAIClient> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ChatError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(AzureOpenAIClient {
            http_client,
            config: self.config,
            system_prompt: self.system_prompt,
            options: self.options,
            request_timeout: self.request_timeout,
            stream_timeout: self.stream_timeout,
        })
    }
}

// ============================================================================
// TRAIT IMPLEMENTATIONS
// ============================================================================

#[async_trait]
impl ChatClient for AzureOpenAIClient {
    async fn request_completion(&self, user_text: &str) -> Result<String> {
        let (config, request) = self.prepare(user_text, false)?;

        let span = tracing::info_span!(
            "chat_completion",
            call_id = %Uuid::new_v4(),
            deployment = %config.deployment_name,
            stream = false
        );

        async {
            tracing::debug!(chars = user_text.len(), "Sending chat completion request");

            let response = self.send(&config, &request, self.request_timeout).await?;

            let raw: AzureChatResponse = response.json().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to read completion response");
                if e.is_timeout() {
                    ChatError::NoResponse(e.to_string())
                } else {
                    ChatError::Transport(format!("Failed to parse response: {}", e))
                }
            })?;

            if let Some(usage) = &raw.usage {
                tracing::debug!(
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    total_tokens = usage.total_tokens,
                    "Completion received"
                );
            }

            let choice = raw.choices.into_iter().next().ok_or_else(|| {
                ChatError::Transport("Response contained no choices".to_string())
            })?;

            let content = choice.message.content.unwrap_or_default();
            if content.is_empty() {
                tracing::warn!("Completion returned empty content");
            }

            Ok::<_, ChatError>(content)
        }
        .instrument(span)
        .await
    }

    async fn stream_completion(&self, user_text: &str) -> Result<ChatStream> {
        let (config, request) = self.prepare(user_text, true)?;

        let span = tracing::info_span!(
            "chat_completion",
            call_id = %Uuid::new_v4(),
            deployment = %config.deployment_name,
            stream = true
        );

        let response = async {
            tracing::debug!(chars = user_text.len(), "Opening chat completion stream");
            let response = self.send(&config, &request, self.stream_timeout).await?;
            tracing::debug!("Stream established");
            Ok::<_, ChatError>(response)
        }
        .instrument(span)
        .await?;

        Ok(decode_event_stream(response.bytes_stream()))
    }
}

// ============================================================================
// AZURE-SPECIFIC RESPONSE TYPES (for Chat Completions)
// ============================================================================

#[derive(Debug, Deserialize)]
struct AzureChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
