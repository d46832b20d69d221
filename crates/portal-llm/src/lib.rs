pub mod azure_openai;
pub mod buffer_utils;
pub mod config;
pub mod error;
pub mod log_store;
pub mod streaming;
pub mod traits;
pub mod types;

pub use traits::{
    ChatClient,
    CompletionOptions, CompletionRequest,
    DEFAULT_MAX_TOKENS, DEFAULT_SYSTEM_PROMPT, DEFAULT_TEMPERATURE,
};

pub use azure_openai::{AzureOpenAIClient, AzureOpenAIClientBuilder};
pub use config::{AzureConfig, ConfigProvider, DEFAULT_API_VERSION};
pub use error::{ChatError, Result};
pub use log_store::{LogEntry, LogLevel, LogStore, LogStoreConfig, LogStoreLayer};
pub use streaming::{
    decode_event_stream, dispatch_events, ChatStream, DecoderStats, StreamAccumulator,
    StreamDecoder, StreamEvent, StreamHandler,
};
pub use types::{ChatMessage, Role};
