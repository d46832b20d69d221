mod client;

pub use client::{
    AzureOpenAIClient, AzureOpenAIClientBuilder, DEFAULT_REQUEST_TIMEOUT, DEFAULT_STREAM_TIMEOUT,
};
