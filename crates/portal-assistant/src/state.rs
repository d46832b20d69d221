use portal_llm::{AzureOpenAIClient, ChatClient, LogStore};
use std::sync::Arc;

use crate::config::SettingsStore;

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<SettingsStore>,
    pub client: Arc<dyn ChatClient>,
    pub logs: LogStore,
}

impl AppState {
    pub fn new(settings: Arc<SettingsStore>, client: Arc<dyn ChatClient>, logs: LogStore) -> Self {
        Self {
            settings,
            client,
            logs,
        }
    }

    /// State backed by the Azure client, reading credentials from `settings` on each call
    pub fn with_azure_client(settings: SettingsStore, logs: LogStore) -> anyhow::Result<Self> {
        let settings = Arc::new(settings);
        let client = AzureOpenAIClient::builder_shared(settings.clone()).build()?;
        Ok(Self::new(settings, Arc::new(client), logs))
    }
}
