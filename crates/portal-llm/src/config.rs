// Configuration layer for the Azure OpenAI chat client
// The client never validates these values beyond presence; they are passed through as-is

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

/// API version used when none has been stored yet
pub const DEFAULT_API_VERSION: &str = "2023-05-15";

pub const ENV_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_DEPLOYMENT_NAME: &str = "AZURE_OPENAI_DEPLOYMENT_NAME";
pub const ENV_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";

/// Connection settings for an Azure OpenAI deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureConfig {
    #[serde(default)]
    pub api_key: String,
    /// Resource base URL, e.g. "https://my-resource.openai.azure.com/"
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub deployment_name: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: String::new(),
            deployment_name: String::new(),
            api_version: default_api_version(),
        }
    }
}

impl AzureConfig {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        deployment_name: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            deployment_name: deployment_name.into(),
            api_version: api_version.into(),
        }
    }

    /// Read all four values from the `AZURE_OPENAI_*` environment variables.
    ///
    /// Returns `None` unless every variable is set and non-empty, so callers
    /// can fall back to stored settings as a whole rather than mixing sources.
    pub fn from_env() -> Option<Self> {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        Some(Self {
            api_key: read(ENV_API_KEY)?,
            endpoint: read(ENV_ENDPOINT)?,
            deployment_name: read(ENV_DEPLOYMENT_NAME)?,
            api_version: read(ENV_API_VERSION)?,
        })
    }

    /// Names of the fields that are empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("api_key", &self.api_key),
            ("endpoint", &self.endpoint),
            ("deployment_name", &self.deployment_name),
            ("api_version", &self.api_version),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Fail with `ConfigurationMissing` unless all four fields are present
    pub fn ensure_complete(&self) -> Result<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ChatError::ConfigurationMissing(missing))
        }
    }

    /// Chat-completions URL for the configured deployment
    pub fn chat_completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment_name,
            self.api_version
        )
    }
}

/// Source of connection settings, consulted once per call.
///
/// Implementations may re-read their backing store each time so that edits
/// made between calls take effect without rebuilding the client.
pub trait ConfigProvider: Send + Sync {
    fn azure_config(&self) -> AzureConfig;
}

impl ConfigProvider for AzureConfig {
    fn azure_config(&self) -> AzureConfig {
        self.clone()
    }
}
