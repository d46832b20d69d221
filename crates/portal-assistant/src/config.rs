use config::{Config as ConfigLoader, ConfigError, Environment, File, FileFormat};
use portal_llm::{AzureConfig, ConfigProvider, LogStoreConfig, DEFAULT_API_VERSION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings file used when `--settings` is not given
pub const DEFAULT_SETTINGS_FILE: &str = "portal.toml";

/// Contents of the settings file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub azure_openai: StoredAzureSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Azure values as saved from `settings set`; any of them may be blank
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredAzureSettings {
    pub api_key: String,
    pub endpoint: String,
    pub deployment_name: String,
    pub api_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    /// "pretty" or "json"
    pub format: String,
    pub console_output: bool,
    pub capture: LogStoreConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            console_output: true,
            capture: LogStoreConfig::default(),
        }
    }
}

/// Partial update applied by `settings set`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AzureSettingsUpdate {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub deployment_name: Option<String>,
    pub api_version: Option<String>,
}

impl AzureSettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.api_key.is_none()
            && self.endpoint.is_none()
            && self.deployment_name.is_none()
            && self.api_version.is_none()
    }

    pub fn apply(self, stored: &mut StoredAzureSettings) {
        if let Some(v) = self.api_key {
            stored.api_key = v;
        }
        if let Some(v) = self.endpoint {
            stored.endpoint = v;
        }
        if let Some(v) = self.deployment_name {
            stored.deployment_name = v;
        }
        if let Some(v) = self.api_version {
            stored.api_version = v;
        }
    }
}

/// Pick the connection settings for one call.
///
/// A complete environment wins as a whole; otherwise the stored values are
/// used and a blank API version falls back to the default.
pub fn resolve_azure_config(env: Option<AzureConfig>, stored: &StoredAzureSettings) -> AzureConfig {
    if let Some(config) = env {
        return config;
    }

    let api_version = if stored.api_version.is_empty() {
        DEFAULT_API_VERSION.to_string()
    } else {
        stored.api_version.clone()
    };

    AzureConfig::new(
        stored.api_key.clone(),
        stored.endpoint.clone(),
        stored.deployment_name.clone(),
        api_version,
    )
}

/// Show only the last four characters of a key
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.is_empty() {
        return "(not set)".to_string();
    }
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}

impl Settings {
    /// Load settings from a TOML file (missing file is fine) and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. built-in defaults
    /// 2. the settings file
    /// 3. `PORTAL_LOGGING__*` variables, e.g. `PORTAL_LOGGING__LEVEL=debug`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .add_source(File::from(path.as_ref()).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("PORTAL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Parse settings from a TOML string, ignoring the environment
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        ConfigLoader::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Settings file handle; re-read on every lookup so edits apply to the next call
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Settings, ConfigError> {
        Settings::load(&self.path)
    }

    /// Only the file, without environment overrides, so saving never persists them
    fn load_file(&self) -> anyhow::Result<Settings> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Merge `update` into the stored Azure settings and write the file back
    pub fn update_azure(&self, update: AzureSettingsUpdate) -> anyhow::Result<StoredAzureSettings> {
        use anyhow::Context;

        let mut settings = self
            .load_file()
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        update.apply(&mut settings.azure_openai);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents = settings.to_toml().context("Failed to serialize settings")?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))?;

        tracing::info!(path = %self.path.display(), "Azure OpenAI settings saved");
        Ok(settings.azure_openai)
    }

    fn stored_azure(&self) -> StoredAzureSettings {
        match self.load() {
            Ok(settings) => settings.azure_openai,
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "Error reading stored settings");
                StoredAzureSettings::default()
            }
        }
    }
}

impl ConfigProvider for SettingsStore {
    fn azure_config(&self) -> AzureConfig {
        resolve_azure_config(AzureConfig::from_env(), &self.stored_azure())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_llm::LogLevel;

    #[test]
    fn test_settings_structure() {
        let toml = r#"
            [azure_openai]
            api_key = "secret-key"
            endpoint = "https://my-resource.openai.azure.com/"
            deployment_name = "gpt-4o"

            [logging]
            level = "debug"
            format = "json"
            console_output = false

            [logging.capture]
            level = "WARN"
            max_stored_logs = 20
        "#;

        let settings = Settings::from_toml(toml).unwrap();
        assert_eq!(settings.azure_openai.deployment_name, "gpt-4o");
        assert_eq!(settings.azure_openai.api_version, "");
        assert_eq!(settings.logging.format, "json");
        assert!(!settings.logging.console_output);
        assert_eq!(settings.logging.capture.level, LogLevel::Warn);
        assert_eq!(settings.logging.capture.max_stored_logs, 20);
        assert!(settings.logging.capture.store_logs);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn test_environment_wins_when_complete() {
        let env = AzureConfig::new("env-key", "https://env/", "env-dep", "2024-06-01");
        let stored = StoredAzureSettings {
            api_key: "stored-key".to_string(),
            ..Default::default()
        };

        assert_eq!(resolve_azure_config(Some(env.clone()), &stored), env);
    }

    #[test]
    fn test_stored_values_with_default_version() {
        let stored = StoredAzureSettings {
            api_key: "k".to_string(),
            endpoint: "https://x/".to_string(),
            deployment_name: "d".to_string(),
            api_version: String::new(),
        };

        let config = resolve_azure_config(None, &stored);
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
        assert!(config.is_complete());
    }

    #[test]
    fn test_nothing_stored_is_incomplete() {
        let config = resolve_azure_config(None, &StoredAzureSettings::default());
        assert_eq!(
            config.missing_fields(),
            vec!["api_key", "endpoint", "deployment_name"]
        );
    }

    #[test]
    fn test_partial_update_merges() {
        let mut stored = StoredAzureSettings {
            api_key: "old".to_string(),
            endpoint: "https://x/".to_string(),
            deployment_name: "d".to_string(),
            api_version: "2023-05-15".to_string(),
        };

        AzureSettingsUpdate {
            api_key: Some("new".to_string()),
            ..Default::default()
        }
        .apply(&mut stored);

        assert_eq!(stored.api_key, "new");
        assert_eq!(stored.endpoint, "https://x/");
        assert!(AzureSettingsUpdate::default().is_empty());
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "(not set)");
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret("sk-123456"), "*****3456");
    }
}
