use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{AzureSettingsUpdate, DEFAULT_SETTINGS_FILE};

/// Solutions Portal assistant
#[derive(Debug, Parser)]
#[command(name = "portal-assistant", about = "Chat with the Solutions Development Assistant")]
pub struct Args {
    /// Path to the settings file
    #[arg(short, long, global = true, default_value = DEFAULT_SETTINGS_FILE, env = "PORTAL_SETTINGS")]
    pub settings: PathBuf,

    /// Log filter directive, overriding RUST_LOG and the settings file
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Console log format, overriding the settings file
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send a single message and print the reply
    Ask {
        /// Message text
        text: String,

        /// Wait for the whole reply instead of streaming it
        #[arg(long)]
        no_stream: bool,

        /// Print the captured log as JSON after the reply
        #[arg(long)]
        export_logs: bool,
    },
    /// Start an interactive chat session
    Chat {
        /// Wait for whole replies instead of streaming them
        #[arg(long)]
        no_stream: bool,
    },
    /// View or change the Azure OpenAI connection settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    /// Print the effective settings with the API key masked
    Show,
    /// Save one or more values to the settings file
    Set {
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        endpoint: Option<String>,
        #[arg(long)]
        deployment_name: Option<String>,
        #[arg(long)]
        api_version: Option<String>,
    },
}

impl SettingsAction {
    /// Values given to `settings set`, if this is one
    pub fn into_update(self) -> Option<AzureSettingsUpdate> {
        match self {
            Self::Show => None,
            Self::Set {
                api_key,
                endpoint,
                deployment_name,
                api_version,
            } => Some(AzureSettingsUpdate {
                api_key,
                endpoint,
                deployment_name,
                api_version,
            }),
        }
    }
}
