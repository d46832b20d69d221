use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;

use portal_assistant::{
    args::{Args, Command},
    config::SettingsStore,
    handlers::{chat, settings},
    state::AppState,
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let store = SettingsStore::new(&args.settings);
    let mut config = store
        .load()
        .with_context(|| format!("Failed to load settings from {}", args.settings.display()))?;

    if let Some(format) = args.log_format {
        config.logging.format = format.as_str().to_string();
    }

    let guard = telemetry::init(&config.logging, args.log_level.as_deref())
        .context("Failed to initialize logging")?;
    tracing::info!(settings = %args.settings.display(), "Starting portal assistant");

    let mut stdout = std::io::stdout();
    let result = match args.command {
        Command::Settings { action } => match action.into_update() {
            None => settings::show(&store, &mut stdout),
            Some(update) => settings::set(&store, update, &mut stdout),
        },
        Command::Ask {
            text,
            no_stream,
            export_logs,
        } => {
            let state = AppState::with_azure_client(store, guard.store().clone())?;
            let result = chat::ask(&state, &text, !no_stream, &mut stdout).await;
            if export_logs {
                chat::write_logs(&state.logs, &mut stdout)?;
            }
            result
        }
        Command::Chat { no_stream } => {
            let state = AppState::with_azure_client(store, guard.store().clone())?;
            let stdin = BufReader::new(tokio::io::stdin());
            chat::run_repl(&state, !no_stream, stdin, &mut stdout).await
        }
    };

    let remaining = guard.shutdown();
    tracing::debug!(entries = remaining.len(), "Shut down");
    result
}
