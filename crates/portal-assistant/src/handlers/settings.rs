use std::io::Write;

use portal_llm::{AzureConfig, ConfigProvider};

use crate::config::{mask_secret, AzureSettingsUpdate, SettingsStore};

/// Print the effective connection settings with the key masked
pub fn show<W: Write>(store: &SettingsStore, out: &mut W) -> anyhow::Result<()> {
    let from_env = AzureConfig::from_env().is_some();
    let config = store.azure_config();

    writeln!(out, "Settings file:   {}", store.path().display())?;
    writeln!(
        out,
        "Source:          {}",
        if from_env { "environment" } else { "settings file" }
    )?;
    writeln!(out, "API key:         {}", mask_secret(&config.api_key))?;
    writeln!(out, "Endpoint:        {}", or_not_set(&config.endpoint))?;
    writeln!(out, "Deployment name: {}", or_not_set(&config.deployment_name))?;
    writeln!(out, "API version:     {}", config.api_version)?;

    let missing = config.missing_fields();
    if !missing.is_empty() {
        writeln!(out, "Missing:         {}", missing.join(", "))?;
    }
    Ok(())
}

/// Merge the given values into the settings file
pub fn set<W: Write>(
    store: &SettingsStore,
    update: AzureSettingsUpdate,
    out: &mut W,
) -> anyhow::Result<()> {
    if update.is_empty() {
        anyhow::bail!("Nothing to update; pass at least one of --api-key, --endpoint, --deployment-name, --api-version");
    }

    store.update_azure(update)?;
    writeln!(out, "Settings saved to {}", store.path().display())?;
    if AzureConfig::from_env().is_some() {
        writeln!(
            out,
            "Note: AZURE_OPENAI_* environment variables are set and take precedence."
        )?;
    }
    Ok(())
}

fn or_not_set(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}
