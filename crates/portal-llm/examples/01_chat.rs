use anyhow::Result;
use portal_llm::{AzureConfig, AzureOpenAIClient, ChatClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Load Azure OpenAI configuration from environment variables
    let config = AzureConfig::from_env().ok_or_else(|| {
        anyhow::anyhow!("Set AZURE_OPENAI_API_KEY, AZURE_OPENAI_ENDPOINT, AZURE_OPENAI_DEPLOYMENT_NAME and AZURE_OPENAI_API_VERSION")
    })?;

    println!("Azure OpenAI Chat Completion Example");
    println!("=====================================\n");
    println!("Endpoint: {}", config.endpoint);
    println!("Deployment: {}", config.deployment_name);
    println!("API Version: {}\n", config.api_version);

    let client = AzureOpenAIClient::builder(config).build()?;

    println!("Sending request...\n");

    match client
        .request_completion("Summarize what a project kickoff meeting should cover.")
        .await
    {
        Ok(reply) if reply.is_empty() => println!("(empty reply)"),
        Ok(reply) => println!("Response: {}", reply),
        Err(e) => {
            println!("{}", e.user_message());
            println!("Details: {}", e);
        }
    }

    Ok(())
}
