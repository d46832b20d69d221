use std::io::Write;

use anyhow::Result;
use futures::StreamExt;
use portal_llm::{AzureConfig, AzureOpenAIClient, ChatClient, StreamEvent};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AzureConfig::from_env().ok_or_else(|| {
        anyhow::anyhow!("Set AZURE_OPENAI_API_KEY, AZURE_OPENAI_ENDPOINT, AZURE_OPENAI_DEPLOYMENT_NAME and AZURE_OPENAI_API_VERSION")
    })?;

    println!("Azure OpenAI Streaming Chat Example");
    println!("====================================\n");
    println!("Endpoint: {}", config.endpoint);
    println!("API Version: {}\n", config.api_version);

    let client = AzureOpenAIClient::builder(config).build()?;

    println!("Streaming response:\n");
    println!("---");

    let mut stream = match client
        .stream_completion("Write four short lines about shipping a release on time.")
        .await
    {
        Ok(stream) => stream,
        Err(e) => {
            println!("{}", e.user_message());
            return Ok(());
        }
    };

    while let Some(event) = stream.next().await {
        match event {
            StreamEvent::Fragment(text) => {
                print!("{}", text);
                std::io::stdout().flush()?;
            }
            StreamEvent::Done => println!("\n---\n"),
            StreamEvent::Error(e) => println!("\n[{}]", e.user_message()),
        }
    }

    println!("Stream complete!");

    Ok(())
}
