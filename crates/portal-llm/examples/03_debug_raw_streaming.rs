use std::fs::File;
use std::io::Write;

use anyhow::Result;
use futures::StreamExt;
use portal_llm::{AzureConfig, CompletionOptions, CompletionRequest, StreamDecoder, StreamEvent};

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Azure OpenAI Raw Streaming Debug ===\n");

    let config = AzureConfig::from_env()
        .ok_or_else(|| anyhow::anyhow!("AZURE_OPENAI_* environment variables are not set"))?;

    println!("URL: {}\n", config.chat_completions_url());

    let mut raw_chunks_file = File::create("azure_raw_chunks.txt")?;
    let mut events_file = File::create("azure_decoded_events.txt")?;

    let request = CompletionRequest::single_turn(
        "You are a terse assistant.",
        "Explain server-sent events in 3 sentences.",
        &CompletionOptions::default(),
    )
    .streaming(true);

    println!("Request payload:");
    println!("{}\n", serde_json::to_string_pretty(&request)?);

    let response = reqwest::Client::new()
        .post(config.chat_completions_url())
        .header("api-key", config.api_key.as_str())
        .header("accept", "text/event-stream")
        .json(&request)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await?;
        anyhow::bail!("API error ({}): {}", status, error_text);
    }

    let mut stream = response.bytes_stream();
    let mut decoder = StreamDecoder::new();
    let mut chunk_number = 0;

    while let Some(chunk) = stream.next().await {
        let bytes = chunk?;
        chunk_number += 1;

        writeln!(raw_chunks_file, "--- Chunk #{} ({} bytes) ---", chunk_number, bytes.len())?;
        writeln!(raw_chunks_file, "{}\n", String::from_utf8_lossy(&bytes))?;

        for event in decoder.feed(&bytes) {
            writeln!(events_file, "chunk {}: {:?}", chunk_number, event)?;
            if let StreamEvent::Fragment(text) = event {
                print!("{}", text);
                std::io::stdout().flush()?;
            }
        }

        if decoder.is_finished() {
            break;
        }
    }

    if let Some(event) = decoder.finish() {
        writeln!(events_file, "end of transport: {:?}", event)?;
    }

    let stats = decoder.stats();
    println!("\n\n---\n");
    println!("Total chunks received: {}", chunk_number);
    println!("Lines: {}", stats.lines);
    println!("Fragments: {}", stats.fragments);
    println!("Ignored lines: {}", stats.ignored_lines);
    println!("Empty deltas: {}", stats.empty_deltas);
    println!("Malformed records: {}", stats.malformed_lines);
    println!("\nFiles created: azure_raw_chunks.txt, azure_decoded_events.txt");

    Ok(())
}
