use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use mockito::{Matcher, Server};
use portal_assistant::{
    config::{AzureSettingsUpdate, Settings, SettingsStore},
    handlers::{chat, settings},
    state::AppState,
};
use portal_llm::{
    decode_event_stream, ChatClient, ChatError, ChatStream, LogLevel, LogStore, LogStoreConfig,
    Result,
};

/// Replies with a fixed SSE body and remembers what it was asked
struct FakeClient {
    sse: &'static str,
    error: Option<ChatError>,
    seen: Mutex<Vec<String>>,
}

impl FakeClient {
    fn replying(sse: &'static str) -> Self {
        Self {
            sse,
            error: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn failing(error: ChatError) -> Self {
        Self {
            sse: "",
            error: Some(error),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatClient for FakeClient {
    async fn request_completion(&self, user_text: &str) -> Result<String> {
        self.seen.lock().unwrap().push(user_text.to_string());
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok("Whole reply".to_string()),
        }
    }

    async fn stream_completion(&self, user_text: &str) -> Result<ChatStream> {
        self.seen.lock().unwrap().push(user_text.to_string());
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        let chunks: Vec<std::result::Result<&'static [u8], String>> =
            self.sse.as_bytes().chunks(5).map(Ok).collect();
        Ok(decode_event_stream(stream::iter(chunks)))
    }
}

const TWO_FRAGMENTS: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"content\":\"Hello \"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"there\"}}]}\n\n",
    "data: [DONE]\n\n",
);

fn state_with(client: Arc<FakeClient>, logs: LogStore) -> AppState {
    let dir = std::env::temp_dir().join("portal-assistant-unused.toml");
    AppState::new(Arc::new(SettingsStore::new(dir)), client, logs)
}

#[tokio::test]
async fn test_ask_streams_reply() {
    let client = Arc::new(FakeClient::replying(TWO_FRAGMENTS));
    let state = state_with(client.clone(), LogStore::default());

    let mut out = Vec::new();
    chat::ask(&state, "Hi", true, &mut out).await.unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "Hello there\n");
    assert_eq!(*client.seen.lock().unwrap(), vec!["Hi"]);
}

#[tokio::test]
async fn test_ask_without_streaming() {
    let client = Arc::new(FakeClient::replying(""));
    let state = state_with(client, LogStore::default());

    let mut out = Vec::new();
    chat::ask(&state, "Hi", false, &mut out).await.unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "Whole reply\n");
}

#[tokio::test]
async fn test_ask_prints_user_message_on_error() {
    let client = Arc::new(FakeClient::failing(ChatError::AuthenticationFailed));
    let state = state_with(client, LogStore::default());

    let mut out = Vec::new();
    chat::ask(&state, "Hi", false, &mut out).await.unwrap();

    assert_eq!(
        String::from_utf8(out).unwrap(),
        "Authentication failed. Please check your Azure OpenAI API key in the Settings page.\n"
    );
}

#[tokio::test]
async fn test_repl_session() {
    let client = Arc::new(FakeClient::replying(TWO_FRAGMENTS));
    let logs = LogStore::new(LogStoreConfig {
        level: LogLevel::Debug,
        ..LogStoreConfig::default()
    });
    logs.record(LogLevel::Info, "test", "before session", None);
    let state = state_with(client.clone(), logs.clone());

    let input: &[u8] = b"\n   \nFirst question\n/clear-logs\n/logs\n/quit\nnever sent\n";
    let mut out = Vec::new();
    chat::run_repl(&state, true, input, &mut out).await.unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with(chat::GREETING));
    assert!(text.contains("Hello there\n"));
    assert!(text.contains("Logs cleared."));
    assert!(text.contains("[]"));
    assert!(logs.is_empty());
    assert_eq!(*client.seen.lock().unwrap(), vec!["First question"]);
}

#[tokio::test]
async fn test_repl_ends_at_eof() {
    let client = Arc::new(FakeClient::replying(TWO_FRAGMENTS));
    let state = state_with(client.clone(), LogStore::default());

    let input: &[u8] = b"one\ntwo";
    let mut out = Vec::new();
    chat::run_repl(&state, false, input, &mut out).await.unwrap();

    assert_eq!(*client.seen.lock().unwrap(), vec!["one", "two"]);
}

#[test]
fn test_settings_set_merges_into_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("portal.toml");
    let store = SettingsStore::new(&path);

    let mut out = Vec::new();
    settings::set(
        &store,
        AzureSettingsUpdate {
            api_key: Some("first-key".to_string()),
            endpoint: Some("https://x/".to_string()),
            ..Default::default()
        },
        &mut out,
    )
    .unwrap();
    settings::set(
        &store,
        AzureSettingsUpdate {
            deployment_name: Some("gpt-4o".to_string()),
            ..Default::default()
        },
        &mut out,
    )
    .unwrap();

    let saved = Settings::from_toml(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved.azure_openai.api_key, "first-key");
    assert_eq!(saved.azure_openai.endpoint, "https://x/");
    assert_eq!(saved.azure_openai.deployment_name, "gpt-4o");
}

#[test]
fn test_settings_set_requires_a_value() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::new(dir.path().join("portal.toml"));

    let mut out = Vec::new();
    assert!(settings::set(&store, AzureSettingsUpdate::default(), &mut out).is_err());
    assert!(!dir.path().join("portal.toml").exists());
}

#[test]
fn test_settings_show_masks_key() {
    if portal_llm::AzureConfig::from_env().is_some() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("portal.toml");
    std::fs::write(
        &path,
        "[azure_openai]\napi_key = \"sk-very-secret\"\nendpoint = \"https://x/\"\n",
    )
    .unwrap();

    let mut out = Vec::new();
    settings::show(&SettingsStore::new(&path), &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(!text.contains("sk-very-secret"));
    assert!(text.contains("**********cret"));
    assert!(text.contains("2023-05-15"));
    assert!(text.contains("Missing:         deployment_name"));
}

#[tokio::test]
async fn test_settings_edits_apply_to_next_call() {
    if portal_llm::AzureConfig::from_env().is_some() {
        return;
    }
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/openai/deployments/gpt-4o/chat/completions")
        .match_query(Matcher::UrlEncoded("api-version".into(), "2023-05-15".into()))
        .match_header("api-key", "saved-key")
        .with_status(200)
        .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"Configured"}}]}"#)
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::new(dir.path().join("portal.toml"));
    let state = AppState::with_azure_client(store, LogStore::default()).unwrap();

    let mut out = Vec::new();
    chat::ask(&state, "Hi", false, &mut out).await.unwrap();
    assert!(String::from_utf8(out)
        .unwrap()
        .contains("check your Azure OpenAI configuration"));

    state
        .settings
        .update_azure(AzureSettingsUpdate {
            api_key: Some("saved-key".to_string()),
            endpoint: Some(format!("{}/", server.url())),
            deployment_name: Some("gpt-4o".to_string()),
            api_version: None,
        })
        .unwrap();

    let mut out = Vec::new();
    chat::ask(&state, "Hi", false, &mut out).await.unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "Configured\n");
    mock.assert_async().await;
}
