use std::io::Write;

use portal_llm::{ChatError, LogStore, StreamHandler};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::state::AppState;

/// First assistant message shown in the chat session
pub const GREETING: &str = "Hello! I'm your Solutions Development Assistant. I can help you with projects, ideas, documents, and more. What can I assist you with today?";

const HELP: &str = "Commands: /logs  print captured logs as JSON\n          /clear-logs  discard captured logs\n          /quit  leave the session";

/// Writes fragments to the terminal as they arrive
pub struct TerminalRenderer<W> {
    out: W,
    wrote_any: bool,
    io_error: Option<std::io::Error>,
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            wrote_any: false,
            io_error: None,
        }
    }

    fn write(&mut self, text: &str) {
        if self.io_error.is_some() {
            return;
        }
        let result = self
            .out
            .write_all(text.as_bytes())
            .and_then(|_| self.out.flush());
        if let Err(e) = result {
            self.io_error = Some(e);
        }
    }

    /// First write failure seen while rendering, if any
    pub fn finish(self) -> std::io::Result<()> {
        match self.io_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<W: Write + Send> StreamHandler for TerminalRenderer<W> {
    fn on_fragment(&mut self, text: &str) {
        self.wrote_any = true;
        self.write(text);
    }

    fn on_done(&mut self) {
        self.write("\n");
    }

    fn on_error(&mut self, error: &ChatError) {
        tracing::error!(kind = error.kind(), error = %error, "Chat completion failed");
        if self.wrote_any {
            self.write("\n");
        }
        self.write(error.user_message());
        self.write("\n");
    }
}

/// Send one message and print the reply (or the user-facing error) to `out`
pub async fn ask<W: Write + Send>(
    state: &AppState,
    text: &str,
    streaming: bool,
    out: &mut W,
) -> anyhow::Result<()> {
    if streaming {
        let mut renderer = TerminalRenderer::new(&mut *out);
        state.client.stream_completion_with(text, &mut renderer).await;
        renderer.finish()?;
    } else {
        match state.client.request_completion(text).await {
            Ok(reply) => writeln!(out, "{}", reply)?,
            Err(error) => {
                tracing::error!(kind = error.kind(), error = %error, "Chat completion failed");
                writeln!(out, "{}", error.user_message())?;
            }
        }
    }
    Ok(())
}

/// Print the captured log as a JSON array
pub fn write_logs<W: Write>(logs: &LogStore, out: &mut W) -> anyhow::Result<()> {
    writeln!(out, "{}", logs.export_json()?)?;
    Ok(())
}

/// What a line of REPL input asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput<'a> {
    Empty,
    Message(&'a str),
    ShowLogs,
    ClearLogs,
    Help,
    Quit,
    Unknown(&'a str),
}

pub fn parse_input(line: &str) -> ReplInput<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ReplInput::Empty;
    }
    match trimmed {
        "/logs" => ReplInput::ShowLogs,
        "/clear-logs" => ReplInput::ClearLogs,
        "/help" => ReplInput::Help,
        "/quit" | "/exit" => ReplInput::Quit,
        cmd if cmd.starts_with('/') => ReplInput::Unknown(cmd),
        _ => ReplInput::Message(line.trim_end_matches(['\r', '\n'])),
    }
}

/// Interactive session reading lines from `input` until EOF or `/quit`
pub async fn run_repl<R, W>(
    state: &AppState,
    streaming: bool,
    input: R,
    out: &mut W,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write + Send,
{
    writeln!(out, "{}", GREETING)?;
    writeln!(out, "(type /help for commands)")?;

    let mut lines = input.lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_input(&line) {
            ReplInput::Empty => continue,
            ReplInput::Quit => break,
            ReplInput::Help => writeln!(out, "{}", HELP)?,
            ReplInput::ShowLogs => write_logs(&state.logs, out)?,
            ReplInput::ClearLogs => {
                state.logs.clear();
                writeln!(out, "Logs cleared.")?;
            }
            ReplInput::Unknown(cmd) => writeln!(out, "Unknown command: {}", cmd)?,
            ReplInput::Message(text) => {
                tracing::debug!(chars = text.len(), streaming, "Sending message");
                ask(state, text, streaming, out).await?;
            }
        }
    }

    tracing::debug!("Chat session ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("   "), ReplInput::Empty);
        assert_eq!(parse_input(" /logs "), ReplInput::ShowLogs);
        assert_eq!(parse_input("/clear-logs"), ReplInput::ClearLogs);
        assert_eq!(parse_input("/quit"), ReplInput::Quit);
        assert_eq!(parse_input("/nope"), ReplInput::Unknown("/nope"));
        assert_eq!(parse_input("  keep spacing "), ReplInput::Message("  keep spacing "));
    }

    #[test]
    fn test_write_logs_goes_to_given_writer() {
        let logs = LogStore::default();
        logs.record(portal_llm::LogLevel::Warn, "portal", "slow reply", None);

        let mut buf = Vec::new();
        write_logs(&logs, &mut buf).unwrap();

        let parsed: Vec<portal_llm::LogEntry> = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].message, "slow reply");
        assert!(buf.ends_with(b"\n"));
    }

    #[test]
    fn test_renderer_writes_fragments_then_newline() {
        let mut buf = Vec::new();
        let mut renderer = TerminalRenderer::new(&mut buf);
        renderer.on_fragment("Hel");
        renderer.on_fragment("lo");
        renderer.on_done();
        renderer.finish().unwrap();

        assert_eq!(String::from_utf8(buf).unwrap(), "Hello\n");
    }

    #[test]
    fn test_renderer_error_after_partial_reply() {
        let mut buf = Vec::new();
        let mut renderer = TerminalRenderer::new(&mut buf);
        renderer.on_fragment("par");
        renderer.on_error(&ChatError::RateLimited);
        renderer.finish().unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("par\n"));
        assert!(text.ends_with(&format!("{}\n", ChatError::RateLimited.user_message())));
    }
}
