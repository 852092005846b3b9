//! Interactive chat REPL.
//!
//! Lines starting with `/` are commands (`/reset`, `/quit`); anything else
//! is sent as a chat turn. Ctrl-C while a reply streams cancels that reply.

use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use url::{Host, Url};

use honyaku_client::chat::{ChatSession, GenerationController, GenerationObserver, GenerationState, Usage};
use honyaku_client::{OpenAiEngine, ShareInbox};
use honyaku_core::{AppConfig, Error};

/// Writes streamed text to stdout as it grows.
#[derive(Default)]
struct StdoutObserver {
    printed: usize,
}

impl GenerationObserver for StdoutObserver {
    fn on_update(&mut self, text: &str) {
        if let Some(fresh) = text.get(self.printed..) {
            print!("{fresh}");
            let _ = std::io::stdout().flush();
        }
        self.printed = text.len();
    }

    fn on_finish(&mut self, message: &str, usage: Option<&Usage>) {
        if let Some(rest) = message.get(self.printed..) {
            print!("{rest}");
        }
        println!();
        if let Some(usage) = usage {
            eprintln!("[{} prompt / {} completion tokens]", usage.prompt_tokens, usage.completion_tokens);
        }
    }

    fn on_error(&mut self, error: &Error) {
        println!();
        eprintln!("error: {error}");
    }
}

/// Remote engines need a key; a local one does not.
fn is_local(base_url: &str) -> bool {
    match Url::parse(base_url).ok().and_then(|url| url.host().map(|host| host.to_owned())) {
        Some(Host::Domain(domain)) => domain == "localhost",
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

async fn turn(controller: &GenerationController, session: &ChatSession, input: &str) -> Result<GenerationState> {
    let mut observer = StdoutObserver::default();
    let send = controller.send(session, input, &mut observer);
    tokio::pin!(send);

    loop {
        tokio::select! {
            state = &mut send => return Ok(state?),
            _ = tokio::signal::ctrl_c() => {
                if session.cancel() {
                    println!();
                    eprintln!("(stopped)");
                }
            }
        }
    }
}

pub async fn run(config: &AppConfig, startup_url: Option<&str>) -> Result<()> {
    if !is_local(&config.engine.base_url) {
        config.require_engine_api_key()?;
    }

    let engine = Arc::new(OpenAiEngine::from_config(config)?);
    let controller = GenerationController::new(engine);
    let session = ChatSession::new(config.system_prompt.clone());

    let mut inbox = match startup_url {
        Some(input) => {
            let mut url = Url::parse(input).with_context(|| format!("invalid startup url {input}"))?;
            ShareInbox::from_startup_url(&mut url)
        }
        None => ShareInbox::new(),
    };
    inbox.set_chat_active(true);

    eprintln!("model {} at {} (/reset, /quit)", config.engine.model_id, config.engine.base_url);

    if let Some(shared) = inbox.take_pending() {
        println!("> {shared}");
        turn(&controller, &session, &shared).await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else { break };
        match line.trim() {
            "" => continue,
            "/quit" => break,
            "/reset" => {
                session.reset();
                eprintln!("(history cleared)");
            }
            input => {
                let state = turn(&controller, &session, input).await?;
                tracing::debug!(%state, history = session.len(), "turn finished");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_local() {
        assert!(is_local("http://localhost:8000/v1"));
        assert!(is_local("http://127.0.0.1:8080/v1"));
        assert!(is_local("http://[::1]:8080/v1"));
        assert!(!is_local("https://api.example.com/v1"));
        assert!(!is_local("not a url"));
    }

    #[test]
    fn test_observer_tracks_printed_prefix() {
        let mut observer = StdoutObserver::default();
        observer.on_update("こん");
        observer.on_update("こんにちは");
        assert_eq!(observer.printed, "こんにちは".len());
    }
}
