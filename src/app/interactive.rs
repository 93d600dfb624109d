use super::{create_history, create_provider, create_view, Connection, ProviderConfig};
use crate::session::{StreamController, StreamOutcome, TranslateRequest};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, PartialEq)]
enum Command {
    Translate(String),
    Stop,
    Quit,
    Nothing,
}

fn parse_command(line: &str) -> Command {
    match line.trim() {
        "" => Command::Nothing,
        "/stop" => Command::Stop,
        "/quit" | "/exit" => Command::Quit,
        text => Command::Translate(text.to_string()),
    }
}

pub async fn run(
    connection: Connection,
    html_out: Option<PathBuf>,
    no_history: bool,
) -> Result<()> {
    let model = connection.require_model()?.to_string();
    let provider = create_provider(ProviderConfig {
        api_url: connection.api_url,
        ..ProviderConfig::default()
    })
    .context("Failed to initialize model client")?;
    let controller = Arc::new(StreamController::new(
        provider,
        create_view(html_out),
        create_history(no_history)?,
    ));

    eprintln!("Enter text to translate with {model}. A new line replaces the running translation.");
    eprintln!("/stop stops it, /quit or Ctrl-D exits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut running: Option<JoinHandle<StreamOutcome>> = None;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read from stdin")?,
            _ = tokio::signal::ctrl_c() => {
                // The first Ctrl-C stops a running translation, the next one exits
                if controller.stop() {
                    continue;
                }
                break;
            }
        };
        let Some(line) = line else {
            debug!("stdin closed");
            break;
        };

        match parse_command(&line) {
            Command::Nothing => {}
            Command::Stop => {
                if !controller.stop() {
                    eprintln!("Nothing to stop.");
                }
            }
            Command::Quit => {
                controller.stop();
                break;
            }
            Command::Translate(input) => {
                // The new run is current before this returns, so a following
                // /stop or line always applies to it
                running = Some(controller.spawn(TranslateRequest::new(input, model.clone())));
            }
        }
    }

    // Let the last translation finish (or wind down after a stop)
    if let Some(handle) = running {
        match handle.await {
            Ok(outcome) => debug!("Last translation ended as {}", outcome.state()),
            Err(e) => info!("Translation task ended abnormally: {e}"),
        }
    }
    Ok(())
}
