use super::{create_history, create_provider, create_view, Connection, ProviderConfig};
use crate::cli::TranslateArgs;
use crate::session::{StreamController, StreamOutcome, TranslateRequest};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// Read the text from the argument, or from stdin when none was given
async fn read_input(text: Option<String>) -> Result<String> {
    let input = match text {
        Some(text) => text,
        None => {
            let mut input = String::new();
            tokio::io::stdin()
                .read_to_string(&mut input)
                .await
                .context("Failed to read text from stdin")?;
            input
        }
    };

    let input = input.trim().to_string();
    if input.is_empty() {
        anyhow::bail!("Please enter text to translate.");
    }
    Ok(input)
}

pub async fn run(connection: Connection, args: TranslateArgs) -> Result<()> {
    let model = connection.require_model()?.to_string();
    let input = read_input(args.text).await?;

    let provider = create_provider(ProviderConfig {
        api_url: connection.api_url,
        record_path: args.record,
        playback_path: args.playback,
        fast_playback: args.fast_playback,
    })
    .context("Failed to initialize model client")?;
    let history = create_history(args.no_history)?;
    let view = create_view(args.html_out);

    let controller = Arc::new(StreamController::new(provider, view, history));

    // Ctrl-C stops the stream and keeps what arrived so far
    let stopper = controller.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Ctrl-C received");
            stopper.stop();
        }
    });

    let outcome = controller.run(TranslateRequest::new(input, model)).await;
    ctrl_c.abort();

    match outcome {
        StreamOutcome::Completed(finalized) => {
            debug!(
                "Translation finished: {}, {} bytes",
                finalized.label,
                finalized.frame.text.len()
            );
            if finalized.entry.is_none() {
                debug!("Nothing was added to the history");
            }
            Ok(())
        }
        StreamOutcome::Cancelled { partial } => {
            debug!("Translation stopped after {} bytes", partial.len());
            Ok(())
        }
        StreamOutcome::Failed { detail, partial } => {
            if !partial.is_empty() {
                warn!("Discarding {} bytes of partial output", partial.len());
            }
            anyhow::bail!("Translation failed: {detail}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_input_is_trimmed_and_required() {
        assert_eq!(
            read_input(Some("  Bonjour \n".to_string())).await.unwrap(),
            "Bonjour"
        );
        let err = read_input(Some(" \n\t".to_string())).await.unwrap_err();
        assert_eq!(err.to_string(), "Please enter text to translate.");
    }
}
