pub mod history;
pub mod interactive;
pub mod models;
pub mod translate;

use crate::persistence::{FileHistoryStore, HistoryStore, InMemoryHistoryStore};
use crate::settings::Settings;
use crate::ui::{HtmlPageView, MultiView, OutputView, TerminalView};
use anyhow::{Context, Result};
use llm::{
    ApiRecorder, GenerateProvider, OllamaClient, PlaybackProvider, PlaybackState,
    RecordingProvider,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Server and model choices, merged from arguments and remembered settings
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub api_url: String,
    pub model: Option<String>,
}

/// Apply command line overrides to the remembered settings. Changed values
/// are written back so later runs reuse them.
pub fn resolve_connection(
    settings_path: &Path,
    api_url: Option<String>,
    model: Option<String>,
) -> Result<Connection> {
    let mut settings = Settings::load_from(settings_path);
    let mut changed = false;

    if let Some(api_url) = api_url {
        let api_url = api_url.trim().to_string();
        if !api_url.is_empty() && api_url != settings.api_url {
            settings.api_url = api_url;
            changed = true;
        }
    }
    if let Some(model) = model {
        let model = model.trim().to_string();
        if !model.is_empty() && settings.model.as_deref() != Some(model.as_str()) {
            settings.model = Some(model);
            changed = true;
        }
    }

    if changed {
        settings
            .save_to(settings_path)
            .context("Failed to remember settings")?;
        debug!("Remembered api_url={} model={:?}", settings.api_url, settings.model);
    }

    Ok(Connection {
        api_url: settings.api_url,
        model: settings.model,
    })
}

impl Connection {
    pub fn require_model(&self) -> Result<&str> {
        self.model
            .as_deref()
            .context("Please select a model with --model (see `quick-tl models`).")
    }
}

/// Where generate streams come from
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub api_url: String,
    pub record_path: Option<PathBuf>,
    pub playback_path: Option<PathBuf>,
    pub fast_playback: bool,
}

pub fn create_provider(config: ProviderConfig) -> Result<Arc<dyn GenerateProvider>> {
    // Playback replaces the server entirely
    if let Some(path) = config.playback_path {
        let state = PlaybackState::from_file(&path, config.fast_playback)
            .with_context(|| format!("Failed to load recording {}", path.display()))?;
        if state.session_count() == 0 {
            anyhow::bail!("Recording file contains no sessions");
        }
        info!(
            "Playing back {} recorded sessions from {}",
            state.session_count(),
            path.display()
        );
        return Ok(Arc::new(PlaybackProvider::new(state)));
    }

    let client: Arc<dyn GenerateProvider> = Arc::new(OllamaClient::new(config.api_url));
    match config.record_path {
        Some(path) => {
            info!("Recording responses to {}", path.display());
            Ok(Arc::new(RecordingProvider::new(client, ApiRecorder::new(path))))
        }
        None => Ok(client),
    }
}

pub fn create_history(no_history: bool) -> Result<Arc<dyn HistoryStore>> {
    if no_history {
        return Ok(Arc::new(InMemoryHistoryStore::default()));
    }
    Ok(Arc::new(FileHistoryStore::open_default()?))
}

/// The terminal, plus an HTML page when one was requested
pub fn create_view(html_out: Option<PathBuf>) -> Arc<dyn OutputView> {
    let terminal: Arc<dyn OutputView> = Arc::new(TerminalView::new());
    match html_out {
        Some(path) => {
            info!("Writing output page to {}", path.display());
            Arc::new(MultiView::new(vec![
                terminal,
                Arc::new(HtmlPageView::new(path)),
            ]))
        }
        None => terminal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_overrides_are_remembered() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        let connection = resolve_connection(
            &path,
            Some("http://gpu-box:11434".to_string()),
            Some("qwen3:8b".to_string()),
        )
        .unwrap();
        assert_eq!(connection.api_url, "http://gpu-box:11434");
        assert_eq!(connection.require_model().unwrap(), "qwen3:8b");

        let remembered = resolve_connection(&path, None, None).unwrap();
        assert_eq!(remembered, connection);
    }

    #[test]
    fn test_missing_model_is_reported() {
        let dir = TempDir::new().unwrap();
        let connection = resolve_connection(&dir.path().join("settings.json"), None, None).unwrap();
        assert_eq!(connection.api_url, "http://localhost:11434");
        let err = connection.require_model().unwrap_err();
        assert!(err.to_string().starts_with("Please select a model"));
    }

    #[test]
    fn test_blank_overrides_are_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let connection = resolve_connection(&path, Some("  ".to_string()), Some(String::new())).unwrap();
        assert_eq!(connection.model, None);
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_recording_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, "[]").unwrap();

        let result = create_provider(ProviderConfig {
            playback_path: Some(path),
            ..ProviderConfig::default()
        });
        assert!(result.is_err());
    }
}
