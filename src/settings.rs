use anyhow::{Context, Result};
use llm::OllamaClient;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Remembered choices, loaded from ~/.config/quick-tl/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub api_url: String,
    pub model: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: OllamaClient::default_base_url(),
            model: None,
        }
    }
}

/// Get the configuration directory, creating it if needed
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine configuration directory"))?;
    let dir = base.join("quick-tl");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

impl Settings {
    pub fn default_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("settings.json"))
    }

    /// Load settings, falling back to defaults when the file is missing or
    /// unreadable
    pub fn load_from(path: &Path) -> Settings {
        match Self::read(path) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!("Failed to load settings: {err:#}");
                Settings::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Settings> {
        if !path.exists() {
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings from {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to save settings to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load_from(&dir.path().join("settings.json"));
        assert_eq!(settings.api_url, "http://localhost:11434");
        assert_eq!(settings.model, None);
    }

    #[test]
    fn test_round_trip_and_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        let settings = Settings {
            api_url: "http://gpu-box:11434".to_string(),
            model: Some("qwen3:8b".to_string()),
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);

        std::fs::write(&path, r#"{"model":"mistral"}"#).unwrap();
        let partial = Settings::load_from(&path);
        assert_eq!(partial.api_url, "http://localhost:11434");
        assert_eq!(partial.model.as_deref(), Some("mistral"));
    }

    #[test]
    fn test_unparseable_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "][").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }
}
