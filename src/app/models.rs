use crate::settings::Settings;
use anyhow::{Context, Result};
use llm::{ModelInfo, OllamaClient};
use std::io::Write;
use std::path::Path;
use tracing::warn;

pub async fn run(api_url: &str, settings_path: &Path) -> Result<()> {
    let client = OllamaClient::new(api_url.to_string());
    let models = client
        .list_models()
        .await
        .with_context(|| format!("Failed to list models at {}", client.base_url()))?;

    let mut settings = Settings::load_from(settings_path);
    let mut stdout = std::io::stdout().lock();
    print_models(&models, settings.model.as_deref(), &mut stdout)?;

    if forget_missing_model(&mut settings, &models) {
        settings
            .save_to(settings_path)
            .context("Failed to update settings")?;
    }
    Ok(())
}

fn print_models(models: &[ModelInfo], selected: Option<&str>, out: &mut impl Write) -> Result<()> {
    if models.is_empty() {
        writeln!(out, "No models installed on the server.")?;
        return Ok(());
    }
    for model in models {
        let marker = if selected == Some(model.name.as_str()) {
            "*"
        } else {
            " "
        };
        writeln!(out, "{marker} {}", model.name)?;
    }
    Ok(())
}

/// Drop the remembered model if the server no longer offers it. An empty
/// list keeps it. Returns whether the settings changed.
fn forget_missing_model(settings: &mut Settings, models: &[ModelInfo]) -> bool {
    let Some(selected) = settings.model.as_deref() else {
        return false;
    };
    if models.is_empty() {
        return false;
    }
    if models.iter().any(|model| model.name == selected) {
        return false;
    }
    warn!("Remembered model '{selected}' is not available anymore");
    settings.model = None;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(name: &str) -> ModelInfo {
        serde_json::from_value(serde_json::json!({ "name": name })).unwrap()
    }

    #[test]
    fn test_selected_model_is_marked() {
        let mut out = Vec::new();
        print_models(&[model("a:1b"), model("b:7b")], Some("b:7b"), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "  a:1b\n* b:7b\n");
    }

    #[test]
    fn test_missing_model_is_forgotten() {
        let mut settings = Settings {
            model: Some("gone:3b".to_string()),
            ..Settings::default()
        };
        assert!(!forget_missing_model(&mut settings.clone(), &[model("gone:3b")]));
        assert!(forget_missing_model(&mut settings, &[model("other:1b")]));
        assert_eq!(settings.model, None);
        assert!(!forget_missing_model(&mut settings, &[]));
    }

    #[test]
    fn test_empty_model_list_keeps_selection() {
        let mut settings = Settings {
            model: Some("llama3.2:3b".to_string()),
            ..Settings::default()
        };
        assert!(!forget_missing_model(&mut settings, &[]));
        assert_eq!(settings.model.as_deref(), Some("llama3.2:3b"));
    }
}
