//! Model management page: installed models, details, pulls and the library

use colored::*;

use llamadesk_core::{Error, Result};
use llamadesk_ollama::{HARDWARE_REQUIREMENTS, ModelDescriptor, ModelLibrary};

use crate::app::App;
use crate::ui;

/// Human readable byte count, e.g. `4.1 GB`
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// One line per installed model
pub fn format_model_rows(models: &[ModelDescriptor]) -> Vec<String> {
    let width = models.iter().map(|m| m.name.len()).max().unwrap_or(0);
    models
        .iter()
        .map(|model| {
            let details = [
                model.details.family.as_str(),
                model.details.parameter_size.as_str(),
                model.details.quantization_level.as_str(),
            ]
            .into_iter()
            .filter(|d| !d.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

            format!(
                "{:<width$}  {:>9}  {}",
                model.name,
                format_size(model.size),
                details,
                width = width
            )
        })
        .collect()
}

pub async fn list_models(app: &App) -> Result<()> {
    let models = app.client().list_models().await?;
    if models.is_empty() {
        ui::print_info("No models installed. Browse with: llamadesk models library");
        return Ok(());
    }

    println!("{}", "Installed models".bold());
    for row in format_model_rows(&models) {
        println!("  {}", row);
    }
    Ok(())
}

pub async fn show_model_info(app: &App, name: &str) -> Result<()> {
    match app.client().model_info(name).await {
        Some(report) => {
            println!("{}", report);
            Ok(())
        }
        None => Err(Error::BackendUnavailable(format!(
            "Could not run '{} show'. Is Ollama installed?",
            app.client().config().ollama_bin
        ))),
    }
}

pub async fn pull_model(app: &App, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("Model name must not be empty".to_string()));
    }

    ui::print_info(format!("Pulling {}. This can take a while...", name));
    let outcome = app.client().pull_model(name).await;
    if outcome.success {
        ui::print_success(outcome.message);
        Ok(())
    } else {
        Err(Error::LLMProvider(outcome.message))
    }
}

/// Library listing followed by the hardware guidance table
pub fn format_library(library: &ModelLibrary) -> String {
    let mut lines = Vec::new();

    if library.is_empty() {
        lines.push("The model library is empty.".to_string());
    } else {
        for (name, entry) in library.entries() {
            lines.push(format!("{}  [{}]", name, entry.params));
            lines.push(format!("    {}", entry.description));
        }
    }

    lines.push(String::new());
    lines.push("Hardware requirements".to_string());
    for (size, ram) in HARDWARE_REQUIREMENTS {
        lines.push(format!("  {:<8} {}", size, ram));
    }
    lines.join("\n")
}

pub fn show_library(app: &App) {
    println!("{}", "Model library".bold());
    println!("{}", format_library(&app.model_library()));
    println!();
    ui::print_info("Install one with: llamadesk models pull <name>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use llamadesk_ollama::ModelDetails;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(4_661_224_676), "4.3 GB");
    }

    #[test]
    fn test_model_rows_skip_empty_details() {
        let models = vec![
            ModelDescriptor {
                name: "llama3.2:latest".to_string(),
                size: 2_019_393_189,
                modified_at: String::new(),
                details: ModelDetails {
                    family: "llama".to_string(),
                    parameter_size: "3.2B".to_string(),
                    quantization_level: "Q4_K_M".to_string(),
                },
            },
            ModelDescriptor {
                name: "tiny".to_string(),
                size: 0,
                modified_at: String::new(),
                details: ModelDetails::default(),
            },
        ];

        let rows = format_model_rows(&models);
        assert_eq!(rows[0], "llama3.2:latest     1.9 GB  llama, 3.2B, Q4_K_M");
        assert_eq!(rows[1], "tiny                   0 B  ");
    }

    #[tokio::test]
    async fn test_pull_rejects_empty_name() {
        let app = App::new(llamadesk_core::AppConfig::default());
        assert!(matches!(pull_model(&app, "  ").await, Err(Error::InvalidInput(_))));
    }
}
