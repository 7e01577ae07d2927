//! Document question answering page

use colored::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use llamadesk_core::{Error, Result, SourceFile, SourceFragment};

use crate::app::{App, pick_model};
use crate::session::{RagSession, SessionContext};
use crate::stream::ThinkFilter;
use crate::ui;

/// How the document chat gets its experiment
#[derive(Debug, Clone, Default)]
pub struct RagOptions {
    /// Files to process into a new experiment
    pub files: Vec<PathBuf>,
    /// Name of the new experiment, or of the saved one to load
    pub experiment: Option<String>,
    /// Chat model; defaults to the experiment's or the first installed one
    pub model: Option<String>,
    /// Embedding catalog key; defaults to the first catalog entry
    pub embedding: Option<String>,
    pub chunk_size: Option<usize>,
    pub top_k: Option<usize>,
    /// Save the new experiment right after processing
    pub save: bool,
}

/// Read files from disk into named byte buffers
pub fn read_source_files(paths: &[PathBuf]) -> Result<Vec<SourceFile>> {
    paths
        .iter()
        .map(|path| {
            let bytes = fs::read(path)?;
            Ok(SourceFile::new(file_name(path), bytes))
        })
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Process files or load a saved experiment, then answer questions until `/exit`
pub async fn run_rag(app: &App, options: RagOptions) -> Result<()> {
    let models = app.chat_models().await?;
    let mut ctx = SessionContext::new(app.llm(), app.conversation_store()?)
        .with_temperature(app.config().temperature)
        .with_rag(app.rag_engine()?);
    let rag = ctx
        .rag_mut()
        .ok_or_else(|| Error::NotReady("Document chat is not available".to_string()))?;

    if options.files.is_empty() {
        let name = match &options.experiment {
            Some(name) => name.clone(),
            None => ui::prompt_value("Experiment to load", "")?,
        };
        if rag.load(&name).is_none() {
            return Err(Error::InvalidInput(format!(
                "No saved experiment named '{}'",
                name
            )));
        }
        if let Some(model) = &options.model {
            rag.set_llm_model(&pick_model(&models, model)?);
        }
        info!(experiment = %name, "experiment loaded");
    } else {
        process_files(app, rag, &models, &options).await?;
    }

    // The experiment's model may have been removed since it was saved
    let missing_model = rag
        .config()
        .map(|config| config.llm_model.clone())
        .filter(|model| !models.contains(model));
    if let Some(missing) = missing_model {
        ui::print_info(format!("Model {} is not installed, using {}", missing, models[0]));
        rag.set_llm_model(&models[0]);
    }

    ui::display_banner("Chat with your documents");
    if let Some(config) = rag.config() {
        println!("{} {}", "Experiment:".bold(), config.experiment_name.cyan());
        println!("{} {}", "Model:".bold(), config.llm_model.cyan());
        println!();
    }

    ask_loop(rag).await
}

async fn process_files(
    app: &App,
    rag: &mut RagSession,
    models: &[String],
    options: &RagOptions,
) -> Result<()> {
    let name = match &options.experiment {
        Some(name) => name.clone(),
        None => ui::prompt_value("Experiment name", "")?,
    };
    if rag.engine().experiment_exists(&name)
        && !ui::confirm(&format!("Experiment '{}' exists. Replace it when saving?", name))?
    {
        return Err(Error::InvalidInput(format!(
            "Experiment '{}' already exists",
            name
        )));
    }

    let llm_model = match &options.model {
        Some(model) => pick_model(models, model)?,
        None => models[0].clone(),
    };
    let embedding = match &options.embedding {
        Some(key) => key.clone(),
        None => rag
            .engine()
            .embedding_catalog()
            .keys()
            .next()
            .map(str::to_string)
            .ok_or_else(|| Error::Configuration("No embedding models configured".to_string()))?,
    };
    let chunk_size = options.chunk_size.unwrap_or(app.config().default_chunk_size);
    let top_k = options.top_k.unwrap_or(app.config().default_top_k);

    let files = read_source_files(&options.files)?;
    ui::print_info(format!(
        "Processing {} file(s) with {} (chunk size {}, top {})...",
        files.len(),
        embedding,
        chunk_size,
        top_k
    ));

    let count = rag
        .process(&files, &name, &llm_model, &embedding, chunk_size, top_k)
        .await?;
    ui::print_success(format!("Processed {} document(s) into '{}'", count, name));

    if options.save {
        save_experiment(rag);
    }
    Ok(())
}

fn save_experiment(rag: &RagSession) {
    let name = rag.experiment_name().unwrap_or_default().to_string();
    if rag.save() {
        ui::print_success(format!("Experiment '{}' saved", name));
    } else {
        ui::print_error(format!("Saving experiment '{}' failed", name));
    }
}

async fn ask_loop(rag: &mut RagSession) -> Result<()> {
    let mut history = Vec::new();
    let mut last_sources: Vec<SourceFragment> = Vec::new();

    loop {
        let Some(line) = ui::read_line_with_history("ask>", &mut history)? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/exit" | "/quit" => break,
            "/help" => ui::print_rag_help(),
            "/save" => save_experiment(rag),
            "/sources" => ui::print_sources(&last_sources),
            command if command.starts_with('/') => {
                ui::print_error(format!("Unknown command {}. Type /help for commands", command))
            }
            question => {
                let mut filter = ThinkFilter::new();
                ui::print_assistant_label();
                let outcome = {
                    let mut on_token = |token: &str| ui::print_streamed(&filter.push(token));
                    rag.ask(question, &mut on_token).await
                };
                ui::print_streamed(&filter.finish());
                println!();

                match outcome {
                    Ok(answer) => {
                        debug!(sources = answer.sources.len(), "question answered");
                        last_sources = answer.sources;
                        println!(
                            "{}",
                            format!("{} source passage(s). /sources to view", last_sources.len())
                                .dimmed()
                        );
                    }
                    Err(e) => {
                        last_sources.clear();
                        ui::print_error(e);
                    }
                }
            }
        }
    }

    Ok(())
}
