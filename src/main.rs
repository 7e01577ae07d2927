use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use llamadesk_cli::{App, RagOptions, print_error};
use llamadesk_core::AppConfig;

#[derive(Parser)]
#[command(name = "llamadesk")]
#[command(about = "Chat with local Ollama models and your documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Ollama server URL (overrides LLAMADESK_OLLAMA_URL)
    #[arg(long, global = true)]
    ollama_url: Option<String>,

    /// Directory for saved conversations and experiments (overrides LLAMADESK_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat with an installed model
    Chat {
        /// Model to chat with; defaults to the first installed one
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Ask questions about your documents
    Rag {
        /// Files to process into a new experiment (.pdf, .txt, .md)
        files: Vec<PathBuf>,
        /// Experiment name; without files, the saved experiment to load
        #[arg(short, long)]
        experiment: Option<String>,
        /// Model answering the questions
        #[arg(short, long)]
        model: Option<String>,
        /// Embedding model key from the embedding catalog
        #[arg(long)]
        embedding: Option<String>,
        /// Child chunk size in characters
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Number of passages retrieved per question
        #[arg(long)]
        top_k: Option<usize>,
        /// Save the experiment right after processing
        #[arg(long)]
        save: bool,
    },
    /// Installed and downloadable models
    Models {
        #[command(subcommand)]
        action: ModelsAction,
    },
    /// Saved conversations
    Conversations {
        #[command(subcommand)]
        action: ConversationsAction,
    },
    /// Saved RAG experiments
    Experiments {
        #[command(subcommand)]
        action: ExperimentsAction,
    },
}

#[derive(Subcommand)]
enum ModelsAction {
    /// List installed models
    List,
    /// Show architecture and context details of a model
    Info { name: String },
    /// Download a model
    Pull { name: String },
    /// Browse the model library
    Library,
}

#[derive(Subcommand)]
enum ConversationsAction {
    /// List saved conversations, newest first
    List,
    /// Delete a conversation by list number or version key
    Delete {
        target: String,
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ExperimentsAction {
    /// List saved experiments
    List,
    /// Show the configuration of one experiment, or of all
    Show { name: Option<String> },
    /// Delete an experiment
    Delete {
        name: String,
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::from_env().context("Invalid configuration")?;
    if let Some(url) = cli.ollama_url {
        config = config.with_ollama_url(url);
    }
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }
    let app = App::new(config);

    match cli.command.unwrap_or(Commands::Chat { model: None }) {
        Commands::Chat { model } => llamadesk_cli::run_chat(&app, model.as_deref()).await?,
        Commands::Rag {
            files,
            experiment,
            model,
            embedding,
            chunk_size,
            top_k,
            save,
        } => {
            let options = RagOptions {
                files,
                experiment,
                model,
                embedding,
                chunk_size,
                top_k,
                save,
            };
            llamadesk_cli::run_rag(&app, options).await?
        }
        Commands::Models { action } => match action {
            ModelsAction::List => llamadesk_cli::list_models(&app).await?,
            ModelsAction::Info { name } => llamadesk_cli::show_model_info(&app, &name).await?,
            ModelsAction::Pull { name } => llamadesk_cli::pull_model(&app, &name).await?,
            ModelsAction::Library => llamadesk_cli::show_library(&app),
        },
        Commands::Conversations { action } => {
            let store = app.conversation_store()?;
            match action {
                ConversationsAction::List => llamadesk_cli::list_conversations(&store),
                ConversationsAction::Delete { target, yes } => {
                    llamadesk_cli::delete_conversation(&store, &target, yes)?
                }
            }
        }
        Commands::Experiments { action } => {
            let store = app.experiment_store()?;
            match action {
                ExperimentsAction::List => llamadesk_cli::list_experiments(&store),
                ExperimentsAction::Show { name } => {
                    llamadesk_cli::show_experiments(&store, name.as_deref())?
                }
                ExperimentsAction::Delete { name, yes } => {
                    llamadesk_cli::delete_experiment(&store, &name, yes)?
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_rag_arguments() {
        let cli = Cli::parse_from([
            "llamadesk",
            "rag",
            "a.pdf",
            "b.md",
            "-e",
            "Contracts",
            "--chunk-size",
            "200",
            "--save",
        ]);

        match cli.command {
            Some(Commands::Rag {
                files,
                experiment,
                chunk_size,
                top_k,
                save,
                ..
            }) => {
                assert_eq!(files, vec![PathBuf::from("a.pdf"), PathBuf::from("b.md")]);
                assert_eq!(experiment.as_deref(), Some("Contracts"));
                assert_eq!(chunk_size, Some(200));
                assert_eq!(top_k, None);
                assert!(save);
            }
            _ => panic!("expected rag command"),
        }
    }

    #[test]
    fn test_no_subcommand_means_chat() {
        let cli = Cli::parse_from(["llamadesk", "--data-dir", "/tmp/ld"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/ld")));
    }
}
