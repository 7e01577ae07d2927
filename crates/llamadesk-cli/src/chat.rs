//! Interactive chat page

use colored::*;
use tracing::debug;

use llamadesk_core::{Error, Result};
use llamadesk_store::ConversationListing;

use crate::app::{App, pick_model};
use crate::session::SessionContext;
use crate::stream::ThinkFilter;
use crate::ui;

/// A slash command typed on the chat prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    New,
    Save,
    List,
    Load(usize),
    Delete,
    Model(String),
    Help,
    Exit,
}

impl ChatCommand {
    /// Parse a line starting with `/`; `None` for ordinary chat input
    pub fn parse(line: &str) -> Option<std::result::Result<Self, String>> {
        let line = line.trim();
        let rest = line.strip_prefix('/')?;
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        let command = match name {
            "new" => Ok(Self::New),
            "save" => Ok(Self::Save),
            "list" => Ok(Self::List),
            "load" => arg
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .map(Self::Load)
                .ok_or_else(|| "Usage: /load <n> (numbers come from /list)".to_string()),
            "delete" => Ok(Self::Delete),
            "model" if !arg.is_empty() => Ok(Self::Model(arg.to_string())),
            "model" => Err("Usage: /model <id>".to_string()),
            "help" => Ok(Self::Help),
            "exit" | "quit" => Ok(Self::Exit),
            other => Err(format!("Unknown command /{}. Type /help for commands", other)),
        };
        Some(command)
    }
}

/// Run the chat loop until `/exit` or end of input
pub async fn run_chat(app: &App, model: Option<&str>) -> Result<()> {
    let models = app.chat_models().await?;
    let mut model_id = match model {
        Some(name) => pick_model(&models, name)?,
        None => models[0].clone(),
    };

    let mut ctx = SessionContext::new(app.llm(), app.conversation_store()?)
        .with_temperature(app.config().temperature);
    let mut listing: Vec<ConversationListing> = Vec::new();
    let mut history = Vec::new();

    ui::display_banner("Chat with your local models");
    println!("{} {}", "Model:".bold(), model_id.cyan());
    println!();

    loop {
        let Some(line) = ui::read_line_with_history("you>", &mut history)? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match ChatCommand::parse(&line) {
            None => {
                stream_turn(&mut ctx, &model_id, line.trim()).await;
            }
            Some(Err(usage)) => ui::print_error(usage),
            Some(Ok(ChatCommand::Exit)) => break,
            Some(Ok(ChatCommand::Help)) => ui::print_chat_help(),
            Some(Ok(ChatCommand::New)) => {
                ctx.new_conversation();
                ui::print_info("Started a new conversation.");
            }
            Some(Ok(ChatCommand::Save)) => match ctx.save() {
                Some(saved) => ui::print_success(format!("Saved as {}", saved.version_key)),
                None if ctx.messages().is_empty() => ui::print_info("Nothing to save yet."),
                None => ui::print_error("Saving the conversation failed"),
            },
            Some(Ok(ChatCommand::List)) => {
                listing = ctx.list_conversations();
                print_listing(&listing);
            }
            Some(Ok(ChatCommand::Load(n))) => {
                let Some(entry) = listing.get(n - 1) else {
                    ui::print_error("No such entry. Run /list first");
                    continue;
                };
                if ctx.load_conversation(&entry.version_key) {
                    if let Some(loaded) = ctx.model_id() {
                        model_id = loaded.to_string();
                    }
                    println!("{} {} ({})", "Loaded".bold(), entry.label, model_id.cyan());
                    ui::print_transcript(ctx.messages());
                } else {
                    ui::print_error(format!("Could not load {}", entry.label));
                }
            }
            Some(Ok(ChatCommand::Delete)) => {
                let Some(version_key) = ctx.version_key().map(str::to_string) else {
                    ui::print_info("The current conversation has not been saved.");
                    continue;
                };
                if !ui::confirm(&format!("Delete '{}'?", ctx.conversation_title()))? {
                    continue;
                }
                if ctx.delete_conversation(&version_key) {
                    ui::print_success("Conversation deleted.");
                } else {
                    ui::print_error("Deleting the conversation failed");
                }
                listing.clear();
            }
            Some(Ok(ChatCommand::Model(name))) => match pick_model(&models, &name) {
                Ok(name) => {
                    if name != model_id {
                        model_id = name;
                        ctx.new_conversation();
                    }
                    println!("{} {}", "Model:".bold(), model_id.cyan());
                }
                Err(e) => ui::print_error(e),
            },
        }
    }

    Ok(())
}

/// One streamed exchange; failures are already part of the transcript
async fn stream_turn(ctx: &mut SessionContext, model_id: &str, input: &str) {
    let mut filter = ThinkFilter::new();
    ui::print_assistant_label();

    let outcome = {
        let mut on_token = |token: &str| ui::print_streamed(&filter.push(token));
        ctx.chat_turn(model_id, input, &mut on_token).await
    };
    ui::print_streamed(&filter.finish());
    println!();

    match outcome {
        Ok(reply) => debug!(chars = reply.len(), "chat turn complete"),
        Err(e @ Error::BackendUnavailable(_)) => ui::print_error(e),
        Err(e) => ui::print_error(format!("Error generating response: {}", e)),
    }
}

pub(crate) fn print_listing(listing: &[ConversationListing]) {
    if listing.is_empty() {
        ui::print_info("No saved conversations.");
        return;
    }
    for (i, entry) in listing.iter().enumerate() {
        println!("  {} {}", format!("{:>3}.", i + 1).cyan(), entry.label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(ChatCommand::parse("hello there"), None);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ChatCommand::parse("/new"), Some(Ok(ChatCommand::New)));
        assert_eq!(ChatCommand::parse(" /load 3 "), Some(Ok(ChatCommand::Load(3))));
        assert_eq!(
            ChatCommand::parse("/model llama3.2:latest"),
            Some(Ok(ChatCommand::Model("llama3.2:latest".to_string())))
        );
        assert_eq!(ChatCommand::parse("/quit"), Some(Ok(ChatCommand::Exit)));
    }

    #[test]
    fn test_parse_rejects_bad_arguments() {
        assert!(matches!(ChatCommand::parse("/load"), Some(Err(_))));
        assert!(matches!(ChatCommand::parse("/load 0"), Some(Err(_))));
        assert!(matches!(ChatCommand::parse("/model"), Some(Err(_))));
        assert!(matches!(ChatCommand::parse("/frobnicate"), Some(Err(_))));
    }
}
