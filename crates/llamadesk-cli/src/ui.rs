//! UI utilities for the terminal front end

use colored::*;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, size},
};
use std::io::{self, IsTerminal, Write};

use llamadesk_core::{ChatMessage, Result, Role, SourceFragment};

/// Display startup banner
pub fn display_banner(subtitle: &str) {
    let terminal_width = size().map(|(w, _)| w as usize).unwrap_or(80);
    let banner_width = 60.min(terminal_width.saturating_sub(4)).max(40);
    let inner = banner_width - 2;

    let top_border = format!("┌{}┐", "─".repeat(inner));
    let bottom_border = format!("└{}┘", "─".repeat(inner));
    let empty_line = format!("│{}│", " ".repeat(inner));
    let padded = |text: &str| {
        let width = text.chars().count();
        format!("│  {}{}│", text, " ".repeat(inner.saturating_sub(width + 2)))
    };

    println!();
    println!("{}", top_border.blue());
    println!("{}", empty_line.blue());
    println!("{}", padded("llamadesk").blue().bold());
    println!("{}", padded(subtitle).blue());
    println!("{}", empty_line.blue());
    println!(
        "{}",
        padded(&format!("v{} • Powered by Ollama", env!("CARGO_PKG_VERSION"))).dimmed()
    );
    println!("{}", bottom_border.blue());
    println!();
    println!("{}", "Tip: type /help for commands".dimmed());
    println!();
}

/// Read one line with history navigation.
///
/// Returns `None` at end of input (Ctrl-D, or EOF when stdin is piped) and an
/// empty string when the line is abandoned with Esc.
pub fn read_line_with_history(prompt: &str, history: &mut Vec<String>) -> Result<Option<String>> {
    if !io::stdin().is_terminal() {
        print!("{} ", prompt.green().bold());
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        let input = input.trim().to_string();
        if !input.is_empty() {
            history.push(input.clone());
        }
        return Ok(Some(input));
    }

    enable_raw_mode()?;
    let outcome = edit_line(prompt, history);
    disable_raw_mode()?;
    println!();

    let line = outcome?;
    if let Some(input) = &line {
        if !input.is_empty() {
            history.push(input.clone());
        }
    }
    Ok(line)
}

fn edit_line(prompt: &str, history: &[String]) -> Result<Option<String>> {
    let mut input = String::new();
    let mut history_index: Option<usize> = None;
    let mut shown_width: usize = 0;

    let mut redraw = |input: &str| -> Result<()> {
        let width = input.chars().count();
        let clear = " ".repeat(shown_width.saturating_sub(width));
        print!("\r{} {}{}\r{} {}", prompt.green().bold(), input, clear, prompt.green().bold(), input);
        shown_width = width;
        io::stdout().flush()?;
        Ok(())
    };
    redraw(&input)?;

    loop {
        let Event::Key(key_event) = event::read()? else {
            continue;
        };
        if key_event.kind != KeyEventKind::Press {
            continue;
        }

        match key_event.code {
            KeyCode::Enter => return Ok(Some(input)),
            KeyCode::Char('d') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
                if input.is_empty() {
                    return Ok(None);
                }
            }
            KeyCode::Char('c') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
                return Ok(None);
            }
            KeyCode::Char(c) => {
                input.push(c);
                redraw(&input)?;
            }
            KeyCode::Backspace => {
                if input.pop().is_some() {
                    redraw(&input)?;
                }
            }
            KeyCode::Up => {
                if !history.is_empty() {
                    let new_index = match history_index {
                        None => history.len() - 1,
                        Some(idx) => idx.saturating_sub(1),
                    };
                    history_index = Some(new_index);
                    input = history[new_index].clone();
                    redraw(&input)?;
                }
            }
            KeyCode::Down => {
                if let Some(idx) = history_index {
                    if idx + 1 < history.len() {
                        history_index = Some(idx + 1);
                        input = history[idx + 1].clone();
                    } else {
                        history_index = None;
                        input.clear();
                    }
                    redraw(&input)?;
                }
            }
            KeyCode::Esc => return Ok(Some(String::new())),
            _ => {}
        }
    }
}

/// Ask a yes/no question; Enter alone means no
pub fn confirm(question: &str) -> Result<bool> {
    print!("{} {} [y/N]: ", "?".cyan().bold(), question);
    io::stdout().flush()?;

    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    let response = response.trim().to_lowercase();

    Ok(response == "y" || response == "yes")
}

/// Prompt for a single value, falling back to `default` on an empty answer
pub fn prompt_value(label: &str, default: &str) -> Result<String> {
    if default.is_empty() {
        print!("{}: ", label.bold());
    } else {
        print!("{} [{}]: ", label.bold(), default.dimmed());
    }
    io::stdout().flush()?;

    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    let value = value.trim();
    Ok(if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    })
}

/// Display help for the chat page
pub fn print_chat_help() {
    println!("{}", "Available commands:".bold());
    println!("  {} - Start a new conversation", "/new".green());
    println!("  {} - Save the current conversation", "/save".green());
    println!("  {} - List saved conversations", "/list".green());
    println!("  {} - Continue saved conversation number n", "/load <n>".green());
    println!("  {} - Delete the current conversation", "/delete".green());
    println!("  {} - Switch model (starts a new conversation)", "/model <id>".green());
    println!("  {} - Show this help message", "/help".green());
    println!("  {} - Exit", "/exit".green());
    println!();
    println!("Anything else is sent to the model. Conversations are saved after every reply.");
}

/// Display help for the document chat page
pub fn print_rag_help() {
    println!("{}", "Available commands:".bold());
    println!("  {} - Show the passages behind the last answer", "/sources".green());
    println!("  {} - Save the active experiment", "/save".green());
    println!("  {} - Show this help message", "/help".green());
    println!("  {} - Exit", "/exit".green());
    println!();
    println!("Anything else is asked of your documents.");
}

pub fn print_message(message: &ChatMessage) {
    match message.role {
        Role::User => println!("{} {}", "you>".green().bold(), message.content),
        Role::Assistant => println!("{} {}", "assistant>".blue().bold(), message.content),
        Role::System => println!("{}", message.content.dimmed()),
    }
}

pub fn print_transcript(messages: &[ChatMessage]) {
    for message in messages {
        print_message(message);
    }
}

/// Print retrieved passages, one block per source
pub fn print_sources(sources: &[SourceFragment]) {
    if sources.is_empty() {
        println!("{}", "No sources for the last answer.".dimmed());
        return;
    }
    for (i, fragment) in sources.iter().enumerate() {
        println!("{} {}", format!("[{}]", i + 1).cyan().bold(), fragment.source.bold());
        println!("{}", fragment.content.trim());
        println!();
    }
}

pub fn print_error(message: impl std::fmt::Display) {
    eprintln!("{} {}", "error:".red().bold(), message);
}

pub fn print_success(message: impl std::fmt::Display) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_info(message: impl std::fmt::Display) {
    println!("{}", message.to_string().dimmed());
}

/// Write streamed text as it arrives
pub fn print_streamed(text: &str) {
    if text.is_empty() {
        return;
    }
    print!("{}", text);
    let _ = io::stdout().flush();
}

/// Label printed before a streamed answer
pub fn print_assistant_label() {
    print!("{} ", "assistant>".blue().bold());
    let _ = io::stdout().flush();
}
