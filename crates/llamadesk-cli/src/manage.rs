//! Listing and deleting saved conversations and experiments

use colored::*;

use llamadesk_core::{Error, ExperimentConfig, Result};
use llamadesk_rag::format_configurations;
use llamadesk_store::{
    ConversationListing, ConversationStore, ExperimentStore, sanitize_experiment_name,
};

use crate::chat::print_listing;
use crate::ui;

pub fn list_conversations(store: &ConversationStore) {
    println!("{}", "Saved conversations".bold());
    print_listing(&store.list_all());
}

/// Resolve a list number (as printed by `list`) or a version key
pub fn resolve_conversation<'a>(
    listing: &'a [ConversationListing],
    target: &str,
) -> Option<&'a ConversationListing> {
    match target.parse::<usize>() {
        Ok(n) if n > 0 => listing.get(n - 1),
        _ => listing.iter().find(|entry| entry.version_key == target),
    }
}

pub fn delete_conversation(store: &ConversationStore, target: &str, assume_yes: bool) -> Result<()> {
    let listing = store.list_all();
    let entry = resolve_conversation(&listing, target)
        .ok_or_else(|| Error::InvalidInput(format!("No saved conversation '{}'", target)))?;

    if !assume_yes && !ui::confirm(&format!("Delete '{}'?", entry.label))? {
        return Ok(());
    }
    if store.delete(&entry.version_key) {
        ui::print_success(format!("Deleted {}", entry.label));
        Ok(())
    } else {
        Err(Error::Other(format!("Could not delete {}", entry.label)))
    }
}

pub fn list_experiments(store: &ExperimentStore) {
    let experiments = store.list_all();
    if experiments.is_empty() {
        ui::print_info("No saved experiments.");
        return;
    }
    println!("{}", "Saved experiments".bold());
    for (name, config) in &experiments {
        println!(
            "  {}  {}",
            name.cyan(),
            format!(
                "{} / {} / {} file(s)",
                config.llm_model, config.embedding_model, config.total_documents
            )
            .dimmed()
        );
    }
}

/// Saved experiments matching `name` the way the store names its files
fn select_experiments(
    store: &ExperimentStore,
    name: Option<&str>,
) -> Vec<(String, ExperimentConfig)> {
    let wanted = name.map(sanitize_experiment_name);
    store
        .list_all()
        .into_iter()
        .filter(|(saved, _)| wanted.as_deref().is_none_or(|wanted| saved == wanted))
        .collect()
}

/// Configuration overview of one experiment, or of all when `name` is absent
pub fn show_experiments(store: &ExperimentStore, name: Option<&str>) -> Result<()> {
    let experiments = select_experiments(store, name);

    match format_configurations(&experiments) {
        Some(text) => {
            println!("{}", text);
            Ok(())
        }
        None => match name {
            Some(name) => Err(Error::InvalidInput(format!("No saved experiment '{}'", name))),
            None => {
                ui::print_info("No saved experiments.");
                Ok(())
            }
        },
    }
}

pub fn delete_experiment(store: &ExperimentStore, name: &str, assume_yes: bool) -> Result<()> {
    if !store.exists(name) {
        return Err(Error::InvalidInput(format!("No saved experiment '{}'", name)));
    }
    if !assume_yes && !ui::confirm(&format!("Delete experiment '{}'?", name))? {
        return Ok(());
    }
    if store.delete(name) {
        ui::print_success(format!("Deleted experiment '{}'", name));
        Ok(())
    } else {
        Err(Error::Other(format!("Could not delete experiment '{}'", name)))
    }
}
