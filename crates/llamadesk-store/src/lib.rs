//! On-disk persistence for llamadesk
//!
//! Two independent stores share one policy: nothing raises past the store
//! boundary. Missing or corrupt records come back as `None`, failed writes and
//! deletes as `false`, and the cause is logged.

mod conversation_store;
mod experiment_store;
mod fs_util;

#[cfg(test)]
mod tests;

pub use conversation_store::{
    ConversationListing, ConversationRecord, ConversationStore, SavedConversation,
    conversation_id_from_title, derive_title,
};
pub use experiment_store::{
    CONFIG_SUFFIX, ExperimentStore, RETRIEVER_SUFFIX, sanitize_experiment_name,
};

// Re-export core types for convenience
pub use llamadesk_core::{ChatMessage, Error, ExperimentConfig, Result, Role};
