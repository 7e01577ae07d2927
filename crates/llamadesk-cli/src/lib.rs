//! Terminal front end for llamadesk
//!
//! Owns the session state (transcript, conversation identity, active model,
//! RAG experiment) and the interactive pages that drive it.

mod app;
mod chat;
mod conversation;
mod manage;
mod models;
mod rag_chat;
mod session;
mod stream;
mod ui;


pub use app::App;
pub use chat::{ChatCommand, run_chat};
pub use conversation::{CHAT_PROMPT_TEMPLATE, ChatSession};
pub use manage::{
    delete_conversation, delete_experiment, list_conversations, list_experiments,
    resolve_conversation, show_experiments,
};
pub use models::{format_library, format_size, list_models, pull_model, show_library, show_model_info};
pub use rag_chat::{RagOptions, read_source_files, run_rag};
pub use session::{RagSession, SessionContext, TURN_ERROR_PREFIX};
pub use stream::{ThinkFilter, clean_response, strip_message_wrapper};
pub use ui::{display_banner, print_error};

// Re-export core types
pub use llamadesk_core::{Error, Result};
