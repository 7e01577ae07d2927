//! Conversation persistence
//!
//! Every save writes a new physical record `{logical_id}_{YYYYMMDD_HHMMSS}.json`
//! and prunes the older versions of the same logical conversation, so at most
//! one record per logical id survives a completed save.

use chrono::{Local, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, error, warn};

use llamadesk_core::{
    CONVERSATION_TITLE_MAX_LENGTH, ChatMessage, NEW_CONVERSATION_ID, NEW_CONVERSATION_TITLE,
    Result, first_user_message, truncate_chars,
};

use crate::fs_util::{is_plain_file_name, read_json, write_json_atomic};

const RECORD_EXTENSION: &str = "json";
const VERSION_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static VERSION_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{8}_\d{6}$").expect("static regex"));

/// A persisted chat transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    #[serde(default)]
    pub logical_id: String,
    #[serde(default)]
    pub version_key: String,
    #[serde(default)]
    pub title: String,
    pub messages: Vec<ChatMessage>,
    /// Chat memory state, restored verbatim into a new session
    #[serde(default)]
    pub memory: Vec<ChatMessage>,
    #[serde(default = "unknown_model", alias = "model")]
    pub model_id: String,
    #[serde(default = "unknown_date", alias = "timestamp")]
    pub created_at: String,
}

fn unknown_model() -> String {
    "unknown".to_string()
}

fn unknown_date() -> String {
    "Unknown date".to_string()
}

impl ConversationRecord {
    /// `"{date} - {model}: {title}"`, the label shown in conversation pickers
    pub fn display_label(&self) -> String {
        let title = if self.title.is_empty() {
            let first = first_user_message(&self.messages).unwrap_or("");
            let mut title = truncate_chars(first, CONVERSATION_TITLE_MAX_LENGTH).to_string();
            if first.chars().count() > CONVERSATION_TITLE_MAX_LENGTH {
                title.push_str("...");
            }
            title
        } else {
            self.title.clone()
        };

        format!(
            "{} - {}: {}",
            truncate_chars(&self.created_at, 10),
            self.model_id,
            title
        )
    }
}

/// Identity of a successfully saved conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedConversation {
    /// Stable id across edits
    pub logical_id: String,
    /// Physical key of the record just written
    pub version_key: String,
}

/// One row of [`ConversationStore::list_all`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationListing {
    pub version_key: String,
    pub label: String,
}

/// Title to store: the explicit one, or the first 40 characters of the first
/// user message when unset or still the placeholder.
pub fn derive_title(title: Option<&str>, messages: &[ChatMessage]) -> String {
    match title {
        Some(t) if !t.is_empty() && t != NEW_CONVERSATION_TITLE => t.to_string(),
        _ => first_user_message(messages)
            .map(|content| {
                truncate_chars(content, CONVERSATION_TITLE_MAX_LENGTH)
                    .trim()
                    .to_string()
            })
            .unwrap_or_default(),
    }
}

/// Logical id for a new conversation: the truncated title with spaces turned
/// into underscores and anything unsafe in a file name dropped.
pub fn conversation_id_from_title(title: &str) -> String {
    let slug: String = truncate_chars(title, CONVERSATION_TITLE_MAX_LENGTH)
        .trim()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            c if c.is_alphanumeric() || c == '-' || c == '_' => Some(c),
            _ => None,
        })
        .collect();

    if slug.is_empty() {
        NEW_CONVERSATION_ID.to_string()
    } else {
        slug
    }
}

/// Manages conversation persistence to disk
#[derive(Debug, Clone)]
pub struct ConversationStore {
    base_dir: PathBuf,
}

impl ConversationStore {
    /// Open a store rooted at `base_dir`, creating the directory if needed
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Save a conversation, superseding earlier versions of the same logical id.
    ///
    /// Returns `None` when `messages` is empty (nothing is written) or when the
    /// write fails.
    pub fn save(
        &self,
        conversation_id: &str,
        messages: &[ChatMessage],
        model_id: &str,
        memory: &[ChatMessage],
        title: Option<&str>,
    ) -> Option<SavedConversation> {
        self.save_at(
            conversation_id,
            messages,
            model_id,
            memory,
            title,
            Local::now().naive_local(),
        )
    }

    pub(crate) fn save_at(
        &self,
        conversation_id: &str,
        messages: &[ChatMessage],
        model_id: &str,
        memory: &[ChatMessage],
        title: Option<&str>,
        now: NaiveDateTime,
    ) -> Option<SavedConversation> {
        if messages.is_empty() {
            return None;
        }

        let title = derive_title(title, messages);
        let logical_id = if conversation_id == NEW_CONVERSATION_ID {
            conversation_id_from_title(&title)
        } else {
            conversation_id.to_string()
        };
        let version_key = format!("{}_{}", logical_id, now.format(VERSION_TIMESTAMP_FORMAT));

        let Some(path) = self.record_path(&version_key) else {
            error!(logical_id = %logical_id, "conversation id is not usable as a file name");
            return None;
        };

        let record = ConversationRecord {
            logical_id: logical_id.clone(),
            version_key: version_key.clone(),
            title,
            messages: messages.to_vec(),
            memory: memory.to_vec(),
            model_id: model_id.to_string(),
            created_at: now.format(CREATED_AT_FORMAT).to_string(),
        };

        if let Err(e) = write_json_atomic(&path, &record) {
            error!(version_key = %version_key, error = %e, "failed to save conversation");
            return None;
        }

        self.remove_previous_versions(&logical_id, &version_key);

        debug!(version_key = %version_key, "conversation saved");
        Some(SavedConversation {
            logical_id,
            version_key,
        })
    }

    /// Load one physical record; missing or corrupt records are `None`
    pub fn load(&self, version_key: &str) -> Option<ConversationRecord> {
        let path = self.record_path(version_key)?;
        match read_json::<ConversationRecord>(&path) {
            Ok(mut record) => {
                if record.version_key.is_empty() {
                    record.version_key = version_key.to_string();
                }
                Some(record)
            }
            Err(e) => {
                debug!(version_key = %version_key, error = %e, "conversation not loadable");
                None
            }
        }
    }

    /// Delete one physical record; any failure is reported as `false`
    pub fn delete(&self, version_key: &str) -> bool {
        let Some(path) = self.record_path(version_key) else {
            return false;
        };
        match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) => {
                warn!(version_key = %version_key, error = %e, "failed to delete conversation");
                false
            }
        }
    }

    /// List every readable record, newest first
    pub fn list_all(&self) -> Vec<ConversationListing> {
        let mut conversations = Vec::new();

        for (version_key, path) in self.record_files() {
            match read_json::<ConversationRecord>(&path) {
                Ok(record) => conversations.push(ConversationListing {
                    label: record.display_label(),
                    version_key,
                }),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping unreadable conversation");
                }
            }
        }

        conversations.sort_by(|a, b| b.version_key.cmp(&a.version_key));
        conversations
    }

    fn record_path(&self, version_key: &str) -> Option<PathBuf> {
        is_plain_file_name(version_key)
            .then(|| self.base_dir.join(format!("{}.{}", version_key, RECORD_EXTENSION)))
    }

    /// `(version_key, path)` for every record file in the directory
    fn record_files(&self) -> Vec<(String, PathBuf)> {
        let entries = match fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.base_dir.display(), error = %e, "conversation directory not readable");
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.extension().is_some_and(|ext| ext == RECORD_EXTENSION))
            .filter_map(|path| {
                let stem = path.file_stem()?.to_str()?.to_string();
                Some((stem, path))
            })
            .collect()
    }

    /// Best-effort removal of every older version of `logical_id`
    fn remove_previous_versions(&self, logical_id: &str, keep: &str) {
        let prefix = format!("{}_", logical_id);

        for (version_key, path) in self.record_files() {
            if version_key == keep {
                continue;
            }
            let is_version = version_key
                .strip_prefix(&prefix)
                .is_some_and(|suffix| VERSION_SUFFIX.is_match(suffix));
            if !is_version {
                continue;
            }
            if let Err(e) = fs::remove_file(&path) {
                warn!(file = %path.display(), error = %e, "failed to prune old conversation version");
            }
        }
    }
}
