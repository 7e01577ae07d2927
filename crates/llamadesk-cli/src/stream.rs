//! Filtering of streamed model output
//!
//! Reasoning models wrap their chain of thought in `<think>...</think>`. The
//! tags can arrive split across tokens, so the filter holds back any suffix
//! that could still turn into a tag.

use regex::Regex;
use std::sync::LazyLock;

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

static THINK_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("static regex"));

/// Remove complete reasoning sections and message-wrapper artifacts from a final answer
pub fn clean_response(response: &str) -> String {
    let without_think = THINK_SECTION.replace_all(response, "");
    strip_message_wrapper(&without_think).trim().to_string()
}

/// Undo a stringified `AIMessage(content="...")` wrapper, if present
pub fn strip_message_wrapper(text: &str) -> String {
    if !text.contains("AIMessage") {
        return text.to_string();
    }

    let mut text = match text.split_once("content=\"") {
        Some((_, rest)) => rest.rsplit_once('"').map_or(rest, |(inner, _)| inner).to_string(),
        None => text.to_string(),
    };

    for artifact in [
        "AIMessage(",
        ", additional_kwargs={}",
        ", response_metadata={})",
    ] {
        text = text.replace(artifact, "");
    }
    text
}

/// Incremental filter over streamed tokens
#[derive(Debug, Default)]
pub struct ThinkFilter {
    visible: String,
    pending: String,
    in_think: bool,
}

impl ThinkFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one token; returns the text that became visible because of it
    pub fn push(&mut self, token: &str) -> String {
        self.pending.push_str(token);
        let mut emitted = String::new();

        loop {
            if self.in_think {
                if let Some(pos) = self.pending.find(THINK_CLOSE) {
                    self.pending.drain(..pos + THINK_CLOSE.len());
                    self.in_think = false;
                    continue;
                }
                let keep = partial_tag_len(&self.pending, THINK_CLOSE);
                let hidden = self.pending.len() - keep;
                self.pending.drain(..hidden);
                break;
            }

            if let Some(pos) = self.pending.find(THINK_OPEN) {
                emitted.push_str(&self.pending[..pos]);
                self.pending.drain(..pos + THINK_OPEN.len());
                self.in_think = true;
                continue;
            }
            let keep = partial_tag_len(&self.pending, THINK_OPEN);
            let ready = self.pending.len() - keep;
            emitted.push_str(&self.pending[..ready]);
            self.pending.drain(..ready);
            break;
        }

        self.visible.push_str(&emitted);
        emitted
    }

    /// Flush text held back at end of stream; an unterminated reasoning section stays hidden
    pub fn finish(&mut self) -> String {
        if self.in_think {
            self.pending.clear();
            return String::new();
        }
        let rest = std::mem::take(&mut self.pending);
        self.visible.push_str(&rest);
        rest
    }

    /// Everything made visible so far
    pub fn text(&self) -> &str {
        &self.visible
    }

    pub fn in_think(&self) -> bool {
        self.in_think
    }
}

/// Length of the longest proper prefix of `tag` that `text` ends with
fn partial_tag_len(text: &str, tag: &str) -> usize {
    (1..tag.len())
        .rev()
        .find(|&k| text.ends_with(&tag[..k]))
        .unwrap_or(0)
}
