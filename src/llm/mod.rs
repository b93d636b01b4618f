//! Chat model integration via Bedrock
//!
//! One trait seam, one Bedrock-backed client bound to a single model id,
//! and a failover wrapper that runs the primary model with retries before
//! repeating the same policy on the fallback model.

mod bedrock;
mod failover;

pub use bedrock::BedrockChat;
pub use failover::FailoverChat;

use crate::error::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Message role in a chat-completion request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A message in a chat-completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Helper to build a user message
pub fn user_message(content: impl Into<String>) -> Message {
    Message {
        role: Role::User,
        content: content.into(),
    }
}

/// Trait for chat model clients
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a completion for a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;
}

static REASONING_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)<reasoning>.*?</reasoning>").ok());

/// Remove every `<reasoning>…</reasoning>` block and trim the remainder.
///
/// Never fails: without a usable pattern the raw content is returned
/// trimmed.
pub fn strip_reasoning(raw: &str) -> String {
    match REASONING_BLOCK.as_ref() {
        Some(pattern) => pattern.replace_all(raw, "").trim().to_string(),
        None => raw.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_reasoning_removes_blocks() {
        let raw = "<reasoning>thinking\nhard</reasoning>La respuesta es 42.";
        assert_eq!(strip_reasoning(raw), "La respuesta es 42.");
    }

    #[test]
    fn test_strip_reasoning_is_non_greedy() {
        let raw = "<reasoning>a</reasoning>keep<reasoning>b</reasoning> tail";
        assert_eq!(strip_reasoning(raw), "keep tail");
    }

    #[test]
    fn test_strip_reasoning_without_tags_only_trims() {
        assert_eq!(strip_reasoning("  plain answer \n"), "plain answer");
    }

    #[test]
    fn test_strip_reasoning_is_idempotent() {
        let raw = "<reasoning>x</reasoning> answer";
        let once = strip_reasoning(raw);
        assert_eq!(strip_reasoning(&once), once);
    }

    #[test]
    fn test_user_message() {
        let message = user_message("hola");
        assert_eq!(message.role, Role::User);
        assert_eq!(message.content, "hola");
    }
}
