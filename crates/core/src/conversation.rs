//! Conversation turns and the two memory retention policies.

use crate::llm_client::ChatMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of turns retained by short-term memory.
pub const SHORT_TERM_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(TurnRole::User),
            "assistant" | "ai" => Some(TurnRole::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    Text,
    Image,
    File,
}

impl TurnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnKind::Text => "text",
            TurnKind::Image => "image",
            TurnKind::File => "file",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(TurnKind::Text),
            "image" => Some(TurnKind::Image),
            "file" => Some(TurnKind::File),
            _ => None,
        }
    }
}

/// A resource attached to a turn: an uploaded file or a generated image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl Attachment {
    pub fn file(url: impl Into<String>, file_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            file_name: Some(file_name.into()),
            mime_type: Some(mime_type.into()),
        }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            file_name: None,
            mime_type: None,
        }
    }
}

/// One exchange unit of a conversation.
///
/// The constructors guarantee that `content` and `attachment` are never both
/// absent and that `kind` matches the populated fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: Option<String>,
    pub kind: TurnKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user_text(content: impl Into<String>) -> Self {
        Self::text(TurnRole::User, content)
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self::text(TurnRole::Assistant, content)
    }

    /// A user turn carrying an uploaded file, with optional accompanying text.
    pub fn user_file(content: Option<String>, attachment: Attachment) -> Self {
        Self {
            role: TurnRole::User,
            content: content.filter(|c| !c.is_empty()),
            kind: TurnKind::File,
            attachment: Some(attachment),
            timestamp: Utc::now(),
        }
    }

    /// An assistant turn showing a generated image; the caption is its content.
    pub fn assistant_image(url: impl Into<String>, caption: Option<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: caption,
            kind: TurnKind::Image,
            attachment: Some(Attachment::image(url)),
            timestamp: Utc::now(),
        }
    }

    fn text(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            kind: TurnKind::Text,
            attachment: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// The message this turn contributes to a generation request, if any.
    ///
    /// File turns are skipped: their metadata travelled inside the user prompt
    /// of the request that introduced them.
    pub fn to_chat_message(&self) -> Option<ChatMessage> {
        if self.kind == TurnKind::File {
            return None;
        }
        let content = self.content.as_deref().filter(|c| !c.is_empty())?;
        Some(match self.role {
            TurnRole::User => ChatMessage::user(content),
            TurnRole::Assistant => ChatMessage::assistant(content),
        })
    }
}

/// Which retention policy backs the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryPolicy {
    /// Bounded in-memory ring, oldest turn evicted first.
    ShortTerm,
    /// Unbounded view over the externally persisted log.
    LongTerm,
}

impl MemoryPolicy {
    pub fn from_long_term_flag(long_term: bool) -> Self {
        if long_term {
            MemoryPolicy::LongTerm
        } else {
            MemoryPolicy::ShortTerm
        }
    }
}

/// The turns supplied as context to the generation service.
///
/// Exactly one policy is active. Changing it discards every retained turn.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    policy: MemoryPolicy,
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
}

impl ConversationMemory {
    pub fn new(policy: MemoryPolicy) -> Self {
        Self::with_capacity(policy, SHORT_TERM_CAPACITY)
    }

    pub fn with_capacity(policy: MemoryPolicy, capacity: usize) -> Self {
        Self {
            policy,
            turns: VecDeque::new(),
            capacity,
        }
    }

    pub fn policy(&self) -> MemoryPolicy {
        self.policy
    }

    /// Switches policy. Retained turns are cleared, never merged.
    pub fn set_policy(&mut self, policy: MemoryPolicy) {
        self.policy = policy;
        self.turns.clear();
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        if self.policy == MemoryPolicy::ShortTerm {
            if self.capacity == 0 {
                return;
            }
            while self.turns.len() >= self.capacity {
                self.turns.pop_front();
            }
        }
        self.turns.push_back(turn);
    }

    /// Replaces retained turns with a chronologically ordered reload.
    pub fn replace(&mut self, turns: Vec<ConversationTurn>) {
        self.turns.clear();
        for turn in turns {
            self.push(turn);
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    /// The retained turns as generation context, oldest first.
    pub fn context(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .filter_map(ConversationTurn::to_chat_message)
            .collect()
    }
}
