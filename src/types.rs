//! Common types shared by both bot integrations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Role of a message in a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Persona and grounding context
    System,
    /// Message from the human user
    User,
}

/// Identifier of a conversation (a Discord channel or a Slack channel).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationKey(String);

impl ConversationKey {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationKey {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ConversationKey {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Platform-independent view of an inbound message event.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub conversation: ConversationKey,
    pub author: String,
    pub text: String,
    /// Whether the platform reports the bot among the message's mentions.
    pub mentions_self: bool,
    /// Whether the bot itself authored the message.
    pub from_self: bool,
    /// The platform token that references the bot inside message text, e.g. `<@123>`.
    pub self_mention_token: String,
}

impl InboundMessage {
    /// Returns true when this message should produce a completion reply.
    #[must_use]
    pub fn qualifies(&self) -> bool {
        !self.from_self && self.mentions_self
    }
}
